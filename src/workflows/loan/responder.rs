use super::domain::SessionContext;

/// Natural-language phrasing contract. Implementations must be total: every
/// call returns some usable string, so the workflow never has to handle a
/// phrasing failure. Retry, caching, and model fallback are implementation
/// concerns of the collaborator behind this trait.
pub trait ResponseGenerator: Send + Sync {
    fn respond(&self, prompt: &str, context: &SessionContext, conversation_id: &str) -> String;
}

/// Canned phrasing keyed on prompt keywords, used when no language-model
/// backend is configured.
#[derive(Debug, Default, Clone)]
pub struct ScriptedResponder;

impl ResponseGenerator for ScriptedResponder {
    fn respond(&self, prompt: &str, context: &SessionContext, _conversation_id: &str) -> String {
        let lowered = prompt.to_lowercase();
        let name = context.applicant_name.as_deref().unwrap_or("valued customer");

        if lowered.contains("greet") {
            return format!(
                "Hello {name}! Welcome to our loan processing service. I'm here to help \
                 with your application. What type of loan are you interested in today? \
                 We offer personal, home, auto, and business loans."
            );
        }

        if lowered.contains("confirm") && lowered.contains("data") {
            return "I've retrieved your information from our records. Please review the \
                    details and confirm that everything looks correct; the next step is \
                    entering your desired loan amount."
                .to_string();
        }

        if lowered.contains("loan amount") {
            return "Great! Please enter the loan amount you'd like to apply for, and I'll \
                    check your eligibility against your financial profile."
                .to_string();
        }

        if lowered.contains("denied") {
            return "I'm sorry, but based on our current assessment we're unable to approve \
                    your loan request at this time. Our financial advisors can help you \
                    improve your eligibility; would you like to schedule a consultation?"
                .to_string();
        }

        "I'm here to help with your loan application. Please let me know how I can assist."
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_named(name: &str) -> SessionContext {
        SessionContext {
            applicant_name: Some(name.to_string()),
            ..SessionContext::default()
        }
    }

    #[test]
    fn greeting_addresses_the_applicant_by_name() {
        let responder = ScriptedResponder;
        let reply = responder.respond(
            "Greet the applicant and ask what type of loan they want",
            &context_named("Jane Smith"),
            "USR002",
        );
        assert!(reply.contains("Jane Smith"));
        assert!(reply.to_lowercase().contains("loan"));
    }

    #[test]
    fn greeting_falls_back_without_a_name() {
        let responder = ScriptedResponder;
        let reply = responder.respond("greet", &SessionContext::default(), "USR999");
        assert!(reply.contains("valued customer"));
    }

    #[test]
    fn every_prompt_produces_some_reply() {
        let responder = ScriptedResponder;
        for prompt in [
            "confirm the data",
            "ask for the loan amount",
            "loan denied",
            "completely unrelated question",
        ] {
            let reply = responder.respond(prompt, &SessionContext::default(), "USR001");
            assert!(!reply.is_empty());
        }
    }
}
