use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::directory::{DirectoryError, UserDirectory};
use super::domain::{
    ApplicantId, ConversationSession, ConversationStep, LoanType, UserRecord,
};
use super::eligibility::{
    EligibilityCalculator, EligibilityOutcome, LoanPolicy, ValidationError,
};
use super::responder::ResponseGenerator;
use super::screening::{SanctionsScreener, ScreeningPolicy};
use super::session::{SessionStore, SessionStoreError};

/// Fixed reply stored on a session when sanctions screening fails. Every
/// later call against the halted session returns exactly this text.
pub const COMPLIANCE_DECLINE_MESSAGE: &str =
    "We are unable to proceed with your loan application at this time. Your case has \
     been referred for compliance review, and our team will contact you if any further \
     information is required.";

/// Closed error set for the workflow core. The sanctions halt is deliberately
/// absent: it is a valid terminal business state, not a failure.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("no user record for '{0}'")]
    UserNotFound(ApplicantId),
    #[error("no active session for '{0}'")]
    SessionNotFound(ApplicantId),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Store(#[from] SessionStoreError),
}

/// Reply returned by the prompt-only transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReply {
    pub message: String,
    pub next_step: &'static str,
}

/// Reply for `select_loan_type`: the applicant's basic data plus the
/// screening status, alongside the conversational message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenedDataReply {
    pub user_id: ApplicantId,
    pub name: String,
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    pub existing_loan: f64,
    pub screening_clear: bool,
    pub screening_status: String,
    pub message: String,
    pub next_step: &'static str,
}

/// Numeric verdict for `calculate_eligibility`. `outcome` is absent when a
/// halted session short-circuited the calculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilityReply {
    pub total_eligibility: f64,
    pub eligible_amount: f64,
    pub requested_amount: f64,
    pub is_eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<EligibilityOutcome>,
    pub message: String,
    pub next_step: &'static str,
}

/// Orchestrates the fixed conversation sequence: session lifecycle, sanctions
/// screening at the data-fetch step, eligibility calculation, and delegation
/// of free-text phrasing to the response generator.
pub struct LoanConversationService<D, S, G> {
    directory: Arc<D>,
    sessions: Arc<S>,
    responder: Arc<G>,
    calculator: EligibilityCalculator,
    screener: Arc<SanctionsScreener>,
}

impl<D, S, G> LoanConversationService<D, S, G>
where
    D: UserDirectory + 'static,
    S: SessionStore + 'static,
    G: ResponseGenerator + 'static,
{
    pub fn new(
        directory: Arc<D>,
        sessions: Arc<S>,
        responder: Arc<G>,
        loan_policy: LoanPolicy,
        screening_policy: ScreeningPolicy,
    ) -> Self {
        Self {
            directory,
            sessions,
            responder,
            calculator: EligibilityCalculator::new(loan_policy),
            screener: Arc::new(SanctionsScreener::new(screening_policy)),
        }
    }

    /// Start (or restart) a conversation. Supersedes any prior session for
    /// the applicant.
    pub fn greet(&self, applicant_id: &ApplicantId) -> Result<StepReply, WorkflowError> {
        let record = self.require_record(applicant_id)?;

        let mut session = ConversationSession::new(applicant_id.clone());
        session.context.applicant_name = Some(record.name.clone());
        session.context.greeted_at = Some(Utc::now());
        session.advance(ConversationStep::AwaitingLoanType);

        let message = self.responder.respond(
            "Greet the applicant and ask what type of loan they are interested in",
            &session.context,
            &applicant_id.0,
        );
        let next_step = session.step.expected_transition();

        self.sessions.create_or_replace(session)?;
        info!(applicant = %applicant_id, "loan conversation started");

        Ok(StepReply { message, next_step })
    }

    /// Record the loan type, re-fetch the applicant's data, and run the
    /// sanctions screen. A failed screen permanently halts the session.
    pub fn select_loan_type(
        &self,
        applicant_id: &ApplicantId,
        loan_type: LoanType,
    ) -> Result<ScreenedDataReply, WorkflowError> {
        let record = self.require_record(applicant_id)?;
        let mut session = self.require_session(applicant_id)?;

        if session.process_halted {
            let reply = Self::halt_text(&session);
            return Ok(Self::screened_reply(&record, false, &session, reply));
        }

        session.context.monthly_income = Some(record.monthly_income);
        session.context.monthly_expenses = Some(record.monthly_expenses);
        session.context.existing_loan = Some(record.existing_loan);
        session.user_record = Some(record.clone());

        let verdict = self.screener.screen(&record.name, applicant_id);
        session.context.screening_status = Some(verdict.status.clone());

        if !verdict.clear {
            session.halt(COMPLIANCE_DECLINE_MESSAGE.to_string());
            self.sessions.update(session)?;
            warn!(
                applicant = %applicant_id,
                status = %verdict.status,
                "sanctions screening halted the conversation"
            );
            return Ok(ScreenedDataReply {
                user_id: record.user_id.clone(),
                name: record.name.clone(),
                monthly_income: record.monthly_income,
                monthly_expenses: record.monthly_expenses,
                existing_loan: record.existing_loan,
                screening_clear: false,
                screening_status: verdict.status,
                message: COMPLIANCE_DECLINE_MESSAGE.to_string(),
                next_step: ConversationStep::SanctionsHalted.expected_transition(),
            });
        }

        // The loan type is set once; a repeated call keeps the original.
        if session.loan_type.is_none() {
            session.loan_type = Some(loan_type);
            session.context.loan_type = Some(loan_type);
        }
        session.advance(ConversationStep::AwaitingDataConfirmation);

        let message = self.responder.respond(
            "Present the retrieved data and ask the applicant to confirm their details",
            &session.context,
            &applicant_id.0,
        );
        let next_step = session.step.expected_transition();
        self.sessions.update(session)?;

        Ok(ScreenedDataReply {
            user_id: record.user_id.clone(),
            name: record.name.clone(),
            monthly_income: record.monthly_income,
            monthly_expenses: record.monthly_expenses,
            existing_loan: record.existing_loan,
            screening_clear: true,
            screening_status: verdict.status,
            message,
            next_step,
        })
    }

    /// Acknowledge the data confirmation and move on to amount entry.
    /// Safe to re-invoke; the step never moves backward.
    pub fn confirm_data(&self, applicant_id: &ApplicantId) -> Result<StepReply, WorkflowError> {
        let mut session = self.require_session(applicant_id)?;
        if session.process_halted {
            return Ok(Self::halted_step_reply(&session));
        }

        session.advance(ConversationStep::AwaitingLoanAmount);
        let message = self.responder.respond(
            "Ask the applicant to confirm their data and explain that the next step is \
             entering the loan amount",
            &session.context,
            &applicant_id.0,
        );
        let next_step = session.step.expected_transition();
        self.sessions.update(session)?;

        Ok(StepReply { message, next_step })
    }

    /// Prompt for the desired loan amount.
    pub fn request_loan_amount(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<StepReply, WorkflowError> {
        let mut session = self.require_session(applicant_id)?;
        if session.process_halted {
            return Ok(Self::halted_step_reply(&session));
        }

        session.advance(ConversationStep::AwaitingEligibilityCalculation);
        let message = self.responder.respond(
            "Ask the applicant to enter their desired loan amount",
            &session.context,
            &applicant_id.0,
        );
        let next_step = session.step.expected_transition();
        self.sessions.update(session)?;

        Ok(StepReply { message, next_step })
    }

    /// Run the eligibility formula over the session's financial snapshot and
    /// persist the verdict. A validation failure leaves the session untouched
    /// so the caller can retry with a corrected amount.
    pub fn calculate_eligibility(
        &self,
        applicant_id: &ApplicantId,
        requested_amount: f64,
    ) -> Result<EligibilityReply, WorkflowError> {
        let mut session = self.require_session(applicant_id)?;
        if session.process_halted {
            // The verdict is fully zeroed; the requested figure is not echoed.
            return Ok(EligibilityReply {
                total_eligibility: 0.0,
                eligible_amount: 0.0,
                requested_amount: 0.0,
                is_eligible: false,
                outcome: None,
                message: Self::halt_text(&session),
                next_step: ConversationStep::SanctionsHalted.expected_transition(),
            });
        }

        // The snapshot is only present once select_loan_type has run.
        let record = session
            .user_record
            .clone()
            .ok_or_else(|| WorkflowError::SessionNotFound(applicant_id.clone()))?;

        let result = self.calculator.calculate(&record, requested_amount)?;

        session.loan_amount = Some(requested_amount);
        session.total_eligibility = Some(result.total_eligibility);
        session.eligible_amount = Some(result.eligible_amount);
        session.is_eligible = Some(result.is_eligible);
        session.context.requested_amount = Some(requested_amount);
        session.context.total_eligibility = Some(result.total_eligibility);
        session.context.eligible_amount = Some(result.eligible_amount);
        session.context.is_eligible = Some(result.is_eligible);
        session.advance(ConversationStep::AwaitingFinalConfirmation);

        let next_step = session.step.expected_transition();
        self.sessions.update(session)?;
        info!(
            applicant = %applicant_id,
            eligible = result.is_eligible,
            requested = requested_amount,
            "eligibility calculated"
        );

        Ok(EligibilityReply {
            total_eligibility: result.total_eligibility,
            eligible_amount: result.eligible_amount,
            requested_amount,
            is_eligible: result.is_eligible,
            outcome: Some(result.outcome),
            message: result.outcome.summary().to_string(),
            next_step,
        })
    }

    /// Close out the conversation with an approval or denial and delete the
    /// session; the applicant must greet again to run another cycle. Halted
    /// sessions are retained and keep replying with the stored decline.
    pub fn final_confirmation(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<StepReply, WorkflowError> {
        let session = self.require_session(applicant_id)?;
        if session.process_halted {
            return Ok(Self::halted_step_reply(&session));
        }

        let is_eligible = session.is_eligible.unwrap_or(false);
        let amount = session.loan_amount.unwrap_or(0.0);

        let message = if is_eligible {
            format!(
                "Congratulations! Your loan application for ${amount:.2} has been approved. \
                 The next step is signing the loan agreement; our team will reach out within \
                 24-48 hours to complete the paperwork."
            )
        } else {
            self.responder
                .respond("loan denied", &session.context, &applicant_id.0)
        };

        self.sessions.delete(applicant_id)?;
        info!(applicant = %applicant_id, eligible = is_eligible, "loan conversation completed");

        Ok(StepReply {
            message,
            next_step: ConversationStep::Complete.expected_transition(),
        })
    }

    /// Free-text side channel. Never changes the session's step.
    pub fn chat(
        &self,
        applicant_id: &ApplicantId,
        message: &str,
    ) -> Result<StepReply, WorkflowError> {
        let session = self.require_session(applicant_id)?;
        if session.process_halted {
            return Ok(Self::halted_step_reply(&session));
        }

        let reply = self
            .responder
            .respond(message, &session.context, &applicant_id.0);

        Ok(StepReply {
            message: reply,
            next_step: session.step.expected_transition(),
        })
    }

    fn require_record(&self, applicant_id: &ApplicantId) -> Result<UserRecord, WorkflowError> {
        self.directory
            .lookup(applicant_id)?
            .ok_or_else(|| WorkflowError::UserNotFound(applicant_id.clone()))
    }

    fn require_session(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<ConversationSession, WorkflowError> {
        self.sessions
            .get(applicant_id)?
            .ok_or_else(|| WorkflowError::SessionNotFound(applicant_id.clone()))
    }

    fn halt_text(session: &ConversationSession) -> String {
        session
            .halt_message
            .clone()
            .unwrap_or_else(|| COMPLIANCE_DECLINE_MESSAGE.to_string())
    }

    fn halted_step_reply(session: &ConversationSession) -> StepReply {
        StepReply {
            message: Self::halt_text(session),
            next_step: ConversationStep::SanctionsHalted.expected_transition(),
        }
    }

    fn screened_reply(
        record: &UserRecord,
        clear: bool,
        session: &ConversationSession,
        message: String,
    ) -> ScreenedDataReply {
        ScreenedDataReply {
            user_id: record.user_id.clone(),
            name: record.name.clone(),
            monthly_income: record.monthly_income,
            monthly_expenses: record.monthly_expenses,
            existing_loan: record.existing_loan,
            screening_clear: clear,
            screening_status: session
                .context
                .screening_status
                .clone()
                .unwrap_or_else(|| "halted".to_string()),
            message,
            next_step: session.step.expected_transition(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::loan::directory::InMemoryUserDirectory;
    use crate::workflows::loan::responder::ScriptedResponder;
    use crate::workflows::loan::session::InMemorySessionStore;
    use std::time::Duration;

    type Service =
        LoanConversationService<InMemoryUserDirectory, InMemorySessionStore, ScriptedResponder>;

    fn build_service() -> (Service, Arc<InMemorySessionStore>) {
        let directory = Arc::new(InMemoryUserDirectory::with_sample_records());
        let sessions = Arc::new(InMemorySessionStore::default());
        let responder = Arc::new(ScriptedResponder);
        let service = LoanConversationService::new(
            directory,
            sessions.clone(),
            responder,
            LoanPolicy::default(),
            ScreeningPolicy {
                simulation_match_probability: 0.0,
                cache_ttl: Duration::from_secs(3600),
                ..ScreeningPolicy::default()
            },
        );
        (service, sessions)
    }

    fn john() -> ApplicantId {
        ApplicantId("USR001".to_string())
    }

    #[test]
    fn greet_requires_a_known_user() {
        let (service, _) = build_service();
        let error = service
            .greet(&ApplicantId("USR999".to_string()))
            .expect_err("unknown user");
        assert!(matches!(error, WorkflowError::UserNotFound(_)));
    }

    #[test]
    fn greet_creates_a_session_awaiting_loan_type() {
        let (service, sessions) = build_service();
        let reply = service.greet(&john()).expect("greeting succeeds");
        assert_eq!(reply.next_step, "select_loan_type");
        assert!(reply.message.contains("John Doe"));

        let session = sessions.get(&john()).expect("get").expect("present");
        assert_eq!(session.step, ConversationStep::AwaitingLoanType);
        assert!(session.context.greeted_at.is_some());
    }

    #[test]
    fn validation_failure_leaves_session_figures_untouched() {
        let (service, sessions) = build_service();
        service.greet(&john()).expect("greet");
        service
            .select_loan_type(&john(), LoanType::Personal)
            .expect("select");

        let before = sessions.get(&john()).expect("get").expect("present");
        for bad_amount in [-5.0, 2_000_000.0] {
            let error = service
                .calculate_eligibility(&john(), bad_amount)
                .expect_err("amount rejected");
            assert!(matches!(error, WorkflowError::Validation(_)));

            let after = sessions.get(&john()).expect("get").expect("present");
            assert_eq!(before, after);
        }
    }

    #[test]
    fn eligibility_before_loan_type_selection_is_session_not_found() {
        let (service, _) = build_service();
        service.greet(&john()).expect("greet");
        let error = service
            .calculate_eligibility(&john(), 1000.0)
            .expect_err("snapshot missing");
        assert!(matches!(error, WorkflowError::SessionNotFound(_)));
    }

    #[test]
    fn repeated_calculations_are_last_write_wins() {
        let (service, sessions) = build_service();
        service.greet(&john()).expect("greet");
        service
            .select_loan_type(&john(), LoanType::Personal)
            .expect("select");

        let first = service
            .calculate_eligibility(&john(), 250_000.0)
            .expect("first calculation");
        assert!(first.is_eligible);

        let second = service
            .calculate_eligibility(&john(), 290_000.0)
            .expect("second calculation");
        assert!(!second.is_eligible);

        let session = sessions.get(&john()).expect("get").expect("present");
        assert_eq!(session.loan_amount, Some(290_000.0));
        assert_eq!(session.is_eligible, Some(false));
    }

    #[test]
    fn chat_does_not_change_the_step() {
        let (service, sessions) = build_service();
        service.greet(&john()).expect("greet");
        let reply = service.chat(&john(), "what documents do I need?").expect("chat");
        assert!(!reply.message.is_empty());
        assert_eq!(reply.next_step, "select_loan_type");

        let session = sessions.get(&john()).expect("get").expect("present");
        assert_eq!(session.step, ConversationStep::AwaitingLoanType);
    }

    #[test]
    fn prompt_transitions_are_safely_reinvocable() {
        let (service, _) = build_service();
        service.greet(&john()).expect("greet");
        service
            .select_loan_type(&john(), LoanType::Home)
            .expect("select");

        let first = service.confirm_data(&john()).expect("confirm");
        let again = service.confirm_data(&john()).expect("confirm again");
        assert_eq!(first, again);

        let prompt = service.request_loan_amount(&john()).expect("prompt");
        let prompt_again = service.request_loan_amount(&john()).expect("prompt again");
        assert_eq!(prompt, prompt_again);
        assert_eq!(prompt.next_step, "calculate_eligibility");
    }
}
