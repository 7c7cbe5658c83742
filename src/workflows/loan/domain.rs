use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for loan applicants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicantId(pub String);

impl fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only financial record for one applicant, as served by the user
/// directory. Income, expenses, and existing loan are non-negative by
/// construction of the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: ApplicantId,
    pub name: String,
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    pub existing_loan: f64,
}

/// Loan categories offered in the opening prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    Personal,
    Home,
    Auto,
    Business,
}

impl LoanType {
    pub const fn label(self) -> &'static str {
        match self {
            LoanType::Personal => "personal",
            LoanType::Home => "home",
            LoanType::Auto => "auto",
            LoanType::Business => "business",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "personal" => Some(LoanType::Personal),
            "home" => Some(LoanType::Home),
            "auto" => Some(LoanType::Auto),
            "business" => Some(LoanType::Business),
            _ => None,
        }
    }
}

/// Position in the fixed conversation sequence. Ordering follows declaration
/// order; sessions only ever move forward through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStep {
    AwaitingGreeting,
    AwaitingLoanType,
    AwaitingDataConfirmation,
    AwaitingLoanAmount,
    AwaitingEligibilityCalculation,
    AwaitingFinalConfirmation,
    Complete,
    SanctionsHalted,
}

impl ConversationStep {
    pub const fn label(self) -> &'static str {
        match self {
            ConversationStep::AwaitingGreeting => "awaiting_greeting",
            ConversationStep::AwaitingLoanType => "awaiting_loan_type",
            ConversationStep::AwaitingDataConfirmation => "awaiting_data_confirmation",
            ConversationStep::AwaitingLoanAmount => "awaiting_loan_amount",
            ConversationStep::AwaitingEligibilityCalculation => {
                "awaiting_eligibility_calculation"
            }
            ConversationStep::AwaitingFinalConfirmation => "awaiting_final_confirmation",
            ConversationStep::Complete => "complete",
            ConversationStep::SanctionsHalted => "sanctions_halted",
        }
    }

    /// Wire name of the transition the caller is expected to invoke next.
    pub const fn expected_transition(self) -> &'static str {
        match self {
            ConversationStep::AwaitingGreeting => "greet",
            ConversationStep::AwaitingLoanType => "select_loan_type",
            ConversationStep::AwaitingDataConfirmation => "confirm_data",
            ConversationStep::AwaitingLoanAmount => "enter_loan_amount",
            ConversationStep::AwaitingEligibilityCalculation => "calculate_eligibility",
            ConversationStep::AwaitingFinalConfirmation => "final_confirmation",
            ConversationStep::Complete => "complete",
            ConversationStep::SanctionsHalted => "halted",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ConversationStep::Complete | ConversationStep::SanctionsHalted
        )
    }
}

/// Typed context accumulated over the conversation and handed to the response
/// generator for phrasing continuity. Fields are only ever filled in or
/// overwritten, never cleared mid-flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub applicant_name: Option<String>,
    pub greeted_at: Option<DateTime<Utc>>,
    pub loan_type: Option<LoanType>,
    pub monthly_income: Option<f64>,
    pub monthly_expenses: Option<f64>,
    pub existing_loan: Option<f64>,
    pub screening_status: Option<String>,
    pub requested_amount: Option<f64>,
    pub total_eligibility: Option<f64>,
    pub eligible_amount: Option<f64>,
    pub is_eligible: Option<bool>,
}

/// One applicant's conversation state, owned exclusively by the session store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub applicant_id: ApplicantId,
    pub step: ConversationStep,
    pub context: SessionContext,
    pub loan_type: Option<LoanType>,
    pub user_record: Option<UserRecord>,
    pub process_halted: bool,
    pub halt_message: Option<String>,
    pub loan_amount: Option<f64>,
    pub total_eligibility: Option<f64>,
    pub eligible_amount: Option<f64>,
    pub is_eligible: Option<bool>,
}

impl ConversationSession {
    pub fn new(applicant_id: ApplicantId) -> Self {
        Self {
            applicant_id,
            step: ConversationStep::AwaitingGreeting,
            context: SessionContext::default(),
            loan_type: None,
            user_record: None,
            process_halted: false,
            halt_message: None,
            loan_amount: None,
            total_eligibility: None,
            eligible_amount: None,
            is_eligible: None,
        }
    }

    /// Move the session forward. Backward moves are ignored, and a halted
    /// session is frozen permanently.
    pub fn advance(&mut self, next: ConversationStep) {
        if !self.process_halted && next > self.step {
            self.step = next;
        }
    }

    /// Enter the absorbing halted state, recording the permanent reply every
    /// later call against this session must return.
    pub fn halt(&mut self, message: String) {
        self.process_halted = true;
        self.halt_message = Some(message);
        self.step = ConversationStep::SanctionsHalted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_only_advance_forward() {
        let mut session = ConversationSession::new(ApplicantId("USR001".to_string()));
        session.advance(ConversationStep::AwaitingDataConfirmation);
        assert_eq!(session.step, ConversationStep::AwaitingDataConfirmation);

        session.advance(ConversationStep::AwaitingLoanType);
        assert_eq!(session.step, ConversationStep::AwaitingDataConfirmation);
    }

    #[test]
    fn halt_freezes_the_session() {
        let mut session = ConversationSession::new(ApplicantId("USR001".to_string()));
        session.halt("declined".to_string());
        assert!(session.process_halted);
        assert_eq!(session.step, ConversationStep::SanctionsHalted);

        session.advance(ConversationStep::Complete);
        assert_eq!(session.step, ConversationStep::SanctionsHalted);
        assert!(session.step.is_terminal());
    }

    #[test]
    fn loan_type_parses_case_insensitively() {
        assert_eq!(LoanType::parse(" Personal "), Some(LoanType::Personal));
        assert_eq!(LoanType::parse("HOME"), Some(LoanType::Home));
        assert_eq!(LoanType::parse("boat"), None);
    }

    #[test]
    fn expected_transition_tracks_step() {
        assert_eq!(
            ConversationStep::AwaitingLoanType.expected_transition(),
            "select_loan_type"
        );
        assert_eq!(
            ConversationStep::SanctionsHalted.expected_transition(),
            "halted"
        );
    }
}
