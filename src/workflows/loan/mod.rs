//! Conversational loan-processing workflow: a fixed greeting-to-decision
//! sequence with per-applicant session state, sanctions screening at the
//! data-fetch step, and a configurable eligibility formula.

pub mod directory;
pub mod domain;
pub mod eligibility;
pub mod responder;
pub mod router;
pub mod screening;
pub mod service;
pub mod session;

pub use directory::{CsvUserDirectory, InMemoryUserDirectory, UserDirectory};
pub use domain::{ApplicantId, ConversationSession, ConversationStep, LoanType, UserRecord};
pub use eligibility::{EligibilityCalculator, EligibilityResult, LoanPolicy};
pub use responder::{ResponseGenerator, ScriptedResponder};
pub use router::loan_router;
pub use screening::{SanctionsScreener, ScreeningPolicy, ScreeningVerdict};
pub use service::{LoanConversationService, WorkflowError, COMPLIANCE_DECLINE_MESSAGE};
pub use session::{InMemorySessionStore, SessionStore};
