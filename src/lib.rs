//! Conversational loan-processing service.
//!
//! The crate wraps a fixed multi-step applicant conversation (greeting, loan
//! type selection, data confirmation, amount entry, eligibility calculation,
//! final decision) behind an HTTP API. The workflow core lives under
//! [`workflows::loan`]; everything else is configuration, telemetry, and
//! transport plumbing.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
