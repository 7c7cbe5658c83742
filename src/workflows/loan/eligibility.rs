use serde::{Deserialize, Serialize};

use super::domain::UserRecord;

/// Policy dial backing the eligibility formula.
///
/// The formula is `disposable_income * term_years * multiplier`, with the
/// annualization factor folded into `term_years` (default 12), so the stock
/// configuration reproduces `((income - expenses) * 12) * 5`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanPolicy {
    pub loan_multiplier: f64,
    pub loan_term_years: f64,
    pub max_loan_amount: f64,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            loan_multiplier: 5.0,
            loan_term_years: 12.0,
            max_loan_amount: 1_000_000.0,
        }
    }
}

/// Rejected transition input; the offending field, value, and reason are
/// preserved so the transport layer can render a precise message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("validation failed for field '{field}': {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub value: f64,
    pub reason: String,
}

/// Human-readable classification of an eligibility verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityOutcome {
    Eligible,
    InsufficientDisposableIncome,
    AmountExceedsLimit,
}

impl EligibilityOutcome {
    pub const fn summary(self) -> &'static str {
        match self {
            EligibilityOutcome::Eligible => "eligible",
            EligibilityOutcome::InsufficientDisposableIncome => {
                "not eligible: insufficient disposable income"
            }
            EligibilityOutcome::AmountExceedsLimit => {
                "not eligible: requested amount exceeds the eligible limit"
            }
        }
    }
}

/// Verdict produced by one eligibility calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub total_eligibility: f64,
    pub eligible_amount: f64,
    pub requested_amount: f64,
    pub is_eligible: bool,
    pub outcome: EligibilityOutcome,
}

/// Stateless calculator applying the configured formula to a financial
/// snapshot. Deterministic and side-effect free.
#[derive(Debug, Clone)]
pub struct EligibilityCalculator {
    policy: LoanPolicy,
}

impl EligibilityCalculator {
    pub fn new(policy: LoanPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &LoanPolicy {
        &self.policy
    }

    /// Reject non-positive or over-ceiling amounts before any figures are
    /// touched. Amounts are never silently clamped.
    pub fn validate_amount(&self, requested: f64) -> Result<(), ValidationError> {
        if !requested.is_finite() || requested <= 0.0 {
            return Err(ValidationError {
                field: "loan_amount",
                value: requested,
                reason: "loan amount must be a positive number".to_string(),
            });
        }

        if requested > self.policy.max_loan_amount {
            return Err(ValidationError {
                field: "loan_amount",
                value: requested,
                reason: format!(
                    "loan amount exceeds the configured ceiling of {:.2}",
                    self.policy.max_loan_amount
                ),
            });
        }

        Ok(())
    }

    pub fn calculate(
        &self,
        record: &UserRecord,
        requested: f64,
    ) -> Result<EligibilityResult, ValidationError> {
        self.validate_amount(requested)?;

        let disposable_income = record.monthly_income - record.monthly_expenses;
        let total_eligibility =
            disposable_income * self.policy.loan_term_years * self.policy.loan_multiplier;
        let eligible_amount = (total_eligibility - record.existing_loan).max(0.0);

        let is_eligible =
            requested <= eligible_amount && eligible_amount > 0.0 && disposable_income > 0.0;

        let outcome = if is_eligible {
            EligibilityOutcome::Eligible
        } else if disposable_income <= 0.0 {
            EligibilityOutcome::InsufficientDisposableIncome
        } else {
            EligibilityOutcome::AmountExceedsLimit
        };

        Ok(EligibilityResult {
            total_eligibility,
            eligible_amount,
            requested_amount: requested,
            is_eligible,
            outcome,
        })
    }
}
