//! Credit activity types and validation.

use serde::Serialize;

use crate::error::CoreError;

/// Charge recorded when a job completes (negative amount).
pub const ACTIVITY_JOB_CHARGE: &str = "job_charge";

/// Credits added by the user.
pub const ACTIVITY_TOP_UP: &str = "top_up";

/// Credits returned for a failed or cancelled job.
pub const ACTIVITY_REFUND: &str = "refund";

/// Manual correction in either direction.
pub const ACTIVITY_ADJUSTMENT: &str = "adjustment";

pub const VALID_ACTIVITY_TYPES: &[&str] = &[
    ACTIVITY_JOB_CHARGE,
    ACTIVITY_TOP_UP,
    ACTIVITY_REFUND,
    ACTIVITY_ADJUSTMENT,
];

/// Activity types a client may record directly; charges and refunds are
/// written by the job lifecycle only.
pub const MANUAL_ACTIVITY_TYPES: &[&str] = &[ACTIVITY_TOP_UP, ACTIVITY_ADJUSTMENT];

/// Largest single manual amount.
pub const MAX_MANUAL_AMOUNT: f64 = 1_000_000.0;

/// Validate a manually recorded activity.
pub fn validate_manual_activity(activity_type: &str, amount: f64) -> Result<(), CoreError> {
    if !MANUAL_ACTIVITY_TYPES.contains(&activity_type) {
        return Err(CoreError::Validation(format!(
            "Invalid activity_type '{activity_type}'. Must be one of: {}",
            MANUAL_ACTIVITY_TYPES.join(", ")
        )));
    }
    if !amount.is_finite() || amount.abs() > MAX_MANUAL_AMOUNT {
        return Err(CoreError::Validation(format!(
            "amount must be a finite number with magnitude <= {MAX_MANUAL_AMOUNT}"
        )));
    }
    match activity_type {
        ACTIVITY_TOP_UP if amount <= 0.0 => Err(CoreError::Validation(
            "top_up amount must be positive".to_string(),
        )),
        ACTIVITY_ADJUSTMENT if amount == 0.0 => Err(CoreError::Validation(
            "adjustment amount must be non-zero".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Aggregated credit totals for a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreditSummary {
    pub balance: f64,
    pub total_spent: f64,
    pub total_added: f64,
    pub activity_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_up_must_be_positive() {
        assert!(validate_manual_activity("top_up", 10.0).is_ok());
        assert!(validate_manual_activity("top_up", 0.0).is_err());
        assert!(validate_manual_activity("top_up", -5.0).is_err());
    }

    #[test]
    fn adjustment_any_sign_but_zero() {
        assert!(validate_manual_activity("adjustment", -3.5).is_ok());
        assert!(validate_manual_activity("adjustment", 0.0).is_err());
    }

    #[test]
    fn lifecycle_types_not_manual() {
        assert!(validate_manual_activity("job_charge", -1.0).is_err());
        assert!(validate_manual_activity("refund", 1.0).is_err());
    }

    #[test]
    fn non_finite_and_huge_amounts_rejected() {
        assert!(validate_manual_activity("top_up", f64::NAN).is_err());
        assert!(validate_manual_activity("top_up", 2_000_000.0).is_err());
    }
}
