//! Canonical payment-status normalization
//!
//! Providers report status with their own vocabulary ("paid", "successful",
//! "abandoned", ...). Everything funnels through this table into the
//! three-value canonical status. Unrecognized strings map to `Pending`:
//! an unknown provider state is never treated as final.

use shared::models::PaymentStatus;

/// Provider status strings that mean the payment settled
const SUCCESS_STATUSES: &[&str] = &["paid", "success", "successful", "completed", "approved"];

/// Provider status strings that mean the attempt terminally failed
const FAILED_STATUSES: &[&str] = &[
    "failed",
    "failure",
    "cancelled",
    "canceled",
    "declined",
    "expired",
    "abandoned",
    "reversed",
];

/// Normalize a provider-specific status string, case- and
/// whitespace-insensitively, into the canonical three-value status
pub fn normalize_provider_status(provider_status: &str) -> PaymentStatus {
    let s = provider_status.trim().to_ascii_lowercase();
    if SUCCESS_STATUSES.contains(&s.as_str()) {
        PaymentStatus::Success
    } else if FAILED_STATUSES.contains(&s.as_str()) {
        PaymentStatus::Failed
    } else {
        PaymentStatus::Pending
    }
}
