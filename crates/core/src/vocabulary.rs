//! Translation of legacy status strings into the canonical enums.
//!
//! | legacy       | canonical   |
//! |--------------|-------------|
//! | `pending`    | `Pending`   |
//! | `approved`   | `Approved`  |
//! | `processing` | `Approved`  |
//! | `failed`     | `Approved`  |
//! | `rejected`   | `Rejected`  |
//! | `cancelled`  | `Rejected`  |
//! | `executed`   | `Completed` |
//! | `completed`  | `Completed` |
//!
//! A `failed` payout is still awaiting completion, so it stays `Approved`.

use crate::domain::status::{RefundStatus, SupportCaseStatus};
use crate::errors::DomainError;

pub const LEGACY_REFUND_STATUSES: [(&str, RefundStatus); 8] = [
    ("pending", RefundStatus::Pending),
    ("approved", RefundStatus::Approved),
    ("processing", RefundStatus::Approved),
    ("failed", RefundStatus::Approved),
    ("rejected", RefundStatus::Rejected),
    ("cancelled", RefundStatus::Rejected),
    ("executed", RefundStatus::Completed),
    ("completed", RefundStatus::Completed),
];

pub fn translate_legacy_refund_status(value: &str) -> Result<RefundStatus, DomainError> {
    let needle = value.trim().to_ascii_lowercase();
    let needle = if needle == "canceled" { "cancelled".to_owned() } else { needle };
    LEGACY_REFUND_STATUSES
        .iter()
        .find(|(legacy, _)| *legacy == needle)
        .map(|(_, status)| *status)
        .ok_or_else(|| DomainError::invalid_status("refund status", value))
}

pub fn translate_legacy_case_status(value: &str) -> Result<SupportCaseStatus, DomainError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "resolved" => Ok(SupportCaseStatus::Closed),
        _ => value.parse(),
    }
}
