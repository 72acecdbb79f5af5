//! Outcome of validating or applying a SET against a handler.

use crate::error::ErrorStatus;

/// Result of testing or committing one SET binding.
///
/// Variants map onto RFC 3416 error-status codes through
/// [`SetResult::to_error_status`]. SNMPv1 requests are further narrowed with
/// [`ErrorStatus::to_v1`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetResult {
    /// Operation succeeded.
    Ok,
    /// The handler does not accept writes.
    NotWritable,
    /// Value has the wrong ASN.1 type for this handler.
    WrongType,
    /// Value is longer than the handler's storage allows.
    WrongLength,
    /// Value is outside the handler's configured bounds.
    BadValue,
}

impl SetResult {
    /// Check if this result indicates success.
    pub fn is_ok(&self) -> bool {
        matches!(self, SetResult::Ok)
    }

    /// Convert to an ErrorStatus code.
    pub fn to_error_status(&self) -> ErrorStatus {
        match self {
            SetResult::Ok => ErrorStatus::NoError,
            SetResult::NotWritable => ErrorStatus::NotWritable,
            SetResult::WrongType => ErrorStatus::WrongType,
            SetResult::WrongLength => ErrorStatus::WrongLength,
            SetResult::BadValue => ErrorStatus::BadValue,
        }
    }
}
