//! Unified error codes for the commerce platform
//!
//! This module defines all error codes used across the commerce server and
//! its clients. Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has already been paid
    OrderAlreadyPaid = 4002,
    /// Order is empty (no line items)
    OrderEmpty = 4003,

    // ==================== 5xxx: Payment ====================
    /// Payment provider rejected the request (not retryable)
    ProviderRejected = 5002,
    /// Payment provider unreachable or timed out (retryable)
    ProviderUnavailable = 5003,
    /// Payment provider credentials are not configured
    ProviderNotConfigured = 5004,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the default human-readable message for this error code
    pub fn message(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Unknown => "Unknown error",
            Self::ValidationFailed => "Validation failed",
            Self::NotFound => "Resource not found",
            Self::AlreadyExists => "Resource already exists",

            Self::OrderNotFound => "Order not found",
            Self::OrderAlreadyPaid => "Order has already been paid",
            Self::OrderEmpty => "Order must contain at least one item",

            Self::ProviderRejected => "Payment provider rejected the request",
            Self::ProviderUnavailable => "Payment provider is unavailable",
            Self::ProviderNotConfigured => "Payment provider is not configured",

            Self::InternalError => "Internal server error",
            Self::DatabaseError => "Database error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when converting an unknown u16 into an [`ErrorCode`]
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid error code: {0}")]
pub struct InvalidErrorCode(pub u16);

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Success),
            1 => Ok(Self::Unknown),
            2 => Ok(Self::ValidationFailed),
            3 => Ok(Self::NotFound),
            4 => Ok(Self::AlreadyExists),
            4001 => Ok(Self::OrderNotFound),
            4002 => Ok(Self::OrderAlreadyPaid),
            4003 => Ok(Self::OrderEmpty),
            5002 => Ok(Self::ProviderRejected),
            5003 => Ok(Self::ProviderUnavailable),
            5004 => Ok(Self::ProviderNotConfigured),
            9001 => Ok(Self::InternalError),
            9002 => Ok(Self::DatabaseError),
            other => Err(InvalidErrorCode(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::OrderNotFound.code(), 4001);
        assert_eq!(ErrorCode::ProviderRejected.code(), 5002);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_round_trip_u16() {
        for code in [
            ErrorCode::Success,
            ErrorCode::NotFound,
            ErrorCode::AlreadyExists,
            ErrorCode::OrderAlreadyPaid,
            ErrorCode::ProviderUnavailable,
            ErrorCode::DatabaseError,
        ] {
            let value: u16 = code.into();
            assert_eq!(ErrorCode::try_from(value).unwrap(), code);
        }
    }

    #[test]
    fn test_invalid_code() {
        assert!(ErrorCode::try_from(1234).is_err());
    }

    #[test]
    fn test_serialize_as_u16() {
        let json = serde_json::to_string(&ErrorCode::OrderNotFound).unwrap();
        assert_eq!(json, "4001");
    }
}
