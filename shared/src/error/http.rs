//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound | Self::OrderNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists | Self::OrderAlreadyPaid => StatusCode::CONFLICT,

            // 400 Bad Request
            Self::ValidationFailed | Self::OrderEmpty | Self::ProviderRejected => {
                StatusCode::BAD_REQUEST
            }

            // 502 Bad Gateway (upstream provider unreachable)
            Self::ProviderUnavailable => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            Self::ProviderNotConfigured => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::Unknown | Self::InternalError | Self::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
