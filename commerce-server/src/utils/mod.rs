//! Utility module
//!
//! Re-exports the unified error types from `shared` so handlers import
//! them from one place, plus logging setup.

pub mod logger;

pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
