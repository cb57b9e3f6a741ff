//! Shared types for the commerce platform
//!
//! Common types used across the commerce server and client code:
//! the unified error system, domain models, and small utilities.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use http;
pub use serde::{Deserialize, Serialize};
