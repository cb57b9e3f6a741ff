//! API route modules
//!
//! # Structure
//!
//! - [`health`] - health checks
//! - [`orders`] - checkout, verification, webhook, reinitiation

pub mod health;
pub mod orders;

// Re-export common types for handlers
pub use crate::utils::{AppError, AppResult};
