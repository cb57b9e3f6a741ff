//! Payment gateway adapters
//!
//! Two structurally different providers behind one contract: Paystack
//! resolves within the checkout request (verify-now), Monnify starts a
//! hosted checkout and reaches a terminal state later via webhook or
//! the reconciliation sweep. Each adapter owns the normalization of its
//! provider's status vocabulary into the canonical three-value status.

mod monnify;
mod paystack;

pub use monnify::MonnifyGateway;
pub use paystack::PaystackGateway;

use crate::payments::status::normalize_provider_status;
use async_trait::async_trait;
use shared::error::AppError;
use shared::models::{Order, PaymentStatus};
use thiserror::Error;

/// Gateway error types
///
/// The split matters for retry policy: a `Rejected` request must never be
/// retried automatically, while `Transport` failures are exactly what the
/// reconciliation sweep exists to recover from.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Provider explicitly declined the request (bad merchant config,
    /// unknown reference, unsupported operation)
    #[error("provider rejected request: {0}")]
    Rejected(String),

    /// Timeout, network failure, or malformed response. Never interpreted
    /// as payment success or failure.
    #[error("provider transport failure: {0}")]
    Transport(String),

    /// Required credentials are absent from configuration. Maps to a 503
    /// rather than a 400: the request was fine, the deployment is not.
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected(msg) => AppError::provider_rejected(msg),
            GatewayError::Transport(msg) => AppError::provider_unavailable(msg),
            GatewayError::NotConfigured(provider) => AppError::provider_not_configured(provider),
        }
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result of a synchronous verify-now call
#[derive(Debug, Clone)]
pub struct SyncVerifyResult {
    pub provider_status: String,
    pub raw: serde_json::Value,
}

/// Result of initiating an asynchronous hosted checkout
#[derive(Debug, Clone)]
pub struct AsyncInitiateResult {
    pub checkout_url: String,
    pub checkout_direct_url: Option<String>,
    pub provider_reference: String,
}

/// Result of querying an asynchronous payment's status
#[derive(Debug, Clone)]
pub struct AsyncStatusResult {
    pub provider_status: String,
    pub raw: serde_json::Value,
}

/// Contract implemented by both payment providers
///
/// Adapters that do not support an operation return
/// [`GatewayError::Rejected`] so callers can distinguish "wrong adapter"
/// from a transient failure.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Whether credentials are present in configuration. An unconfigured
    /// adapter disables reconciliation rather than erroring.
    fn is_configured(&self) -> bool;

    /// Verify a payment now (sync provider)
    async fn verify(&self, reference: &str) -> GatewayResult<SyncVerifyResult>;

    /// Start a hosted checkout (async provider)
    async fn initiate(
        &self,
        order: &Order,
        return_url: &str,
        cancellation_url: &str,
    ) -> GatewayResult<AsyncInitiateResult>;

    /// Query the current status of a payment (async provider)
    async fn query_status(&self, reference: &str) -> GatewayResult<AsyncStatusResult>;

    /// Normalize this provider's status vocabulary into the canonical
    /// status. Defaults to the shared table; adapters override to handle
    /// provider-specific values first.
    fn normalize_status(&self, provider_status: &str) -> PaymentStatus {
        normalize_provider_status(provider_status)
    }
}
