//! Paystack adapter (synchronous verify-now)
//!
//! The client charges the card inline; the server's only job is to confirm
//! the outcome with `GET /transaction/verify/{reference}` before trusting
//! it. No hosted checkout, so `initiate` is unsupported on this adapter.

use super::{
    AsyncInitiateResult, AsyncStatusResult, GatewayError, GatewayResult, PaymentGateway,
    SyncVerifyResult,
};
use crate::core::Config;
use async_trait::async_trait;
use serde::Deserialize;
use shared::models::Order;
use std::time::Duration;

/// Paystack response envelope
#[derive(Debug, Deserialize)]
struct PaystackEnvelope {
    status: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: serde_json::Value,
}

pub struct PaystackGateway {
    client: reqwest::Client,
    secret_key: Option<String>,
    base_url: String,
}

impl PaystackGateway {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.provider_timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            client,
            secret_key: config.paystack_secret_key.clone(),
            base_url: config.paystack_base_url.clone(),
        }
    }

    fn secret_key(&self) -> GatewayResult<&str> {
        self.secret_key
            .as_deref()
            .ok_or_else(|| GatewayError::NotConfigured("paystack".into()))
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    fn name(&self) -> &'static str {
        "paystack"
    }

    fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }

    async fn verify(&self, reference: &str) -> GatewayResult<SyncVerifyResult> {
        let secret = self.secret_key()?;
        let url = format!("{}/transaction/verify/{}", self.base_url, reference);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(secret)
            .send()
            .await?;

        let http_status = resp.status();
        if http_status.is_server_error() {
            return Err(GatewayError::Transport(format!(
                "verify returned {http_status}"
            )));
        }

        let body: PaystackEnvelope = resp
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("malformed verify response: {e}")))?;

        if !body.status {
            // Envelope-level false means Paystack could not process the
            // request (unknown reference, bad key), not a failed payment
            return Err(GatewayError::Rejected(body.message));
        }

        let provider_status = body
            .data
            .get("status")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                GatewayError::Transport("verify response missing data.status".into())
            })?
            .to_string();

        tracing::debug!(reference = %reference, status = %provider_status, "Paystack verify");

        Ok(SyncVerifyResult {
            provider_status,
            raw: body.data,
        })
    }

    async fn initiate(
        &self,
        _order: &Order,
        _return_url: &str,
        _cancellation_url: &str,
    ) -> GatewayResult<AsyncInitiateResult> {
        Err(GatewayError::Rejected(
            "Paystack adapter does not support hosted checkout initiation".into(),
        ))
    }

    async fn query_status(&self, reference: &str) -> GatewayResult<AsyncStatusResult> {
        // Verify doubles as a status query for manual re-checks
        let result = self.verify(reference).await?;
        Ok(AsyncStatusResult {
            provider_status: result.provider_status,
            raw: result.raw,
        })
    }
}
