//! Monnify adapter (asynchronous hosted checkout)
//!
//! Initiate creates a hosted-checkout session and returns its URLs; the
//! terminal outcome arrives later through the webhook or is pulled by the
//! reconciliation sweep via the transaction-query endpoint. Auth is a
//! basic-auth login exchanged for a short-lived bearer token per call.

use super::{
    AsyncInitiateResult, AsyncStatusResult, GatewayError, GatewayResult, PaymentGateway,
    SyncVerifyResult,
};
use crate::core::Config;
use crate::payments::status::normalize_provider_status;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use shared::models::{Order, PaymentStatus};
use std::time::Duration;

/// Monnify response envelope
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MonnifyEnvelope {
    request_successful: bool,
    #[serde(default)]
    response_message: String,
    #[serde(default)]
    response_body: serde_json::Value,
}

#[derive(Debug, Clone)]
struct MonnifyCredentials {
    api_key: String,
    secret_key: String,
    contract_code: String,
}

pub struct MonnifyGateway {
    client: reqwest::Client,
    credentials: Option<MonnifyCredentials>,
    base_url: String,
}

impl MonnifyGateway {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.provider_timeout_ms))
            .build()
            .unwrap_or_default();

        let credentials = match (
            config.monnify_api_key.clone(),
            config.monnify_secret_key.clone(),
            config.monnify_contract_code.clone(),
        ) {
            (Some(api_key), Some(secret_key), Some(contract_code)) => Some(MonnifyCredentials {
                api_key,
                secret_key,
                contract_code,
            }),
            _ => None,
        };

        Self {
            client,
            credentials,
            base_url: config.monnify_base_url.clone(),
        }
    }

    fn credentials(&self) -> GatewayResult<&MonnifyCredentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| GatewayError::NotConfigured("monnify".into()))
    }

    /// Exchange the basic-auth credentials for a bearer token
    async fn login(&self) -> GatewayResult<String> {
        let creds = self.credentials()?;
        let basic = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", creds.api_key, creds.secret_key));

        let resp = self
            .client
            .post(format!("{}/api/v1/auth/login", self.base_url))
            .header("Authorization", format!("Basic {basic}"))
            .send()
            .await?;

        let body = self.read_envelope(resp, "login").await?;
        body.response_body
            .get("accessToken")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Transport("login response missing accessToken".into()))
    }

    /// Read a Monnify envelope, mapping HTTP 5xx and decode failures to
    /// transport errors and an unsuccessful envelope to a rejection
    async fn read_envelope(
        &self,
        resp: reqwest::Response,
        op: &str,
    ) -> GatewayResult<MonnifyEnvelope> {
        let http_status = resp.status();
        if http_status.is_server_error() {
            return Err(GatewayError::Transport(format!("{op} returned {http_status}")));
        }

        let body: MonnifyEnvelope = resp
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("malformed {op} response: {e}")))?;

        if !body.request_successful {
            return Err(GatewayError::Rejected(body.response_message));
        }
        Ok(body)
    }
}

#[async_trait]
impl PaymentGateway for MonnifyGateway {
    fn name(&self) -> &'static str {
        "monnify"
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    async fn verify(&self, _reference: &str) -> GatewayResult<SyncVerifyResult> {
        Err(GatewayError::Rejected(
            "Monnify adapter does not support synchronous verification".into(),
        ))
    }

    async fn initiate(
        &self,
        order: &Order,
        return_url: &str,
        _cancellation_url: &str,
    ) -> GatewayResult<AsyncInitiateResult> {
        let creds = self.credentials()?;
        let token = self.login().await?;

        let payload = json!({
            "amount": order.total_amount,
            "customerName": order.billing.name,
            "customerEmail": order.billing.email,
            "paymentReference": order.reference,
            "paymentDescription": format!("Order {}", order.order_number.as_deref().unwrap_or(&order.reference)),
            "currencyCode": order.currency,
            "contractCode": creds.contract_code,
            "redirectUrl": return_url,
        });

        let resp = self
            .client
            .post(format!(
                "{}/api/v1/merchant/transactions/init-transaction",
                self.base_url
            ))
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await?;

        let body = self.read_envelope(resp, "init-transaction").await?;

        let checkout_url = body
            .response_body
            .get("checkoutUrl")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                GatewayError::Transport("init-transaction response missing checkoutUrl".into())
            })?;
        let provider_reference = body
            .response_body
            .get("transactionReference")
            .and_then(|v| v.as_str())
            .unwrap_or(&order.reference)
            .to_string();
        let checkout_direct_url = body
            .response_body
            .get("checkoutDirectUrl")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        tracing::info!(
            reference = %order.reference,
            provider_reference = %provider_reference,
            "Monnify checkout initiated"
        );

        Ok(AsyncInitiateResult {
            checkout_url,
            checkout_direct_url,
            provider_reference,
        })
    }

    async fn query_status(&self, reference: &str) -> GatewayResult<AsyncStatusResult> {
        let token = self.login().await?;

        let resp = self
            .client
            .get(format!(
                "{}/api/v1/merchant/transactions/query",
                self.base_url
            ))
            .query(&[("paymentReference", reference)])
            .bearer_auth(&token)
            .send()
            .await?;

        let body = self.read_envelope(resp, "transaction-query").await?;

        let provider_status = body
            .response_body
            .get("paymentStatus")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                GatewayError::Transport("transaction-query response missing paymentStatus".into())
            })?
            .to_string();

        Ok(AsyncStatusResult {
            provider_status,
            raw: body.response_body,
        })
    }

    /// Monnify-specific vocabulary first, then the shared table
    fn normalize_status(&self, provider_status: &str) -> PaymentStatus {
        match provider_status.trim().to_ascii_lowercase().as_str() {
            "overpaid" => PaymentStatus::Success,
            // Partial settlement is not a terminal outcome for us
            "partially_paid" => PaymentStatus::Pending,
            _ => normalize_provider_status(provider_status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;

    #[test]
    fn test_unconfigured_without_credentials() {
        let mut config = Config::for_tests();
        config.monnify_api_key = None;
        let gateway = MonnifyGateway::new(&config);
        assert!(!gateway.is_configured());
    }

    #[test]
    fn test_monnify_status_normalization() {
        let gateway = MonnifyGateway::new(&Config::for_tests());
        assert_eq!(gateway.normalize_status("PAID"), PaymentStatus::Success);
        assert_eq!(gateway.normalize_status("OVERPAID"), PaymentStatus::Success);
        assert_eq!(
            gateway.normalize_status("PARTIALLY_PAID"),
            PaymentStatus::Pending
        );
        assert_eq!(gateway.normalize_status("EXPIRED"), PaymentStatus::Failed);
        assert_eq!(gateway.normalize_status("PENDING"), PaymentStatus::Pending);
    }
}
