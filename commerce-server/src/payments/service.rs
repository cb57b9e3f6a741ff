//! Order Service
//!
//! Order creation, retry/idempotency resolution, payment dispatch, and the
//! idempotent status-transition entry point. Every path that touches a
//! provider happens after the order row is persisted: the row is the
//! source of truth and must survive a crashed payment-initiation call.

use crate::db::repository::order as order_repo;
use crate::db::repository::{RepoError, order::MatchKey, order::NewOrder};
use crate::payments::gateway::PaymentGateway;
use crate::payments::matching::{
    RETRY_WINDOW_MS, amounts_equal, billing_key, items_match, normalize_phone,
};
use crate::payments::reference::{new_reference, order_number_for};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{
    BillingSnapshot, CheckoutResponse, CreateOrderRequest, Order, PaymentProvider, PaymentStatus,
    ReinitiateRequest,
};
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct OrderService {
    pool: SqlitePool,
    sync_gateway: Arc<dyn PaymentGateway>,
    async_gateway: Arc<dyn PaymentGateway>,
}

impl OrderService {
    pub fn new(
        pool: SqlitePool,
        sync_gateway: Arc<dyn PaymentGateway>,
        async_gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            pool,
            sync_gateway,
            async_gateway,
        }
    }

    /// Create an order for one logical checkout attempt
    ///
    /// Retried checkouts (double submits, explicit "try again") collapse
    /// onto the existing pending order instead of creating a parallel row.
    pub async fn create_order(&self, req: CreateOrderRequest) -> AppResult<CheckoutResponse> {
        // 1. Validate before any persistence or network call
        validate_request(&req)?;

        // 2. Retry resolution: at most one live order per logical attempt
        if let Some(target) = self.resolve_retry_target(&req).await? {
            tracing::info!(
                order_id = target.id,
                reference = %target.reference,
                "Checkout matched an existing pending order, reinitiating"
            );
            return self.redispatch(target, &req).await;
        }

        // 3. No target: persist a fresh order, then dispatch to the provider
        let new_order = NewOrder {
            reference: new_reference(),
            order_number: None,
            payer_id: req.payer_id,
            provider: req.provider,
            total_amount: req.total_amount,
            currency: req.currency.trim().to_ascii_uppercase(),
            payment_status: PaymentStatus::Pending,
            billing: BillingSnapshot {
                name: req.billing.name.clone(),
                email: req.billing.email.clone(),
                // Stored normalized so the guest-match key compares the
                // column directly; any whitespace (tabs, NBSP) is stripped
                phone: normalize_phone(&req.billing.phone),
                country: req.billing.country.clone(),
            },
            items: req.items.clone(),
        };

        let order = match order_repo::create(&self.pool, new_order).await {
            Ok(order) => order,
            Err(RepoError::Duplicate(_)) => {
                // Lost the reference race to a concurrent checkout; re-run
                // resolution once instead of erroring the user
                match self.resolve_retry_target(&req).await? {
                    Some(target) => return self.redispatch(target, &req).await,
                    None => {
                        return Err(AppError::conflict(
                            "Duplicate checkout attempt, please retry",
                        ));
                    }
                }
            }
            Err(e) => return Err(e.into()),
        };

        self.dispatch(order, req.return_url.as_deref(), req.cancellation_url.as_deref())
            .await
    }

    /// Resume payment for an abandoned or failed checkout without creating
    /// a duplicate financial record
    pub async fn reinitiate_payment(
        &self,
        order_id: i64,
        req: ReinitiateRequest,
    ) -> AppResult<CheckoutResponse> {
        let order = order_repo::find_by_id(&self.pool, order_id)
            .await?
            .ok_or_else(|| AppError::order_not_found(order_id.to_string()))?;

        // A paid order can never be reinitiated
        if order.payment_status == PaymentStatus::Success {
            return Err(AppError::new(ErrorCode::OrderAlreadyPaid));
        }

        let order = order_repo::update_reference(
            &self.pool,
            order.id,
            &new_reference(),
            PaymentProvider::Async,
            PaymentStatus::Pending,
        )
        .await?;

        self.dispatch(order, Some(&req.return_url), Some(&req.cancellation_url))
            .await
    }

    /// Idempotent status-transition entry point, callable identically from
    /// the webhook handler and the reconciliation sweep
    pub async fn apply_status(&self, reference: &str, status: PaymentStatus) -> AppResult<Order> {
        let order = order_repo::find_by_reference(&self.pool, reference)
            .await?
            .ok_or_else(|| AppError::order_not_found(reference))?;

        // Same status is a no-op
        if order.payment_status == status {
            return Ok(order);
        }

        // Success is sticky: a late "failed" callback after a confirmed
        // payment must never downgrade a paid order
        if order.payment_status == PaymentStatus::Success {
            tracing::debug!(
                reference = %reference,
                incoming = %status,
                "Ignoring transition away from SUCCESS"
            );
            return Ok(order);
        }

        let number = order_number_for(order.id, order.created_at);
        let updated =
            order_repo::update_status(&self.pool, order.id, status, Some(&number)).await?;

        tracing::info!(
            reference = %reference,
            order_number = %updated.order_number.as_deref().unwrap_or("-"),
            from = %order.payment_status,
            to = %status,
            "Payment status transition"
        );
        Ok(updated)
    }

    /// Apply a raw provider status string (webhook payload); normalization
    /// goes through the async adapter's vocabulary
    pub async fn apply_provider_status(
        &self,
        reference: &str,
        provider_status: &str,
    ) -> AppResult<Order> {
        let status = self.async_gateway.normalize_status(provider_status);
        self.apply_status(reference, status).await
    }

    /// Manual sync re-check: verify with the sync provider and apply
    pub async fn verify_by_reference(&self, reference: &str) -> AppResult<Order> {
        // 404 before any provider call
        order_repo::find_by_reference(&self.pool, reference)
            .await?
            .ok_or_else(|| AppError::order_not_found(reference))?;

        let result = self.sync_gateway.verify(reference).await?;
        let status = self.sync_gateway.normalize_status(&result.provider_status);
        self.apply_status(reference, status).await
    }

    pub async fn get_order(&self, order_id: i64) -> AppResult<Order> {
        order_repo::find_by_id(&self.pool, order_id)
            .await?
            .ok_or_else(|| AppError::order_not_found(order_id.to_string()))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Find the order this checkout should collapse onto, if any
    ///
    /// Explicit retry tokens are resolved first; otherwise pending orders
    /// in the 2-hour window with the same identity and an equal normalized
    /// cart qualify. A previously paid order never qualifies.
    async fn resolve_retry_target(&self, req: &CreateOrderRequest) -> AppResult<Option<Order>> {
        if let Some(token) = req.retry_reference.as_deref()
            && let Some(order) = order_repo::find_retry_target(&self.pool, token).await?
        {
            if order.payment_status != PaymentStatus::Success {
                return Ok(Some(order));
            }
            // Token pointed at a paid order; fall through to a fresh create
        }

        let window_start = shared::util::now_millis() - RETRY_WINDOW_MS;
        let key = match req.payer_id {
            // Payer id is authoritative when present (product decision:
            // a signed-in payer with a changed email still matches their
            // own pending order)
            Some(payer_id) => MatchKey::Payer(payer_id),
            None => {
                let (email, phone) = billing_key(&req.billing);
                MatchKey::Billing { email, phone }
            }
        };

        let candidates = order_repo::find_pending_matches(&self.pool, window_start, &key).await?;
        for candidate in candidates {
            if amounts_equal(candidate.total_amount, req.total_amount)
                && candidate.currency.eq_ignore_ascii_case(req.currency.trim())
                && items_match(&candidate.items, &req.items)
            {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Reinitiate an existing order for a matched retry: fresh reference,
    /// status reset, provider taken from the incoming request
    async fn redispatch(
        &self,
        target: Order,
        req: &CreateOrderRequest,
    ) -> AppResult<CheckoutResponse> {
        let order = order_repo::update_reference(
            &self.pool,
            target.id,
            &new_reference(),
            req.provider,
            PaymentStatus::Pending,
        )
        .await?;

        self.dispatch(order, req.return_url.as_deref(), req.cancellation_url.as_deref())
            .await
    }

    /// Drive a persisted pending order through its provider
    ///
    /// Provider failures surface to the caller but never roll the order
    /// back; the row stays recoverable via reconciliation or reinitiation.
    async fn dispatch(
        &self,
        order: Order,
        return_url: Option<&str>,
        cancellation_url: Option<&str>,
    ) -> AppResult<CheckoutResponse> {
        match order.provider {
            PaymentProvider::Sync => {
                // Verify-now: a timed-out verification leaves the order in
                // its prior status, never assumed successful
                let result = self.sync_gateway.verify(&order.reference).await?;
                let status = self.sync_gateway.normalize_status(&result.provider_status);
                let number = order_number_for(order.id, order.created_at);
                let order =
                    order_repo::update_status(&self.pool, order.id, status, Some(&number)).await?;
                Ok(CheckoutResponse {
                    order,
                    checkout_url: None,
                    checkout_direct_url: None,
                    provider_reference: None,
                })
            }
            PaymentProvider::Async => {
                // Pending is itself a meaningful, number-bearing state:
                // assign the order number before any provider confirmation
                let number = order_number_for(order.id, order.created_at);
                let order = order_repo::update_status(
                    &self.pool,
                    order.id,
                    PaymentStatus::Pending,
                    Some(&number),
                )
                .await?;

                let return_url = return_url
                    .ok_or_else(|| AppError::validation("return_url is required"))?;
                let cancellation_url = cancellation_url
                    .ok_or_else(|| AppError::validation("cancellation_url is required"))?;

                let init = self
                    .async_gateway
                    .initiate(&order, return_url, cancellation_url)
                    .await?;
                Ok(CheckoutResponse {
                    order,
                    checkout_url: Some(init.checkout_url),
                    checkout_direct_url: init.checkout_direct_url,
                    provider_reference: Some(init.provider_reference),
                })
            }
        }
    }
}

/// Request validation, rejected before any side effect
fn validate_request(req: &CreateOrderRequest) -> AppResult<()> {
    if req.items.is_empty() {
        return Err(AppError::new(ErrorCode::OrderEmpty));
    }
    if !req.total_amount.is_finite() || req.total_amount <= 0.0 {
        return Err(AppError::validation("total_amount must be positive")
            .with_detail("field", "total_amount"));
    }
    for item in &req.items {
        if !item.price.is_finite() || item.price < 0.0 {
            return Err(AppError::validation("item price must be non-negative")
                .with_detail("field", "items.price"));
        }
        if item.quantity <= 0 {
            return Err(AppError::validation("item quantity must be positive")
                .with_detail("field", "items.quantity"));
        }
    }
    if req.provider == PaymentProvider::Async {
        if req.return_url.as_deref().is_none_or(str::is_empty) {
            return Err(
                AppError::validation("return_url is required for the async provider")
                    .with_detail("field", "return_url"),
            );
        }
        if req.cancellation_url.as_deref().is_none_or(str::is_empty) {
            return Err(AppError::validation(
                "cancellation_url is required for the async provider",
            )
            .with_detail("field", "cancellation_url"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{BillingInput, LineItemInput};

    fn base_request(provider: PaymentProvider) -> CreateOrderRequest {
        CreateOrderRequest {
            payer_id: None,
            total_amount: 100.0,
            currency: "NGN".into(),
            provider,
            return_url: Some("https://shop.example/done".into()),
            cancellation_url: Some("https://shop.example/cancel".into()),
            retry_reference: None,
            billing: BillingInput {
                name: "Ada O.".into(),
                email: "ada@example.com".into(),
                phone: "+2348000000000".into(),
                country: Some("NG".into()),
            },
            items: vec![LineItemInput {
                name: "Choir Robe".into(),
                product_id: "P-1".into(),
                market_id: "M-1".into(),
                price: 50.0,
                currency: "NGN".into(),
                quantity: 2,
                item_type: "apparel".into(),
                category: "robes".into(),
                color: Some("blue".into()),
                size: Some("L".into()),
                image: None,
            }],
        }
    }

    #[test]
    fn test_validate_rejects_empty_items() {
        let mut req = base_request(PaymentProvider::Sync);
        req.items.clear();
        let err = validate_request(&req).unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderEmpty);
    }

    #[test]
    fn test_validate_requires_redirect_urls_for_async() {
        let mut req = base_request(PaymentProvider::Async);
        req.return_url = None;
        let err = validate_request(&req).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);

        let mut req = base_request(PaymentProvider::Async);
        req.cancellation_url = Some(String::new());
        let err = validate_request(&req).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[test]
    fn test_validate_allows_sync_without_urls() {
        let mut req = base_request(PaymentProvider::Sync);
        req.return_url = None;
        req.cancellation_url = None;
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_amounts() {
        let mut req = base_request(PaymentProvider::Sync);
        req.total_amount = 0.0;
        assert!(validate_request(&req).is_err());

        let mut req = base_request(PaymentProvider::Sync);
        req.total_amount = f64::NAN;
        assert!(validate_request(&req).is_err());

        let mut req = base_request(PaymentProvider::Sync);
        req.items[0].quantity = 0;
        assert!(validate_request(&req).is_err());
    }
}
