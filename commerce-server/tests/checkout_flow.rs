//! End-to-end checkout flows over an in-memory database
//!
//! Exercises the order service against scripted gateway adapters: retry
//! collapse, status stickiness, reinitiation, and the interplay with the
//! reconciliation sweep.

use async_trait::async_trait;
use commerce_server::payments::gateway::{
    AsyncInitiateResult, AsyncStatusResult, GatewayError, GatewayResult, PaymentGateway,
    SyncVerifyResult,
};
use commerce_server::payments::{OrderService, Reconciler};
use shared::error::ErrorCode;
use shared::models::{
    BillingInput, CreateOrderRequest, LineItemInput, PaymentProvider, PaymentStatus,
    ReinitiateRequest,
};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Gateway double with a settable status and initiation counter
struct MockGateway {
    status: Mutex<String>,
    initiations: AtomicUsize,
}

impl MockGateway {
    fn returning(status: &str) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status.to_string()),
            initiations: AtomicUsize::new(0),
        })
    }

    fn set_status(&self, status: &str) {
        *self.status.lock().unwrap() = status.to_string();
    }

    fn initiations(&self) -> usize {
        self.initiations.load(Ordering::SeqCst)
    }

    fn current_status(&self) -> String {
        self.status.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn verify(&self, _reference: &str) -> GatewayResult<SyncVerifyResult> {
        let status = self.current_status();
        if status == "!transport" {
            return Err(GatewayError::Transport("connection refused".into()));
        }
        Ok(SyncVerifyResult {
            provider_status: status,
            raw: serde_json::Value::Null,
        })
    }

    async fn initiate(
        &self,
        order: &shared::models::Order,
        _return_url: &str,
        _cancellation_url: &str,
    ) -> GatewayResult<AsyncInitiateResult> {
        self.initiations.fetch_add(1, Ordering::SeqCst);
        Ok(AsyncInitiateResult {
            checkout_url: format!("https://pay.example/checkout/{}", order.reference),
            checkout_direct_url: None,
            provider_reference: format!("TX-{}", order.id),
        })
    }

    async fn query_status(&self, reference: &str) -> GatewayResult<AsyncStatusResult> {
        let result = self.verify(reference).await?;
        Ok(AsyncStatusResult {
            provider_status: result.provider_status,
            raw: result.raw,
        })
    }
}

struct Harness {
    pool: SqlitePool,
    service: Arc<OrderService>,
    sync: Arc<MockGateway>,
    asynchronous: Arc<MockGateway>,
}

async fn harness() -> Harness {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let sync = MockGateway::returning("success");
    let asynchronous = MockGateway::returning("pending");
    let service = Arc::new(OrderService::new(
        pool.clone(),
        Arc::clone(&sync) as Arc<dyn PaymentGateway>,
        Arc::clone(&asynchronous) as Arc<dyn PaymentGateway>,
    ));

    Harness {
        pool,
        service,
        sync,
        asynchronous,
    }
}

fn request(provider: PaymentProvider) -> CreateOrderRequest {
    CreateOrderRequest {
        payer_id: None,
        total_amount: 150.0,
        currency: "NGN".into(),
        provider,
        return_url: Some("https://shop.example/done".into()),
        cancellation_url: Some("https://shop.example/cancel".into()),
        retry_reference: None,
        billing: BillingInput {
            name: "Ada O.".into(),
            email: "ada@example.com".into(),
            phone: "+234 800 000 0000".into(),
            country: Some("NG".into()),
        },
        items: vec![
            LineItemInput {
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
            },
            LineItemInput {
                name: "Hymn Book".into(),
                product_id: "P-2".into(),
                market_id: "M-1".into(),
                price: 50.0,
                currency: "NGN".into(),
                quantity: 1,
                item_type: "book".into(),
                category: "books".into(),
                color: None,
                size: None,
                image: None,
            },
        ],
    }
}

async fn order_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_async_checkout_happy_path() {
    let h = harness().await;

    let checkout = h.service.create_order(request(PaymentProvider::Async)).await.unwrap();

    assert_eq!(checkout.order.payment_status, PaymentStatus::Pending);
    // Order number exists before any provider confirmation
    let number = checkout.order.order_number.as_deref().unwrap();
    assert!(number.starts_with("ORD-"));
    assert!(checkout.checkout_url.as_deref().unwrap().starts_with("https://pay.example/"));
    assert!(checkout.provider_reference.is_some());
    assert_eq!(h.asynchronous.initiations(), 1);
}

#[tokio::test]
async fn test_sync_checkout_resolves_immediately() {
    let h = harness().await;
    h.sync.set_status("success");

    let checkout = h.service.create_order(request(PaymentProvider::Sync)).await.unwrap();

    assert_eq!(checkout.order.payment_status, PaymentStatus::Success);
    assert!(checkout.order.order_number.is_some());
    assert!(checkout.checkout_url.is_none());
}

#[tokio::test]
async fn test_sync_transport_failure_leaves_order_pending() {
    let h = harness().await;
    h.sync.set_status("!transport");

    let err = h.service.create_order(request(PaymentProvider::Sync)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ProviderUnavailable);

    // The row survived the failed verification and stays recoverable
    assert_eq!(order_count(&h.pool).await, 1);
    let status: String = sqlx::query_scalar("SELECT payment_status FROM orders")
        .fetch_one(&h.pool)
        .await
        .unwrap();
    assert_eq!(status, "PENDING");
}

#[tokio::test]
async fn test_double_submit_collapses_onto_one_order() {
    let h = harness().await;

    let first = h.service.create_order(request(PaymentProvider::Async)).await.unwrap();
    let second = h.service.create_order(request(PaymentProvider::Async)).await.unwrap();

    assert_eq!(first.order.id, second.order.id);
    assert_ne!(first.order.reference, second.order.reference);
    assert_eq!(order_count(&h.pool).await, 1);
    assert_eq!(h.asynchronous.initiations(), 2);
}

#[tokio::test]
async fn test_retry_collapses_across_phone_whitespace_variants() {
    let h = harness().await;

    // First submit carries a tab and an NBSP in the phone number
    let mut first_req = request(PaymentProvider::Async);
    first_req.billing.phone = "+234\t800\u{00A0}000 0000".into();
    let first = h.service.create_order(first_req).await.unwrap();

    // Stored snapshot is normalized at write time
    assert_eq!(first.order.billing.phone, "+2348000000000");

    // Retry with plain spaces still matches its own pending order
    let second = h.service.create_order(request(PaymentProvider::Async)).await.unwrap();
    assert_eq!(first.order.id, second.order.id);
    assert_eq!(order_count(&h.pool).await, 1);
}

#[tokio::test]
async fn test_different_cart_creates_a_second_order() {
    let h = harness().await;

    h.service.create_order(request(PaymentProvider::Async)).await.unwrap();

    let mut changed = request(PaymentProvider::Async);
    changed.items[0].quantity = 3;
    changed.total_amount = 200.0;
    h.service.create_order(changed).await.unwrap();

    assert_eq!(order_count(&h.pool).await, 2);
}

#[tokio::test]
async fn test_stale_pending_order_is_not_a_retry_target() {
    let h = harness().await;

    let first = h.service.create_order(request(PaymentProvider::Async)).await.unwrap();

    // Age the order past the retry window
    let three_hours_ago = shared::util::now_millis() - 3 * 60 * 60 * 1000;
    sqlx::query("UPDATE orders SET created_at = ? WHERE id = ?")
        .bind(three_hours_ago)
        .bind(first.order.id)
        .execute(&h.pool)
        .await
        .unwrap();

    let second = h.service.create_order(request(PaymentProvider::Async)).await.unwrap();
    assert_ne!(first.order.id, second.order.id);
    assert_eq!(order_count(&h.pool).await, 2);
}

#[tokio::test]
async fn test_explicit_retry_token_reuses_the_order() {
    let h = harness().await;

    let first = h.service.create_order(request(PaymentProvider::Async)).await.unwrap();

    // A different payer, different cart, but an explicit token wins
    let mut retry = request(PaymentProvider::Async);
    retry.total_amount = 999.0;
    retry.items[0].quantity = 9;
    retry.retry_reference = Some(first.order.reference.clone());

    let second = h.service.create_order(retry).await.unwrap();
    assert_eq!(first.order.id, second.order.id);
    assert_eq!(order_count(&h.pool).await, 1);
}

#[tokio::test]
async fn test_paid_order_never_collapses_a_new_checkout() {
    let h = harness().await;

    let first = h.service.create_order(request(PaymentProvider::Async)).await.unwrap();
    h.service
        .apply_provider_status(&first.order.reference, "PAID")
        .await
        .unwrap();

    let mut retry = request(PaymentProvider::Async);
    retry.retry_reference = Some(first.order.reference.clone());
    let second = h.service.create_order(retry).await.unwrap();

    assert_ne!(first.order.id, second.order.id);
    assert_eq!(order_count(&h.pool).await, 2);
}

#[tokio::test]
async fn test_webhook_success_is_sticky() {
    let h = harness().await;

    let checkout = h.service.create_order(request(PaymentProvider::Async)).await.unwrap();
    let reference = checkout.order.reference.clone();

    let paid = h.service.apply_provider_status(&reference, "PAID").await.unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Success);
    let number = paid.order_number.clone().unwrap();

    // A late failure callback must not downgrade the paid order
    let after = h.service.apply_provider_status(&reference, "FAILED").await.unwrap();
    assert_eq!(after.payment_status, PaymentStatus::Success);
    assert_eq!(after.order_number.as_deref(), Some(number.as_str()));

    // Redelivered success is a no-op, number unchanged
    let again = h.service.apply_provider_status(&reference, "PAID").await.unwrap();
    assert_eq!(again.order_number.as_deref(), Some(number.as_str()));
}

#[tokio::test]
async fn test_unknown_provider_status_stays_pending() {
    let h = harness().await;

    let checkout = h.service.create_order(request(PaymentProvider::Async)).await.unwrap();
    let order = h
        .service
        .apply_provider_status(&checkout.order.reference, "SOMETHING_NEW")
        .await
        .unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_reinitiate_rejected_for_paid_order() {
    let h = harness().await;

    let checkout = h.service.create_order(request(PaymentProvider::Async)).await.unwrap();
    h.service
        .apply_provider_status(&checkout.order.reference, "PAID")
        .await
        .unwrap();

    let err = h
        .service
        .reinitiate_payment(
            checkout.order.id,
            ReinitiateRequest {
                return_url: "https://shop.example/done".into(),
                cancellation_url: "https://shop.example/cancel".into(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::OrderAlreadyPaid);

    // Reference untouched
    let order = h.service.get_order(checkout.order.id).await.unwrap();
    assert_eq!(order.reference, checkout.order.reference);
}

#[tokio::test]
async fn test_reinitiate_failed_order_issues_fresh_reference() {
    let h = harness().await;

    let checkout = h.service.create_order(request(PaymentProvider::Async)).await.unwrap();
    h.service
        .apply_provider_status(&checkout.order.reference, "FAILED")
        .await
        .unwrap();

    let resumed = h
        .service
        .reinitiate_payment(
            checkout.order.id,
            ReinitiateRequest {
                return_url: "https://shop.example/done".into(),
                cancellation_url: "https://shop.example/cancel".into(),
            },
        )
        .await
        .unwrap();

    assert_eq!(resumed.order.id, checkout.order.id);
    assert_ne!(resumed.order.reference, checkout.order.reference);
    assert_eq!(resumed.order.payment_status, PaymentStatus::Pending);
    assert!(resumed.checkout_url.is_some());
}

#[tokio::test]
async fn test_invalid_request_persists_nothing() {
    let h = harness().await;

    let mut req = request(PaymentProvider::Async);
    req.items.clear();
    let err = h.service.create_order(req).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::OrderEmpty);

    let mut req = request(PaymentProvider::Async);
    req.return_url = None;
    assert!(h.service.create_order(req).await.is_err());

    assert_eq!(order_count(&h.pool).await, 0);
}

#[tokio::test]
async fn test_reconciliation_settles_an_abandoned_checkout() {
    let h = harness().await;

    let checkout = h.service.create_order(request(PaymentProvider::Async)).await.unwrap();

    // The customer paid but the webhook never arrived
    h.asynchronous.set_status("PAID");
    let reconciler = Reconciler::new(
        h.pool.clone(),
        Arc::clone(&h.service),
        Arc::clone(&h.asynchronous) as Arc<dyn PaymentGateway>,
    );

    let summary = reconciler.run_pass(50).await;
    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.succeeded, 1);

    let order = h.service.get_order(checkout.order.id).await.unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Success);
}

#[tokio::test]
async fn test_verify_by_reference_applies_sync_outcome() {
    let h = harness().await;
    h.sync.set_status("!transport");

    // Creation fails over transport, order stays pending
    let _ = h.service.create_order(request(PaymentProvider::Sync)).await;
    let reference: String = sqlx::query_scalar("SELECT reference FROM orders")
        .fetch_one(&h.pool)
        .await
        .unwrap();

    // A later manual verify settles it
    h.sync.set_status("success");
    let order = h.service.verify_by_reference(&reference).await.unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Success);

    // Unknown reference is a 404-class error, no provider call implied
    let err = h.service.verify_by_reference("CHC-missing").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::OrderNotFound);
}
