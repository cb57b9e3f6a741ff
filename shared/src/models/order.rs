//! Order Model
//!
//! Commerce order entities and request/response payloads. An order is the
//! unit of one logical checkout attempt: it owns a billing snapshot captured
//! at creation time and an ordered set of line items, and moves only along
//! the payment-status axis after creation.

use serde::{Deserialize, Serialize};

/// Canonical payment status
///
/// Every provider-specific status string is normalized into exactly one of
/// these three values. `Success` is terminal and sticky.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    /// Stable string form (matches serde / database representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    /// Whether this status is terminal for payment purposes
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment provider selection
///
/// `Sync` resolves within the checkout request (verify-now); `Async` starts
/// pending and reaches a terminal state later via webhook or reconciliation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum PaymentProvider {
    Sync,
    Async,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Async => "async",
        }
    }
}

/// Billing identity captured at checkout time
///
/// Denormalized copy, never a live reference to a customer record. Retry
/// matching uses a normalized projection of these fields only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct BillingSnapshot {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub country: Option<String>,
}

/// One purchasable unit within an order
///
/// Immutable once the order is created; a changed cart requires a new order
/// or a reinitiation, never an item edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct LineItem {
    pub id: i64,
    pub order_id: i64,
    /// Position within the order (preserves client ordering)
    pub position: i32,
    pub name: String,
    /// External product id (client catalog reference)
    pub product_id: String,
    /// Marketplace / market id the product was listed in
    pub market_id: String,
    /// Unit price in currency unit
    pub price: f64,
    pub currency: String,
    pub quantity: i32,
    pub item_type: String,
    pub category: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub image: Option<String>,
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Order {
    pub id: i64,
    /// Opaque provider-facing token, unique, reassigned on each reinitiation
    pub reference: String,
    /// Human-readable identifier, assigned once and immutable after
    pub order_number: Option<String>,
    /// Signed-in payer, if any (guest checkout allowed)
    pub payer_id: Option<i64>,
    pub provider: PaymentProvider,
    /// Total amount in currency unit, fixed at creation
    pub total_amount: f64,
    pub currency: String,
    pub payment_status: PaymentStatus,
    #[cfg_attr(feature = "db", sqlx(flatten))]
    pub billing: BillingSnapshot,
    #[cfg_attr(feature = "db", sqlx(skip))]
    pub items: Vec<LineItem>,
    /// Unix millis; anchor for retry-window matching
    pub created_at: i64,
    pub updated_at: i64,
}

// ============================================================================
// Request / response payloads
// ============================================================================

/// Line item as supplied by the client at checkout time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemInput {
    pub name: String,
    pub product_id: String,
    pub market_id: String,
    /// Unit price in currency unit
    pub price: f64,
    pub currency: String,
    pub quantity: i32,
    pub item_type: String,
    pub category: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub image: Option<String>,
}

/// Billing snapshot as supplied by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub country: Option<String>,
}

/// Create order payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub payer_id: Option<i64>,
    /// Total amount in currency unit (trusted as-is at checkout time)
    pub total_amount: f64,
    pub currency: String,
    pub provider: PaymentProvider,
    /// Required for the async provider
    pub return_url: Option<String>,
    /// Required for the async provider
    pub cancellation_url: Option<String>,
    /// Explicit retry token: a prior reference, order number, or order id
    pub retry_reference: Option<String>,
    pub billing: BillingInput,
    pub items: Vec<LineItemInput>,
}

/// Reinitiate payment payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReinitiateRequest {
    pub return_url: String,
    pub cancellation_url: String,
}

/// Checkout response: the order plus hosted-checkout URLs when the async
/// provider was selected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_direct_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_reference: Option<String>,
}

/// Provider callback payload (webhook or manual push)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub reference: String,
    pub provider_status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_serde() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        let s: PaymentStatus = serde_json::from_str("\"SUCCESS\"").unwrap();
        assert_eq!(s, PaymentStatus::Success);
    }

    #[test]
    fn test_provider_serde() {
        assert_eq!(
            serde_json::to_string(&PaymentProvider::Async).unwrap(),
            "\"async\""
        );
        let p: PaymentProvider = serde_json::from_str("\"sync\"").unwrap();
        assert_eq!(p, PaymentProvider::Sync);
    }

    #[test]
    fn test_status_terminal() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Success.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
    }

    #[test]
    fn test_create_order_request_deserialize() {
        let json = r#"{
            "payer_id": null,
            "total_amount": 100.0,
            "currency": "NGN",
            "provider": "async",
            "return_url": "https://shop.example/done",
            "cancellation_url": "https://shop.example/cancel",
            "retry_reference": null,
            "billing": {"name": "Ada O.", "email": "ada@example.com", "phone": "+2348000000000", "country": "NG"},
            "items": [{
                "name": "Choir Robe", "product_id": "P-1", "market_id": "M-1",
                "price": 50.0, "currency": "NGN", "quantity": 2,
                "item_type": "apparel", "category": "robes",
                "color": "blue", "size": "L", "image": null
            }]
        }"#;
        let req: CreateOrderRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.provider, PaymentProvider::Async);
        assert_eq!(req.items.len(), 1);
        assert_eq!(req.items[0].quantity, 2);
    }
}
