//! Retry-match normalization
//!
//! Checkout UIs double-submit and users click "try again" after failures;
//! both must collapse onto one order. Matching compares a normalized
//! projection of the billing identity and a normalized, order-independent
//! view of the line-item set. All money comparisons go through
//! `rust_decimal` to avoid f64 representation noise.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use shared::models::{BillingInput, LineItem, LineItemInput};

/// Implicit retry-match window: 2 hours. Bounds the candidate search and
/// avoids false positives against unrelated later purchases with
/// identical carts.
pub const RETRY_WINDOW_MS: i64 = 2 * 60 * 60 * 1000;

/// Lowercase + trim (used for emails and free-text item fields)
pub fn normalize_text(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

/// Strip all whitespace from a phone number
pub fn normalize_phone(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Normalized billing identity key for guest matching: (email, phone)
pub fn billing_key(billing: &BillingInput) -> (String, String) {
    (
        normalize_text(&billing.email),
        normalize_phone(&billing.phone),
    )
}

/// Two amounts are equal if they agree after rounding to 2 decimal places
pub fn amounts_equal(a: f64, b: f64) -> bool {
    match (Decimal::from_f64(a), Decimal::from_f64(b)) {
        (Some(da), Some(db)) => da.round_dp(2) == db.round_dp(2),
        _ => false,
    }
}

/// Case/whitespace-normalized projection of one line item. Price is rounded
/// to 4 decimal places, currency upper-cased; presentation attributes
/// participate so a changed color or size counts as a different cart.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct NormalizedItem {
    product_id: String,
    market_id: String,
    name: String,
    price: Decimal,
    currency: String,
    quantity: i32,
    item_type: String,
    category: String,
    color: Option<String>,
    size: Option<String>,
}

impl NormalizedItem {
    fn from_input(item: &LineItemInput) -> Self {
        Self {
            product_id: item.product_id.trim().to_string(),
            market_id: item.market_id.trim().to_string(),
            name: normalize_text(&item.name),
            price: Decimal::from_f64(item.price)
                .unwrap_or_default()
                .round_dp(4),
            currency: item.currency.trim().to_ascii_uppercase(),
            quantity: item.quantity,
            item_type: normalize_text(&item.item_type),
            category: normalize_text(&item.category),
            color: item.color.as_deref().map(normalize_text),
            size: item.size.as_deref().map(normalize_text),
        }
    }

    fn from_stored(item: &LineItem) -> Self {
        Self {
            product_id: item.product_id.trim().to_string(),
            market_id: item.market_id.trim().to_string(),
            name: normalize_text(&item.name),
            price: Decimal::from_f64(item.price)
                .unwrap_or_default()
                .round_dp(4),
            currency: item.currency.trim().to_ascii_uppercase(),
            quantity: item.quantity,
            item_type: normalize_text(&item.item_type),
            category: normalize_text(&item.category),
            color: item.color.as_deref().map(normalize_text),
            size: item.size.as_deref().map(normalize_text),
        }
    }
}

/// Whether a stored order's line items equal the incoming cart as an
/// order-independent multiset of normalized items
pub fn items_match(stored: &[LineItem], incoming: &[LineItemInput]) -> bool {
    if stored.len() != incoming.len() {
        return false;
    }
    let mut a: Vec<NormalizedItem> = stored.iter().map(NormalizedItem::from_stored).collect();
    let mut b: Vec<NormalizedItem> = incoming.iter().map(NormalizedItem::from_input).collect();
    a.sort();
    b.sort();
    a == b
}
