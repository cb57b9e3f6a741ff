//! Order Repository
//!
//! Persistence and lookup of orders, line items, and billing snapshots.
//! The `reference` UNIQUE index is the concurrency backstop for retry
//! resolution: two processes racing to create the same logical checkout
//! surface the loss as [`RepoError::Duplicate`].

use super::RepoResult;
use shared::models::{
    BillingSnapshot, LineItem, LineItemInput, Order, PaymentProvider, PaymentStatus,
};
use sqlx::SqlitePool;

const ORDER_SELECT: &str = "SELECT id, reference, order_number, payer_id, provider, total_amount, currency, payment_status, billing_name AS name, billing_email AS email, billing_phone AS phone, billing_country AS country, created_at, updated_at FROM orders";

/// Payload for creating a new order row (items + billing snapshot included)
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub reference: String,
    pub order_number: Option<String>,
    pub payer_id: Option<i64>,
    pub provider: PaymentProvider,
    pub total_amount: f64,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub billing: BillingSnapshot,
    pub items: Vec<LineItemInput>,
}

/// Key used for implicit retry matching: payer id is authoritative for
/// signed-in checkouts; normalized billing identity covers guests.
#[derive(Debug, Clone)]
pub enum MatchKey {
    Payer(i64),
    /// Already-normalized (lowercased email, whitespace-stripped phone).
    /// `billing_phone` is stored normalized, so the phone compares the
    /// column directly.
    Billing { email: String, phone: String },
}

/// Create order + line items atomically in one transaction
pub async fn create(pool: &SqlitePool, data: NewOrder) -> RepoResult<Order> {
    let now = shared::util::now_millis();
    let id = shared::util::snowflake_id();

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO orders (id, reference, order_number, payer_id, provider, total_amount, currency, payment_status, billing_name, billing_email, billing_phone, billing_country, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
    )
    .bind(id)
    .bind(&data.reference)
    .bind(&data.order_number)
    .bind(data.payer_id)
    .bind(data.provider)
    .bind(data.total_amount)
    .bind(&data.currency)
    .bind(data.payment_status)
    .bind(&data.billing.name)
    .bind(&data.billing.email)
    .bind(&data.billing.phone)
    .bind(&data.billing.country)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    for (position, item) in data.items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO order_item (id, order_id, position, name, product_id, market_id, price, currency, quantity, item_type, category, color, size, image) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )
        .bind(shared::util::snowflake_id())
        .bind(id)
        .bind(position as i32)
        .bind(&item.name)
        .bind(&item.product_id)
        .bind(&item.market_id)
        .bind(item.price)
        .bind(&item.currency)
        .bind(item.quantity)
        .bind(&item.item_type)
        .bind(&item.category)
        .bind(&item.color)
        .bind(&item.size)
        .bind(&item.image)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| super::RepoError::Database("Failed to create order".into()))
}

/// Line items for one order, in client-supplied position order
async fn find_items(pool: &SqlitePool, order_id: i64) -> RepoResult<Vec<LineItem>> {
    let rows = sqlx::query_as::<_, LineItem>(
        "SELECT id, order_id, position, name, product_id, market_id, price, currency, quantity, item_type, category, color, size, image \
         FROM order_item WHERE order_id = ? ORDER BY position ASC",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn load_items(pool: &SqlitePool, order: Option<Order>) -> RepoResult<Option<Order>> {
    match order {
        Some(mut o) => {
            o.items = find_items(pool, o.id).await?;
            Ok(Some(o))
        }
        None => Ok(None),
    }
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Order>> {
    let sql = format!("{} WHERE id = ?", ORDER_SELECT);
    let row = sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    load_items(pool, row).await
}

pub async fn find_by_reference(pool: &SqlitePool, reference: &str) -> RepoResult<Option<Order>> {
    let sql = format!("{} WHERE reference = ?", ORDER_SELECT);
    let row = sqlx::query_as::<_, Order>(&sql)
        .bind(reference)
        .fetch_optional(pool)
        .await?;
    load_items(pool, row).await
}

pub async fn find_by_order_number(
    pool: &SqlitePool,
    order_number: &str,
) -> RepoResult<Option<Order>> {
    let sql = format!("{} WHERE order_number = ?", ORDER_SELECT);
    let row = sqlx::query_as::<_, Order>(&sql)
        .bind(order_number)
        .fetch_optional(pool)
        .await?;
    load_items(pool, row).await
}

/// Resolve an explicit retry token: a reference, an order number, or a raw
/// internal id, in that order
pub async fn find_retry_target(pool: &SqlitePool, token: &str) -> RepoResult<Option<Order>> {
    if let Some(order) = find_by_reference(pool, token).await? {
        return Ok(Some(order));
    }
    if let Some(order) = find_by_order_number(pool, token).await? {
        return Ok(Some(order));
    }
    if let Ok(id) = token.parse::<i64>() {
        return find_by_id(pool, id).await;
    }
    Ok(None)
}

/// Pending orders created since `window_start` for the given identity key,
/// most recent first, with items loaded for cart comparison.
///
/// Amount equality is checked by the caller with decimal rounding; SQL only
/// narrows by status, window, and identity. Product decision: when a payer
/// id is present it is authoritative and billing identity is not consulted.
pub async fn find_pending_matches(
    pool: &SqlitePool,
    window_start: i64,
    key: &MatchKey,
) -> RepoResult<Vec<Order>> {
    let rows = match key {
        MatchKey::Payer(payer_id) => {
            let sql = format!(
                "{} WHERE payment_status = 'PENDING' AND created_at >= ? AND payer_id = ? ORDER BY created_at DESC",
                ORDER_SELECT
            );
            sqlx::query_as::<_, Order>(&sql)
                .bind(window_start)
                .bind(payer_id)
                .fetch_all(pool)
                .await?
        }
        MatchKey::Billing { email, phone } => {
            let sql = format!(
                "{} WHERE payment_status = 'PENDING' AND created_at >= ? AND payer_id IS NULL \
                 AND LOWER(TRIM(billing_email)) = ? AND billing_phone = ? \
                 ORDER BY created_at DESC",
                ORDER_SELECT
            );
            sqlx::query_as::<_, Order>(&sql)
                .bind(window_start)
                .bind(email)
                .bind(phone)
                .fetch_all(pool)
                .await?
        }
    };

    let mut orders = Vec::with_capacity(rows.len());
    for mut order in rows {
        order.items = find_items(pool, order.id).await?;
        orders.push(order);
    }
    Ok(orders)
}

/// Persist a payment-status transition. The order number is assigned only
/// if not already set (COALESCE keeps the first assignment immutable).
pub async fn update_status(
    pool: &SqlitePool,
    id: i64,
    status: PaymentStatus,
    order_number: Option<&str>,
) -> RepoResult<Order> {
    let now = shared::util::now_millis();
    let rows = sqlx::query(
        "UPDATE orders SET payment_status = ?1, order_number = COALESCE(order_number, ?2), updated_at = ?3 WHERE id = ?4",
    )
    .bind(status)
    .bind(order_number)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(super::RepoError::NotFound(format!("Order {id}")));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| super::RepoError::NotFound(format!("Order {id}")))
}

/// Reassign the opaque reference for a reinitiation: fresh reference, status
/// reset, same id and order number. The provider may change when the retry
/// request selected the other gateway.
pub async fn update_reference(
    pool: &SqlitePool,
    id: i64,
    reference: &str,
    provider: PaymentProvider,
    status: PaymentStatus,
) -> RepoResult<Order> {
    let now = shared::util::now_millis();
    let rows = sqlx::query(
        "UPDATE orders SET reference = ?1, provider = ?2, payment_status = ?3, updated_at = ?4 WHERE id = ?5",
    )
    .bind(reference)
    .bind(provider)
    .bind(status)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(super::RepoError::NotFound(format!("Order {id}")));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| super::RepoError::NotFound(format!("Order {id}")))
}

/// Pending orders for the reconciliation sweep, most recent first.
/// Items are not loaded; the sweep only needs references.
pub async fn list_pending(pool: &SqlitePool, limit: i64) -> RepoResult<Vec<Order>> {
    let sql = format!(
        "{} WHERE payment_status = 'PENDING' ORDER BY created_at DESC LIMIT ?",
        ORDER_SELECT
    );
    let rows = sqlx::query_as::<_, Order>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
