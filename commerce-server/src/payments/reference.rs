//! Reference and order-number generation
//!
//! Two identifiers with different lifetimes: the opaque `reference` is
//! per-attempt and reassigned on every reinitiation; the `order_number`
//! is human-readable and assigned once per order lifetime.

use chrono::{TimeZone, Utc};

/// Generate a fresh opaque provider-facing reference
pub fn new_reference() -> String {
    format!("CHC-{}", uuid::Uuid::new_v4().simple())
}

/// Derive the human-readable order number from the internal id and creation
/// time. Deterministic, so repeated assignment attempts produce the same
/// value for the same order. The full id is encoded (base36), so numbers
/// are unique whenever ids are; the `order_number` column carries a UNIQUE
/// index and a collision would wedge a confirmed payment permanently.
pub fn order_number_for(order_id: i64, created_at_millis: i64) -> String {
    let date = Utc
        .timestamp_millis_opt(created_at_millis)
        .single()
        .unwrap_or_else(Utc::now)
        .format("%Y%m%d");
    format!("ORD-{}-{}", date, base36(order_id))
}

/// Uppercase base36 of a non-negative id (snowflake ids are 53-bit, so at
/// most 11 digits)
fn base36(mut n: i64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n <= 0 {
        return "0".into();
    }
    let mut buf = [0u8; 13];
    let mut i = buf.len();
    while n > 0 {
        i -= 1;
        buf[i] = DIGITS[(n % 36) as usize];
        n /= 36;
    }
    String::from_utf8_lossy(&buf[i..]).into_owned()
}
