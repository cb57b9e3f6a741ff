//! Order API Module
//!
//! Checkout creation, payment verification, webhook ingestion, and
//! reinitiation. All mutations go through [`OrderService`].
//!
//! [`OrderService`]: crate::payments::OrderService

mod handler;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        // Checkout: create (or collapse onto) an order and dispatch payment
        .route("/", post(handler::create))
        // Manual verify for the sync provider, by payment reference
        .route("/verify", put(handler::verify))
        // Async provider callback
        .route("/webhook", post(handler::webhook))
        // Order detail
        .route("/{id}", get(handler::get_by_id))
        // Resume payment on an unpaid order
        .route("/{id}/reinitiate", put(handler::reinitiate))
}
