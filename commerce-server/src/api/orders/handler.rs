//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::core::ServerState;
use crate::utils::{AppError, AppResult};
use shared::models::{
    CheckoutResponse, CreateOrderRequest, Order, ReinitiateRequest, WebhookPayload,
};

/// Create an order and dispatch it to its payment provider
///
/// Retried checkouts collapse onto the existing pending order; the
/// response is 201 either way since the client gets a live checkout.
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<CheckoutResponse>)> {
    let response = state.order_service.create_order(payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get order by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Order>> {
    let order = state.order_service.get_order(id).await?;
    Ok(Json(order))
}

/// Resume payment on an unpaid order
pub async fn reinitiate(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<ReinitiateRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    let response = state.order_service.reinitiate_payment(id, payload).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub reference: Option<String>,
}

/// Verify a payment with the sync provider and apply the outcome
pub async fn verify(
    State(state): State<ServerState>,
    Query(query): Query<VerifyQuery>,
) -> AppResult<Json<Order>> {
    let reference = query
        .reference
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::validation("reference query parameter is required"))?;

    let order = state.order_service.verify_by_reference(reference).await?;
    Ok(Json(order))
}

/// Async provider callback
///
/// Transitions are idempotent, so a redelivered webhook is harmless.
pub async fn webhook(
    State(state): State<ServerState>,
    Json(payload): Json<WebhookPayload>,
) -> AppResult<Json<Order>> {
    tracing::info!(
        reference = %payload.reference,
        provider_status = %payload.provider_status,
        "Webhook received"
    );
    let order = state
        .order_service
        .apply_provider_status(&payload.reference, &payload.provider_status)
        .await?;
    Ok(Json(order))
}
