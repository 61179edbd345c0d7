//! Checkout and order lifecycle endpoints.
//!
//! ```text
//!   POST /orders ──► PENDING ──confirm-payment──► COMPLETED ──return──► RETURNED
//!         │             │                            ▲
//!         │             └──cancel──► CANCELLED       │
//!         └── CASH / CARD ───────────────────────────┘
//! ```
//!
//! Totals always come from the server; request bodies have no field for them.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use meridian_core::checkout::{CreateOrderRequest, Quote, QuoteRequest};
use meridian_core::validation::resolve_limit;
use meridian_core::{Order, OrderReceipt};
use serde::Deserialize;
use tracing::info;

use crate::auth::ActingUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::routes::PageParams;
use crate::state::SharedState;

/// Body of `POST /orders/{id}/confirm-payment`. The body may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfirmPayment {
    /// Provider reference; keeps the one given at checkout when absent.
    pub reference: Option<String>,
}

/// Body of the cancel and return routes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReversalRequest {
    pub reason: String,
}

pub async fn quote(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<QuoteRequest>,
) -> ApiResult<Json<Quote>> {
    Ok(Json(state.checkout.quote(request).await?))
}

pub async fn create(
    State(state): State<SharedState>,
    user: ActingUser,
    ApiJson(request): ApiJson<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<OrderReceipt>)> {
    let receipt = state.checkout.create_order(request, Some(user.id())).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn recent(
    State(state): State<SharedState>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.checkout.recent_orders(resolve_limit(params.limit)).await?))
}

pub async fn get_order(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderReceipt>> {
    Ok(Json(state.checkout.get_receipt(&id).await?))
}

pub async fn get_by_number(
    State(state): State<SharedState>,
    Path(number): Path<String>,
) -> ApiResult<Json<OrderReceipt>> {
    Ok(Json(state.checkout.get_receipt_by_number(&number).await?))
}

pub async fn confirm_payment(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(id): Path<String>,
    body: Option<ApiJson<ConfirmPayment>>,
) -> ApiResult<Json<OrderReceipt>> {
    let body = body.map(|ApiJson(body)| body).unwrap_or_default();
    let receipt = state
        .checkout
        .confirm_payment(&id, body.reference.as_deref())
        .await?;
    info!(order_id = %id, user = %user.id(), "Payment confirmed");
    Ok(Json(receipt))
}

pub async fn cancel(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ReversalRequest>,
) -> ApiResult<Json<OrderReceipt>> {
    Ok(Json(state.checkout.cancel_order(&id, user.id(), &body.reason).await?))
}

pub async fn return_order(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ReversalRequest>,
) -> ApiResult<Json<OrderReceipt>> {
    Ok(Json(state.checkout.return_order(&id, user.id(), &body.reason).await?))
}
