//! Catalog and stock endpoints.

use axum::extract::{Path, State};
use axum::Json;
use meridian_core::validation::resolve_limit;
use meridian_core::{Product, SerialUnit, StockMovement};
use meridian_db::inventory::{PriceUpdate, SerialIntake, StockAdjustment};
use tracing::info;

use crate::auth::ActingUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::routes::{PageParams, SearchParams};
use crate::state::SharedState;

/// `GET /products?q=&limit=`: active products by name, sku or barcode.
pub async fn search(
    State(state): State<SharedState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> ApiResult<Json<Vec<Product>>> {
    let products = state
        .inventory
        .search(&params.q, resolve_limit(params.limit))
        .await?;
    Ok(Json(products))
}

pub async fn low_stock(
    State(state): State<SharedState>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.inventory.low_stock(resolve_limit(params.limit)).await?))
}

pub async fn get_product(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.inventory.get_product(&id).await?))
}

pub async fn update_price(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<PriceUpdate>,
) -> ApiResult<Json<Product>> {
    let product = state.inventory.update_price(&id, update, user.id()).await?;
    info!(product_id = %id, user = %user.id(), price = %product.price(), "Price updated");
    Ok(Json(product))
}

pub async fn adjust_stock(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(id): Path<String>,
    ApiJson(adjustment): ApiJson<StockAdjustment>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.inventory.adjust_stock(&id, adjustment, user.id()).await?))
}

pub async fn receive_serials(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(id): Path<String>,
    ApiJson(intake): ApiJson<SerialIntake>,
) -> ApiResult<Json<Vec<SerialUnit>>> {
    Ok(Json(state.inventory.receive_serials(&id, intake, user.id()).await?))
}

pub async fn movements(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<Vec<StockMovement>>> {
    Ok(Json(state.inventory.movements(&id, resolve_limit(params.limit)).await?))
}
