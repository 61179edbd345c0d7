use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use meridian_core::TaxConfig;
use meridian_db::pricing::NewTaxConfig;
use tracing::info;

use crate::auth::ActingUser;
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::state::SharedState;

pub async fn list(State(state): State<SharedState>) -> ApiResult<Json<Vec<TaxConfig>>> {
    Ok(Json(state.pricing.list_tax_configs().await?))
}

/// Creates an inactive config; activation is a separate, audited step.
pub async fn create(
    State(state): State<SharedState>,
    user: ActingUser,
    ApiJson(request): ApiJson<NewTaxConfig>,
) -> ApiResult<(StatusCode, Json<TaxConfig>)> {
    let config = state.pricing.create_tax_config(request).await?;
    info!(id = %config.id, user = %user.id(), "Tax config created via API");
    Ok((StatusCode::CREATED, Json(config)))
}

pub async fn activate(
    State(state): State<SharedState>,
    user: ActingUser,
    Path(id): Path<String>,
) -> ApiResult<Json<TaxConfig>> {
    Ok(Json(state.pricing.activate_tax_config(&id, user.id()).await?))
}
