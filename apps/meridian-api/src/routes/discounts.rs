use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use meridian_core::validation::resolve_limit;
use meridian_core::Discount;
use meridian_db::pricing::NewDiscount;

use crate::auth::ActingUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::routes::PageParams;
use crate::state::SharedState;

pub async fn list(
    State(state): State<SharedState>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<Vec<Discount>>> {
    Ok(Json(state.pricing.list_discounts(resolve_limit(params.limit)).await?))
}

pub async fn create(
    State(state): State<SharedState>,
    user: ActingUser,
    ApiJson(request): ApiJson<NewDiscount>,
) -> ApiResult<(StatusCode, Json<Discount>)> {
    let discount = state.pricing.create_discount(request, user.id()).await?;
    Ok((StatusCode::CREATED, Json(discount)))
}
