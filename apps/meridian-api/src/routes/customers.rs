use axum::extract::State;
use axum::Json;
use meridian_core::validation::resolve_limit;
use meridian_core::Customer;

use crate::error::ApiResult;
use crate::extract::ApiQuery;
use crate::routes::SearchParams;
use crate::state::SharedState;

/// `GET /customers?q=&limit=`, matching name, phone or email.
pub async fn search(
    State(state): State<SharedState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> ApiResult<Json<Vec<Customer>>> {
    let customers = state
        .db
        .customers()
        .search(&params.q, resolve_limit(params.limit))
        .await?;
    Ok(Json(customers))
}
