use axum::extract::State;
use axum::Json;
use meridian_core::validation::resolve_limit;
use meridian_core::AuditLog;
use meridian_db::AuditFilter;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::ApiQuery;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuditParams {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub limit: Option<i64>,
}

/// `GET /audit-logs?entityType=&entityId=&limit=`, newest first.
pub async fn list(
    State(state): State<SharedState>,
    ApiQuery(params): ApiQuery<AuditParams>,
) -> ApiResult<Json<Vec<AuditLog>>> {
    let filter = AuditFilter {
        entity_type: params.entity_type,
        entity_id: params.entity_id,
    };

    let logs = state
        .db
        .audit_logs()
        .list(&filter, resolve_limit(params.limit))
        .await?;
    Ok(Json(logs))
}
