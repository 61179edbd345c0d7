//! Liveness plus a database round trip.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;
use tracing::warn;

use crate::state::SharedState;

pub async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let database = state.db.health_check().await;

    let status = if database {
        StatusCode::OK
    } else {
        warn!("Health check: database unreachable");
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
        "store": state.config.store.name,
        "serverTime": Utc::now().to_rfc3339(),
    });

    (status, Json(body))
}
