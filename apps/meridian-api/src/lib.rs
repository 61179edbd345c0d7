//! # Meridian API
//!
//! REST front for the POS checkout backend.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Meridian API Server                             │
//! │                                                                         │
//! │  POS frontend ──► HTTP/JSON ──► TraceLayer ──► routes ──► services      │
//! │                   x-user-id                      │          │           │
//! │                                                  ▼          ▼           │
//! │                                              ApiError    SQLite (WAL)   │
//! │                                     {category, code, message,           │
//! │                                      itemIndex?}                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config`]. `MERIDIAN_CONFIG` points at a TOML file; `MERIDIAN_*`
//! variables override individual keys.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

use axum::Router;
use tower_http::trace::TraceLayer;

// Re-exports
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use state::{AppState, SharedState};

/// Builds the application router.
pub fn router(state: SharedState) -> Router {
    routes::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
