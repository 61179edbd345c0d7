//! Router fixtures for the HTTP tests.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use meridian_core::{Product, TaxConfig};
use meridian_db::pricing::NewTaxConfig;
use meridian_db::{Database, DbConfig};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::auth::USER_HEADER;
use crate::config::ApiConfig;
use crate::state::{AppState, SharedState};

pub async fn test_app() -> (Router, SharedState) {
    let db = Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database");
    let state = AppState::new(db, ApiConfig::default());
    (crate::router(state.clone()), state)
}

/// Active, non-serialized product.
pub async fn insert_product(state: &AppState, sku: &str, price_cents: i64, stock: i64) -> Product {
    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4().to_string(),
        sku: sku.to_string(),
        barcode: None,
        name: sku.to_string(),
        category_id: None,
        price_cents,
        cost_cents: price_cents / 2,
        stock_quantity: stock,
        low_stock_threshold: 5,
        warranty_months: None,
        is_serialized: false,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    state.db.products().insert(&product).await.expect("insert product")
}

pub async fn activate_tax(state: &AppState, rate_bps: i64) -> TaxConfig {
    let config = state
        .pricing
        .create_tax_config(NewTaxConfig {
            name: format!("Tax {}", rate_bps),
            rate_bps,
        })
        .await
        .expect("create tax config");
    state
        .pricing
        .activate_tax_config(&config.id, "test")
        .await
        .expect("activate tax config")
}

pub struct TestRequest {
    method: Method,
    uri: String,
    body: Option<Value>,
    user: Option<String>,
}

impl TestRequest {
    fn new(method: Method, uri: &str, body: Option<Value>) -> Self {
        TestRequest {
            method,
            uri: uri.to_string(),
            body,
            user: None,
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri, None)
    }

    pub fn post(uri: &str, body: Value) -> Self {
        Self::new(Method::POST, uri, Some(body))
    }

    pub fn post_empty(uri: &str) -> Self {
        Self::new(Method::POST, uri, None)
    }

    pub fn put(uri: &str, body: Value) -> Self {
        Self::new(Method::PUT, uri, Some(body))
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.user = Some(user_id.to_string());
        self
    }

    fn build(self) -> Request<Body> {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        if let Some(user) = self.user {
            builder = builder.header(USER_HEADER, user);
        }
        match self.body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }
}

/// Sends one request and decodes the JSON reply (`Null` when empty).
pub async fn send(app: &Router, request: TestRequest) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request.build()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}
