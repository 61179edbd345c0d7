//! # Route Table
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  /health                                  health                       │
//! │  /products[/low-stock|/{id}[/price|/stock-adjustments|/serials|        │
//! │            /movements]]                   products → InventoryService   │
//! │  /customers                               customers → repository        │
//! │  /orders[/quote|/{id}|/by-number/{n}|/{id}/confirm-payment|/cancel|    │
//! │          /return]                         orders → CheckoutService      │
//! │  /discounts                               discounts → PricingService    │
//! │  /tax-configs[/{id}/activate]             tax → PricingService          │
//! │  /audit-logs                              audit → repository            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::routing::{get, post, put};
use axum::Router;
use serde::Deserialize;

use crate::state::SharedState;

pub mod audit;
pub mod customers;
pub mod discounts;
pub mod health;
pub mod orders;
pub mod products;
pub mod tax;

/// `?q=&limit=` for the lookup endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<i64>,
}

/// `?limit=` for the list endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageParams {
    pub limit: Option<i64>,
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/products", get(products::search))
        .route("/products/low-stock", get(products::low_stock))
        .route("/products/{id}", get(products::get_product))
        .route("/products/{id}/price", put(products::update_price))
        .route("/products/{id}/stock-adjustments", post(products::adjust_stock))
        .route("/products/{id}/serials", post(products::receive_serials))
        .route("/products/{id}/movements", get(products::movements))
        .route("/customers", get(customers::search))
        .route("/orders", get(orders::recent).post(orders::create))
        .route("/orders/quote", post(orders::quote))
        .route("/orders/by-number/{number}", get(orders::get_by_number))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/confirm-payment", post(orders::confirm_payment))
        .route("/orders/{id}/cancel", post(orders::cancel))
        .route("/orders/{id}/return", post(orders::return_order))
        .route("/discounts", get(discounts::list).post(discounts::create))
        .route("/tax-configs", get(tax::list).post(tax::create))
        .route("/tax-configs/{id}/activate", post(tax::activate))
        .route("/audit-logs", get(audit::list))
}
