//! # Repository Module
//!
//! SQL for each table family, one file per family.
//!
//! ## Two Shapes of Access
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Route handler / service (reads)                                        │
//! │       │  db.products().search("a15", 20)                                │
//! │       ▼                                                                 │
//! │  XxxRepository { pool }  ── each call borrows a pooled connection       │
//! │                                                                         │
//! │  Service transaction (writes)                                           │
//! │       │  let mut tx = db.pool().begin().await?;                         │
//! │       │  stock::reserve(&mut tx, ...)                                   │
//! │       │  order::insert_order(&mut tx, ...)                              │
//! │       ▼                                                                 │
//! │  free functions taking `&mut SqliteConnection` ── all share one tx      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog search, categories, low stock
//! - [`stock::StockRepository`] - Stock ledger and serial units
//! - [`order::OrderRepository`] - Receipts and recent orders
//! - [`customer::CustomerRepository`] - Customer lookup
//! - [`discount::DiscountRepository`] - Coupons and promotions
//! - [`tax::TaxConfigRepository`] - Tax configurations
//! - [`audit::AuditLogRepository`] - Write-once audit trail

pub mod audit;
pub mod customer;
pub mod discount;
pub mod order;
pub mod product;
pub mod stock;
pub mod tax;
