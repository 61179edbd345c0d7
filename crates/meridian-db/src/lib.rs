//! # meridian-db: Database Layer for Meridian POS
//!
//! SQLite storage, the checkout transaction and the services built on it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Meridian POS Data Flow                             │
//! │                                                                         │
//! │  meridian-api route (POST /orders)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  meridian-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   Services          CheckoutService  InventoryService           │   │
//! │  │                     PricingService   AuditRecorder              │   │
//! │  │                            │                                    │   │
//! │  │   Repositories      product  stock  order  discount  tax        │   │
//! │  │                     customer  audit                             │   │
//! │  │                            │                                    │   │
//! │  │   Database          SqlitePool (WAL) + embedded migrations      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  meridian.db (SQLite)                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - `DbError` and the services' `ServiceError`
//! - [`repository`] - SQL per table family
//! - [`checkout`] - Order assembly and the order lifecycle
//! - [`inventory`] - Stock adjustments, serial intake, price changes
//! - [`pricing`] - Discount/tax resolution and their management
//! - [`audit`] - Fire-and-forget audit recording
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use meridian_core::order_number::OrderNumberGenerator;
//! use meridian_db::{AuditRecorder, CheckoutService, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("meridian.db")).await?;
//! let audit = AuditRecorder::new(db.audit_logs());
//! let checkout = CheckoutService::new(db.clone(), audit, Arc::new(OrderNumberGenerator::new("ORD")));
//!
//! let receipt = checkout.create_order(request, Some("cashier-1")).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod checkout;
pub mod error;
pub mod inventory;
pub mod migrations;
pub mod pool;
pub mod pricing;
pub mod repository;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use audit::{AuditEntry, AuditRecorder};
pub use checkout::CheckoutService;
pub use error::{DbError, DbResult, ServiceError, ServiceFailure, ServiceResult};
pub use inventory::InventoryService;
pub use pool::{Database, DbConfig};
pub use pricing::PricingService;

// Repository re-exports for convenience
pub use repository::audit::{AuditFilter, AuditLogRepository};
pub use repository::customer::CustomerRepository;
pub use repository::discount::DiscountRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
pub use repository::stock::StockRepository;
pub use repository::tax::TaxConfigRepository;
