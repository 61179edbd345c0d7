//! # meridian-core: Pure Business Logic for Meridian POS
//!
//! This crate holds the checkout rules of Meridian POS as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Meridian POS Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web Frontend                                 │   │
//! │  │    Product lookup ──► Cart ──► Tender ──► Receipt              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    meridian-api (axum)                          │   │
//! │  │    POST /orders, GET /products, GET /customers, ...            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ meridian-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │ checkout  │  │   │
//! │  │   │  Product  │  │   Money   │  │ discount  │  │  request  │  │   │
//! │  │   │   Order   │  │  TaxRate  │  │    tax    │  │ validation│  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 meridian-db (Database Layer)                    │   │
//! │  │      SQLite queries, migrations, checkout transaction           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Order, Payment, Discount, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types and their categories
//! - [`validation`] - Field-level validation
//! - [`pricing`] - Discount and tax resolution, order totals
//! - [`checkout`] - Checkout request types and their validation
//! - [`order_number`] - Unique, human-readable order numbers
//!
//! ## Example Usage
//!
//! ```rust
//! use meridian_core::money::Money;
//! use meridian_core::pricing::OrderTotals;
//! use meridian_core::types::TaxRate;
//!
//! let subtotal = Money::from_cents(100_000);
//! let totals = OrderTotals::compute(subtotal, Money::zero(), TaxRate::from_bps(1800)).unwrap();
//!
//! assert_eq!(totals.tax.cents(), 18_000);
//! assert_eq!(totals.total.cents(), 118_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod money;
pub mod order_number;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorCategory, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single checkout request.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// Guards against typing 1000 instead of 10 at the till.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest amount accepted on input, in minor units (10 billion major).
///
/// Keeps `price × quantity` summed over a full cart far inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000;

/// Order number prefix used when the store config does not set one.
pub const DEFAULT_ORDER_PREFIX: &str = "ORD";

/// Stock movement reason written for checkout reservations.
pub const REASON_SALE: &str = "SALE";

/// Stock movement reason written when a completed order is returned.
pub const REASON_RETURN: &str = "RETURN";

/// Stock movement reason written when a pending order is cancelled.
pub const REASON_CANCEL: &str = "CANCEL";

/// Stock movement reason written for serial unit intake.
pub const REASON_RECEIVE: &str = "RECEIVE";
