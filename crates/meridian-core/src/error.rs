//! # Error Types
//!
//! Domain-specific error types for meridian-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  meridian-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── ValidationError  - Malformed input                                │
//! │  └── ErrorCategory    - VALIDATION / NOT_FOUND / CONFLICT /            │
//! │                         POLICY / PERSISTENCE                           │
//! │                                                                         │
//! │  meridian-db errors (separate crate)                                   │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── ServiceError     - CoreError/DbError + offending line index       │
//! │                                                                         │
//! │  meridian-api errors                                                   │
//! │  └── ApiError         - What the frontend sees (JSON + status code)    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → ApiError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, code, amounts)
//! 3. Every variant maps to exactly one [`ErrorCategory`]

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Error Category
// =============================================================================

/// Coarse error taxonomy shared by every layer.
///
/// The frontend switches on this to decide how to present a failure; the
/// HTTP layer derives the status code from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Malformed request shape.
    Validation,
    /// Referenced product/discount/customer/order is missing.
    NotFound,
    /// Insufficient stock, serial unavailable, number collision, bad status.
    Conflict,
    /// Business policy refused the request (discount rules, cash tendered).
    Policy,
    /// Transaction or commit failure.
    Persistence,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Product exists but has been deactivated.
    #[error("Product {0} is inactive")]
    ProductInactive(String),

    /// Insufficient stock to complete sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (qty: 5)
    ///      │
    ///      ▼
    /// Conditional decrement: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "PHN-A15", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 PHN-A15 in stock", cart kept for correction
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Requested serial unit is unknown, belongs to another product, or sold.
    #[error("Serial number {serial} is not available")]
    SerialNotAvailable { serial: String },

    /// No discount with the given code.
    #[error("Discount code not found: {0}")]
    DiscountNotFound(String),

    /// Discount is switched off or outside its validity window.
    #[error("Discount {0} is not active")]
    DiscountInactive(String),

    /// Subtotal is below the discount's minimum purchase.
    #[error("Discount {code} requires a minimum purchase of {min_purchase}, subtotal is {subtotal}")]
    MinPurchaseNotMet {
        code: String,
        min_purchase: Money,
        subtotal: Money,
    },

    /// Cash tendered does not cover the order total.
    #[error("Insufficient payment: total {total}, tendered {tendered}")]
    InsufficientPayment { total: Money, tendered: Money },

    /// Computed total came out negative.
    #[error("Invalid order total: {0}")]
    InvalidTotal(Money),

    /// Customer cannot be found.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Order cannot be found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Tax configuration cannot be found.
    #[error("Tax configuration not found: {0}")]
    TaxConfigNotFound(String),

    /// Order is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Confirming payment on a completed order
    /// - Returning a pending or cancelled order
    /// - Cancelling a completed order (use return instead)
    #[error("Order {order_id} is {current_status}, cannot {operation}")]
    InvalidOrderStatus {
        order_id: String,
        current_status: String,
        operation: String,
    },

    /// Could not allocate a unique order number.
    #[error("Order number collision after {attempts} attempts")]
    OrderNumberCollision { attempts: u32 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns the taxonomy bucket for this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::Validation(_) => ErrorCategory::Validation,
            CoreError::ProductNotFound(_)
            | CoreError::DiscountNotFound(_)
            | CoreError::CustomerNotFound(_)
            | CoreError::OrderNotFound(_)
            | CoreError::TaxConfigNotFound(_) => ErrorCategory::NotFound,
            CoreError::InsufficientStock { .. }
            | CoreError::SerialNotAvailable { .. }
            | CoreError::InvalidOrderStatus { .. }
            | CoreError::OrderNumberCollision { .. } => ErrorCategory::Conflict,
            CoreError::ProductInactive(_)
            | CoreError::DiscountInactive(_)
            | CoreError::MinPurchaseNotMet { .. }
            | CoreError::InsufficientPayment { .. }
            | CoreError::InvalidTotal(_) => ErrorCategory::Policy,
        }
    }

    /// Machine-readable code for the frontend, e.g. `INSUFFICIENT_STOCK`.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            CoreError::ProductInactive(_) => "PRODUCT_INACTIVE",
            CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CoreError::SerialNotAvailable { .. } => "SERIAL_NOT_AVAILABLE",
            CoreError::DiscountNotFound(_) => "DISCOUNT_NOT_FOUND",
            CoreError::DiscountInactive(_) => "DISCOUNT_INACTIVE",
            CoreError::MinPurchaseNotMet { .. } => "MIN_PURCHASE_NOT_MET",
            CoreError::InsufficientPayment { .. } => "INSUFFICIENT_PAYMENT",
            CoreError::InvalidTotal(_) => "INVALID_TOTAL",
            CoreError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            CoreError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            CoreError::TaxConfigNotFound(_) => "TAX_CONFIG_NOT_FOUND",
            CoreError::InvalidOrderStatus { .. } => "INVALID_ORDER_STATUS",
            CoreError::OrderNumberCollision { .. } => "ORDER_NUMBER_COLLISION",
            CoreError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when request input doesn't meet requirements.
/// Used for early validation before any database work starts.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Two fields that cannot be combined were both supplied.
    #[error("{first} and {second} cannot be combined")]
    Conflicting { first: String, second: String },

    /// Duplicate value in a request (e.g., same serial twice).
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },

    /// A computed amount (line total, subtotal, total) does not fit in the
    /// money type.
    #[error("{field} exceeds the largest supported amount")]
    AmountTooLarge { field: String },

    /// Checkout request has no lines.
    #[error("Order must contain at least one item")]
    EmptyCart,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
