//! # Domain Types
//!
//! Core domain types used throughout Meridian POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog                 Checkout                  Pricing              │
//! │  ─────────────────       ─────────────────         ──────────────       │
//! │  Category                Order ◄───┐               Discount             │
//! │  Product ◄─── SerialUnit   │       │               TaxConfig            │
//! │     │                      ├── OrderItem (snapshots)  TaxRate (bps)      │
//! │     └── StockMovement      └── Payment (1:1)                            │
//! │                                                                         │
//! │  People                  Records                                        │
//! │  ─────────────────       ─────────────────                              │
//! │  Customer                AuditLog (write-once)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conventions
//! - `id`: UUID v4 string, immutable, used for relations
//! - Business ids (`sku`, `order_number`, `code`) are human-readable
//! - Amounts are stored as `*_cents: i64` with `Money` accessors
//! - Wire format is camelCase; enums are SCREAMING_SNAKE_CASE both on the
//!   wire and in the database

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1800 bps = 18%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Upper bound: 100%.
    pub const MAX_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Product grouping shown in the catalog filter.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A product available for sale.
///
/// ## Stock Invariants
/// - `stock_quantity >= 0` (also a CHECK constraint)
/// - when `is_serialized`, `stock_quantity` equals the number of
///   AVAILABLE [`SerialUnit`] rows for this product
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    pub category_id: Option<String>,

    /// Selling price in minor units.
    pub price_cents: i64,

    /// Cost in minor units (for margin reporting).
    pub cost_cents: i64,

    pub stock_quantity: i64,

    /// Stock at or below this level shows up in the low-stock listing.
    pub low_stock_threshold: i64,

    /// Warranty granted on each unit sold, if any.
    pub warranty_months: Option<i64>,

    /// Units are tracked individually by serial number.
    pub is_serialized: bool,

    /// Soft delete flag. Inactive products cannot be sold.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }
}

/// Availability of a single serialized unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SerialStatus {
    Available,
    Sold,
}

/// One physical unit of a serialized product (phones, laptops, ...).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SerialUnit {
    pub id: String,
    pub product_id: String,
    pub serial_number: String,
    pub status: SerialStatus,
    /// Set while the unit belongs to an order.
    pub order_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stock Ledger
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
}

/// Append-only stock ledger entry.
///
/// `quantity` is the signed delta applied to `Product.stock_quantity`:
/// negative for OUT, positive for IN, either sign for ADJUSTMENT.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    pub quantity: i64,
    /// SALE, RETURN, CANCEL, RECEIVE, or free text for adjustments.
    pub reason: String,
    pub order_id: Option<String>,
    pub user_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle of an order.
///
/// ```text
///   createOrder ──┬── CASH / CARD ────────► COMPLETED ──return──► RETURNED
///                 │                            ▲
///                 └── MOBILE_MONEY ──► PENDING ┘ confirmPayment
///                                        │
///                                        └──cancel──► CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Returned => "RETURNED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method / Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Physical cash; the only method where tendered/change matter.
    Cash,
    /// Mobile money push; confirmed later by the operator.
    MobileMoney,
    /// Card on an external terminal.
    Card,
}

impl PaymentMethod {
    /// Whether the payment is settled at checkout time.
    pub fn settles_immediately(&self) -> bool {
        matches!(self, PaymentMethod::Cash | PaymentMethod::Card)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Voided,
    Refunded,
}

// =============================================================================
// Order
// =============================================================================

/// A checkout transaction.
///
/// `total_cents = subtotal_cents - discount_cents + tax_cents`, never
/// negative. Totals are only ever computed by the checkout service.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub discount_id: Option<String>,
    pub customer_id: Option<String>,
    /// Staff member who rang up the order.
    pub agent_id: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item in an order.
///
/// Name, sku, price and cost are snapshots taken at checkout and never
/// recomputed from the live product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub name_snapshot: String,
    pub sku_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub unit_cost_cents: i64,
    /// unit_price × quantity.
    pub line_total_cents: i64,
    pub serial_number: Option<String>,
    #[ts(as = "Option<String>")]
    pub warranty_expires_at: Option<DateTime<Utc>>,
    /// Unit price was entered by staff instead of taken from the catalog.
    pub price_overridden: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// The single payment attached to an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Always equals the order total.
    pub amount_cents: i64,
    pub tendered_cents: i64,
    pub change_cents: i64,
    /// External reference (mobile money transaction id, card auth code).
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Everything a receipt needs: the order, its lines and its payment.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: Payment,
}

// =============================================================================
// Discounts & Tax
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    /// `value` is a whole percentage, 0..=100.
    Percentage,
    /// `value` is an amount in minor units.
    Fixed,
}

/// A coupon or promotion.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    pub id: String,
    /// Coupon code, stored upper-case. Codeless discounts are not redeemable
    /// at checkout.
    pub code: Option<String>,
    pub name: String,
    pub discount_type: DiscountType,
    pub value: i64,
    pub min_purchase_cents: Option<i64>,
    pub max_discount_cents: Option<i64>,
    #[ts(as = "Option<String>")]
    pub starts_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Discount {
    /// Active and `now` falls inside `[starts_at, ends_at]`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        if matches!(self.starts_at, Some(start) if now < start) {
            return false;
        }
        if matches!(self.ends_at, Some(end) if now > end) {
            return false;
        }
        true
    }

    pub fn min_purchase(&self) -> Option<Money> {
        self.min_purchase_cents.map(Money::from_cents)
    }

    pub fn max_discount(&self) -> Option<Money> {
        self.max_discount_cents.map(Money::from_cents)
    }
}

/// A named tax rate. At most one row is active at a time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TaxConfig {
    pub id: String,
    pub name: String,
    pub rate_bps: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl TaxConfig {
    /// Rate as a [`TaxRate`]. Out-of-range stored values clamp to 0..=100%.
    pub fn rate(&self) -> TaxRate {
        TaxRate::from_bps(self.rate_bps.clamp(0, TaxRate::MAX_BPS as i64) as u32)
    }
}

// =============================================================================
// Audit
// =============================================================================

/// What an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Order created with overridden pricing.
    OrderCreate,
    OrderCancel,
    OrderReturn,
    PriceChange,
    StockAdjust,
    DiscountCreate,
    TaxConfigChange,
}

/// Entity kinds referenced by [`AuditLog::entity_type`].
pub mod entity {
    pub const ORDER: &str = "ORDER";
    pub const PRODUCT: &str = "PRODUCT";
    pub const DISCOUNT: &str = "DISCOUNT";
    pub const TAX_CONFIG: &str = "TAX_CONFIG";
}

/// A write-once audit record. `old_value`/`new_value` hold JSON snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: String,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    pub user_id: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
