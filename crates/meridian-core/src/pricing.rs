//! # Pricing Module
//!
//! Discount and tax resolution plus order totals. Pure functions: the
//! database layer looks up the [`Discount`] and the active [`TaxConfig`]
//! and hands them in.
//!
//! ## Resolution Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  subtotal ──┬── coupon? ──► apply_discount ──┐                         │
//! │             │                  │              │                         │
//! │             │     inactive / out of window ──► DiscountInactive        │
//! │             │     subtotal < min purchase  ──► MinPurchaseNotMet       │
//! │             │                                 │                         │
//! │             └── manual? ──► clamp_manual ─────┤                         │
//! │                                               ▼                         │
//! │                                         discount (≤ cap, ≤ subtotal)   │
//! │                                               │                         │
//! │  active TaxConfig ──► TaxRate ───────────────►│                         │
//! │                                               ▼                         │
//! │                        OrderTotals::compute(subtotal, discount, rate)  │
//! │                          tax   = (subtotal - discount) × rate, half-up │
//! │                          total = subtotal - discount + tax             │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                        settle_payment(method, total, tendered)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Discount, DiscountType, PaymentMethod, TaxConfig, TaxRate};

// =============================================================================
// Discounts
// =============================================================================

/// Raw discount for a type/value pair, before any cap.
///
/// PERCENTAGE takes `value`% of the subtotal (half-up); FIXED is `value`
/// minor units.
pub fn raw_discount(discount_type: DiscountType, value: i64, subtotal: Money) -> Money {
    match discount_type {
        DiscountType::Percentage => subtotal.percentage(value),
        DiscountType::Fixed => Money::from_cents(value),
    }
}

/// Applies a coupon to a subtotal.
///
/// ## Rules
/// 1. The discount must be active and `now` inside its validity window
/// 2. `subtotal` must reach `min_purchase`, when set
/// 3. The raw amount is clamped to `max_discount`, then to `subtotal`
///
/// ```rust
/// use chrono::Utc;
/// use meridian_core::pricing::apply_discount;
/// use meridian_core::{Discount, DiscountType, Money};
///
/// let coupon = Discount {
///     id: "d1".into(),
///     code: Some("SAVE10".into()),
///     name: "10% off, max 50.00".into(),
///     discount_type: DiscountType::Percentage,
///     value: 10,
///     min_purchase_cents: None,
///     max_discount_cents: Some(5_000),
///     starts_at: None,
///     ends_at: None,
///     is_active: true,
///     created_at: Utc::now(),
/// };
///
/// let amount = apply_discount(&coupon, Money::from_cents(100_000), Utc::now()).unwrap();
/// assert_eq!(amount.cents(), 5_000);
/// ```
pub fn apply_discount(discount: &Discount, subtotal: Money, now: DateTime<Utc>) -> CoreResult<Money> {
    let label = discount.code.clone().unwrap_or_else(|| discount.name.clone());

    if !discount.is_valid_at(now) {
        return Err(CoreError::DiscountInactive(label));
    }

    if let Some(min_purchase) = discount.min_purchase() {
        if subtotal < min_purchase {
            return Err(CoreError::MinPurchaseNotMet {
                code: label,
                min_purchase,
                subtotal,
            });
        }
    }

    let mut amount = raw_discount(discount.discount_type, discount.value, subtotal);
    if let Some(cap) = discount.max_discount() {
        amount = amount.min(cap);
    }

    Ok(amount.min(subtotal).max(Money::zero()))
}

/// Clamps a staff-entered manual discount to `0..=subtotal`.
pub fn clamp_manual_discount(amount: Money, subtotal: Money) -> Money {
    amount.min(subtotal).max(Money::zero())
}

// =============================================================================
// Tax
// =============================================================================

/// Rate of the active tax configuration, or zero when none is active.
pub fn resolve_tax_rate(active: Option<&TaxConfig>) -> TaxRate {
    active.map(TaxConfig::rate).unwrap_or_default()
}

// =============================================================================
// Order Totals
// =============================================================================

/// Subtotal, discount, tax and total of one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Computes tax and total.
    ///
    /// `tax = (subtotal - discount) × rate` rounded half-up, and
    /// `total = subtotal - discount + tax`. A negative total is refused, as
    /// is one too large for `Money`.
    pub fn compute(subtotal: Money, discount: Money, rate: TaxRate) -> CoreResult<Self> {
        let taxable = subtotal - discount;
        let tax = taxable.calculate_tax(rate);
        let total = taxable.checked_add(tax).ok_or_else(|| ValidationError::AmountTooLarge {
            field: "total".to_string(),
        })?;

        if total.is_negative() {
            return Err(CoreError::InvalidTotal(total));
        }

        Ok(OrderTotals {
            subtotal,
            discount,
            tax,
            total,
        })
    }
}

// =============================================================================
// Payment Settlement
// =============================================================================

/// Amount tendered and change owed for a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub tendered: Money,
    pub change: Money,
}

/// Works out tendered/change for a payment of `total`.
///
/// Only cash uses the tendered amount: `change = tendered - total`, and a
/// shortfall is refused with `InsufficientPayment`. Cash without a tendered
/// amount is treated as exact. Other methods always settle the exact total.
pub fn settle_payment(method: PaymentMethod, total: Money, tendered: Option<Money>) -> CoreResult<Settlement> {
    match (method, tendered) {
        (PaymentMethod::Cash, Some(tendered)) => {
            let change = tendered - total;
            if change.is_negative() {
                return Err(CoreError::InsufficientPayment { total, tendered });
            }
            Ok(Settlement { tendered, change })
        }
        _ => Ok(Settlement {
            tendered: total,
            change: Money::zero(),
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
