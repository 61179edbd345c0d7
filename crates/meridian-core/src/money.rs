//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  With floats:                                                           │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │                                                                         │
//! │  An order total built from a float subtotal, a float discount and a    │
//! │  float tax drifts by a minor unit every few thousand receipts.          │
//! │                                                                         │
//! │  Meridian: every amount is an i64 count of minor units.                │
//! │    subtotal 100000 - discount 0 + tax 18000 = total 118000              │
//! │    Rounding happens in exactly two places (tax, percentage discount),  │
//! │    both half-up, both in this file.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use meridian_core::money::Money;
//!
//! let price = Money::from_cents(50_000);
//! let line_total = price.multiply_quantity(2);
//! assert_eq!(line_total.cents(), 100_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// Serialized as a bare integer, so the wire format and the database column
/// carry the same number.
///
/// ## Where Money Flows
/// ```text
/// Product.price ──► OrderItem.unit_price ──► OrderItem.line_total
///                                                  │
///                                                  ▼
///                 Order.subtotal ──► discount ──► tax ──► Order.total
///                                                              │
///                                                              ▼
///                                    Payment.amount / tendered / change
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ```rust
    /// use meridian_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Calculates tax at the given rate, rounding half-up to the minor unit.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`.
    /// The +5000 is the half-up rounding term (5000/10000 = 0.5).
    ///
    /// ```rust
    /// use meridian_core::money::Money;
    /// use meridian_core::types::TaxRate;
    ///
    /// let taxable = Money::from_cents(100_000);
    /// assert_eq!(taxable.calculate_tax(TaxRate::from_bps(1800)).cents(), 18_000);
    ///
    /// // 10.00 at 8.25% = 0.825 -> 0.83
    /// assert_eq!(Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825)).cents(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 so large subtotals times bps cannot overflow
        let tax = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax as i64)
    }

    /// Returns `percent`% of this amount, rounded half-up.
    ///
    /// `percent` is a whole percentage (10 = 10%), which is how discounts
    /// store their value.
    ///
    /// ```rust
    /// use meridian_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(100_000).percentage(10).cents(), 10_000);
    /// assert_eq!(Money::from_cents(1_005).percentage(10).cents(), 101);
    /// ```
    pub fn percentage(&self, percent: i64) -> Money {
        let amount = (self.0 as i128 * percent as i128 + 50) / 100;
        Money::from_cents(amount as i64)
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// `self × qty`, or `None` if the product does not fit in `i64`.
    ///
    /// ```rust
    /// use meridian_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(250).checked_mul(4), Some(Money::from_cents(1_000)));
    /// assert_eq!(Money::from_cents(i64::MAX / 2 + 1).checked_mul(2), None);
    /// ```
    #[inline]
    pub const fn checked_mul(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// `self + other`, or `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented display: `1180.00`. Currency symbols and localization are
/// the frontend's job.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(500, 0).cents(), 50_000);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(118_000).to_string(), "1180.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_serializes_as_integer() {
        let json = serde_json::to_string(&Money::from_cents(118_000)).unwrap();
        assert_eq!(json, "118000");
        let back: Money = serde_json::from_str("5000").unwrap();
        assert_eq!(back, Money::from_cents(5000));
    }

    #[test]
    fn test_tax_half_up() {
        // 2 x 50000 at 18%
        assert_eq!(
            Money::from_cents(100_000).calculate_tax(TaxRate::from_bps(1800)).cents(),
            18_000
        );
        // 0.5 minor unit rounds up
        assert_eq!(Money::from_cents(50).calculate_tax(TaxRate::from_bps(100)).cents(), 1);
        assert_eq!(Money::from_cents(49).calculate_tax(TaxRate::from_bps(100)).cents(), 0);
        assert_eq!(Money::from_cents(1000).calculate_tax(TaxRate::zero()).cents(), 0);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(Money::from_cents(100_000).percentage(10).cents(), 10_000);
        assert_eq!(Money::from_cents(15).percentage(10).cents(), 2);
        assert_eq!(Money::from_cents(14).percentage(10).cents(), 1);
        assert_eq!(Money::from_cents(777).percentage(100).cents(), 777);
        assert_eq!(Money::from_cents(777).percentage(0).cents(), 0);
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);
        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3i64).cents(), 3000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
        assert_eq!(a.min(b), b);
    }

    #[test]
    fn test_checked_arithmetic() {
        let big = Money::from_cents(1 << 62);
        assert_eq!(big.checked_mul(4), None);
        assert_eq!(big.checked_add(big), None);
        assert_eq!(big.checked_mul(1), Some(big));
        assert_eq!(
            Money::from_cents(50_000).checked_add(Money::from_cents(1_200)),
            Some(Money::from_cents(51_200))
        );
    }
}
