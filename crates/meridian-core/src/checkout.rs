//! # Checkout Requests
//!
//! Wire types for `POST /orders` and `POST /orders/quote`, and the
//! validation that turns them into normalized commands before any database
//! work starts.
//!
//! ## Request Flow
//! ```text
//! JSON body
//!    │  serde: camelCase, deny_unknown_fields, enum payment method
//!    ▼
//! CreateOrderRequest
//!    │  validate(): ids, quantities, serial rules, coupon xor manual
//!    ▼
//! ValidatedOrder ──► CheckoutService::create_order (meridian-db)
//! ```
//!
//! Requests carry no totals. A body with a `total*` field is rejected by
//! `deny_unknown_fields`; totals come only from the checkout service.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::pricing::OrderTotals;
use crate::types::PaymentMethod;
use crate::validation::{
    normalize_coupon_code, validate_amount_cents, validate_optional_text, validate_quantity,
    validate_serial_number, validate_uuid,
};
use crate::MAX_CART_ITEMS;

// =============================================================================
// Wire Types
// =============================================================================

/// One requested line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub serial_number: Option<String>,
    /// Staff price override; replaces the catalog price for this line.
    #[serde(default)]
    pub unit_price_override: Option<Money>,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
    #[serde(default)]
    pub customer_id: Option<String>,
    /// Defaults to the acting user.
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub manual_discount: Option<Money>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub amount_tendered: Option<Money>,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Body of `POST /orders/quote`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QuoteRequest {
    pub items: Vec<OrderLineRequest>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub manual_discount: Option<Money>,
}

/// A priced line in a quote.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QuoteLine {
    pub product_id: String,
    pub name: String,
    pub sku: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
    pub price_overridden: bool,
}

/// Totals preview returned by `POST /orders/quote`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub lines: Vec<QuoteLine>,
    pub totals: OrderTotals,
    pub discount_id: Option<String>,
}

// =============================================================================
// Validated Commands
// =============================================================================

/// A line that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLine {
    pub product_id: String,
    pub quantity: i64,
    pub serial_number: Option<String>,
    pub unit_price_override: Option<Money>,
}

/// How the order's discount is decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountSource {
    None,
    /// Normalized (trimmed, upper-case) coupon code.
    Coupon(String),
    /// Staff-entered amount, clamped to the subtotal at pricing time.
    Manual(Money),
}

/// A checkout command ready for the checkout service.
#[derive(Debug, Clone)]
pub struct ValidatedOrder {
    pub lines: Vec<ValidatedLine>,
    pub customer_id: Option<String>,
    pub agent_id: Option<String>,
    pub discount: DiscountSource,
    pub payment_method: PaymentMethod,
    pub amount_tendered: Option<Money>,
    /// Always `None` for cash.
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
}

impl ValidatedOrder {
    /// Whether standard catalog pricing was bypassed (price override or
    /// manual discount). Such orders get an audit entry.
    pub fn overrides_pricing(&self) -> bool {
        matches!(self.discount, DiscountSource::Manual(_))
            || self.lines.iter().any(|l| l.unit_price_override.is_some())
    }
}

/// A quote command.
#[derive(Debug, Clone)]
pub struct ValidatedQuote {
    pub lines: Vec<ValidatedLine>,
    pub discount: DiscountSource,
}

/// Validation failure, tagged with the offending line when there is one.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct RequestRejected {
    pub item_index: Option<usize>,
    pub source: ValidationError,
}

impl RequestRejected {
    fn order(source: ValidationError) -> Self {
        RequestRejected {
            item_index: None,
            source,
        }
    }

    fn line(index: usize, source: ValidationError) -> Self {
        RequestRejected {
            item_index: Some(index),
            source,
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

impl CreateOrderRequest {
    /// Validates and normalizes the request.
    ///
    /// ## Rules
    /// - 1..=100 lines, each valid per [`validate_lines`]
    /// - `customerId` is a UUID when present
    /// - `couponCode` and `manualDiscount` are mutually exclusive
    /// - `amountTendered` and `manualDiscount` are non-negative
    /// - cash payments carry no external reference
    pub fn validate(self) -> Result<ValidatedOrder, RequestRejected> {
        let lines = validate_lines(&self.items)?;

        if let Some(customer_id) = &self.customer_id {
            validate_uuid("customerId", customer_id).map_err(RequestRejected::order)?;
        }

        let agent_id = validate_optional_text("agentId", self.agent_id.as_deref(), 64)
            .map_err(RequestRejected::order)?;

        let discount = discount_source(self.coupon_code.as_deref(), self.manual_discount)?;

        if let Some(tendered) = self.amount_tendered {
            validate_amount_cents("amountTendered", tendered.cents()).map_err(RequestRejected::order)?;
        }

        let payment_reference = match self.payment_method {
            PaymentMethod::Cash => None,
            _ => validate_optional_text("paymentReference", self.payment_reference.as_deref(), 128)
                .map_err(RequestRejected::order)?,
        };

        let notes = validate_optional_text("notes", self.notes.as_deref(), 1000)
            .map_err(RequestRejected::order)?;

        Ok(ValidatedOrder {
            lines,
            customer_id: self.customer_id,
            agent_id,
            discount,
            payment_method: self.payment_method,
            amount_tendered: self.amount_tendered,
            payment_reference,
            notes,
        })
    }
}

impl QuoteRequest {
    pub fn validate(self) -> Result<ValidatedQuote, RequestRejected> {
        let lines = validate_lines(&self.items)?;
        let discount = discount_source(self.coupon_code.as_deref(), self.manual_discount)?;
        Ok(ValidatedQuote { lines, discount })
    }
}

/// Validates request lines.
///
/// ## Rules
/// - non-empty, at most `MAX_CART_ITEMS`
/// - `productId` is a UUID, quantity 1..=999
/// - a requested serial number forces quantity 1 and may appear only once
/// - a price override is non-negative
pub fn validate_lines(items: &[OrderLineRequest]) -> Result<Vec<ValidatedLine>, RequestRejected> {
    if items.is_empty() {
        return Err(RequestRejected::order(ValidationError::EmptyCart));
    }

    if items.len() > MAX_CART_ITEMS {
        return Err(RequestRejected::order(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        }));
    }

    let mut seen_serials = HashSet::new();
    let mut lines = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let reject = |e| RequestRejected::line(index, e);

        validate_uuid("productId", &item.product_id).map_err(reject)?;
        validate_quantity(item.quantity).map_err(reject)?;

        let serial_number = match item.serial_number.as_deref() {
            Some(raw) => {
                let serial = validate_serial_number(raw).map_err(reject)?;
                if item.quantity != 1 {
                    return Err(reject(ValidationError::OutOfRange {
                        field: "quantity".to_string(),
                        min: 1,
                        max: 1,
                    }));
                }
                if !seen_serials.insert(serial.clone()) {
                    return Err(reject(ValidationError::Duplicate {
                        field: "serialNumber".to_string(),
                        value: serial,
                    }));
                }
                Some(serial)
            }
            None => None,
        };

        if let Some(price) = item.unit_price_override {
            validate_amount_cents("unitPriceOverride", price.cents()).map_err(reject)?;
        }

        lines.push(ValidatedLine {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            serial_number,
            unit_price_override: item.unit_price_override,
        });
    }

    Ok(lines)
}

fn discount_source(coupon_code: Option<&str>, manual: Option<Money>) -> Result<DiscountSource, RequestRejected> {
    match (coupon_code, manual) {
        (Some(_), Some(_)) => Err(RequestRejected::order(ValidationError::Conflicting {
            first: "couponCode".to_string(),
            second: "manualDiscount".to_string(),
        })),
        (Some(code), None) => normalize_coupon_code(code)
            .map(DiscountSource::Coupon)
            .map_err(RequestRejected::order),
        (None, Some(amount)) => {
            validate_amount_cents("manualDiscount", amount.cents()).map_err(RequestRejected::order)?;
            Ok(DiscountSource::Manual(amount))
        }
        (None, None) => Ok(DiscountSource::None),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
