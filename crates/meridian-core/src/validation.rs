//! # Validation Module
//!
//! Field-level input validation for Meridian POS.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP boundary (axum + serde)                                 │
//! │  ├── Unknown fields rejected (deny_unknown_fields)                     │
//! │  └── Enum payment methods, integer money                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Ids, quantities, prices, codes, serials                           │
//! │  └── Runs before any transaction begins                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock_quantity >= 0)                                       │
//! │  ├── UNIQUE (sku, order_number, serial_number, code)                   │
//! │  └── Foreign keys                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use meridian_core::validation::{normalize_coupon_code, validate_quantity};
//!
//! validate_quantity(2).unwrap();
//! assert_eq!(normalize_coupon_code("  save10 ").unwrap(), "SAVE10");
//! ```

use crate::error::ValidationError;
use crate::types::{DiscountType, TaxRate};
use crate::{MAX_AMOUNT_CENTS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Default page size for list endpoints.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Largest page a list endpoint will return.
pub const MAX_LIST_LIMIT: i64 = 500;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - 1 to 50 characters after trimming
/// - Letters, digits, hyphens and underscores only
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, customer, discount, tax config).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates free text such as notes or an adjustment reason.
///
/// Returns the trimmed text, or `None` when it was blank.
pub fn validate_optional_text(field: &str, text: Option<&str>, max: usize) -> ValidationResult<Option<String>> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    if text.len() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(Some(text.to_string()))
}

/// Validates a reason that must be present (cancel, return, adjustment).
pub fn validate_reason(reason: &str) -> ValidationResult<String> {
    validate_optional_text("reason", Some(reason), 500)?.ok_or_else(|| ValidationError::Required {
        field: "reason".to_string(),
    })
}

/// Validates a search query.
///
/// Empty is allowed (returns the default listing). Returns the trimmed query.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "q".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Normalizes a coupon code: trimmed and upper-cased.
///
/// ## Rules
/// - 1 to 32 characters after trimming
/// - Letters, digits and hyphens only
pub fn normalize_coupon_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "couponCode".to_string(),
        });
    }

    if code.len() > 32 {
        return Err(ValidationError::TooLong {
            field: "couponCode".to_string(),
            max: 32,
        });
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: "couponCode".to_string(),
            reason: "must contain only letters, numbers, and hyphens".to_string(),
        });
    }

    Ok(code.to_ascii_uppercase())
}

/// Validates a serial number and returns it trimmed.
pub fn validate_serial_number(serial: &str) -> ValidationResult<String> {
    let serial = serial.trim();

    if serial.is_empty() {
        return Err(ValidationError::Required {
            field: "serialNumber".to_string(),
        });
    }

    if serial.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "serialNumber".to_string(),
            max: 64,
        });
    }

    if serial.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "serialNumber".to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(serial.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity: 1..=999.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an amount in minor units: `0..=MAX_AMOUNT_CENTS`.
pub fn validate_amount_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_AMOUNT_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points: 0..=10000.
pub fn validate_tax_rate_bps(bps: i64) -> ValidationResult<()> {
    if !(0..=TaxRate::MAX_BPS as i64).contains(&bps) {
        return Err(ValidationError::OutOfRange {
            field: "rateBps".to_string(),
            min: 0,
            max: TaxRate::MAX_BPS as i64,
        });
    }

    Ok(())
}

/// Validates a discount value against its type.
///
/// PERCENTAGE takes a whole percent 0..=100; FIXED takes a positive amount.
pub fn validate_discount_value(discount_type: DiscountType, value: i64) -> ValidationResult<()> {
    match discount_type {
        DiscountType::Percentage if !(0..=100).contains(&value) => {
            Err(ValidationError::OutOfRange {
                field: "value".to_string(),
                min: 0,
                max: 100,
            })
        }
        DiscountType::Fixed if value <= 0 => Err(ValidationError::MustBePositive {
            field: "value".to_string(),
        }),
        _ => Ok(()),
    }
}

/// Validates a manual stock adjustment delta. Zero is meaningless.
pub fn validate_stock_delta(delta: i64) -> ValidationResult<()> {
    if delta == 0 || delta.abs() > 100_000 {
        return Err(ValidationError::OutOfRange {
            field: "delta".to_string(),
            min: -100_000,
            max: 100_000,
        });
    }

    Ok(())
}

/// Resolves an optional `limit` query parameter to 1..=MAX_LIST_LIMIT.
pub fn resolve_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT)
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates that `id` is a well-formed UUID.
///
/// ```rust
/// use meridian_core::validation::validate_uuid;
///
/// assert!(validate_uuid("productId", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("productId", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
