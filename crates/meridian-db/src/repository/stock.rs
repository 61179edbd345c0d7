//! # Stock Repository
//!
//! Every change to `products.stock_quantity` happens in this file, always
//! together with a `stock_movements` ledger row.
//!
//! ## Reservation (checkout)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reserve(conn, product, qty, serial?)        inside the checkout tx     │
//! │                                                                         │
//! │  1. UPDATE products SET stock_quantity = stock_quantity - qty           │
//! │     WHERE id = ? AND is_active = 1 AND stock_quantity >= qty            │
//! │        │                                                                │
//! │        ├── 0 rows ─► SELECT to classify:                                │
//! │        │             missing → ProductNotFound                          │
//! │        │             inactive → ProductInactive                         │
//! │        │             else → InsufficientStock { available, requested }  │
//! │        ▼                                                                │
//! │  2. serialized?                                                         │
//! │        ├── serial requested → mark that unit SOLD (or SerialNotAvail.)  │
//! │        └── none requested  → mark the oldest `qty` AVAILABLE units SOLD │
//! │        ▼                                                                │
//! │  3. INSERT stock_movements (OUT, -qty, "SALE", order_id)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The conditional decrement is the first statement of each reservation, so
//! the transaction takes SQLite's write lock before it reads anything and
//! two checkouts racing for the last unit cannot both see it.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceResult};
use crate::repository::product;
use meridian_core::{CoreError, MovementType, Product, SerialStatus, SerialUnit, StockMovement};

/// Outcome of a successful reservation.
#[derive(Debug, Clone)]
pub struct Reservation {
    /// The product after the decrement.
    pub product: Product,
    /// Serial numbers allocated to this line, oldest first. Empty for
    /// non-serialized products.
    pub serials: Vec<String>,
}

/// Who and why, for ledger rows.
#[derive(Debug, Clone, Copy)]
pub struct MovementContext<'a> {
    pub reason: &'a str,
    pub order_id: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub at: DateTime<Utc>,
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Reserves `quantity` units of a product for an order.
///
/// Must run inside the caller's transaction; the caller rolls back on error.
pub async fn reserve(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    serial_number: Option<&str>,
    ctx: MovementContext<'_>,
) -> ServiceResult<Reservation> {
    debug!(product_id = %product_id, quantity, serial = ?serial_number, "Reserving stock");

    let updated = sqlx::query(
        r#"
        UPDATE products
        SET stock_quantity = stock_quantity - ?2,
            updated_at = ?3
        WHERE id = ?1 AND is_active = 1 AND stock_quantity >= ?2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(ctx.at)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(classify_failed_reservation(conn, product_id, quantity).await?.into());
    }

    let product = product::find_by_id(&mut *conn, product_id)
        .await?
        .ok_or_else(|| DbError::not_found("Product", product_id))?;

    let serials = match (product.is_serialized, serial_number) {
        (_, Some(serial)) => {
            claim_serial(conn, product_id, serial, ctx).await?;
            vec![serial.to_string()]
        }
        (true, None) => claim_oldest_serials(conn, &product, quantity, ctx).await?,
        (false, None) => Vec::new(),
    };

    insert_movement(conn, product_id, MovementType::Out, -quantity, ctx).await?;

    Ok(Reservation { product, serials })
}

/// Works out why the conditional decrement matched no row.
async fn classify_failed_reservation(
    conn: &mut SqliteConnection,
    product_id: &str,
    requested: i64,
) -> DbResult<CoreError> {
    let row: Option<(String, bool, i64)> =
        sqlx::query_as("SELECT sku, is_active, stock_quantity FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(match row {
        None => CoreError::ProductNotFound(product_id.to_string()),
        Some((sku, false, _)) => CoreError::ProductInactive(sku),
        Some((sku, true, available)) => CoreError::InsufficientStock {
            sku,
            available,
            requested,
        },
    })
}

/// Marks one requested serial unit SOLD.
///
/// Fails with `SerialNotAvailable` if the serial is unknown, belongs to
/// another product, or is already sold.
async fn claim_serial(
    conn: &mut SqliteConnection,
    product_id: &str,
    serial_number: &str,
    ctx: MovementContext<'_>,
) -> ServiceResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE serial_units
        SET status = ?4, order_id = ?3, updated_at = ?5
        WHERE serial_number = ?1 AND product_id = ?2 AND status = ?6
        "#,
    )
    .bind(serial_number)
    .bind(product_id)
    .bind(ctx.order_id)
    .bind(SerialStatus::Sold)
    .bind(ctx.at)
    .bind(SerialStatus::Available)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::SerialNotAvailable {
            serial: serial_number.to_string(),
        }
        .into());
    }

    Ok(())
}

/// Allocates the oldest `quantity` AVAILABLE units of a serialized product.
async fn claim_oldest_serials(
    conn: &mut SqliteConnection,
    product: &Product,
    quantity: i64,
    ctx: MovementContext<'_>,
) -> ServiceResult<Vec<String>> {
    let units: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT id, serial_number FROM serial_units
        WHERE product_id = ?1 AND status = ?2
        ORDER BY created_at, rowid
        LIMIT ?3
        "#,
    )
    .bind(&product.id)
    .bind(SerialStatus::Available)
    .bind(quantity)
    .fetch_all(&mut *conn)
    .await?;

    // stock_quantity and the unit count disagree; refuse rather than sell
    // units that cannot be identified
    if (units.len() as i64) < quantity {
        return Err(CoreError::InsufficientStock {
            sku: product.sku.clone(),
            available: units.len() as i64,
            requested: quantity,
        }
        .into());
    }

    let mut serials = Vec::with_capacity(units.len());
    for (id, serial_number) in units {
        sqlx::query("UPDATE serial_units SET status = ?2, order_id = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(&id)
            .bind(SerialStatus::Sold)
            .bind(ctx.order_id)
            .bind(ctx.at)
            .execute(&mut *conn)
            .await?;
        serials.push(serial_number);
    }

    Ok(serials)
}

/// Puts an order's units back on the shelf (cancel / return).
///
/// `lines` are `(product_id, quantity)` pairs, one per order item. Serial
/// units tied to the order become AVAILABLE again.
pub async fn restock(
    conn: &mut SqliteConnection,
    lines: &[(String, i64)],
    ctx: MovementContext<'_>,
) -> DbResult<()> {
    for (product_id, quantity) in lines {
        debug!(product_id = %product_id, quantity, reason = ctx.reason, "Restocking");

        sqlx::query(
            "UPDATE products SET stock_quantity = stock_quantity + ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(product_id)
        .bind(quantity)
        .bind(ctx.at)
        .execute(&mut *conn)
        .await?;

        insert_movement(conn, product_id, MovementType::In, *quantity, ctx).await?;
    }

    if let Some(order_id) = ctx.order_id {
        sqlx::query(
            "UPDATE serial_units SET status = ?2, order_id = NULL, updated_at = ?3 WHERE order_id = ?1",
        )
        .bind(order_id)
        .bind(SerialStatus::Available)
        .bind(ctx.at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Applies a manual adjustment and returns `(old, new)` stock.
///
/// Refused for serialized products (units come and go individually) and
/// when the result would be negative.
pub async fn adjust(
    conn: &mut SqliteConnection,
    product_id: &str,
    delta: i64,
    ctx: MovementContext<'_>,
) -> ServiceResult<(i64, i64)> {
    // Write first so the transaction holds the lock before it reads
    let updated = sqlx::query(
        r#"
        UPDATE products
        SET stock_quantity = stock_quantity + ?2,
            updated_at = ?3
        WHERE id = ?1 AND is_serialized = 0 AND stock_quantity + ?2 >= 0
        "#,
    )
    .bind(product_id)
    .bind(delta)
    .bind(ctx.at)
    .execute(&mut *conn)
    .await?;

    let product = product::find_by_id(&mut *conn, product_id)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

    if updated.rows_affected() == 0 {
        if product.is_serialized {
            return Err(meridian_core::ValidationError::InvalidFormat {
                field: "delta".to_string(),
                reason: "serialized stock changes through serial intake or sales".to_string(),
            }
            .into());
        }
        return Err(CoreError::InsufficientStock {
            sku: product.sku,
            available: product.stock_quantity,
            requested: -delta,
        }
        .into());
    }

    insert_movement(conn, product_id, MovementType::Adjustment, delta, ctx).await?;

    Ok((product.stock_quantity - delta, product.stock_quantity))
}

/// Adds AVAILABLE serial units and raises stock by their count.
pub async fn receive_serials(
    conn: &mut SqliteConnection,
    product_id: &str,
    serial_numbers: &[String],
    ctx: MovementContext<'_>,
) -> ServiceResult<Vec<SerialUnit>> {
    let count = serial_numbers.len() as i64;

    let updated = sqlx::query(
        "UPDATE products SET stock_quantity = stock_quantity + ?2, updated_at = ?3 \
         WHERE id = ?1 AND is_serialized = 1",
    )
    .bind(product_id)
    .bind(count)
    .bind(ctx.at)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return match product::find_by_id(&mut *conn, product_id).await? {
            None => Err(CoreError::ProductNotFound(product_id.to_string()).into()),
            Some(p) => Err(meridian_core::ValidationError::InvalidFormat {
                field: "productId".to_string(),
                reason: format!("{} is not a serialized product", p.sku),
            }
            .into()),
        };
    }

    let mut units = Vec::with_capacity(serial_numbers.len());
    for serial_number in serial_numbers {
        let unit = SerialUnit {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            serial_number: serial_number.clone(),
            status: SerialStatus::Available,
            order_id: None,
            created_at: ctx.at,
            updated_at: ctx.at,
        };

        sqlx::query(
            r#"
            INSERT INTO serial_units (id, product_id, serial_number, status, order_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)
            "#,
        )
        .bind(&unit.id)
        .bind(&unit.product_id)
        .bind(&unit.serial_number)
        .bind(unit.status)
        .bind(unit.created_at)
        .bind(unit.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(DbError::from)
        .map_err(|e| match e {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: serial_number.clone(),
            },
            other => other,
        })?;

        units.push(unit);
    }

    insert_movement(conn, product_id, MovementType::In, count, ctx).await?;

    Ok(units)
}

/// Appends a ledger row.
async fn insert_movement(
    conn: &mut SqliteConnection,
    product_id: &str,
    movement_type: MovementType,
    quantity: i64,
    ctx: MovementContext<'_>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (id, product_id, movement_type, quantity, reason, order_id, user_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(product_id)
    .bind(movement_type)
    .bind(quantity)
    .bind(ctx.reason)
    .bind(ctx.order_id)
    .bind(ctx.user_id)
    .bind(ctx.at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Read-side repository
// =============================================================================

/// Ledger and serial unit lookups.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Ledger rows for a product, newest first.
    pub async fn movements_for_product(&self, product_id: &str, limit: i64) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, movement_type, quantity, reason, order_id, user_id, created_at
            FROM stock_movements
            WHERE product_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Ledger rows written for an order, oldest first.
    pub async fn movements_for_order(&self, order_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, movement_type, quantity, reason, order_id, user_id, created_at
            FROM stock_movements
            WHERE order_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    pub async fn serials_for_product(&self, product_id: &str) -> DbResult<Vec<SerialUnit>> {
        let units = sqlx::query_as::<_, SerialUnit>(
            r#"
            SELECT id, product_id, serial_number, status, order_id, created_at, updated_at
            FROM serial_units
            WHERE product_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(units)
    }

    pub async fn get_serial(&self, serial_number: &str) -> DbResult<Option<SerialUnit>> {
        let unit = sqlx::query_as::<_, SerialUnit>(
            r#"
            SELECT id, product_id, serial_number, status, order_id, created_at, updated_at
            FROM serial_units
            WHERE serial_number = ?1
            "#,
        )
        .bind(serial_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(unit)
    }

    pub async fn available_serial_count(&self, product_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM serial_units WHERE product_id = ?1 AND status = ?2",
        )
        .bind(product_id)
        .bind(SerialStatus::Available)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
