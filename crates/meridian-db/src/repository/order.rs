//! # Order Repository
//!
//! Orders, their items and their payment.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. CHECKOUT (one transaction, see checkout.rs)                         │
//! │     └── insert_order() → insert_item() × n → insert_payment()           │
//! │                                                                         │
//! │  2. TRANSITIONS                                                         │
//! │     └── transition() → UPDATE ... WHERE id = ? AND status = <from>      │
//! │         0 rows → OrderNotFound or InvalidOrderStatus                    │
//! │     └── set_payment_status()                                            │
//! │                                                                         │
//! │  3. RECEIPT                                                             │
//! │     └── load_receipt() → order + items + payment                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Orders are never deleted; cancelled and returned orders keep their rows.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult, ServiceResult};
use meridian_core::{CoreError, Order, OrderItem, OrderReceipt, OrderStatus, Payment, PaymentStatus};

const ORDER_COLUMNS: &str = "id, order_number, status, subtotal_cents, discount_cents, tax_cents, \
     total_cents, discount_id, customer_id, agent_id, notes, created_at, updated_at, completed_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, name_snapshot, sku_snapshot, quantity, \
     unit_price_cents, unit_cost_cents, line_total_cents, serial_number, warranty_expires_at, \
     price_overridden, created_at";

const PAYMENT_COLUMNS: &str = "id, order_id, method, status, amount_cents, tendered_cents, \
     change_cents, reference, created_at, updated_at";

/// Read access to orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        find_order(&self.pool, id).await
    }

    /// Loads the receipt view of an order.
    pub async fn get_receipt(&self, id: &str) -> DbResult<Option<OrderReceipt>> {
        let mut conn = self.pool.acquire().await?;
        load_receipt(&mut conn, id).await
    }

    /// Loads the receipt view by the human-readable order number.
    pub async fn get_receipt_by_number(&self, order_number: &str) -> DbResult<Option<OrderReceipt>> {
        let mut conn = self.pool.acquire().await?;

        let id: Option<String> = sqlx::query_scalar("SELECT id FROM orders WHERE order_number = ?1")
            .bind(order_number)
            .fetch_optional(&mut *conn)
            .await?;

        match id {
            Some(id) => load_receipt(&mut conn, &id).await,
            None => Ok(None),
        }
    }

    /// Most recent orders first.
    pub async fn list_recent(&self, limit: i64) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        );

        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

pub async fn find_order(exec: impl SqliteExecutor<'_>, id: &str) -> DbResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");

    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(order)
}

/// Loads order, items (in insertion order) and payment.
pub async fn load_receipt(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<OrderReceipt>> {
    let Some(order) = find_order(&mut *conn, id).await? else {
        return Ok(None);
    };

    let items_sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY rowid");
    let items = sqlx::query_as::<_, OrderItem>(&items_sql)
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

    let payment_sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = ?1");
    let payment = sqlx::query_as::<_, Payment>(&payment_sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::Internal(format!("order {id} has no payment")))?;

    Ok(Some(OrderReceipt { order, items, payment }))
}

/// Inserts the order row.
///
/// ## Returns
/// * `Err(DbError::UniqueViolation { field: "orders.order_number", .. })` -
///   the order number is taken; the caller regenerates and retries
pub async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(id = %order.id, order_number = %order.order_number, "Inserting order");

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_number, status,
            subtotal_cents, discount_cents, tax_cents, total_cents,
            discount_id, customer_id, agent_id, notes,
            created_at, updated_at, completed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&order.id)
    .bind(&order.order_number)
    .bind(order.status)
    .bind(order.subtotal_cents)
    .bind(order.discount_cents)
    .bind(order.tax_cents)
    .bind(order.total_cents)
    .bind(&order.discount_id)
    .bind(&order.customer_id)
    .bind(&order.agent_id)
    .bind(&order.notes)
    .bind(order.created_at)
    .bind(order.updated_at)
    .bind(order.completed_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, product_id, name_snapshot, sku_snapshot,
            quantity, unit_price_cents, unit_cost_cents, line_total_cents,
            serial_number, warranty_expires_at, price_overridden, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.product_id)
    .bind(&item.name_snapshot)
    .bind(&item.sku_snapshot)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.unit_cost_cents)
    .bind(item.line_total_cents)
    .bind(&item.serial_number)
    .bind(item.warranty_expires_at)
    .bind(item.price_overridden)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    debug!(order_id = %payment.order_id, amount = payment.amount_cents, "Recording payment");

    sqlx::query(
        r#"
        INSERT INTO payments (
            id, order_id, method, status,
            amount_cents, tendered_cents, change_cents,
            reference, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.order_id)
    .bind(payment.method)
    .bind(payment.status)
    .bind(payment.amount_cents)
    .bind(payment.tendered_cents)
    .bind(payment.change_cents)
    .bind(&payment.reference)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Moves an order from `from` to `to`.
///
/// `completed_at` is stamped when the target is COMPLETED. `operation` names
/// the attempted transition in the error.
pub async fn transition(
    conn: &mut SqliteConnection,
    order_id: &str,
    from: OrderStatus,
    to: OrderStatus,
    operation: &str,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = ?3,
            updated_at = ?4,
            completed_at = CASE WHEN ?3 = 'COMPLETED' THEN ?4 ELSE completed_at END
        WHERE id = ?1 AND status = ?2
        "#,
    )
    .bind(order_id)
    .bind(from)
    .bind(to)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    let current: Option<OrderStatus> = sqlx::query_scalar("SELECT status FROM orders WHERE id = ?1")
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;

    Err(match current {
        None => CoreError::OrderNotFound(order_id.to_string()),
        Some(current) => CoreError::InvalidOrderStatus {
            order_id: order_id.to_string(),
            current_status: current.to_string(),
            operation: operation.to_string(),
        },
    }
    .into())
}

/// Updates the order's payment. A `None` reference keeps the stored one.
pub async fn set_payment_status(
    conn: &mut SqliteConnection,
    order_id: &str,
    status: PaymentStatus,
    reference: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE payments
        SET status = ?2, reference = COALESCE(?3, reference), updated_at = ?4
        WHERE order_id = ?1
        "#,
    )
    .bind(order_id)
    .bind(status)
    .bind(reference)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Payment", order_id));
    }

    Ok(())
}

/// `(product_id, quantity)` for each item of an order, for restocking.
pub async fn item_quantities(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT product_id, quantity FROM order_items WHERE order_id = ?1 ORDER BY rowid")
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;

    Ok(rows)
}
