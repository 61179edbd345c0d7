//! # Product Repository
//!
//! Catalog reads and writes: products and categories.
//!
//! Stock quantity is never written here; every stock change goes through
//! [`super::stock`] so it lands in the ledger.
//!
//! ## Lookup
//! ```text
//! cashier types "a15"
//!      │
//!      ▼
//! search(): active products where name/sku LIKE %a15%  or barcode = a15
//!      │
//!      ▼
//! [PHN-A15 Galaxy A15 ...]   ordered by name
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use meridian_core::{Category, Product};

pub(crate) const PRODUCT_COLUMNS: &str = "id, sku, barcode, name, category_id, price_cents, \
     cost_cents, stock_quantity, low_stock_threshold, warranty_months, is_serialized, \
     is_active, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Searches active products by name, SKU or exact barcode.
    ///
    /// An empty query lists active products by name.
    pub async fn search(&self, query: &str, limit: i64) -> DbResult<Vec<Product>> {
        let query = query.trim();

        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            return self.list_active(limit).await;
        }

        let pattern = format!("%{}%", escape_like(query));

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 \
               AND (name LIKE ?1 ESCAPE '\\' OR sku LIKE ?1 ESCAPE '\\' OR barcode = ?2) \
             ORDER BY name \
             LIMIT ?3"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(&pattern)
            .bind(query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    async fn list_active(&self, limit: i64) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Gets a product by id, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        find_by_id(&self.pool, id).await
    }

    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1");

        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Active products at or below their low-stock threshold, emptiest first.
    pub async fn low_stock(&self, limit: i64) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND stock_quantity <= low_stock_threshold \
             ORDER BY stock_quantity, name \
             LIMIT ?1"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// Serialized products must start at zero stock; their units arrive
    /// through serial intake.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU or barcode already exists
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(sku = %product.sku, "Inserting product");

        if product.is_serialized && product.stock_quantity != 0 {
            return Err(DbError::QueryFailed(
                "serialized products start with zero stock".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, barcode, name, category_id,
                price_cents, cost_cents, stock_quantity, low_stock_threshold,
                warranty_months, is_serialized, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.category_id)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.stock_quantity)
        .bind(product.low_stock_threshold)
        .bind(product.warranty_months)
        .bind(product.is_serialized)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Counts active products (for diagnostics and the seed binary).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Categories
    // -------------------------------------------------------------------------

    pub async fn insert_category(&self, name: &str) -> DbResult<Category> {
        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO categories (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&category.id)
            .bind(&category.name)
            .bind(category.created_at)
            .execute(&self.pool)
            .await?;

        Ok(category)
    }

    pub async fn list_categories(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, created_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }
}

// =============================================================================
// Executor-generic helpers
// =============================================================================

/// Loads a product on any executor (pool or open transaction).
pub async fn find_by_id(exec: impl SqliteExecutor<'_>, id: &str) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");

    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(product)
}

/// Stamps `updated_at` inside the caller's transaction. Returns `false`
/// when the product does not exist.
///
/// Read-then-write transactions call this first so they hold SQLite's write
/// lock before their first read.
pub async fn touch(conn: &mut SqliteConnection, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
    let result = sqlx::query("UPDATE products SET updated_at = ?2 WHERE id = ?1")
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Writes a new price (and optionally cost) inside the caller's transaction.
pub async fn set_price(
    conn: &mut SqliteConnection,
    id: &str,
    price_cents: i64,
    cost_cents: Option<i64>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET price_cents = ?2,
            cost_cents = COALESCE(?3, cost_cents),
            updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(price_cents)
    .bind(cost_cents)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", id));
    }

    Ok(())
}

/// Escapes LIKE wildcards so user input matches literally.
pub(crate) fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Generates a new product id.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}
