//! # Discount Repository
//!
//! Coupons and promotions. Codes are stored upper-case, so lookups take an
//! already-normalized code (see `meridian_core::validation::normalize_coupon_code`).

use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use meridian_core::Discount;

const DISCOUNT_COLUMNS: &str = "id, code, name, discount_type, value, min_purchase_cents, \
     max_discount_cents, starts_at, ends_at, is_active, created_at";

#[derive(Debug, Clone)]
pub struct DiscountRepository {
    pool: SqlitePool,
}

impl DiscountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Discount>> {
        let sql = format!("SELECT {DISCOUNT_COLUMNS} FROM discounts WHERE id = ?1");

        let discount = sqlx::query_as::<_, Discount>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(discount)
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Discount>> {
        find_by_code(&self.pool, code).await
    }

    /// All discounts, newest first.
    pub async fn list(&self, limit: i64) -> DbResult<Vec<Discount>> {
        let sql = format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discounts ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        );

        let discounts = sqlx::query_as::<_, Discount>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(discounts)
    }

    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - the code is already in use
    pub async fn insert(&self, discount: &Discount) -> DbResult<()> {
        debug!(code = ?discount.code, "Inserting discount");

        sqlx::query(
            r#"
            INSERT INTO discounts (
                id, code, name, discount_type, value,
                min_purchase_cents, max_discount_cents,
                starts_at, ends_at, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&discount.id)
        .bind(&discount.code)
        .bind(&discount.name)
        .bind(discount.discount_type)
        .bind(discount.value)
        .bind(discount.min_purchase_cents)
        .bind(discount.max_discount_cents)
        .bind(discount.starts_at)
        .bind(discount.ends_at)
        .bind(discount.is_active)
        .bind(discount.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Looks up a discount by normalized code on any executor.
pub async fn find_by_code(exec: impl SqliteExecutor<'_>, code: &str) -> DbResult<Option<Discount>> {
    let sql = format!("SELECT {DISCOUNT_COLUMNS} FROM discounts WHERE code = ?1");

    let discount = sqlx::query_as::<_, Discount>(&sql)
        .bind(code)
        .fetch_optional(exec)
        .await?;

    Ok(discount)
}
