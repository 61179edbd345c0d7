//! # Tax Configuration Repository
//!
//! ## Single Active Config
//! ```text
//! activate(id)                         one transaction
//!   │
//!   ├── UPDATE tax_configs SET is_active = 0 WHERE is_active = 1 AND id <> ?
//!   └── UPDATE tax_configs SET is_active = 1 WHERE id = ?
//!
//! idx_tax_configs_single_active (partial unique index) backs this up.
//! ```
//!
//! The active config is read at resolution time on every checkout, never
//! cached.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use meridian_core::TaxConfig;

const TAX_COLUMNS: &str = "id, name, rate_bps, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct TaxConfigRepository {
    pool: SqlitePool,
}

impl TaxConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TaxConfigRepository { pool }
    }

    pub async fn active(&self) -> DbResult<Option<TaxConfig>> {
        find_active(&self.pool).await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<TaxConfig>> {
        find_by_id(&self.pool, id).await
    }

    /// Active config first, then by name.
    pub async fn list(&self) -> DbResult<Vec<TaxConfig>> {
        let sql = format!("SELECT {TAX_COLUMNS} FROM tax_configs ORDER BY is_active DESC, name");

        let configs = sqlx::query_as::<_, TaxConfig>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(configs)
    }

    /// Inserts a config as given. Services create them inactive.
    pub async fn insert(&self, config: &TaxConfig) -> DbResult<()> {
        debug!(name = %config.name, rate_bps = config.rate_bps, "Inserting tax config");

        sqlx::query(
            r#"
            INSERT INTO tax_configs (id, name, rate_bps, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&config.id)
        .bind(&config.name)
        .bind(config.rate_bps)
        .bind(config.is_active)
        .bind(config.created_at)
        .bind(config.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// The active config. Should several ever be active, the most recently
/// updated one wins.
pub async fn find_active(exec: impl SqliteExecutor<'_>) -> DbResult<Option<TaxConfig>> {
    let sql = format!(
        "SELECT {TAX_COLUMNS} FROM tax_configs WHERE is_active = 1 \
         ORDER BY updated_at DESC, rowid DESC LIMIT 1"
    );

    let config = sqlx::query_as::<_, TaxConfig>(&sql)
        .fetch_optional(exec)
        .await?;

    Ok(config)
}

pub async fn find_by_id(exec: impl SqliteExecutor<'_>, id: &str) -> DbResult<Option<TaxConfig>> {
    let sql = format!("SELECT {TAX_COLUMNS} FROM tax_configs WHERE id = ?1");

    let config = sqlx::query_as::<_, TaxConfig>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(config)
}

/// Stamps `updated_at` inside the caller's transaction so it holds the
/// write lock. Returns `false` when the config does not exist.
pub async fn touch(conn: &mut SqliteConnection, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
    let result = sqlx::query("UPDATE tax_configs SET updated_at = ?2 WHERE id = ?1")
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Makes `id` the only active config, inside the caller's transaction.
///
/// Deactivates the others first so the partial unique index never sees two
/// active rows.
pub async fn activate(conn: &mut SqliteConnection, id: &str, now: DateTime<Utc>) -> DbResult<()> {
    sqlx::query("UPDATE tax_configs SET is_active = 0, updated_at = ?2 WHERE is_active = 1 AND id <> ?1")
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    let result = sqlx::query("UPDATE tax_configs SET is_active = 1, updated_at = ?2 WHERE id = ?1")
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("TaxConfig", id));
    }

    Ok(())
}
