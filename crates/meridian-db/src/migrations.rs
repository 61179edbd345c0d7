//! # Database Migrations
//!
//! Embedded SQL migrations for Meridian POS.
//!
//! ```text
//! startup ──► _sqlx_migrations present? ──► compare embedded vs applied
//!                                                  │
//!                     001_initial_schema.sql ✓ ────┤
//!                     002_next_change.sql    ⬜ ────┴──► run pending, record
//! ```
//!
//! ## Adding New Migrations
//! 1. Add `migrations/sqlite/NNN_description.sql` with the next number
//! 2. **Never** edit an applied migration; add a new one instead

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded migrations from the workspace `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns `(total, applied)` migration counts for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;

    Ok((total, applied as usize))
}
