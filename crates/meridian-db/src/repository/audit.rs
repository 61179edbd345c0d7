//! # Audit Log Repository
//!
//! Append and list. There is no update or delete here, and triggers in the
//! schema reject both.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use meridian_core::AuditLog;

#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: SqlitePool,
}

/// Filter for [`AuditLogRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

impl AuditLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AuditLogRepository { pool }
    }

    pub async fn insert(&self, log: &AuditLog) -> DbResult<()> {
        debug!(action = ?log.action, entity_id = %log.entity_id, "Appending audit log");

        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, action, entity_type, entity_id, user_id,
                old_value, new_value, reason, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&log.id)
        .bind(log.action)
        .bind(&log.entity_type)
        .bind(&log.entity_id)
        .bind(&log.user_id)
        .bind(&log.old_value)
        .bind(&log.new_value)
        .bind(&log.reason)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Entries newest first, optionally narrowed to one entity type or id.
    pub async fn list(&self, filter: &AuditFilter, limit: i64) -> DbResult<Vec<AuditLog>> {
        let logs = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, action, entity_type, entity_id, user_id,
                   old_value, new_value, reason, created_at
            FROM audit_logs
            WHERE (?1 IS NULL OR entity_type = ?1)
              AND (?2 IS NULL OR entity_id = ?2)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3
            "#,
        )
        .bind(&filter.entity_type)
        .bind(&filter.entity_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_db;
    use chrono::{Duration, Utc};
    use meridian_core::{entity, AuditAction};

    fn log(action: AuditAction, entity_type: &str, entity_id: &str, offset_secs: i64) -> AuditLog {
        AuditLog {
            id: uuid::Uuid::new_v4().to_string(),
            action,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            user_id: Some("manager-1".to_string()),
            old_value: None,
            new_value: Some("{}".to_string()),
            reason: None,
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[tokio::test]
    async fn test_list_newest_first_and_filtered() {
        let db = test_db().await;
        let repo = db.audit_logs();

        repo.insert(&log(AuditAction::PriceChange, entity::PRODUCT, "p1", 0)).await.unwrap();
        repo.insert(&log(AuditAction::StockAdjust, entity::PRODUCT, "p1", 1)).await.unwrap();
        repo.insert(&log(AuditAction::OrderCancel, entity::ORDER, "o1", 2)).await.unwrap();

        let all = repo.list(&AuditFilter::default(), 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].action, AuditAction::OrderCancel);

        let product_only = repo
            .list(
                &AuditFilter {
                    entity_type: Some(entity::PRODUCT.to_string()),
                    entity_id: Some("p1".to_string()),
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(product_only.len(), 2);
        assert_eq!(product_only[0].action, AuditAction::StockAdjust);
    }

    #[tokio::test]
    async fn test_audit_rows_are_write_once() {
        let db = test_db().await;
        db.audit_logs()
            .insert(&log(AuditAction::PriceChange, entity::PRODUCT, "p1", 0))
            .await
            .unwrap();

        let result = sqlx::query("DELETE FROM audit_logs").execute(db.pool()).await;
        assert!(result.is_err());
    }
}
