//! # Customer Repository
//!
//! Lookup only from the checkout's point of view; `insert` exists for the
//! seed binary and tests.

use sqlx::{SqliteExecutor, SqlitePool};

use crate::error::DbResult;
use crate::repository::product::escape_like;
use meridian_core::Customer;

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Customers whose name, phone or email contains `query`, by name.
    pub async fn search(&self, query: &str, limit: i64) -> DbResult<Vec<Customer>> {
        let pattern = format!("%{}%", escape_like(query.trim()));

        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, phone, email, created_at
            FROM customers
            WHERE name LIKE ?1 ESCAPE '\'
               OR phone LIKE ?1 ESCAPE '\'
               OR email LIKE ?1 ESCAPE '\'
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, name, phone, email, created_at FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO customers (id, name, phone, email, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub async fn exists(exec: impl SqliteExecutor<'_>, id: &str) -> DbResult<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM customers WHERE id = ?1")
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{customer, test_db};

    #[tokio::test]
    async fn test_search_by_name_and_phone() {
        let db = test_db().await;
        let repo = db.customers();
        repo.insert(&customer("Amina Njoroge", Some("+254700000001"))).await.unwrap();
        repo.insert(&customer("Brian Otieno", Some("+254700000002"))).await.unwrap();

        let by_name = repo.search("amina", 10).await.unwrap();
        assert_eq!(by_name.len(), 1);

        let by_phone = repo.search("0002", 10).await.unwrap();
        assert_eq!(by_phone[0].name, "Brian Otieno");

        let everyone = repo.search("", 10).await.unwrap();
        assert_eq!(everyone.len(), 2);
    }

    #[tokio::test]
    async fn test_exists() {
        let db = test_db().await;
        let c = customer("Amina Njoroge", None);
        db.customers().insert(&c).await.unwrap();

        assert!(exists(db.pool(), &c.id).await.unwrap());
        assert!(!exists(db.pool(), "nope").await.unwrap());
    }
}
