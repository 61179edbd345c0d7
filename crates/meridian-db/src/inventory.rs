//! # Inventory Service
//!
//! Catalog operations outside checkout: lookups, manual stock adjustments,
//! serial unit intake and price changes.
//!
//! ```text
//! adjust_stock ──► stock::adjust ──► ADJUSTMENT movement ──► audit STOCK_ADJUST
//! receive_serials ──► stock::receive_serials ──► IN movement (RECEIVE)
//! update_price ──► product::set_price ──► audit PRICE_CHANGE (old/new)
//! ```

use std::collections::HashSet;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::audit::{AuditEntry, AuditRecorder};
use crate::error::ServiceResult;
use crate::repository::product;
use crate::repository::stock::{self, MovementContext};
use crate::Database;
use meridian_core::validation::{
    validate_amount_cents, validate_optional_text, validate_reason, validate_search_query,
    validate_serial_number, validate_stock_delta,
};
use meridian_core::{
    entity, AuditAction, CoreError, Money, Product, SerialUnit, StockMovement, ValidationError,
    REASON_RECEIVE,
};

/// Most serial numbers accepted in one intake.
const MAX_SERIALS_PER_INTAKE: usize = 500;

/// Body of `POST /products/{id}/stock-adjustments`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StockAdjustment {
    /// Signed change to apply.
    pub delta: i64,
    pub reason: String,
}

/// Body of `POST /products/{id}/serials`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SerialIntake {
    pub serial_numbers: Vec<String>,
}

/// Body of `PUT /products/{id}/price`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PriceUpdate {
    pub price: Money,
    #[serde(default)]
    pub cost: Option<Money>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InventoryService {
    db: Database,
    audit: AuditRecorder,
}

impl InventoryService {
    pub fn new(db: Database, audit: AuditRecorder) -> Self {
        InventoryService { db, audit }
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    pub async fn search(&self, query: &str, limit: i64) -> ServiceResult<Vec<Product>> {
        let query = validate_search_query(query)?;
        Ok(self.db.products().search(&query, limit).await?)
    }

    pub async fn get_product(&self, id: &str) -> ServiceResult<Product> {
        self.db
            .products()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    pub async fn low_stock(&self, limit: i64) -> ServiceResult<Vec<Product>> {
        Ok(self.db.products().low_stock(limit).await?)
    }

    /// Stock ledger of a product, newest first.
    pub async fn movements(&self, product_id: &str, limit: i64) -> ServiceResult<Vec<StockMovement>> {
        self.get_product(product_id).await?;
        Ok(self.db.stock().movements_for_product(product_id, limit).await?)
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Applies a manual stock correction (count, damage, shrinkage).
    ///
    /// Refused for serialized products and when stock would go negative.
    pub async fn adjust_stock(&self, product_id: &str, adjustment: StockAdjustment, user_id: &str) -> ServiceResult<Product> {
        validate_stock_delta(adjustment.delta)?;
        let reason = validate_reason(&adjustment.reason)?;
        let now = Utc::now();

        let mut tx = self.db.pool().begin().await?;
        let (old_stock, new_stock) = stock::adjust(
            &mut tx,
            product_id,
            adjustment.delta,
            MovementContext {
                reason: &reason,
                order_id: None,
                user_id: Some(user_id),
                at: now,
            },
        )
        .await?;
        let updated = product::find_by_id(&mut *tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        tx.commit().await?;

        info!(sku = %updated.sku, old_stock, new_stock, "Stock adjusted");

        self.audit.record(
            AuditEntry::new(AuditAction::StockAdjust, entity::PRODUCT, product_id)
                .user(Some(user_id))
                .old_value(&json!({ "stockQuantity": old_stock }))
                .new_value(&json!({ "stockQuantity": new_stock, "delta": adjustment.delta }))
                .reason(Some(reason.as_str())),
        );

        Ok(updated)
    }

    /// Adds serial units to a serialized product.
    pub async fn receive_serials(&self, product_id: &str, intake: SerialIntake, user_id: &str) -> ServiceResult<Vec<SerialUnit>> {
        if intake.serial_numbers.is_empty() {
            return Err(ValidationError::Required {
                field: "serialNumbers".to_string(),
            }
            .into());
        }
        if intake.serial_numbers.len() > MAX_SERIALS_PER_INTAKE {
            return Err(ValidationError::OutOfRange {
                field: "serialNumbers".to_string(),
                min: 1,
                max: MAX_SERIALS_PER_INTAKE as i64,
            }
            .into());
        }

        let mut seen = HashSet::new();
        let mut serials = Vec::with_capacity(intake.serial_numbers.len());
        for raw in &intake.serial_numbers {
            let serial = validate_serial_number(raw)?;
            if !seen.insert(serial.clone()) {
                return Err(ValidationError::Duplicate {
                    field: "serialNumbers".to_string(),
                    value: serial,
                }
                .into());
            }
            serials.push(serial);
        }

        let mut tx = self.db.pool().begin().await?;
        let units = stock::receive_serials(
            &mut tx,
            product_id,
            &serials,
            MovementContext {
                reason: REASON_RECEIVE,
                order_id: None,
                user_id: Some(user_id),
                at: Utc::now(),
            },
        )
        .await?;
        tx.commit().await?;

        info!(product_id = %product_id, count = units.len(), "Serial units received");
        Ok(units)
    }

    /// Changes a product's price (and optionally cost).
    pub async fn update_price(&self, product_id: &str, update: PriceUpdate, user_id: &str) -> ServiceResult<Product> {
        validate_amount_cents("price", update.price.cents())?;
        if let Some(cost) = update.cost {
            validate_amount_cents("cost", cost.cents())?;
        }
        let reason = validate_optional_text("reason", update.reason.as_deref(), 500)?;
        let now = Utc::now();

        let mut tx = self.db.pool().begin().await?;
        // write first: the old snapshot is read under the write lock
        if !product::touch(&mut tx, product_id, now).await? {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }
        let before = product::find_by_id(&mut *tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        product::set_price(
            &mut tx,
            product_id,
            update.price.cents(),
            update.cost.map(|c| c.cents()),
            now,
        )
        .await?;
        let after = product::find_by_id(&mut *tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        tx.commit().await?;

        info!(sku = %after.sku, old = %before.price(), new = %after.price(), "Price changed");

        self.audit.record(
            AuditEntry::new(AuditAction::PriceChange, entity::PRODUCT, product_id)
                .user(Some(user_id))
                .old_value(&json!({ "priceCents": before.price_cents, "costCents": before.cost_cents }))
                .new_value(&json!({ "priceCents": after.price_cents, "costCents": after.cost_cents }))
                .reason(reason.as_deref()),
        );

        Ok(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::audit::AuditFilter;
    use crate::test_support::{insert_product, insert_serialized, test_db};
    use crate::{CheckoutService, DbConfig};
    use meridian_core::checkout::{CreateOrderRequest, OrderLineRequest};
    use meridian_core::order_number::OrderNumberGenerator;
    use meridian_core::{ErrorCategory, MovementType, PaymentMethod, SerialStatus, DEFAULT_ORDER_PREFIX};
    use std::sync::Arc;

    fn service(db: &Database) -> InventoryService {
        InventoryService::new(db.clone(), AuditRecorder::new(db.audit_logs()))
    }

    #[tokio::test]
    async fn test_adjust_stock_records_and_audits() {
        let db = test_db().await;
        let item = insert_product(&db, "CBL-USBC", 1_500, 10).await;
        let svc = service(&db);

        let updated = svc
            .adjust_stock(
                &item.id,
                StockAdjustment { delta: -3, reason: "damaged in transit".into() },
                "manager-1",
            )
            .await
            .unwrap();
        assert_eq!(updated.stock_quantity, 7);

        let moves = svc.movements(&item.id, 10).await.unwrap();
        assert_eq!(moves[0].movement_type, MovementType::Adjustment);
        assert_eq!(moves[0].quantity, -3);
        assert_eq!(moves[0].reason, "damaged in transit");

        svc.audit.flush().await;
        let logs = db.audit_logs().list(&AuditFilter::default(), 10).await.unwrap();
        assert_eq!(logs[0].action, AuditAction::StockAdjust);
        assert!(logs[0].new_value.as_deref().unwrap().contains("\"stockQuantity\":7"));
    }

    #[tokio::test]
    async fn test_adjust_below_zero_refused() {
        let db = test_db().await;
        let item = insert_product(&db, "CBL-USBC", 1_500, 2).await;

        let err = service(&db)
            .adjust_stock(&item.id, StockAdjustment { delta: -5, reason: "count".into() }, "manager-1")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert_eq!(db.products().get_by_id(&item.id).await.unwrap().unwrap().stock_quantity, 2);
    }

    #[tokio::test]
    async fn test_adjust_requires_reason_and_nonzero_delta() {
        let db = test_db().await;
        let item = insert_product(&db, "CBL-USBC", 1_500, 2).await;
        let svc = service(&db);

        let err = svc
            .adjust_stock(&item.id, StockAdjustment { delta: 0, reason: "x".into() }, "manager-1")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);

        let err = svc
            .adjust_stock(&item.id, StockAdjustment { delta: 1, reason: "".into() }, "manager-1")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[tokio::test]
    async fn test_receive_serials_raises_stock() {
        let db = test_db().await;
        let phone = insert_serialized(&db, "PHN-X1", 90_000, &["IMEI-1"]).await;
        let svc = service(&db);

        let units = svc
            .receive_serials(
                &phone.id,
                SerialIntake { serial_numbers: vec!["IMEI-2".into(), " IMEI-3 ".into()] },
                "manager-1",
            )
            .await
            .unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].serial_number, "IMEI-3");
        assert!(units.iter().all(|u| u.status == SerialStatus::Available));

        let reloaded = svc.get_product(&phone.id).await.unwrap();
        assert_eq!(reloaded.stock_quantity, 3);
        assert_eq!(db.stock().available_serial_count(&phone.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_receive_serials_rejects_duplicates_in_request() {
        let db = test_db().await;
        let phone = insert_serialized(&db, "PHN-X1", 90_000, &[]).await;

        let err = service(&db)
            .receive_serials(
                &phone.id,
                SerialIntake { serial_numbers: vec!["A".into(), "A".into()] },
                "manager-1",
            )
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[tokio::test]
    async fn test_receive_serials_into_plain_product_refused() {
        let db = test_db().await;
        let item = insert_product(&db, "CBL-USBC", 1_500, 2).await;

        let err = service(&db)
            .receive_serials(&item.id, SerialIntake { serial_numbers: vec!["S1".into()] }, "manager-1")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert_eq!(db.products().get_by_id(&item.id).await.unwrap().unwrap().stock_quantity, 2);
    }

    #[tokio::test]
    async fn test_update_price_audits_old_and_new() {
        let db = test_db().await;
        let item = insert_product(&db, "PHN-A15", 50_000, 2).await;
        let svc = service(&db);

        let updated = svc
            .update_price(
                &item.id,
                PriceUpdate {
                    price: Money::from_cents(55_000),
                    cost: None,
                    reason: Some("supplier increase".into()),
                },
                "manager-1",
            )
            .await
            .unwrap();
        assert_eq!(updated.price_cents, 55_000);
        assert_eq!(updated.cost_cents, item.cost_cents);

        svc.audit.flush().await;
        let logs = db.audit_logs().list(&AuditFilter::default(), 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, AuditAction::PriceChange);
        assert!(logs[0].old_value.as_deref().unwrap().contains("50000"));
        assert!(logs[0].new_value.as_deref().unwrap().contains("55000"));
    }

    #[tokio::test]
    async fn test_update_price_unknown_product() {
        let db = test_db().await;
        let err = service(&db)
            .update_price(
                "missing",
                PriceUpdate { price: Money::from_cents(1), cost: None, reason: None },
                "manager-1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err.rule(), Some(CoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_price_update_interleaved_with_checkouts() {
        let path = std::env::temp_dir().join(format!("meridian-reprice-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(4)).await.unwrap();
        let item = insert_product(&db, "CBL-USBC", 1_500, 50).await;
        let svc = service(&db);
        let checkout = CheckoutService::new(
            db.clone(),
            AuditRecorder::new(db.audit_logs()),
            Arc::new(OrderNumberGenerator::new(DEFAULT_ORDER_PREFIX)),
        );

        let sale = || {
            checkout.create_order(
                CreateOrderRequest {
                    items: vec![OrderLineRequest {
                        product_id: item.id.clone(),
                        quantity: 1,
                        serial_number: None,
                        unit_price_override: None,
                    }],
                    customer_id: None,
                    agent_id: None,
                    coupon_code: None,
                    manual_discount: None,
                    payment_method: PaymentMethod::Card,
                    amount_tendered: None,
                    payment_reference: None,
                    notes: None,
                },
                Some("cashier-1"),
            )
        };
        let reprice = |cents: i64| {
            svc.update_price(
                &item.id,
                PriceUpdate { price: Money::from_cents(cents), cost: None, reason: None },
                "manager-1",
            )
        };

        let (a, b, c, d) = tokio::join!(sale(), reprice(1_600), sale(), reprice(1_700));

        let final_stock = db.products().get_by_id(&item.id).await.unwrap().unwrap().stock_quantity;
        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }

        assert!(a.is_ok() && c.is_ok());
        assert!(b.is_ok(), "{:?}", b.err());
        assert!(d.is_ok(), "{:?}", d.err());
        assert_eq!(final_stock, 48);
    }
}
