//! # Pricing Service
//!
//! Discount and tax lookups for checkout, plus management of discounts and
//! tax configurations.
//!
//! ## Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  resolve_pricing(conn, subtotal, source, now)       no writes           │
//! │                                                                         │
//! │  DiscountSource::Coupon(code)                                           │
//! │     └── discounts WHERE code = ?  ── none ─► DiscountNotFound           │
//! │            └── apply_discount()   ── inactive / min purchase ─► Policy  │
//! │  DiscountSource::Manual(amount)                                         │
//! │     └── clamp_manual_discount()                                         │
//! │  DiscountSource::None ─► 0                                              │
//! │                                                                         │
//! │  tax_configs WHERE is_active = 1 (newest update wins) ─► TaxRate        │
//! │                                                                         │
//! │  OrderTotals::compute(subtotal, discount, rate)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same function serves the checkout transaction and the read-only
//! quote, so a quote shows exactly what checkout will charge.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditRecorder};
use crate::error::ServiceResult;
use crate::repository::{discount, tax};
use crate::Database;
use meridian_core::checkout::DiscountSource;
use meridian_core::pricing::{apply_discount, clamp_manual_discount, resolve_tax_rate, OrderTotals};
use meridian_core::validation::{
    normalize_coupon_code, validate_amount_cents, validate_discount_value, validate_name,
    validate_tax_rate_bps,
};
use meridian_core::{
    entity, AuditAction, CoreError, Discount, DiscountType, Money, TaxConfig, ValidationError,
};

// =============================================================================
// Resolution
// =============================================================================

/// Discount and tax applied to one subtotal.
#[derive(Debug, Clone)]
pub struct ResolvedPricing {
    /// Coupon that produced the discount, if any.
    pub discount_id: Option<String>,
    pub totals: OrderTotals,
}

/// Resolves discount and tax for `subtotal` on the caller's connection.
pub async fn resolve_pricing(
    conn: &mut SqliteConnection,
    subtotal: Money,
    source: &DiscountSource,
    now: DateTime<Utc>,
) -> ServiceResult<ResolvedPricing> {
    let (discount_id, discount_amount) = match source {
        DiscountSource::None => (None, Money::zero()),
        DiscountSource::Coupon(code) => {
            let coupon = discount::find_by_code(&mut *conn, code)
                .await?
                .ok_or_else(|| CoreError::DiscountNotFound(code.clone()))?;
            let amount = apply_discount(&coupon, subtotal, now)?;
            (Some(coupon.id), amount)
        }
        DiscountSource::Manual(amount) => (None, clamp_manual_discount(*amount, subtotal)),
    };

    let active_tax = tax::find_active(&mut *conn).await?;
    let rate = resolve_tax_rate(active_tax.as_ref());

    let totals = OrderTotals::compute(subtotal, discount_amount, rate)?;

    debug!(
        subtotal = %totals.subtotal,
        discount = %totals.discount,
        tax = %totals.tax,
        total = %totals.total,
        rate_bps = rate.bps(),
        "Pricing resolved"
    );

    Ok(ResolvedPricing { discount_id, totals })
}

// =============================================================================
// Management Requests
// =============================================================================

/// Body of `POST /discounts`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewDiscount {
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
    pub discount_type: DiscountType,
    pub value: i64,
    #[serde(default)]
    pub min_purchase: Option<Money>,
    #[serde(default)]
    pub max_discount: Option<Money>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

/// Body of `POST /tax-configs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewTaxConfig {
    pub name: String,
    pub rate_bps: i64,
}

// =============================================================================
// Service
// =============================================================================

/// Discount and tax configuration management.
#[derive(Debug, Clone)]
pub struct PricingService {
    db: Database,
    audit: AuditRecorder,
}

impl PricingService {
    pub fn new(db: Database, audit: AuditRecorder) -> Self {
        PricingService { db, audit }
    }

    /// Creates a discount. Coupon codes are stored normalized.
    ///
    /// ## Returns
    /// * `Err` CONFLICT (`DUPLICATE`) - the code is already in use
    pub async fn create_discount(&self, req: NewDiscount, user_id: &str) -> ServiceResult<Discount> {
        validate_name("name", &req.name)?;
        validate_discount_value(req.discount_type, req.value)?;

        let code = req.code.as_deref().map(normalize_coupon_code).transpose()?;

        if let Some(min) = req.min_purchase {
            validate_amount_cents("minPurchase", min.cents())?;
        }
        if let Some(max) = req.max_discount {
            validate_amount_cents("maxDiscount", max.cents())?;
        }
        if let (Some(start), Some(end)) = (req.starts_at, req.ends_at) {
            if end < start {
                return Err(ValidationError::InvalidFormat {
                    field: "endsAt".to_string(),
                    reason: "must not be before startsAt".to_string(),
                }
                .into());
            }
        }

        let discount = Discount {
            id: Uuid::new_v4().to_string(),
            code,
            name: req.name.trim().to_string(),
            discount_type: req.discount_type,
            value: req.value,
            min_purchase_cents: req.min_purchase.map(|m| m.cents()),
            max_discount_cents: req.max_discount.map(|m| m.cents()),
            starts_at: req.starts_at,
            ends_at: req.ends_at,
            is_active: true,
            created_at: Utc::now(),
        };

        self.db.discounts().insert(&discount).await?;

        info!(id = %discount.id, code = ?discount.code, "Discount created");

        self.audit.record(
            AuditEntry::new(AuditAction::DiscountCreate, entity::DISCOUNT, &discount.id)
                .user(Some(user_id))
                .new_value(&discount),
        );

        Ok(discount)
    }

    pub async fn list_discounts(&self, limit: i64) -> ServiceResult<Vec<Discount>> {
        Ok(self.db.discounts().list(limit).await?)
    }

    /// Creates a tax configuration. New configs start inactive.
    pub async fn create_tax_config(&self, req: NewTaxConfig) -> ServiceResult<TaxConfig> {
        validate_name("name", &req.name)?;
        validate_tax_rate_bps(req.rate_bps)?;

        let now = Utc::now();
        let config = TaxConfig {
            id: Uuid::new_v4().to_string(),
            name: req.name.trim().to_string(),
            rate_bps: req.rate_bps,
            is_active: false,
            created_at: now,
            updated_at: now,
        };

        self.db.tax_configs().insert(&config).await?;

        info!(id = %config.id, rate_bps = config.rate_bps, "Tax config created");
        Ok(config)
    }

    pub async fn list_tax_configs(&self) -> ServiceResult<Vec<TaxConfig>> {
        Ok(self.db.tax_configs().list().await?)
    }

    /// Makes `id` the single active tax configuration.
    ///
    /// Deactivation of the previous config and activation of the new one
    /// commit together; the change is audited with both snapshots.
    pub async fn activate_tax_config(&self, id: &str, user_id: &str) -> ServiceResult<TaxConfig> {
        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;

        // write first: the previous snapshot is read under the write lock
        if !tax::touch(&mut tx, id, now).await? {
            return Err(CoreError::TaxConfigNotFound(id.to_string()).into());
        }

        let previous = tax::find_active(&mut *tx).await?;
        tax::activate(&mut tx, id, now).await?;

        let activated = tax::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| CoreError::TaxConfigNotFound(id.to_string()))?;

        tx.commit().await?;

        info!(
            id = %activated.id,
            rate_bps = activated.rate_bps,
            previous = ?previous.as_ref().map(|p| p.id.as_str()),
            "Tax config activated"
        );

        let mut entry = AuditEntry::new(AuditAction::TaxConfigChange, entity::TAX_CONFIG, &activated.id)
            .user(Some(user_id))
            .new_value(&activated);
        if let Some(previous) = &previous {
            entry = entry.old_value(previous);
        }
        self.audit.record(entry);

        Ok(activated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::audit::AuditFilter;
    use crate::test_support::{insert_discount, insert_tax, test_db};

    fn service(db: &Database) -> PricingService {
        PricingService::new(db.clone(), AuditRecorder::new(db.audit_logs()))
    }

    fn new_discount(code: Option<&str>, discount_type: DiscountType, value: i64) -> NewDiscount {
        NewDiscount {
            code: code.map(str::to_string),
            name: "Promo".to_string(),
            discount_type,
            value,
            min_purchase: None,
            max_discount: None,
            starts_at: None,
            ends_at: None,
        }
    }

    #[tokio::test]
    async fn test_resolve_coupon_with_cap_and_tax() {
        let db = test_db().await;
        insert_tax(&db, "VAT", 1800).await;
        insert_discount(&db, "SAVE10", DiscountType::Percentage, 10, None, Some(5_000)).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let resolved = resolve_pricing(
            &mut conn,
            Money::from_cents(100_000),
            &DiscountSource::Coupon("SAVE10".into()),
            Utc::now(),
        )
        .await
        .unwrap();

        assert!(resolved.discount_id.is_some());
        assert_eq!(resolved.totals.discount.cents(), 5_000);
        // (100000 - 5000) * 18% = 17100
        assert_eq!(resolved.totals.tax.cents(), 17_100);
        assert_eq!(resolved.totals.total.cents(), 112_100);
    }

    #[tokio::test]
    async fn test_resolve_unknown_coupon() {
        let db = test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let err = resolve_pricing(
            &mut conn,
            Money::from_cents(1_000),
            &DiscountSource::Coupon("NOPE".into()),
            Utc::now(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err.rule(), Some(CoreError::DiscountNotFound(_))));
    }

    #[tokio::test]
    async fn test_resolve_without_tax_config() {
        let db = test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let resolved = resolve_pricing(
            &mut conn,
            Money::from_cents(10_000),
            &DiscountSource::Manual(Money::from_cents(50_000)),
            Utc::now(),
        )
        .await
        .unwrap();

        // manual discount clamps to the subtotal; no config means no tax
        assert_eq!(resolved.totals.discount.cents(), 10_000);
        assert_eq!(resolved.totals.tax.cents(), 0);
        assert_eq!(resolved.totals.total.cents(), 0);
    }

    #[tokio::test]
    async fn test_create_discount_normalizes_code() {
        let db = test_db().await;
        let svc = service(&db);

        let created = svc
            .create_discount(new_discount(Some(" save20 "), DiscountType::Percentage, 20), "manager-1")
            .await
            .unwrap();
        assert_eq!(created.code.as_deref(), Some("SAVE20"));

        let err = svc
            .create_discount(new_discount(Some("SAVE20"), DiscountType::Fixed, 500), "manager-1")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DUPLICATE");

        svc.audit.flush().await;
        let logs = db.audit_logs().list(&AuditFilter::default(), 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, AuditAction::DiscountCreate);
    }

    #[tokio::test]
    async fn test_create_discount_rejects_bad_percentage() {
        let db = test_db().await;
        let err = service(&db)
            .create_discount(new_discount(None, DiscountType::Percentage, 150), "manager-1")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_activation_keeps_single_active() {
        let db = test_db().await;
        let svc = service(&db);

        let vat = svc
            .create_tax_config(NewTaxConfig { name: "VAT".into(), rate_bps: 1800 })
            .await
            .unwrap();
        let reduced = svc
            .create_tax_config(NewTaxConfig { name: "Reduced".into(), rate_bps: 800 })
            .await
            .unwrap();
        assert!(!vat.is_active);

        svc.activate_tax_config(&vat.id, "manager-1").await.unwrap();
        svc.activate_tax_config(&reduced.id, "manager-1").await.unwrap();

        let active = db.tax_configs().active().await.unwrap().unwrap();
        assert_eq!(active.id, reduced.id);

        let active_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tax_configs WHERE is_active = 1")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(active_count, 1);

        svc.audit.flush().await;
        let logs = db
            .audit_logs()
            .list(
                &AuditFilter {
                    entity_type: Some(entity::TAX_CONFIG.to_string()),
                    entity_id: Some(reduced.id.clone()),
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].old_value.as_deref().unwrap().contains(&vat.id));
    }

    #[tokio::test]
    async fn test_activate_unknown_config() {
        let db = test_db().await;
        let err = service(&db)
            .activate_tax_config("missing", "manager-1")
            .await
            .unwrap_err();
        assert!(matches!(err.rule(), Some(CoreError::TaxConfigNotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_activations_leave_one_active() {
        let path = std::env::temp_dir().join(format!("meridian-tax-{}.db", Uuid::new_v4()));
        let db = Database::new(crate::DbConfig::new(&path).max_connections(4)).await.unwrap();
        let svc = service(&db);

        let vat = insert_tax(&db, "VAT", 1800).await;
        let reduced = svc
            .create_tax_config(NewTaxConfig { name: "Reduced".into(), rate_bps: 800 })
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            svc.activate_tax_config(&reduced.id, "manager-1"),
            svc.activate_tax_config(&vat.id, "manager-2"),
        );

        let active_count: Result<i64, _> = sqlx::query_scalar("SELECT COUNT(*) FROM tax_configs WHERE is_active = 1")
            .fetch_one(db.pool())
            .await;
        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }

        assert!(a.is_ok(), "{:?}", a.err());
        assert!(b.is_ok(), "{:?}", b.err());
        assert_eq!(active_count.unwrap(), 1);
    }
}
