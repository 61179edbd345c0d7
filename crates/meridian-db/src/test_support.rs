//! Fixtures shared by the unit tests in this crate.

use chrono::Utc;
use uuid::Uuid;

use crate::repository::stock::{self, MovementContext};
use crate::{Database, DbConfig};
use meridian_core::{Customer, Discount, DiscountType, Product, TaxConfig, REASON_RECEIVE};

pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database")
}

/// Active, non-serialized product with a low-stock threshold of 5.
pub fn product(sku: &str, name: &str, price_cents: i64, stock: i64) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4().to_string(),
        sku: sku.to_string(),
        barcode: None,
        name: name.to_string(),
        category_id: None,
        price_cents,
        cost_cents: price_cents * 7 / 10,
        stock_quantity: stock,
        low_stock_threshold: 5,
        warranty_months: None,
        is_serialized: false,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub async fn insert_product(db: &Database, sku: &str, price_cents: i64, stock: i64) -> Product {
    db.products()
        .insert(&product(sku, sku, price_cents, stock))
        .await
        .expect("insert product")
}

/// Serialized product with a 12-month warranty, stocked with `serials`.
pub async fn insert_serialized(db: &Database, sku: &str, price_cents: i64, serials: &[&str]) -> Product {
    let mut p = product(sku, sku, price_cents, 0);
    p.is_serialized = true;
    p.warranty_months = Some(12);
    db.products().insert(&p).await.expect("insert product");

    if serials.is_empty() {
        return p;
    }

    let serials: Vec<String> = serials.iter().map(|s| s.to_string()).collect();
    let mut tx = db.pool().begin().await.expect("begin");
    stock::receive_serials(
        &mut tx,
        &p.id,
        &serials,
        MovementContext {
            reason: REASON_RECEIVE,
            order_id: None,
            user_id: None,
            at: Utc::now(),
        },
    )
    .await
    .expect("receive serials");
    tx.commit().await.expect("commit");

    db.products()
        .get_by_id(&p.id)
        .await
        .expect("reload")
        .expect("product exists")
}

pub fn customer(name: &str, phone: Option<&str>) -> Customer {
    Customer {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        phone: phone.map(str::to_string),
        email: None,
        created_at: Utc::now(),
    }
}

/// Inserts an active tax config.
pub async fn insert_tax(db: &Database, name: &str, rate_bps: i64) -> TaxConfig {
    let now = Utc::now();
    let config = TaxConfig {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        rate_bps,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.tax_configs().insert(&config).await.expect("insert tax config");
    config
}

pub async fn insert_discount(
    db: &Database,
    code: &str,
    discount_type: DiscountType,
    value: i64,
    min_purchase_cents: Option<i64>,
    max_discount_cents: Option<i64>,
) -> Discount {
    let discount = Discount {
        id: Uuid::new_v4().to_string(),
        code: Some(code.to_string()),
        name: code.to_string(),
        discount_type,
        value,
        min_purchase_cents,
        max_discount_cents,
        starts_at: None,
        ends_at: None,
        is_active: true,
        created_at: Utc::now(),
    };
    db.discounts().insert(&discount).await.expect("insert discount");
    discount
}
