//! # Seed Data Generator
//!
//! Populates a database with a small electronics shop for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./meridian_dev.db
//! cargo run -p meridian-db --bin seed
//!
//! # Specify database path
//! cargo run -p meridian-db --bin seed -- --db ./data/meridian.db
//!
//! # Skip the sample orders
//! cargo run -p meridian-db --bin seed -- --no-orders
//! ```
//!
//! ## Generated Data
//! - Categories: Phones, Laptops, Audio, Accessories
//! - Products, phones and laptops serialized with generated serial numbers
//! - Customers
//! - An active 18% VAT config and a couple of coupons
//! - Sample orders placed through `CheckoutService`, so totals, stock and
//!   ledger rows come out exactly as a real checkout would leave them

use std::env;
use std::sync::Arc;

use chrono::Utc;
use meridian_core::checkout::{CreateOrderRequest, OrderLineRequest};
use meridian_core::order_number::OrderNumberGenerator;
use meridian_core::{Customer, DiscountType, Money, PaymentMethod, Product, DEFAULT_ORDER_PREFIX};
use meridian_db::inventory::SerialIntake;
use meridian_db::pricing::{NewDiscount, NewTaxConfig};
use meridian_db::{AuditRecorder, CheckoutService, Database, DbConfig, InventoryService, PricingService};
use uuid::Uuid;

const SEED_USER: &str = "seed";

/// (category, sku, name, price in cents, stock, serialized, warranty months)
const PRODUCTS: &[(&str, &str, &str, i64, i64, bool, Option<i64>)] = &[
    ("Phones", "PHN-A15", "Galaxy A15 128GB", 50_000, 6, true, Some(12)),
    ("Phones", "PHN-RN13", "Redmi Note 13", 42_000, 4, true, Some(12)),
    ("Phones", "PHN-IP15", "iPhone 15 128GB", 245_000, 2, true, Some(12)),
    ("Laptops", "LAP-IDP3", "IdeaPad Slim 3", 135_000, 3, true, Some(24)),
    ("Laptops", "LAP-HP15", "HP 15s Ryzen 5", 118_000, 2, true, Some(24)),
    ("Audio", "AUD-BUDS", "Wireless Earbuds", 6_500, 25, false, Some(6)),
    ("Audio", "AUD-SPK1", "Bluetooth Speaker", 9_800, 12, false, Some(6)),
    ("Accessories", "CBL-USBC", "USB-C Cable 1m", 1_500, 80, false, None),
    ("Accessories", "CHG-25W", "25W Fast Charger", 3_200, 40, false, None),
    ("Accessories", "CSE-A15", "Galaxy A15 Case", 1_200, 3, false, None),
    ("Accessories", "SCR-GLS", "Tempered Glass Protector", 800, 60, false, None),
];

const CUSTOMERS: &[(&str, Option<&str>, Option<&str>)] = &[
    ("Amina Njoroge", Some("+254700000001"), Some("amina@example.com")),
    ("Brian Otieno", Some("+254700000002"), None),
    ("Chloe Wanjiru", None, Some("chloe@example.com")),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./meridian_dev.db");
    let mut with_orders = true;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--no-orders" => with_orders = false,
            "--help" | "-h" => {
                println!("Meridian POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./meridian_dev.db)");
                println!("      --no-orders    Do not place sample orders");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Meridian POS Seed Data Generator");
    println!("===================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let audit = AuditRecorder::new(db.audit_logs());
    let inventory = InventoryService::new(db.clone(), audit.clone());
    let pricing = PricingService::new(db.clone(), audit.clone());
    let checkout = CheckoutService::new(
        db.clone(),
        audit.clone(),
        Arc::new(OrderNumberGenerator::new(DEFAULT_ORDER_PREFIX)),
    );

    // Catalog
    println!();
    println!("Creating catalog...");

    let mut category_ids = Vec::new();
    for name in ["Phones", "Laptops", "Audio", "Accessories"] {
        let category = db.products().insert_category(name).await?;
        category_ids.push((name, category.id));
    }

    let mut products = Vec::new();
    for (index, (category, sku, name, price_cents, stock, serialized, warranty)) in PRODUCTS.iter().enumerate() {
        let now = Utc::now();
        let category_id = category_ids
            .iter()
            .find(|(n, _)| n == category)
            .map(|(_, id)| id.clone());

        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            barcode: Some(format!("616{:010}", index + 1)),
            name: name.to_string(),
            category_id,
            price_cents: *price_cents,
            cost_cents: price_cents * 78 / 100,
            // serialized stock arrives with its units below
            stock_quantity: if *serialized { 0 } else { *stock },
            low_stock_threshold: 5,
            warranty_months: *warranty,
            is_serialized: *serialized,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await?;

        if *serialized {
            let serial_numbers = (1..=*stock).map(|n| format!("{}-SN{:05}", sku, n)).collect();
            inventory
                .receive_serials(&product.id, SerialIntake { serial_numbers }, SEED_USER)
                .await?;
        }

        println!("  ✓ {} {} ({} in stock)", sku, name, stock);
        products.push(product);
    }

    // Customers
    println!();
    println!("Creating customers...");
    let mut customers = Vec::new();
    for (name, phone, email) in CUSTOMERS {
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            phone: phone.map(str::to_string),
            email: email.map(str::to_string),
            created_at: Utc::now(),
        };
        db.customers().insert(&customer).await?;
        println!("  ✓ {}", name);
        customers.push(customer);
    }

    // Pricing
    println!();
    println!("Configuring pricing...");
    let vat = pricing
        .create_tax_config(NewTaxConfig {
            name: "VAT 18%".to_string(),
            rate_bps: 1800,
        })
        .await?;
    pricing.activate_tax_config(&vat.id, SEED_USER).await?;
    println!("  ✓ Active tax: {}", vat.name);

    for (code, name, discount_type, value, min, max) in [
        ("SAVE10", "10% off, max 50.00", DiscountType::Percentage, 10, None, Some(5_000)),
        ("ACC500", "5.00 off accessories over 20.00", DiscountType::Fixed, 500, Some(2_000), None),
    ] {
        pricing
            .create_discount(
                NewDiscount {
                    code: Some(code.to_string()),
                    name: name.to_string(),
                    discount_type,
                    value,
                    min_purchase: min.map(Money::from_cents),
                    max_discount: max.map(Money::from_cents),
                    starts_at: None,
                    ends_at: None,
                },
                SEED_USER,
            )
            .await?;
        println!("  ✓ Coupon {}", code);
    }

    // Orders
    if with_orders {
        println!();
        println!("Placing sample orders...");

        let by_sku = |sku: &str| {
            products
                .iter()
                .find(|p| p.sku == sku)
                .map(|p| p.id.clone())
                .unwrap_or_default()
        };
        let line = |sku: &str, quantity: i64| OrderLineRequest {
            product_id: by_sku(sku),
            quantity,
            serial_number: None,
            unit_price_override: None,
        };

        let samples = vec![
            CreateOrderRequest {
                items: vec![line("PHN-A15", 1), line("CSE-A15", 1), line("SCR-GLS", 1)],
                customer_id: customers.first().map(|c| c.id.clone()),
                agent_id: None,
                coupon_code: None,
                manual_discount: None,
                payment_method: PaymentMethod::Cash,
                amount_tendered: Some(Money::from_cents(70_000)),
                payment_reference: None,
                notes: None,
            },
            CreateOrderRequest {
                items: vec![line("LAP-IDP3", 1)],
                customer_id: customers.get(1).map(|c| c.id.clone()),
                agent_id: None,
                coupon_code: Some("SAVE10".to_string()),
                manual_discount: None,
                payment_method: PaymentMethod::Card,
                amount_tendered: None,
                payment_reference: Some("AUTH-448812".to_string()),
                notes: None,
            },
            CreateOrderRequest {
                items: vec![line("AUD-BUDS", 2), line("CBL-USBC", 3)],
                customer_id: None,
                agent_id: None,
                coupon_code: None,
                manual_discount: None,
                payment_method: PaymentMethod::MobileMoney,
                amount_tendered: None,
                payment_reference: Some("MM-SEED-0001".to_string()),
                notes: Some("awaiting mobile money confirmation".to_string()),
            },
        ];

        for request in samples {
            let receipt = checkout.create_order(request, Some(SEED_USER)).await?;
            println!(
                "  ✓ {} {} total {}",
                receipt.order.order_number, receipt.order.status, receipt.order.total()
            );
        }
    }

    audit.flush().await;

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
