//! # Checkout Service
//!
//! The order assembler: turns a validated checkout request into a persisted
//! order, its items and its payment, with stock reserved, all in one
//! transaction.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_order(request)                                                  │
//! │                                                                         │
//! │  request.validate()               ── ValidationError, nothing touched   │
//! │       │                                                                 │
//! │  BEGIN ─────────────────────────────────────────────────────────────┐   │
//! │  │  for each line i:                                                │   │
//! │  │     stock::reserve()          ── error tagged with item index i  │   │
//! │  │     snapshot name/sku/price/cost/serial/warranty                 │   │
//! │  │     subtotal += unit_price × quantity                            │   │
//! │  │  customer exists?             ── CustomerNotFound                │   │
//! │  │  resolve_pricing()            ── discount + tax + total          │   │
//! │  │  settle_payment()             ── InsufficientPayment             │   │
//! │  │  INSERT orders                ── order number taken? next one    │   │
//! │  │  INSERT order_items, payments                                    │   │
//! │  COMMIT ◄───────────────────────────── any error: ROLLBACK (drop) ──┘   │
//! │       │                                                                 │
//! │  pricing overridden? ─► audit ORDER_CREATE (fire-and-forget)            │
//! │       │                                                                 │
//! │  OrderReceipt                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dropping an uncommitted `sqlx::Transaction` rolls it back, so every early
//! return with `?` leaves the database untouched.

use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditRecorder};
use crate::error::{ServiceError, ServiceResult};
use crate::pricing::resolve_pricing;
use crate::repository::order as orders;
use crate::repository::stock::{self, MovementContext, Reservation};
use crate::repository::{customer, product};
use crate::Database;
use meridian_core::checkout::{
    CreateOrderRequest, DiscountSource, Quote, QuoteLine, QuoteRequest, ValidatedLine, ValidatedOrder,
};
use meridian_core::order_number::OrderNumberGenerator;
use meridian_core::pricing::settle_payment;
use meridian_core::validation::{validate_optional_text, validate_reason};
use meridian_core::{
    entity, AuditAction, CoreError, ErrorCategory, Money, Order, OrderItem, OrderReceipt,
    OrderStatus, Payment, PaymentStatus, ValidationError, REASON_CANCEL, REASON_RETURN, REASON_SALE,
};

/// How many order numbers to try before giving up on an insert.
const MAX_ORDER_NUMBER_ATTEMPTS: u32 = 5;

/// Checkout and order lifecycle operations.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    db: Database,
    audit: AuditRecorder,
    numbers: Arc<OrderNumberGenerator>,
}

impl CheckoutService {
    pub fn new(db: Database, audit: AuditRecorder, numbers: Arc<OrderNumberGenerator>) -> Self {
        CheckoutService { db, audit, numbers }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Places an order.
    ///
    /// `acting_user` becomes the order's agent when the request names none.
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        acting_user: Option<&str>,
    ) -> ServiceResult<OrderReceipt> {
        let result = match request.validate() {
            Ok(mut order) => {
                if order.agent_id.is_none() {
                    order.agent_id = acting_user.map(str::to_string);
                }
                self.place(order).await
            }
            Err(rejected) => Err(rejected.into()),
        };

        if let Err(e) = &result {
            log_rejection("Checkout", e);
        }

        result
    }

    async fn place(&self, order: ValidatedOrder) -> ServiceResult<OrderReceipt> {
        let now = Utc::now();
        let order_id = Uuid::new_v4().to_string();

        let mut tx = self.db.pool().begin().await?;

        let ctx = MovementContext {
            reason: REASON_SALE,
            order_id: Some(&order_id),
            user_id: order.agent_id.as_deref(),
            at: now,
        };

        let mut items = Vec::with_capacity(order.lines.len());
        let mut subtotal = Money::zero();

        for (index, line) in order.lines.iter().enumerate() {
            let reservation = stock::reserve(
                &mut tx,
                &line.product_id,
                line.quantity,
                line.serial_number.as_deref(),
                ctx,
            )
            .await
            .map_err(|e| e.at(index))?;

            let unit_price = line.unit_price_override.unwrap_or(reservation.product.price());
            let (_, running) = add_line(subtotal, unit_price, line.quantity, index)?;
            subtotal = running;

            items.extend(order_items(&order_id, line, &reservation, unit_price, now));
        }

        if let Some(customer_id) = &order.customer_id {
            if !customer::exists(&mut *tx, customer_id).await? {
                return Err(CoreError::CustomerNotFound(customer_id.clone()).into());
            }
        }

        let pricing = resolve_pricing(&mut tx, subtotal, &order.discount, now).await?;
        let totals = pricing.totals;

        let settlement = settle_payment(order.payment_method, totals.total, order.amount_tendered)?;

        let (status, payment_status, completed_at) = if order.payment_method.settles_immediately() {
            (OrderStatus::Completed, PaymentStatus::Paid, Some(now))
        } else {
            (OrderStatus::Pending, PaymentStatus::Pending, None)
        };

        let mut record = Order {
            id: order_id.clone(),
            order_number: String::new(),
            status,
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount.cents(),
            tax_cents: totals.tax.cents(),
            total_cents: totals.total.cents(),
            discount_id: pricing.discount_id,
            customer_id: order.customer_id.clone(),
            agent_id: order.agent_id.clone(),
            notes: order.notes.clone(),
            created_at: now,
            updated_at: now,
            completed_at,
        };

        self.insert_with_fresh_number(&mut tx, &mut record).await?;

        for item in &items {
            orders::insert_item(&mut tx, item).await?;
        }

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.clone(),
            method: order.payment_method,
            status: payment_status,
            amount_cents: totals.total.cents(),
            tendered_cents: settlement.tendered.cents(),
            change_cents: settlement.change.cents(),
            reference: order.payment_reference.clone(),
            created_at: now,
            updated_at: now,
        };
        orders::insert_payment(&mut tx, &payment).await?;

        tx.commit().await?;

        info!(
            order_number = %record.order_number,
            status = %record.status,
            lines = items.len(),
            total = %totals.total,
            "Order created"
        );

        if order.overrides_pricing() {
            let manual_discount = matches!(order.discount, DiscountSource::Manual(_));
            self.audit.record(
                AuditEntry::new(AuditAction::OrderCreate, entity::ORDER, &record.id)
                    .user(order.agent_id.as_deref())
                    .new_value(&json!({
                        "orderNumber": record.order_number,
                        "subtotal": totals.subtotal,
                        "discount": totals.discount,
                        "tax": totals.tax,
                        "total": totals.total,
                        "manualDiscount": manual_discount,
                        "overriddenLines": items
                            .iter()
                            .filter(|i| i.price_overridden)
                            .map(|i| json!({
                                "productId": i.product_id,
                                "sku": i.sku_snapshot,
                                "unitPrice": i.unit_price_cents,
                            }))
                            .collect::<Vec<_>>(),
                    })),
            );
        }

        Ok(OrderReceipt {
            order: record,
            items,
            payment,
        })
    }

    /// Inserts the order row, drawing a new number whenever the previous
    /// one is already taken.
    async fn insert_with_fresh_number(&self, conn: &mut SqliteConnection, record: &mut Order) -> ServiceResult<()> {
        for attempt in 1..=MAX_ORDER_NUMBER_ATTEMPTS {
            record.order_number = self.numbers.next_at(record.created_at);

            match orders::insert_order(conn, record).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_unique_violation_on("orders.order_number") => {
                    warn!(order_number = %record.order_number, attempt, "Order number taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CoreError::OrderNumberCollision {
            attempts: MAX_ORDER_NUMBER_ATTEMPTS,
        }
        .into())
    }

    /// Prices a cart without reserving stock or writing anything.
    ///
    /// Runs the same lookups and resolver as checkout, so the totals match
    /// what `create_order` would charge at the same moment.
    pub async fn quote(&self, request: QuoteRequest) -> ServiceResult<Quote> {
        let quote = request.validate()?;
        let now = Utc::now();

        let mut conn = self.db.pool().acquire().await?;

        let mut lines = Vec::with_capacity(quote.lines.len());
        let mut subtotal = Money::zero();

        for (index, line) in quote.lines.iter().enumerate() {
            let p = product::find_by_id(&mut *conn, &line.product_id)
                .await?
                .ok_or_else(|| ServiceError::from(CoreError::ProductNotFound(line.product_id.clone())).at(index))?;

            if !p.is_active {
                return Err(ServiceError::from(CoreError::ProductInactive(p.sku)).at(index));
            }
            if p.stock_quantity < line.quantity {
                return Err(ServiceError::from(CoreError::InsufficientStock {
                    sku: p.sku,
                    available: p.stock_quantity,
                    requested: line.quantity,
                })
                .at(index));
            }

            let unit_price = line.unit_price_override.unwrap_or(p.price());
            let (line_total, running) = add_line(subtotal, unit_price, line.quantity, index)?;
            subtotal = running;

            lines.push(QuoteLine {
                product_id: p.id,
                name: p.name,
                sku: p.sku,
                quantity: line.quantity,
                unit_price,
                line_total,
                price_overridden: line.unit_price_override.is_some(),
            });
        }

        let pricing = resolve_pricing(&mut conn, subtotal, &quote.discount, now).await?;

        Ok(Quote {
            lines,
            totals: pricing.totals,
            discount_id: pricing.discount_id,
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Completes a PENDING order once its payment has arrived.
    pub async fn confirm_payment(&self, order_id: &str, reference: Option<&str>) -> ServiceResult<OrderReceipt> {
        let reference = validate_optional_text("reference", reference, 128)?;
        let now = Utc::now();

        let mut tx = self.db.pool().begin().await?;
        orders::transition(&mut tx, order_id, OrderStatus::Pending, OrderStatus::Completed, "confirm payment", now)
            .await?;
        orders::set_payment_status(&mut tx, order_id, PaymentStatus::Paid, reference.as_deref(), now).await?;
        let receipt = load_required(&mut tx, order_id).await?;
        tx.commit().await?;

        info!(order_number = %receipt.order.order_number, "Payment confirmed");
        Ok(receipt)
    }

    /// Cancels a PENDING order: stock goes back, payment is voided.
    pub async fn cancel_order(&self, order_id: &str, user_id: &str, reason: &str) -> ServiceResult<OrderReceipt> {
        self.reverse(order_id, user_id, reason, Reversal::Cancel).await
    }

    /// Returns a COMPLETED order: stock goes back, payment is refunded.
    pub async fn return_order(&self, order_id: &str, user_id: &str, reason: &str) -> ServiceResult<OrderReceipt> {
        self.reverse(order_id, user_id, reason, Reversal::Return).await
    }

    async fn reverse(&self, order_id: &str, user_id: &str, reason: &str, kind: Reversal) -> ServiceResult<OrderReceipt> {
        let result = self.try_reverse(order_id, user_id, reason, kind).await;
        if let Err(e) = &result {
            log_rejection(kind.operation(), e);
        }
        result
    }

    async fn try_reverse(&self, order_id: &str, user_id: &str, reason: &str, kind: Reversal) -> ServiceResult<OrderReceipt> {
        let reason = validate_reason(reason)?;
        let now = Utc::now();
        let (from, to, payment_status, movement_reason, action) = kind.plan();

        let mut tx = self.db.pool().begin().await?;

        orders::transition(&mut tx, order_id, from, to, kind.operation(), now).await?;

        let lines = orders::item_quantities(&mut tx, order_id).await?;
        stock::restock(
            &mut tx,
            &lines,
            MovementContext {
                reason: movement_reason,
                order_id: Some(order_id),
                user_id: Some(user_id),
                at: now,
            },
        )
        .await?;

        orders::set_payment_status(&mut tx, order_id, payment_status, None, now).await?;
        let receipt = load_required(&mut tx, order_id).await?;

        tx.commit().await?;

        info!(
            order_number = %receipt.order.order_number,
            status = %receipt.order.status,
            "Order reversed"
        );

        self.audit.record(
            AuditEntry::new(action, entity::ORDER, order_id)
                .user(Some(user_id))
                .old_value(&json!({ "status": from }))
                .new_value(&json!({
                    "status": to,
                    "paymentStatus": payment_status,
                    "total": receipt.order.total(),
                    "restockedLines": lines.len(),
                }))
                .reason(Some(reason.as_str())),
        );

        Ok(receipt)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn get_receipt(&self, order_id: &str) -> ServiceResult<OrderReceipt> {
        self.db
            .orders()
            .get_receipt(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }

    pub async fn get_receipt_by_number(&self, order_number: &str) -> ServiceResult<OrderReceipt> {
        self.db
            .orders()
            .get_receipt_by_number(order_number)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_number.to_string()).into())
    }

    pub async fn recent_orders(&self, limit: i64) -> ServiceResult<Vec<Order>> {
        Ok(self.db.orders().list_recent(limit).await?)
    }
}

// =============================================================================
// Helpers
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Reversal {
    Cancel,
    Return,
}

impl Reversal {
    fn operation(self) -> &'static str {
        match self {
            Reversal::Cancel => "cancel",
            Reversal::Return => "return",
        }
    }

    /// (from, to, payment status, movement reason, audit action)
    fn plan(self) -> (OrderStatus, OrderStatus, PaymentStatus, &'static str, AuditAction) {
        match self {
            Reversal::Cancel => (
                OrderStatus::Pending,
                OrderStatus::Cancelled,
                PaymentStatus::Voided,
                REASON_CANCEL,
                AuditAction::OrderCancel,
            ),
            Reversal::Return => (
                OrderStatus::Completed,
                OrderStatus::Returned,
                PaymentStatus::Refunded,
                REASON_RETURN,
                AuditAction::OrderReturn,
            ),
        }
    }
}

/// Builds the item rows for one request line.
///
/// A line that was allocated serial units becomes one item per unit, each
/// with quantity 1, so every item carries its own serial and warranty.
fn order_items(
    order_id: &str,
    line: &ValidatedLine,
    reservation: &Reservation,
    unit_price: Money,
    now: DateTime<Utc>,
) -> Vec<OrderItem> {
    let product = &reservation.product;
    let warranty_expires_at = product
        .warranty_months
        .and_then(|m| u32::try_from(m).ok())
        .and_then(|m| now.checked_add_months(Months::new(m)));

    let item = |quantity: i64, serial_number: Option<String>| OrderItem {
        id: Uuid::new_v4().to_string(),
        order_id: order_id.to_string(),
        product_id: product.id.clone(),
        name_snapshot: product.name.clone(),
        sku_snapshot: product.sku.clone(),
        quantity,
        unit_price_cents: unit_price.cents(),
        unit_cost_cents: product.cost_cents,
        line_total_cents: (unit_price * quantity).cents(),
        serial_number,
        warranty_expires_at,
        price_overridden: line.unit_price_override.is_some(),
        created_at: now,
    };

    if reservation.serials.is_empty() {
        vec![item(line.quantity, None)]
    } else {
        reservation
            .serials
            .iter()
            .map(|serial| item(1, Some(serial.clone())))
            .collect()
    }
}

/// Prices one line and adds it to `subtotal`, returning
/// `(line_total, new_subtotal)`. Amounts that overflow are refused against
/// the line.
fn add_line(subtotal: Money, unit_price: Money, quantity: i64, index: usize) -> ServiceResult<(Money, Money)> {
    unit_price
        .checked_mul(quantity)
        .and_then(|line_total| subtotal.checked_add(line_total).map(|sum| (line_total, sum)))
        .ok_or_else(|| {
            ServiceError::from(ValidationError::AmountTooLarge {
                field: "lineTotal".to_string(),
            })
            .at(index)
        })
}

async fn load_required(conn: &mut SqliteConnection, order_id: &str) -> ServiceResult<OrderReceipt> {
    orders::load_receipt(conn, order_id)
        .await?
        .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
}

fn log_rejection(operation: &str, e: &ServiceError) {
    if e.category() == ErrorCategory::Persistence {
        error!(operation, error = %e, "Order operation failed");
    } else {
        warn!(operation, code = e.code(), item_index = ?e.item_index, error = %e, "Order operation rejected");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::audit::AuditFilter;
    use crate::test_support::{
        customer, insert_discount, insert_product, insert_serialized, insert_tax, product, test_db,
    };
    use chrono::TimeZone;
    use crate::DbConfig;
    use meridian_core::checkout::OrderLineRequest;
    use meridian_core::{DiscountType, MovementType, PaymentMethod, SerialStatus, DEFAULT_ORDER_PREFIX};

    fn service(db: &Database) -> CheckoutService {
        CheckoutService::new(
            db.clone(),
            AuditRecorder::new(db.audit_logs()),
            Arc::new(OrderNumberGenerator::new(DEFAULT_ORDER_PREFIX)),
        )
    }

    fn line(product_id: &str, quantity: i64) -> OrderLineRequest {
        OrderLineRequest {
            product_id: product_id.to_string(),
            quantity,
            serial_number: None,
            unit_price_override: None,
        }
    }

    fn request(items: Vec<OrderLineRequest>, method: PaymentMethod) -> CreateOrderRequest {
        CreateOrderRequest {
            items,
            customer_id: None,
            agent_id: None,
            coupon_code: None,
            manual_discount: None,
            payment_method: method,
            amount_tendered: None,
            payment_reference: None,
            notes: None,
        }
    }

    async fn stock_of(db: &Database, id: &str) -> i64 {
        db.products().get_by_id(id).await.unwrap().unwrap().stock_quantity
    }

    #[tokio::test]
    async fn test_two_phones_at_eighteen_percent() {
        let db = test_db().await;
        insert_tax(&db, "VAT", 1800).await;
        let phone = insert_product(&db, "PHN-A15", 50_000, 5).await;
        let svc = service(&db);

        let mut req = request(vec![line(&phone.id, 2)], PaymentMethod::Cash);
        req.amount_tendered = Some(Money::from_cents(120_000));

        let receipt = svc.create_order(req, Some("cashier-1")).await.unwrap();

        assert_eq!(receipt.order.subtotal_cents, 100_000);
        assert_eq!(receipt.order.discount_cents, 0);
        assert_eq!(receipt.order.tax_cents, 18_000);
        assert_eq!(receipt.order.total_cents, 118_000);
        assert_eq!(receipt.order.status, OrderStatus::Completed);
        assert!(receipt.order.completed_at.is_some());
        assert_eq!(receipt.order.agent_id.as_deref(), Some("cashier-1"));
        assert!(receipt.order.order_number.starts_with("ORD-"));

        assert_eq!(receipt.payment.status, PaymentStatus::Paid);
        assert_eq!(receipt.payment.amount_cents, 118_000);
        assert_eq!(receipt.payment.change_cents, 2_000);

        assert_eq!(receipt.items.len(), 1);
        assert_eq!(receipt.items[0].line_total_cents, 100_000);
        assert_eq!(receipt.items[0].name_snapshot, "PHN-A15");

        assert_eq!(stock_of(&db, &phone.id).await, 3);

        let moves = db.stock().movements_for_order(&receipt.order.id).await.unwrap();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].movement_type, MovementType::Out);
        assert_eq!(moves[0].quantity, -2);

        // stored receipt matches the returned one
        let stored = svc.get_receipt(&receipt.order.id).await.unwrap();
        assert_eq!(stored.order.total_cents, 118_000);
        assert_eq!(stored.items.len(), 1);

        let by_number = svc.get_receipt_by_number(&receipt.order.order_number).await.unwrap();
        assert_eq!(by_number.order.id, receipt.order.id);
    }

    #[tokio::test]
    async fn test_coupon_capped_at_max_discount() {
        let db = test_db().await;
        let item = insert_product(&db, "LAP-1", 100_000, 2).await;
        insert_discount(&db, "SAVE10", DiscountType::Percentage, 10, None, Some(5_000)).await;
        let svc = service(&db);

        let mut req = request(vec![line(&item.id, 1)], PaymentMethod::Card);
        req.coupon_code = Some("save10".into());

        let receipt = svc.create_order(req, None).await.unwrap();
        assert_eq!(receipt.order.discount_cents, 5_000);
        assert_eq!(receipt.order.total_cents, 95_000);
        assert!(receipt.order.discount_id.is_some());
    }

    #[tokio::test]
    async fn test_coupon_below_min_purchase_rolls_back() {
        let db = test_db().await;
        let item = insert_product(&db, "CBL-USBC", 1_500, 10).await;
        insert_discount(&db, "BIG", DiscountType::Fixed, 1_000, Some(200_000), None).await;
        let svc = service(&db);

        let mut req = request(vec![line(&item.id, 2)], PaymentMethod::Cash);
        req.coupon_code = Some("BIG".into());

        let err = svc.create_order(req, None).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Policy);
        assert!(matches!(err.rule(), Some(CoreError::MinPurchaseNotMet { .. })));

        assert_eq!(stock_of(&db, &item.id).await, 10);
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_over_reservation_leaves_stock_unchanged() {
        let db = test_db().await;
        let first = insert_product(&db, "A-1", 1_000, 5).await;
        let second = insert_product(&db, "B-1", 2_000, 3).await;
        let svc = service(&db);

        let req = request(vec![line(&first.id, 1), line(&second.id, 10)], PaymentMethod::Cash);
        let err = svc.create_order(req, None).await.unwrap_err();

        assert_eq!(err.item_index, Some(1));
        assert!(matches!(
            err.rule(),
            Some(CoreError::InsufficientStock { available: 3, requested: 10, .. })
        ));

        // the first line's reservation was rolled back too
        assert_eq!(stock_of(&db, &first.id).await, 5);
        assert_eq!(stock_of(&db, &second.id).await, 3);
        assert!(db.stock().movements_for_product(&first.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_short_cash_payment_persists_nothing() {
        let db = test_db().await;
        insert_tax(&db, "VAT", 1800).await;
        let phone = insert_product(&db, "PHN-A15", 50_000, 5).await;
        let svc = service(&db);

        let mut req = request(vec![line(&phone.id, 2)], PaymentMethod::Cash);
        req.amount_tendered = Some(Money::from_cents(100_000));

        let err = svc.create_order(req, None).await.unwrap_err();
        assert!(matches!(
            err.rule(),
            Some(CoreError::InsufficientPayment { .. })
        ));
        assert_eq!(db.orders().count().await.unwrap(), 0);
        assert_eq!(stock_of(&db, &phone.id).await, 5);
    }

    #[tokio::test]
    async fn test_non_cash_tendered_is_ignored() {
        let db = test_db().await;
        let item = insert_product(&db, "A-1", 1_000, 5).await;

        let mut req = request(vec![line(&item.id, 1)], PaymentMethod::Card);
        req.amount_tendered = Some(Money::from_cents(1));

        let receipt = service(&db).create_order(req, None).await.unwrap();
        assert_eq!(receipt.payment.tendered_cents, 1_000);
        assert_eq!(receipt.payment.change_cents, 0);
    }

    #[tokio::test]
    async fn test_unknown_customer_rolls_back() {
        let db = test_db().await;
        let item = insert_product(&db, "A-1", 1_000, 5).await;

        let mut req = request(vec![line(&item.id, 1)], PaymentMethod::Cash);
        req.customer_id = Some(Uuid::new_v4().to_string());

        let err = service(&db).create_order(req, None).await.unwrap_err();
        assert!(matches!(err.rule(), Some(CoreError::CustomerNotFound(_))));
        assert_eq!(stock_of(&db, &item.id).await, 5);
    }

    #[tokio::test]
    async fn test_known_customer_attached() {
        let db = test_db().await;
        let item = insert_product(&db, "A-1", 1_000, 5).await;
        let c = customer("Amina Njoroge", Some("+254700000001"));
        db.customers().insert(&c).await.unwrap();

        let mut req = request(vec![line(&item.id, 1)], PaymentMethod::Cash);
        req.customer_id = Some(c.id.clone());

        let receipt = service(&db).create_order(req, None).await.unwrap();
        assert_eq!(receipt.order.customer_id.as_deref(), Some(c.id.as_str()));
    }

    #[tokio::test]
    async fn test_invalid_request_touches_nothing() {
        let db = test_db().await;
        let err = service(&db)
            .create_order(request(vec![], PaymentMethod::Cash), None)
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_last_unit_race_single_connection() {
        let db = test_db().await;
        let item = insert_product(&db, "LAST-1", 10_000, 1).await;
        let svc = service(&db);

        let (a, b) = tokio::join!(
            svc.create_order(request(vec![line(&item.id, 1)], PaymentMethod::Cash), None),
            svc.create_order(request(vec![line(&item.id, 1)], PaymentMethod::Cash), None),
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert!(matches!(loser.rule(), Some(CoreError::InsufficientStock { .. })));
        assert_eq!(stock_of(&db, &item.id).await, 0);
    }

    #[tokio::test]
    async fn test_last_unit_race_on_file_database() {
        let path = std::env::temp_dir().join(format!("meridian-race-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(4)).await.unwrap();
        let item = insert_product(&db, "LAST-1", 10_000, 1).await;
        let svc = service(&db);

        let (a, b) = tokio::join!(
            svc.create_order(request(vec![line(&item.id, 1)], PaymentMethod::Cash), None),
            svc.create_order(request(vec![line(&item.id, 1)], PaymentMethod::Cash), None),
        );

        let ok = [&a, &b].iter().filter(|r| r.is_ok()).count();
        let final_stock = stock_of(&db, &item.id).await;
        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }

        assert_eq!(ok, 1);
        assert_eq!(final_stock, 0);
    }

    #[tokio::test]
    async fn test_serialized_units_allocated_oldest_first() {
        let db = test_db().await;
        let phone = insert_serialized(&db, "PHN-X1", 90_000, &["IMEI-1", "IMEI-2", "IMEI-3"]).await;

        let receipt = service(&db)
            .create_order(request(vec![line(&phone.id, 2)], PaymentMethod::Cash), None)
            .await
            .unwrap();

        assert_eq!(receipt.items.len(), 2);
        let serials: Vec<_> = receipt.items.iter().map(|i| i.serial_number.clone().unwrap()).collect();
        assert_eq!(serials, vec!["IMEI-1", "IMEI-2"]);
        assert!(receipt.items.iter().all(|i| i.quantity == 1 && i.warranty_expires_at.is_some()));
        assert_eq!(receipt.order.subtotal_cents, 180_000);

        // stock and AVAILABLE unit count stay equal
        assert_eq!(stock_of(&db, &phone.id).await, 1);
        assert_eq!(db.stock().available_serial_count(&phone.id).await.unwrap(), 1);

        let unit = db.stock().get_serial("IMEI-1").await.unwrap().unwrap();
        assert_eq!(unit.status, SerialStatus::Sold);
        assert_eq!(unit.order_id.as_deref(), Some(receipt.order.id.as_str()));
    }

    #[tokio::test]
    async fn test_sold_serial_cannot_be_sold_twice() {
        let db = test_db().await;
        let phone = insert_serialized(&db, "PHN-X1", 90_000, &["IMEI-1", "IMEI-2"]).await;
        let svc = service(&db);

        let mut wanted = line(&phone.id, 1);
        wanted.serial_number = Some("IMEI-2".into());

        svc.create_order(request(vec![wanted.clone()], PaymentMethod::Cash), None)
            .await
            .unwrap();
        let err = svc
            .create_order(request(vec![wanted], PaymentMethod::Cash), None)
            .await
            .unwrap_err();

        assert_eq!(err.item_index, Some(0));
        assert!(matches!(err.rule(), Some(CoreError::SerialNotAvailable { .. })));
        assert_eq!(stock_of(&db, &phone.id).await, 1);
    }

    #[tokio::test]
    async fn test_mobile_money_pending_until_confirmed() {
        let db = test_db().await;
        let item = insert_product(&db, "A-1", 1_000, 5).await;
        let svc = service(&db);

        let mut req = request(vec![line(&item.id, 1)], PaymentMethod::MobileMoney);
        req.payment_reference = Some("MM-123".into());
        let receipt = svc.create_order(req, None).await.unwrap();

        assert_eq!(receipt.order.status, OrderStatus::Pending);
        assert_eq!(receipt.payment.status, PaymentStatus::Pending);
        assert!(receipt.order.completed_at.is_none());

        let confirmed = svc.confirm_payment(&receipt.order.id, None).await.unwrap();
        assert_eq!(confirmed.order.status, OrderStatus::Completed);
        assert_eq!(confirmed.payment.status, PaymentStatus::Paid);
        assert!(confirmed.order.completed_at.is_some());
        // reference kept when none given
        assert_eq!(confirmed.payment.reference.as_deref(), Some("MM-123"));

        let err = svc.confirm_payment(&receipt.order.id, None).await.unwrap_err();
        assert!(matches!(err.rule(), Some(CoreError::InvalidOrderStatus { .. })));
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_and_serials() {
        let db = test_db().await;
        let phone = insert_serialized(&db, "PHN-X1", 90_000, &["IMEI-1"]).await;
        let cable = insert_product(&db, "CBL-USBC", 1_500, 10).await;
        let svc = service(&db);

        let receipt = svc
            .create_order(
                request(vec![line(&phone.id, 1), line(&cable.id, 3)], PaymentMethod::MobileMoney),
                Some("cashier-1"),
            )
            .await
            .unwrap();
        assert_eq!(stock_of(&db, &phone.id).await, 0);

        let cancelled = svc
            .cancel_order(&receipt.order.id, "manager-1", "customer walked away")
            .await
            .unwrap();
        assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.payment.status, PaymentStatus::Voided);

        assert_eq!(stock_of(&db, &phone.id).await, 1);
        assert_eq!(stock_of(&db, &cable.id).await, 10);
        let unit = db.stock().get_serial("IMEI-1").await.unwrap().unwrap();
        assert_eq!(unit.status, SerialStatus::Available);
        assert!(unit.order_id.is_none());

        let moves = db.stock().movements_for_order(&receipt.order.id).await.unwrap();
        let restocks: Vec<_> = moves.iter().filter(|m| m.movement_type == MovementType::In).collect();
        assert_eq!(restocks.len(), 2);
        assert!(restocks.iter().all(|m| m.reason == "CANCEL"));

        svc.audit.flush().await;
        let logs = db.audit_logs().list(&AuditFilter::default(), 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, AuditAction::OrderCancel);
        assert_eq!(logs[0].reason.as_deref(), Some("customer walked away"));
    }

    #[tokio::test]
    async fn test_return_only_from_completed() {
        let db = test_db().await;
        let item = insert_product(&db, "A-1", 1_000, 5).await;
        let svc = service(&db);

        let receipt = svc
            .create_order(request(vec![line(&item.id, 2)], PaymentMethod::Cash), None)
            .await
            .unwrap();

        let err = svc
            .cancel_order(&receipt.order.id, "manager-1", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err.rule(), Some(CoreError::InvalidOrderStatus { .. })));

        let returned = svc
            .return_order(&receipt.order.id, "manager-1", "faulty unit")
            .await
            .unwrap();
        assert_eq!(returned.order.status, OrderStatus::Returned);
        assert_eq!(returned.payment.status, PaymentStatus::Refunded);
        assert_eq!(stock_of(&db, &item.id).await, 5);

        let err = svc
            .return_order(&receipt.order.id, "manager-1", "again")
            .await
            .unwrap_err();
        assert!(matches!(err.rule(), Some(CoreError::InvalidOrderStatus { .. })));

        let err = svc
            .return_order(&Uuid::new_v4().to_string(), "manager-1", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err.rule(), Some(CoreError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_reversal_requires_reason() {
        let db = test_db().await;
        let err = service(&db)
            .cancel_order(&Uuid::new_v4().to_string(), "manager-1", "  ")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[tokio::test]
    async fn test_price_override_is_audited() {
        let db = test_db().await;
        let phone = insert_product(&db, "PHN-A15", 50_000, 5).await;
        let svc = service(&db);

        svc.create_order(request(vec![line(&phone.id, 1)], PaymentMethod::Cash), None)
            .await
            .unwrap();

        let mut discounted = line(&phone.id, 1);
        discounted.unit_price_override = Some(Money::from_cents(45_000));
        let receipt = svc
            .create_order(request(vec![discounted], PaymentMethod::Cash), Some("manager-1"))
            .await
            .unwrap();

        assert!(receipt.items[0].price_overridden);
        assert_eq!(receipt.order.subtotal_cents, 45_000);

        svc.audit.flush().await;
        let logs = db.audit_logs().list(&AuditFilter::default(), 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, AuditAction::OrderCreate);
        assert_eq!(logs[0].entity_id, receipt.order.id);
        assert_eq!(logs[0].user_id.as_deref(), Some("manager-1"));
    }

    #[tokio::test]
    async fn test_manual_discount_clamped_and_audited() {
        let db = test_db().await;
        let item = insert_product(&db, "A-1", 1_000, 5).await;
        let svc = service(&db);

        let mut req = request(vec![line(&item.id, 1)], PaymentMethod::Cash);
        req.manual_discount = Some(Money::from_cents(5_000));

        let receipt = svc.create_order(req, None).await.unwrap();
        assert_eq!(receipt.order.discount_cents, 1_000);
        assert_eq!(receipt.order.total_cents, 0);

        svc.audit.flush().await;
        assert_eq!(db.audit_logs().list(&AuditFilter::default(), 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_quote_matches_checkout_without_writing() {
        let db = test_db().await;
        insert_tax(&db, "VAT", 1800).await;
        insert_discount(&db, "SAVE10", DiscountType::Percentage, 10, None, Some(5_000)).await;
        let phone = insert_product(&db, "PHN-A15", 50_000, 5).await;
        let svc = service(&db);

        let quote = svc
            .quote(QuoteRequest {
                items: vec![line(&phone.id, 2)],
                coupon_code: Some("SAVE10".into()),
                manual_discount: None,
            })
            .await
            .unwrap();

        assert_eq!(stock_of(&db, &phone.id).await, 5);
        assert_eq!(quote.lines[0].line_total.cents(), 100_000);

        let mut req = request(vec![line(&phone.id, 2)], PaymentMethod::Card);
        req.coupon_code = Some("SAVE10".into());
        let receipt = svc.create_order(req, None).await.unwrap();

        assert_eq!(quote.totals.total.cents(), receipt.order.total_cents);
        assert_eq!(quote.totals.tax.cents(), receipt.order.tax_cents);
        assert_eq!(quote.discount_id, receipt.order.discount_id);
    }

    #[tokio::test]
    async fn test_quote_reports_shortage_with_index() {
        let db = test_db().await;
        let item = insert_product(&db, "A-1", 1_000, 1).await;

        let err = service(&db)
            .quote(QuoteRequest {
                items: vec![line(&item.id, 1), line(&item.id, 4)],
                coupon_code: None,
                manual_discount: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.item_index, Some(1));
    }

    #[tokio::test]
    async fn test_recent_orders_newest_first() {
        let db = test_db().await;
        let item = insert_product(&db, "A-1", 1_000, 5).await;
        let svc = service(&db);

        let first = svc
            .create_order(request(vec![line(&item.id, 1)], PaymentMethod::Cash), None)
            .await
            .unwrap();
        let second = svc
            .create_order(request(vec![line(&item.id, 1)], PaymentMethod::Cash), None)
            .await
            .unwrap();

        let recent = svc.recent_orders(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, second.order.id);
        assert_eq!(recent[1].id, first.order.id);
        assert_ne!(first.order.order_number, second.order.order_number);
    }

    // -------------------------------------------------------------------------
    // Amount overflow
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_oversized_price_override_rejected() {
        let db = test_db().await;
        let cable = insert_product(&db, "CBL-USBC", 1_500, 10).await;
        let svc = service(&db);

        let mut l = line(&cable.id, 2);
        l.unit_price_override = Some(Money::from_cents(i64::MAX / 2 + 1));

        let err = svc
            .create_order(request(vec![l], PaymentMethod::Cash), None)
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert_eq!(err.item_index, Some(0));
        assert_eq!(stock_of(&db, &cable.id).await, 10);
    }

    #[tokio::test]
    async fn test_line_total_overflow_rolls_back_with_index() {
        let db = test_db().await;
        let cable = insert_product(&db, "CBL-USBC", 1_500, 10).await;
        // written directly, so the price never went through validation
        let mut lot = product("LOT-1", "Clearance lot", 1_000, 5);
        lot.price_cents = i64::MAX / 2 + 1;
        db.products().insert(&lot).await.unwrap();
        let svc = service(&db);

        let req = request(vec![line(&cable.id, 1), line(&lot.id, 2)], PaymentMethod::Card);
        let err = svc.create_order(req, None).await.unwrap_err();

        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(matches!(
            err.rule(),
            Some(CoreError::Validation(ValidationError::AmountTooLarge { .. }))
        ));
        assert_eq!(err.item_index, Some(1));
        assert_eq!(stock_of(&db, &cable.id).await, 10);
        assert_eq!(stock_of(&db, &lot.id).await, 5);
        assert_eq!(db.orders().count().await.unwrap(), 0);

        let err = svc
            .quote(QuoteRequest {
                items: vec![line(&lot.id, 2)],
                coupon_code: None,
                manual_discount: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.item_index, Some(0));
    }

    // -------------------------------------------------------------------------
    // Order numbers
    // -------------------------------------------------------------------------

    fn bare_order(at: DateTime<Utc>) -> Order {
        Order {
            id: Uuid::new_v4().to_string(),
            order_number: String::new(),
            status: OrderStatus::Pending,
            subtotal_cents: 0,
            discount_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            discount_id: None,
            customer_id: None,
            agent_id: None,
            notes: None,
            created_at: at,
            updated_at: at,
            completed_at: None,
        }
    }

    fn service_numbering_from_zero(db: &Database) -> CheckoutService {
        CheckoutService::new(
            db.clone(),
            AuditRecorder::new(db.audit_logs()),
            Arc::new(OrderNumberGenerator::with_start("ORD", 0)),
        )
    }

    #[tokio::test]
    async fn test_taken_order_number_is_regenerated() {
        let db = test_db().await;
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();
        let first = service_numbering_from_zero(&db);
        let second = service_numbering_from_zero(&db);

        let mut tx = db.pool().begin().await.unwrap();
        let mut a = bare_order(at);
        first.insert_with_fresh_number(&mut tx, &mut a).await.unwrap();
        let mut b = bare_order(at);
        second.insert_with_fresh_number(&mut tx, &mut b).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(a.order_number, "ORD-20261016093000-000000");
        // both counters started at 0; the second one skipped the taken number
        assert_eq!(b.order_number, "ORD-20261016093000-000001");
        assert_eq!(db.orders().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_order_number_attempts_exhausted() {
        let db = test_db().await;
        let item = insert_product(&db, "CBL-USBC", 1_500, 10).await;
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();

        let taken = OrderNumberGenerator::with_start("ORD", 0);
        let mut tx = db.pool().begin().await.unwrap();
        for _ in 0..MAX_ORDER_NUMBER_ATTEMPTS {
            let mut row = bare_order(at);
            row.order_number = taken.next_at(at);
            orders::insert_order(&mut tx, &row).await.unwrap();
        }
        tx.commit().await.unwrap();

        let svc = service_numbering_from_zero(&db);
        let mut tx = db.pool().begin().await.unwrap();
        stock::reserve(
            &mut tx,
            &item.id,
            2,
            None,
            MovementContext {
                reason: REASON_SALE,
                order_id: None,
                user_id: Some("cashier-1"),
                at,
            },
        )
        .await
        .unwrap();

        let mut record = bare_order(at);
        let err = svc.insert_with_fresh_number(&mut tx, &mut record).await.unwrap_err();
        drop(tx);

        assert_eq!(err.code(), "ORDER_NUMBER_COLLISION");
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert_eq!(stock_of(&db, &item.id).await, 10);
        assert_eq!(db.orders().count().await.unwrap(), MAX_ORDER_NUMBER_ATTEMPTS as i64);
    }
}
