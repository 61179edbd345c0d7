//! Shared application state.

use std::sync::Arc;

use meridian_core::order_number::OrderNumberGenerator;
use meridian_db::{AuditRecorder, CheckoutService, Database, InventoryService, PricingService};

use crate::config::ApiConfig;

/// Everything a handler needs, shared behind an `Arc`.
#[derive(Debug)]
pub struct AppState {
    pub db: Database,
    pub checkout: CheckoutService,
    pub inventory: InventoryService,
    pub pricing: PricingService,
    pub audit: AuditRecorder,
    pub config: ApiConfig,
}

impl AppState {
    /// Wires the services onto one database and one audit recorder.
    pub fn new(db: Database, config: ApiConfig) -> Arc<Self> {
        let audit = AuditRecorder::new(db.audit_logs());
        let numbers = Arc::new(OrderNumberGenerator::new(config.store.order_prefix.clone()));

        Arc::new(AppState {
            checkout: CheckoutService::new(db.clone(), audit.clone(), numbers),
            inventory: InventoryService::new(db.clone(), audit.clone()),
            pricing: PricingService::new(db.clone(), audit.clone()),
            audit,
            db,
            config,
        })
    }
}

pub type SharedState = Arc<AppState>;
