//! # Audit Recorder
//!
//! Fire-and-forget audit trail for mutations with business-rule
//! implications (price overrides, cancellations, returns, stock and pricing
//! changes).
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  service commits its transaction                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  recorder.record(entry) ──► tokio::spawn ──► audit_logs INSERT          │
//! │       │                                        │                        │
//! │       │ returns immediately                    ├── ok: debug!           │
//! │       ▼                                        └── err: error! (only)   │
//! │  service returns to caller                                              │
//! │                                                                         │
//! │  flush() waits until every spawned append has finished (shutdown,      │
//! │  tests)                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An audit failure never reaches the caller and never undoes the business
//! operation that triggered it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error};
use uuid::Uuid;

use crate::repository::audit::AuditLogRepository;
use meridian_core::{AuditAction, AuditLog};

// =============================================================================
// Entry
// =============================================================================

/// An audit record before it gets an id and timestamp.
///
/// ```rust,ignore
/// let entry = AuditEntry::new(AuditAction::PriceChange, entity::PRODUCT, &product.id)
///     .user(user_id)
///     .old_value(&before)
///     .new_value(&after)
///     .reason("supplier price increase");
/// recorder.record(entry);
/// ```
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    pub user_id: Option<String>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub reason: Option<String>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, entity_type: &str, entity_id: &str) -> Self {
        AuditEntry {
            action,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            user_id: None,
            old_value: None,
            new_value: None,
            reason: None,
        }
    }

    pub fn user(mut self, user_id: Option<&str>) -> Self {
        self.user_id = user_id.map(str::to_string);
        self
    }

    /// Snapshot of the state before the change. Values that fail to
    /// serialize are logged and left out.
    pub fn old_value(mut self, value: &impl Serialize) -> Self {
        self.old_value = snapshot(value);
        self
    }

    pub fn new_value(mut self, value: &impl Serialize) -> Self {
        self.new_value = snapshot(value);
        self
    }

    pub fn reason(mut self, reason: Option<&str>) -> Self {
        self.reason = reason.map(str::to_string);
        self
    }

    fn into_log(self) -> AuditLog {
        AuditLog {
            id: Uuid::new_v4().to_string(),
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            user_id: self.user_id,
            old_value: self.old_value.map(|v| v.to_string()),
            new_value: self.new_value.map(|v| v.to_string()),
            reason: self.reason,
            created_at: Utc::now(),
        }
    }
}

fn snapshot(value: &impl Serialize) -> Option<serde_json::Value> {
    match serde_json::to_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            error!(error = %e, "Failed to serialize audit snapshot");
            None
        }
    }
}

// =============================================================================
// Recorder
// =============================================================================

#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Spawns audit appends off the request path.
///
/// Cheap to clone; clones share the in-flight counter so `flush` on any
/// clone waits for all of them.
#[derive(Debug, Clone)]
pub struct AuditRecorder {
    repo: AuditLogRepository,
    in_flight: Arc<InFlight>,
}

impl AuditRecorder {
    pub fn new(repo: AuditLogRepository) -> Self {
        AuditRecorder {
            repo,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Appends `entry` on a spawned task and returns at once.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn record(&self, entry: AuditEntry) -> JoinHandle<()> {
        let repo = self.repo.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let log = entry.into_log();

        in_flight.count.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            match repo.insert(&log).await {
                Ok(()) => debug!(action = ?log.action, entity_id = %log.entity_id, "Audit entry recorded"),
                Err(e) => error!(
                    error = %e,
                    action = ?log.action,
                    entity_type = %log.entity_type,
                    entity_id = %log.entity_id,
                    "Failed to record audit entry"
                ),
            }

            if in_flight.count.fetch_sub(1, Ordering::SeqCst) == 1 {
                in_flight.idle.notify_waiters();
            }
        })
    }

    /// Appends `entry` and waits for the append to finish. Errors are still
    /// only logged.
    pub async fn record_and_wait(&self, entry: AuditEntry) {
        if let Err(e) = self.record(entry).await {
            error!(error = %e, "Audit task did not complete");
        }
    }

    /// Waits until no append is in flight.
    pub async fn flush(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            tokio::pin!(notified);
            // register before checking so a notify between the check and
            // the await is not lost
            notified.as_mut().enable();

            if self.in_flight.count.load(Ordering::SeqCst) == 0 {
                return;
            }

            notified.await;
        }
    }

    pub fn pending(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }
}
