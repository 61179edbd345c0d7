//! # Database & Service Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error ──► DbError ─────────┐                                     │
//! │                                   ├──► ServiceError { item_index }     │
//! │  CoreError (business rule) ───────┤         │                           │
//! │  RequestRejected (validation) ────┘         ▼                           │
//! │                                       ApiError (meridian-api)          │
//! │                                       { category, code, message,       │
//! │                                         itemIndex? }                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use meridian_core::checkout::RequestRejected;
use meridian_core::{CoreError, ErrorCategory};
use thiserror::Error;

// =============================================================================
// DbError
// =============================================================================

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate SKU, barcode, coupon code or serial number
    /// - Order number collision (retried by the checkout service)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (negative stock, inconsistent totals).
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// All connections in use past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether this is a UNIQUE violation on the given `table.column`.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field == column)
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DbError::NotFound { .. } => ErrorCategory::NotFound,
            DbError::UniqueViolation { .. } => ErrorCategory::Conflict,
            _ => ErrorCategory::Persistence,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → classified by SQLite constraint message
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// ServiceError
// =============================================================================

/// What went wrong inside a service operation.
#[derive(Debug, Error)]
pub enum ServiceFailure {
    /// A business rule refused the operation.
    #[error(transparent)]
    Rule(#[from] CoreError),

    /// The database failed.
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Error returned by the checkout, inventory and pricing services.
///
/// `item_index` points at the request line that caused the failure, when
/// the failure is attributable to one.
#[derive(Debug, Error)]
#[error("{failure}")]
pub struct ServiceError {
    pub item_index: Option<usize>,
    pub failure: ServiceFailure,
}

impl ServiceError {
    /// Tags the error with a request line index.
    pub fn at(mut self, index: usize) -> Self {
        self.item_index = Some(index);
        self
    }

    pub fn category(&self) -> ErrorCategory {
        match &self.failure {
            ServiceFailure::Rule(e) => e.category(),
            ServiceFailure::Db(e) => e.category(),
        }
    }

    /// Machine-readable code, e.g. `INSUFFICIENT_STOCK` or `DATABASE_ERROR`.
    pub fn code(&self) -> &'static str {
        match &self.failure {
            ServiceFailure::Rule(e) => e.code(),
            ServiceFailure::Db(DbError::NotFound { .. }) => "NOT_FOUND",
            ServiceFailure::Db(DbError::UniqueViolation { .. }) => "DUPLICATE",
            ServiceFailure::Db(_) => "DATABASE_ERROR",
        }
    }

    /// The business rule error, if that is what this is.
    pub fn rule(&self) -> Option<&CoreError> {
        match &self.failure {
            ServiceFailure::Rule(e) => Some(e),
            ServiceFailure::Db(_) => None,
        }
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        ServiceError {
            item_index: None,
            failure: ServiceFailure::Rule(err),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        ServiceError {
            item_index: None,
            failure: ServiceFailure::Db(err),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

impl From<meridian_core::ValidationError> for ServiceError {
    fn from(err: meridian_core::ValidationError) -> Self {
        CoreError::from(err).into()
    }
}

impl From<RequestRejected> for ServiceError {
    fn from(err: RequestRejected) -> Self {
        ServiceError {
            item_index: err.item_index,
            failure: ServiceFailure::Rule(CoreError::Validation(err.source)),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
