//! HTTP error mapping.
//!
//! Every failure leaves the API as
//! `{ "category", "code", "message", "itemIndex"? }` with the status taken
//! from the category. Persistence failures are logged in full and answered
//! with a generic message.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use meridian_core::{ErrorCategory, ValidationError};
use meridian_db::{DbError, ServiceError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

const PERSISTENCE_MESSAGE: &str = "The request could not be completed due to a storage error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Body or query string that could not be decoded.
    #[error("Malformed request: {0}")]
    Malformed(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    category: ErrorCategory,
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    item_index: Option<usize>,
}

impl ApiError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Service(e) => e.category(),
            ApiError::Validation(_) | ApiError::Malformed(_) => ErrorCategory::Validation,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Service(e) => e.code(),
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Malformed(_) => "MALFORMED_REQUEST",
        }
    }
}

pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Conflict => StatusCode::CONFLICT,
        ErrorCategory::Policy => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let category = self.category();

        let message = if category == ErrorCategory::Persistence {
            error!(error = %self, "Request failed with a persistence error");
            PERSISTENCE_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        let item_index = match &self {
            ApiError::Service(e) => e.item_index,
            _ => None,
        };

        let body = ErrorBody {
            category,
            code: self.code(),
            message,
            item_index,
        };

        (status_for(category), Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::Service(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Malformed(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Malformed(rejection.body_text())
    }
}
