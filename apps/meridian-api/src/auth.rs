//! Acting-user extraction.
//!
//! Authentication happens upstream; the API trusts the `x-user-id` header
//! it is handed. Mutating routes take an [`ActingUser`] and so reject
//! requests that lack one.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use meridian_core::ValidationError;

use crate::error::ApiError;

pub const USER_HEADER: &str = "x-user-id";

/// Id of the staff member making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser(pub String);

impl ActingUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| ActingUser(value.to_string()))
            .ok_or_else(|| {
                ValidationError::Required {
                    field: USER_HEADER.to_string(),
                }
                .into()
            })
    }
}
