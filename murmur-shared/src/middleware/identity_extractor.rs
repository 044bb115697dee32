use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::errors::{AppError, ErrorCode};
use crate::types::identity::{Caller, USER_IDENTITY_HEADER};

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers)
    }
}

/// Resolves the caller from the identity header. Shared with the socket handshake.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, AppError> {
    let raw = headers
        .get(USER_IDENTITY_HEADER)
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "missing user identity header"))?
        .to_str()
        .map_err(|_| AppError::new(ErrorCode::Unauthorized, "invalid user identity header"))?;

    let id = Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::new(ErrorCode::Unauthorized, "user identity must be a uuid"))?;

    Ok(Caller::new(id))
}
