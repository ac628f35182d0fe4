//! Caller identity.
//!
//! Authentication happens at the upstream gateway, which verifies the JWT
//! and forwards the subject as `x-user-id`. This service only parses the
//! header; requests arriving without it are rejected.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing x-user-id header".to_string()))?;

        let id = Uuid::parse_str(raw)
            .map_err(|_| AppError::Unauthorized("invalid x-user-id header".to_string()))?;

        Ok(UserId(id))
    }
}
