//! Custom Axum extractors.
//!
//! - `BearerToken`: the token from an `Authorization: Bearer <token>` header
//!
//! # Examples
//!
//! ```ignore
//! use loginapp_web::extractors::BearerToken;
//!
//! async fn profile(BearerToken(token): BearerToken) -> Result<Json<Profile>, AppError> {
//!     let claims = tokens.verify(&token).map_err(|_| AppError::unauthorized("Invalid token"))?;
//!     Ok(Json(load_profile(claims.user_id).await?))
//! }
//! ```

use crate::AppError;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

/// Bearer token from the `Authorization` header.
///
/// Rejects with 401 `Missing authorization` when the header is absent and
/// 401 `Invalid authorization format` when it is not `Bearer <token>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::unauthorized("Missing authorization"))?;

        parse_bearer(value.to_str().ok())
            .map(|token| Self(token.to_string()))
            .ok_or_else(|| AppError::unauthorized("Invalid authorization format"))
    }
}

fn parse_bearer(value: Option<&str>) -> Option<&str> {
    let mut parts = value?.split(' ');
    match (parts.next(), parts.next()) {
        (Some("Bearer"), Some(token)) if !token.is_empty() => Some(token),
        _ => None,
    }
}
