use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use time::OffsetDateTime;
use tracing::warn;

use super::{claims::Claims, jwt::JwtKeys};
use crate::error::AppError;

/// Caller identity for protected handlers: the bearer token and its decoded claims.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub token: String,
    pub claims: Claims,
}

/// Pulls the token out of the `Authorization` header.
///
/// The first whitespace-separated segment is the token, unless that segment
/// is the `Bearer` scheme, in which case the token is the segment after it.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers.get(AUTHORIZATION).ok_or(AppError::MissingHeader)?;
    let value = value
        .to_str()
        .map_err(|e| AppError::Unexpected(format!("Authorization header: {e}")))?;

    let mut segments = value.split_whitespace();
    let token = match segments.next() {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer") => segments.next(),
        first => first,
    };
    token.ok_or(AppError::MissingToken)
}

pub fn authorize(
    headers: &HeaderMap,
    keys: &JwtKeys,
    now: OffsetDateTime,
) -> Result<AuthUser, AppError> {
    let token = bearer_token(headers)?;
    let claims = keys.verify_at(token, now).map_err(|e| {
        warn!(reason = %e, "token rejected");
        AppError::Token(e)
    })?;
    Ok(AuthUser {
        token: token.to_string(),
        claims,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let keys = JwtKeys::from_ref(state);
        let user = authorize(&parts.headers, &keys, OffsetDateTime::now_utc())?;
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}
