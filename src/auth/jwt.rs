use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, error};

use crate::{
    auth::claims::{Claims, TokenUser},
    state::AppState,
};

/// Lifetime of an access token. There is no refresh flow, so clients log in
/// again once it runs out.
pub const ACCESS_TOKEN_TTL: Duration = Duration::minutes(5);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("signing secret is empty or unusable")]
    Signing,
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
}

/// Signing and verification keys derived from the shared secret.
///
/// Built once at startup and cloned into requests. Key rotation would replace
/// the value held in [`AppState`]; nothing else reads the secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    has_secret: bool,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            has_secret: !secret.is_empty(),
        }
    }

    pub fn sign(&self, user: &TokenUser) -> Result<String, TokenError> {
        self.sign_at(user, OffsetDateTime::now_utc())
    }

    pub fn sign_at(&self, user: &TokenUser, now: OffsetDateTime) -> Result<String, TokenError> {
        if !self.has_secret {
            error!("refusing to sign jwt with an empty secret");
            return Err(TokenError::Signing);
        }
        let claims = Claims {
            user: user.clone(),
            iat: now.unix_timestamp(),
            exp: (now + ACCESS_TOKEN_TTL).unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            error!(error = %e, "jwt encode failed");
            TokenError::Signing
        })?;
        debug!(user_id = %user.id, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    /// Checks the signature, then the expiry against `now`.
    pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is compared below so the boundary is `now >= exp` and the clock is ours
        validation.validate_exp = false;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt decode failed");
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            }
        })?;

        if now.unix_timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        debug!(user_id = %data.claims.user.id, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user() -> TokenUser {
        TokenUser {
            id: Uuid::new_v4(),
            username: "y4nt0".into(),
            email: "yanto@yanto.com".into(),
        }
    }

    #[test]
    fn sign_and_verify_returns_same_user() {
        let keys = JwtKeys::from_secret("dev-secret");
        let user = user();
        let token = keys.sign(&user).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.user, user);
        assert_eq!(claims.exp - claims.iat, ACCESS_TOKEN_TTL.whole_seconds());
    }

    #[test]
    fn token_is_three_dot_separated_segments() {
        let keys = JwtKeys::from_secret("dev-secret");
        let token = keys.sign(&user()).expect("sign");
        assert_eq!(token.matches('.').count(), 2);
        assert!(token.split('.').all(|segment| !segment.is_empty()));
    }

    #[test]
    fn verify_rejects_other_secret() {
        let good = JwtKeys::from_secret("same-secret");
        let bad = JwtKeys::from_secret("other-secret");
        let token = good.sign(&user()).expect("sign");
        assert_eq!(bad.verify(&token).unwrap_err(), TokenError::InvalidSignature);
    }

    #[test]
    fn verify_rejects_token_past_ttl() {
        let keys = JwtKeys::from_secret("dev-secret");
        let issued = OffsetDateTime::now_utc();
        let token = keys.sign_at(&user(), issued).expect("sign");

        let later = issued + ACCESS_TOKEN_TTL + Duration::seconds(1);
        assert_eq!(keys.verify_at(&token, later).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn expiry_instant_itself_is_expired() {
        let keys = JwtKeys::from_secret("dev-secret");
        let issued = OffsetDateTime::now_utc();
        let token = keys.sign_at(&user(), issued).expect("sign");

        let just_before = issued + ACCESS_TOKEN_TTL - Duration::seconds(1);
        assert!(keys.verify_at(&token, just_before).is_ok());
        let at_expiry = issued + ACCESS_TOKEN_TTL;
        assert_eq!(keys.verify_at(&token, at_expiry).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn verify_rejects_garbage() {
        let keys = JwtKeys::from_secret("dev-secret");
        assert_eq!(keys.verify("not-a-token").unwrap_err(), TokenError::Malformed);
        assert_eq!(keys.verify("a.b.c").unwrap_err(), TokenError::Malformed);
        assert_eq!(keys.verify("").unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn verify_rejects_tampered_payload() {
        let keys = JwtKeys::from_secret("dev-secret");
        let token = keys.sign(&user()).expect("sign");
        let other = keys.sign(&user()).expect("sign");

        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);
        assert_eq!(keys.verify(&forged).unwrap_err(), TokenError::InvalidSignature);
    }

    #[test]
    fn sign_refuses_empty_secret() {
        let keys = JwtKeys::from_secret("");
        assert_eq!(keys.sign(&user()).unwrap_err(), TokenError::Signing);
    }
}
