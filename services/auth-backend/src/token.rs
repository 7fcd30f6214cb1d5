//! HS256 session tokens.

use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use loginapp_core::environment::Clock;
use loginapp_core::users::User;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Token lifetime in seconds.
pub const TOKEN_TTL_SECS: i64 = 3600;

/// Token failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Signing failed
    #[error("Failed to sign token: {0}")]
    Encode(String),

    /// Bad signature, expired, or malformed
    #[error("Invalid token: {0}")]
    Invalid(String),
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    #[serde(rename = "userId")]
    pub user_id: i32,
    /// User email
    pub email: String,
    /// Issued at (seconds since the epoch)
    pub iat: i64,
    /// Expiry (seconds since the epoch)
    pub exp: i64,
}

/// Issues and verifies tokens with one shared secret.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    /// Issuer for `secret`, stamping `iat` from `clock`.
    #[must_use]
    pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            clock,
        }
    }

    /// Sign a token for `user`, valid for [`TOKEN_TTL_SECS`].
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Encode`] if signing fails.
    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        let now = self.clock.now();
        let claims = Claims {
            user_id: user.id,
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(TOKEN_TTL_SECS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Check the signature and expiry of `token`.
    ///
    /// Expiry is checked against the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Invalid`] for any rejected token.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use loginapp_core::environment::SystemClock;
    use loginapp_testing::FixedClock;

    fn user() -> User {
        User {
            id: 7,
            email: "a@x.com".to_string(),
            password_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issue_then_verify() {
        let issuer = TokenIssuer::new("devsecret", Arc::new(SystemClock));
        let token = issuer.issue(&user()).expect("token issued");

        let claims = issuer.verify(&token).expect("fresh token accepted");
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = TokenIssuer::new("one", Arc::new(SystemClock))
            .issue(&user())
            .expect("token issued");
        let other = TokenIssuer::new("two", Arc::new(SystemClock));
        assert!(matches!(other.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let two_hours_ago = FixedClock::new(Utc::now() - Duration::hours(2));
        let issuer = TokenIssuer::new("devsecret", Arc::new(two_hours_ago));
        let token = issuer.issue(&user()).expect("token issued");
        assert!(matches!(issuer.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn claims_use_camel_case_user_id() {
        let claims = Claims {
            user_id: 1,
            email: "a@x.com".to_string(),
            iat: 0,
            exp: 1,
        };
        let json = serde_json::to_value(&claims).expect("claims serialize");
        assert_eq!(json["userId"], 1);
    }
}
