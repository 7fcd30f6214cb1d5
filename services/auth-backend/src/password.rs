//! Argon2id password hashing.
//!
//! Hashing is deliberately slow, so both operations run on the blocking pool.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use thiserror::Error;

/// Password hashing failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    /// Hash computation failed
    #[error("Password hashing failed: {0}")]
    Hash(String),

    /// The stored hash is not a PHC string
    #[error("Malformed password hash: {0}")]
    MalformedHash(String),

    /// The blocking task did not complete
    #[error("Password task failed: {0}")]
    Task(String),
}

/// Hash `password` into a PHC string with a fresh salt.
///
/// # Errors
///
/// Returns [`PasswordError`] if hashing fails.
pub async fn hash_password(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::Hash(e.to_string()))
    })
    .await
    .map_err(|e| PasswordError::Task(e.to_string()))?
}

/// Check `password` against a stored PHC string.
///
/// A wrong password is `Ok(false)`.
///
/// # Errors
///
/// Returns [`PasswordError::MalformedHash`] if `hash` cannot be parsed.
pub async fn verify_password(password: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::Hash(e.to_string())),
        }
    })
    .await
    .map_err(|e| PasswordError::Task(e.to_string()))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hash = hash_password("hunter2".to_string()).await.expect("hash");
        assert!(hash.starts_with("$argon2id$"));

        assert_eq!(verify_password("hunter2".to_string(), hash.clone()).await, Ok(true));
        assert_eq!(verify_password("hunter3".to_string(), hash).await, Ok(false));
    }

    #[tokio::test]
    async fn salts_differ() {
        let first = hash_password("same".to_string()).await.expect("first hash");
        let second = hash_password("same".to_string()).await.expect("second hash");
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn malformed_hash_is_an_error() {
        let result = verify_password("pw".to_string(), "not-a-hash".to_string()).await;
        assert!(matches!(result, Err(PasswordError::MalformedHash(_))));
    }
}
