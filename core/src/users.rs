//! Credential store abstraction.
//!
//! The credential service only needs three operations: look a user up by email,
//! look a user up by id, and insert a new user. [`UserStore`] keeps those behind a
//! dyn compatible trait so the HTTP layer can run against Postgres in production
//! and an in-memory map in tests.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors surfaced by credential and catalog stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A user with this email already exists
    #[error("Duplicate email: {0}")]
    DuplicateEmail(String),

    /// The backing store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Query failed for another reason
    #[error("Query failed: {0}")]
    Query(String),
}

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// A stored user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Database id
    pub id: i32,
    /// Unique email
    pub email: String,
    /// PHC-formatted password hash
    pub password_hash: String,
    /// Row creation time
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Public view of the user (no hash).
    #[must_use]
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

/// User fields safe to return over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    /// Database id
    pub id: i32,
    /// Email address
    pub email: String,
    /// Row creation time
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Insert parameters for a new user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Email address
    pub email: String,
    /// PHC-formatted password hash
    pub password_hash: String,
}

/// Credential repository.
pub trait UserStore: Send + Sync {
    /// Find a user by email.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails. A missing user is `Ok(None)`.
    fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<User>>;

    /// Find a user by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails. A missing user is `Ok(None)`.
    fn find_by_id(&self, id: i32) -> StoreFuture<'_, Option<User>>;

    /// Insert a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateEmail`] if the email is taken.
    fn create<'a>(&'a self, user: &'a NewUser) -> StoreFuture<'a, User>;
}
