//! Registration event: the fact propagated from the credential service to consumers.
//!
//! A [`RegistrationEvent`] is created once per successful registration and never
//! changes afterwards. Its wire form is a JSON object:
//!
//! ```json
//! {"username":"alice","email":"alice@example.com","timestamp":"2025-01-01T00:00:00.000Z"}
//! ```
//!
//! The email doubles as the message key, so all events for one address land on the
//! same partition and keep their relative order. There is no other identifier;
//! consumers must accept duplicates.
//!
//! # Example
//!
//! ```
//! use loginapp_core::event::RegistrationEvent;
//! use chrono::{TimeZone, Utc};
//!
//! let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
//! let event = RegistrationEvent::new("alice@example.com", at);
//!
//! assert_eq!(event.username(), "alice");
//! assert_eq!(event.key(), b"alice@example.com");
//!
//! let json = event.to_json().unwrap();
//! let back = RegistrationEvent::from_json(&json).unwrap();
//! assert_eq!(event, back);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default broker topic carrying registration events.
pub const LOGIN_TOPIC: &str = "Login";

/// Error types for event payload operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),

    /// The message carried no payload at all.
    #[error("Message has no payload")]
    MissingPayload,
}

/// A user registered with the credential service.
///
/// Fields are private so an event cannot be altered after construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationEvent {
    username: String,
    email: String,
    #[serde(with = "crate::timestamp")]
    timestamp: DateTime<Utc>,
}

impl RegistrationEvent {
    /// Build an event for `email`, stamped with `timestamp`.
    ///
    /// The username is the part of the email before the first `@`; an address
    /// without `@` is used whole.
    #[must_use]
    pub fn new(email: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        let email = email.into();
        Self {
            username: username_from_email(&email).to_string(),
            email,
            timestamp,
        }
    }

    /// Username derived from the email.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Registered email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Instant the event was published.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Message key used for partitioning (the email bytes).
    #[must_use]
    pub fn key(&self) -> &[u8] {
        self.email.as_bytes()
    }

    /// Encode as the JSON wire payload.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if encoding fails.
    pub fn to_json(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Decode a JSON wire payload.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DeserializationError`] if the bytes are not a valid
    /// registration event.
    pub fn from_json(bytes: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }

    /// Decode an optional message payload.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::MissingPayload`] for `None`, otherwise as
    /// [`RegistrationEvent::from_json`].
    pub fn from_payload(payload: Option<&[u8]>) -> Result<Self, EventError> {
        payload.map_or(Err(EventError::MissingPayload), Self::from_json)
    }
}

impl fmt::Display for RegistrationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RegistrationEvent {{ username: {}, email: {}, timestamp: {} }}",
            self.username,
            self.email,
            crate::timestamp::format(&self.timestamp)
        )
    }
}

/// Local part of an email address.
#[must_use]
pub fn username_from_email(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 30, 0).single().expect("valid date")
    }

    #[test]
    fn username_is_local_part() {
        let event = RegistrationEvent::new("bob.smith@example.org", at());
        assert_eq!(event.username(), "bob.smith");
        assert_eq!(event.email(), "bob.smith@example.org");
    }

    #[test]
    fn username_without_at_sign_is_whole_address() {
        assert_eq!(username_from_email("nobody"), "nobody");
        assert_eq!(username_from_email("a@b@c"), "a");
        assert_eq!(username_from_email("@host"), "");
    }

    #[test]
    fn wire_format_matches_expected_json() {
        let event = RegistrationEvent::new("a@x.com", at());
        let json = event.to_json().expect("serialization should succeed");
        let value: serde_json::Value =
            serde_json::from_slice(&json).expect("payload should be JSON");

        assert_eq!(
            value,
            serde_json::json!({
                "username": "a",
                "email": "a@x.com",
                "timestamp": "2025-01-01T12:30:00.000Z",
            })
        );
    }

    #[test]
    fn decodes_timestamps_with_offsets() {
        let payload = br#"{"username":"a","email":"a@x.com","timestamp":"2025-01-01T13:30:00+01:00"}"#;
        let event = RegistrationEvent::from_json(payload).expect("valid payload");
        assert_eq!(event.timestamp(), at());
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let result = RegistrationEvent::from_json(b"not json");
        assert!(matches!(result, Err(EventError::DeserializationError(_))));

        let missing_field = RegistrationEvent::from_json(br#"{"email":"a@x.com"}"#);
        assert!(missing_field.is_err());
    }

    #[test]
    fn absent_payload_is_missing() {
        assert!(matches!(RegistrationEvent::from_payload(None), Err(EventError::MissingPayload)));
        assert!(matches!(
            RegistrationEvent::from_payload(Some(b"{}")),
            Err(EventError::DeserializationError(_))
        ));

        let event = RegistrationEvent::new("a@x.com", at());
        let bytes = event.to_json().expect("serialization should succeed");
        assert!(RegistrationEvent::from_payload(Some(&bytes)).is_ok_and(|decoded| decoded == event));
    }

    #[test]
    fn key_is_email_bytes() {
        let event = RegistrationEvent::new("k@x.com", at());
        assert_eq!(event.key(), b"k@x.com");
    }

    proptest::proptest! {
        #[test]
        fn username_never_contains_at(local in "[a-z0-9._+-]{0,20}", domain in "[a-z0-9.@-]{0,20}") {
            let email = format!("{local}@{domain}");
            let event = RegistrationEvent::new(email.clone(), at());
            proptest::prop_assert_eq!(event.username(), local.as_str());
            proptest::prop_assert_eq!(event.email(), email.as_str());
        }
    }

    #[test]
    fn display_includes_fields() {
        let display = format!("{}", RegistrationEvent::new("d@x.com", at()));
        assert!(display.contains("d@x.com"));
        assert!(display.contains("2025-01-01T12:30:00.000Z"));
    }
}
