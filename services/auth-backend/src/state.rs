//! Application state for the credential service handlers.

use crate::token::TokenIssuer;
use loginapp_core::users::UserStore;
use loginapp_runtime::PublishDispatcher;
use std::sync::Arc;

/// State shared by every handler. Cloned per request.
#[derive(Clone)]
pub struct AppState {
    /// Credential store
    pub users: Arc<dyn UserStore>,
    /// Fire-and-forget registration events
    pub events: PublishDispatcher,
    /// Session token issuer
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, events: PublishDispatcher, tokens: TokenIssuer) -> Self {
        Self {
            users,
            events,
            tokens: Arc::new(tokens),
        }
    }
}
