//! HTTP handlers and router for the credential service.

use crate::password::{hash_password, verify_password};
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use loginapp_core::users::{NewUser, StoreError, UserProfile};
use loginapp_runtime::ReadinessFlag;
use loginapp_web::{AppError, BearerToken, WebResult, health_routes};
use serde::{Deserialize, Serialize};

/// Service name reported by `/health`.
pub const SERVICE_NAME: &str = "auth-backend";

/// Body of `POST /api/register` and `POST /api/login`.
///
/// Both fields are optional at the type level so a missing field produces the
/// service's own 400 instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    /// Email address
    #[serde(default)]
    pub email: Option<String>,
    /// Plaintext password
    #[serde(default)]
    pub password: Option<String>,
}

impl Credentials {
    fn require(self) -> WebResult<(String, String)> {
        match (self.email, self.password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => Ok((email, password)),
            _ => Err(AppError::bad_request("email and password required")),
        }
    }
}

/// `{"user": {...}}`
#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    /// Public user fields
    pub user: UserProfile,
}

/// `{"token": "..."}`
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Signed session token
    pub token: String,
}

fn internal(error: impl Into<anyhow::Error>) -> AppError {
    AppError::internal("internal").with_source(error.into())
}

/// Register a user and announce it on the broker.
///
/// The event is queued after the insert commits; its delivery never affects the
/// response.
///
/// ```text
/// POST /api/register
/// {"email": "a@x.com", "password": "pw"}
/// ```
pub async fn register(
    State(state): State<AppState>,
    payload: Option<Json<Credentials>>,
) -> WebResult<(StatusCode, Json<UserEnvelope>)> {
    let (email, password) = payload.map(|Json(c)| c).unwrap_or_default().require()?;

    if state.users.find_by_email(&email).await?.is_some() {
        tracing::info!(email = %email, "User already exists");
        return Err(AppError::bad_request("User already exists"));
    }

    let password_hash = hash_password(password).await.map_err(internal)?;
    let user = match state.users.create(&NewUser { email, password_hash }).await {
        Ok(user) => user,
        Err(StoreError::DuplicateEmail(email)) => {
            tracing::info!(email = %email, "User already exists");
            return Err(AppError::bad_request("User already exists"));
        }
        Err(e) => return Err(e.into()),
    };

    state.events.dispatch(user.email.clone());
    metrics::counter!("loginapp_registrations_total").increment(1);
    tracing::info!(user_id = user.id, email = %user.email, "User registered");

    Ok((StatusCode::CREATED, Json(UserEnvelope { user: user.profile() })))
}

/// Exchange credentials for a one-hour token.
///
/// Unknown email and wrong password answer the same way.
pub async fn login(State(state): State<AppState>, payload: Option<Json<Credentials>>) -> WebResult<Json<TokenResponse>> {
    let (email, password) = payload.map(|Json(c)| c).unwrap_or_default().require()?;

    let Some(user) = state.users.find_by_email(&email).await? else {
        return Err(AppError::bad_request("Invalid credentials"));
    };

    if !verify_password(password, user.password_hash.clone()).await.map_err(internal)? {
        return Err(AppError::bad_request("Invalid credentials"));
    }

    let token = state.tokens.issue(&user).map_err(internal)?;
    Ok(Json(TokenResponse { token }))
}

/// Profile of the token's user.
pub async fn profile(State(state): State<AppState>, BearerToken(token): BearerToken) -> WebResult<Json<UserEnvelope>> {
    let claims = state
        .tokens
        .verify(&token)
        .map_err(|_| AppError::unauthorized("Invalid token"))?;

    let user = state
        .users
        .find_by_id(claims.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Not found"))?;

    Ok(Json(UserEnvelope { user: user.profile() }))
}

/// Build the service router, `/health` included.
pub fn build_router(state: AppState, storage: ReadinessFlag) -> Router {
    let api_routes = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(profile));

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .merge(health_routes(SERVICE_NAME, storage))
}
