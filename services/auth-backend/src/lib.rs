//! Credential service for the login app.
//!
//! Registers users, issues session tokens, serves profiles, and announces every
//! registration on the broker without letting broker trouble reach the caller.
//!
//! # Routes
//!
//! | Method | Path | |
//! |---|---|---|
//! | POST | `/api/register` | 201 `{"user"}` |
//! | POST | `/api/login` | 200 `{"token"}` |
//! | GET | `/api/profile` | 200 `{"user"}`, bearer token required |
//! | GET | `/health` | liveness plus storage readiness |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod password;
pub mod routes;
pub mod state;
pub mod token;

pub use config::Config;
pub use routes::build_router;
pub use state::AppState;
pub use token::TokenIssuer;
