//! HTTP server for coffer.
//!
//! This crate provides:
//! - the JSON API under `/api/v1` (session, users, files, health)
//! - server-rendered HTML pages with cookie sessions and CSRF tokens
//! - Prometheus metrics

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod templates;

pub use auth::TraceId;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
