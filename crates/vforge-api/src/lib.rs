//! Axum HTTP/WS API server.
//!
//! This crate provides:
//! - The `POST /api/process` entry point in front of the pipeline
//! - The `/ws/session` real-time channel
//! - Firebase ID token verification
//! - Health, readiness and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod readiness;
pub mod routes;
pub mod state;
pub mod ws;

pub use auth::{AuthUser, JwksCache, TokenVerifier};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, CorrelatedError};
pub use middleware::RequestId;
pub use readiness::ReadinessCheck;
pub use routes::create_router;
pub use state::AppState;
