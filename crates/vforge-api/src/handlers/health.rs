//! Liveness and readiness probes.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// Liveness probe. Never touches dependencies.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: BTreeMap<&'static str, CheckStatus>,
    #[serde(rename = "activeSessions")]
    pub active_sessions: usize,
}

/// Outcome of one dependency probe.
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CheckStatus {
    Ok { latency_ms: u64 },
    Error { error: String },
}

impl CheckStatus {
    fn is_ok(&self) -> bool {
        matches!(self, CheckStatus::Ok { .. })
    }
}

/// Readiness probe. Dependency checks run concurrently; any failure
/// answers 503 with the per-check breakdown.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let results = join_all(state.readiness.iter().map(|check| async move {
        let start = Instant::now();
        let status = match check.check().await {
            Ok(()) => CheckStatus::Ok {
                latency_ms: start.elapsed().as_millis() as u64,
            },
            Err(error) => CheckStatus::Error { error },
        };
        (check.name(), status)
    }))
    .await;

    let checks: BTreeMap<_, _> = results.into_iter().collect();
    let all_ok = checks.values().all(CheckStatus::is_ok);

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" },
        checks,
        active_sessions: state.broadcaster.session_count(),
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
