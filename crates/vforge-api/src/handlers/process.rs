//! Processing entry point.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;

use vforge_models::{PipelineResult, ProcessingOptions};
use vforge_pipeline::PipelineError;

use crate::auth::AuthUser;
use crate::error::{ApiError, CorrelatedError};
use crate::middleware::RequestId;
use crate::state::AppState;

/// `POST /api/process` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessBody {
    #[serde(default)]
    pub source_ref: Option<String>,
    #[serde(default)]
    pub options: ProcessingOptions,
}

/// Run the pipeline for one source video.
///
/// Authentication is checked first; a malformed body is a validation
/// error only once the caller is known.
pub async fn process(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    user: Option<AuthUser>,
    body: Result<Json<ProcessBody>, JsonRejection>,
) -> Result<Json<PipelineResult>, CorrelatedError> {
    let correlate = |e: ApiError| e.correlate(request_id.as_str());

    let Some(user) = user else {
        return Err(correlate(PipelineError::Unauthenticated.into()));
    };

    let Json(body) = body.map_err(|e| correlate(ApiError::bad_request(e.body_text())))?;

    let result = state
        .pipeline
        .process(Some(&user.uid), body.source_ref, body.options, request_id.as_str())
        .await
        .map_err(|e| correlate(e.into()))?;

    Ok(Json(result))
}
