//! API error types.
//!
//! Callers only ever see a coarse category and the request's correlation
//! id; the full error is logged server-side under the same id.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use vforge_pipeline::{ErrorCategory, PipelineError};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Unauthorized(_) => ErrorCategory::Unauthorized,
            ApiError::BadRequest(_) => ErrorCategory::Validation,
            ApiError::Unavailable(_) => ErrorCategory::Unavailable,
            ApiError::Internal(_) => ErrorCategory::ProcessingFailed,
            ApiError::Pipeline(e) => e.category(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        status_for(self.category())
    }

    /// Attach the request's correlation id, producing a response-ready error.
    pub fn correlate(self, correlation_id: impl Into<String>) -> CorrelatedError {
        CorrelatedError {
            error: self,
            correlation_id: correlation_id.into(),
        }
    }
}

fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCategory::Forbidden => StatusCode::FORBIDDEN,
        ErrorCategory::ProcessingFailed => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCategory::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// An [`ApiError`] bound to the correlation id of the request that hit it.
#[derive(Debug, Error)]
#[error("{error} (correlation id {correlation_id})")]
pub struct CorrelatedError {
    #[source]
    pub error: ApiError,
    pub correlation_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse<'a> {
    error: &'static str,
    correlation_id: &'a str,
}

impl IntoResponse for CorrelatedError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let category = self.error.category();

        if status.is_server_error() {
            error!(
                correlation_id = %self.correlation_id,
                category = %category,
                error = ?self.error,
                "Request failed"
            );
        } else {
            warn!(
                correlation_id = %self.correlation_id,
                category = %category,
                error = %self.error,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: category.as_str(),
            correlation_id: &self.correlation_id,
        };
        (status, Json(body)).into_response()
    }
}
