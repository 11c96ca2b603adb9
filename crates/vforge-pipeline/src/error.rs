//! Pipeline error types.

use serde::Serialize;
use thiserror::Error;

use vforge_firestore::FirestoreError;
use vforge_media::MediaError;
use vforge_ml_client::MlError;
use vforge_models::{PlanTier, RequestError, StageKind};
use vforge_storage::StorageError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failure inside a single stage adapter.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("ML service error: {0}")]
    Ml(#[from] MlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Adapter for {0} received parameters of another stage")]
    ParamsMismatch(StageKind),

    #[error("No adapter registered for {0}")]
    NoAdapter(StageKind),

    #[error("Stage failed: {0}")]
    Failed(String),
}

impl StageError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Request-level failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    Validation(#[from] RequestError),

    #[error("Caller is not authenticated")]
    Unauthenticated,

    #[error("Plan {plan} is not entitled to processing")]
    Forbidden { plan: PlanTier },

    #[error("Entitlement lookup failed: {0}")]
    Entitlement(#[source] FirestoreError),

    #[error("Stage {stage} failed: {cause}")]
    StageFailed {
        stage: StageKind,
        #[source]
        cause: StageError,
    },

    #[error("Primary upload failed: {0}")]
    PrimaryUpload(#[source] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn stage_failed(stage: StageKind, cause: impl Into<StageError>) -> Self {
        Self::StageFailed {
            stage,
            cause: cause.into(),
        }
    }

    /// Coarse caller-facing category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::Validation(_) => ErrorCategory::Validation,
            PipelineError::Unauthenticated => ErrorCategory::Unauthorized,
            PipelineError::Forbidden { .. } => ErrorCategory::Forbidden,
            PipelineError::Entitlement(_) => ErrorCategory::Unavailable,
            PipelineError::StageFailed { .. }
            | PipelineError::PrimaryUpload(_)
            | PipelineError::Io(_) => ErrorCategory::ProcessingFailed,
        }
    }

    /// True for rejections raised before any work starts.
    pub fn is_rejection(&self) -> bool {
        !matches!(self.category(), ErrorCategory::ProcessingFailed)
    }
}

/// Error category exposed to callers. Carries no internal detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    #[serde(rename = "validation_error")]
    Validation,
    Unauthorized,
    Forbidden,
    ProcessingFailed,
    Unavailable,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation_error",
            ErrorCategory::Unauthorized => "unauthorized",
            ErrorCategory::Forbidden => "forbidden",
            ErrorCategory::ProcessingFailed => "processing_failed",
            ErrorCategory::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
