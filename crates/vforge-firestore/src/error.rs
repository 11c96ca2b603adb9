//! Firestore errors.

use thiserror::Error;

pub type FirestoreResult<T> = Result<T, FirestoreError>;

#[derive(Debug, Error)]
pub enum FirestoreError {
    /// Service account or access token problem
    #[error("Credentials rejected: {0}")]
    AuthError(String),

    #[error("Access denied: {0}")]
    PermissionDenied(String),

    #[error("Throttled by Firestore")]
    Throttled,

    #[error("Firestore unavailable (HTTP {0})")]
    Unavailable(u16),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Malformed document: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FirestoreError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    /// Error for a non-success status. 404 never reaches here, a missing
    /// document is `Ok(None)`.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            401 => Self::AuthError(body.into()),
            403 => Self::PermissionDenied(body.into()),
            429 => Self::Throttled,
            500..=599 => Self::Unavailable(status),
            _ => Self::RequestFailed(format!("HTTP {}: {}", status, body.into())),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Throttled | Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(FirestoreError::from_status(401, "x"), FirestoreError::AuthError(_)));
        assert!(matches!(FirestoreError::from_status(429, "x"), FirestoreError::Throttled));
        assert!(FirestoreError::from_status(503, "x").is_retryable());
        assert!(!FirestoreError::from_status(400, "bad").is_retryable());
        assert!(!FirestoreError::from_status(403, "x").is_retryable());
    }
}
