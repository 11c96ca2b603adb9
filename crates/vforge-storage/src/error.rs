//! Storage error types.

use std::path::PathBuf;

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0} is not set")]
    MissingSetting(&'static str),

    #[error("Storage unreachable: {0}")]
    Unreachable(String),

    #[error("Local artifact missing: {}", .0.display())]
    LocalMissing(PathBuf),

    #[error("Upload of {key} failed: {message}")]
    UploadFailed { key: String, message: String },

    #[error("Delete of {key} failed: {message}")]
    DeleteFailed { key: String, message: String },

    /// Key that would escape its folder, or a URI not served by this bucket
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Not a local artifact: {0}")]
    NotLocal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn upload_failed(key: impl Into<String>, message: impl ToString) -> Self {
        Self::UploadFailed {
            key: key.into(),
            message: message.to_string(),
        }
    }

    pub fn delete_failed(key: impl Into<String>, message: impl ToString) -> Self {
        Self::DeleteFailed {
            key: key.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }
}
