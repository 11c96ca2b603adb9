//! Media errors.

use std::path::PathBuf;

use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    ToolMissing(&'static str),

    /// Non-zero exit. `stderr_tail` keeps the last diagnostic lines only.
    #[error("{tool} exited with {}: {summary}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into()))]
    ToolExited {
        tool: &'static str,
        summary: String,
        stderr_tail: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("{0} killed after {1}s")]
    TimedOut(&'static str, u64),

    #[error("Input missing: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("Unusable video: {0}")]
    UnusableVideo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Probe output unreadable: {0}")]
    ProbeOutput(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    pub fn ffmpeg_exited(summary: impl Into<String>, stderr_tail: Option<String>, exit_code: Option<i32>) -> Self {
        Self::ToolExited {
            tool: "ffmpeg",
            summary: summary.into(),
            stderr_tail,
            exit_code,
        }
    }

    pub fn unusable_video(message: impl Into<String>) -> Self {
        Self::UnusableVideo(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
