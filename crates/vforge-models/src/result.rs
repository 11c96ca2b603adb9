//! Pipeline results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ws::SessionId;

/// Fan-out task identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FanOutTask {
    Primary,
    Gif,
    Thumbnail,
}

impl FanOutTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            FanOutTask::Primary => "primary",
            FanOutTask::Gif => "gif",
            FanOutTask::Thumbnail => "thumbnail",
        }
    }
}

impl std::fmt::Display for FanOutTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A derivative task that failed while the primary upload succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FanOutWarning {
    pub task: FanOutTask,
    /// Caller-safe summary
    pub detail: String,
}

/// Successful pipeline response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub video_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gif_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub features_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<FanOutWarning>,
    pub request_id: String,
}
