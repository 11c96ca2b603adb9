//! Real-time session message types.
//!
//! Messages are JSON objects discriminated by a kebab-case `type` field.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a live session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Process-local identifier for a subscriber connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Allocate the next connection id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Per-stage progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub session_id: SessionId,
    /// Feature tag of the stage that completed
    pub feature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(session_id: SessionId, feature: impl Into<String>, preview_url: Option<String>) -> Self {
        Self {
            session_id,
            feature: feature.into(),
            preview_url,
            timestamp: Utc::now(),
        }
    }
}

/// Outbound events delivered to session subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    /// A session was created for the subscriber's owner
    SessionStart { session_id: SessionId, user_id: String },

    /// A stage completed
    Progress(ProgressEvent),

    /// Relayed `edit-command` payload
    Command {
        session_id: SessionId,
        command: serde_json::Value,
    },

    /// Realtime run finished
    Done { session_id: SessionId, video_url: String },

    /// Rejected inbound event or failed run
    Error { message: String },
}

impl SessionEvent {
    pub fn error(message: impl Into<String>) -> Self {
        SessionEvent::Error {
            message: message.into(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SessionEvent::SessionStart { .. } => "session-start",
            SessionEvent::Progress(_) => "progress",
            SessionEvent::Command { .. } => "command",
            SessionEvent::Done { .. } => "done",
            SessionEvent::Error { .. } => "error",
        }
    }
}

/// Inbound events sent by a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinSession { session_id: SessionId },
    EditCommand {
        session_id: SessionId,
        command: serde_json::Value,
    },
}
