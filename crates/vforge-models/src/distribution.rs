//! Distribution records handed to the scheduling queue.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStatus {
    #[default]
    Pending,
    Published,
    Failed,
}

/// A durable video scheduled for posting to external platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DistributionRecord {
    pub id: String,
    pub video_url: String,
    pub owner_id: String,
    pub platforms: BTreeSet<String>,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: DistributionStatus,
}

impl DistributionRecord {
    /// New pending record. `scheduled_at` defaults to now.
    pub fn new(
        video_url: impl Into<String>,
        owner_id: impl Into<String>,
        platforms: BTreeSet<String>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            video_url: video_url.into(),
            owner_id: owner_id.into(),
            platforms,
            scheduled_at: scheduled_at.unwrap_or(now),
            created_at: now,
            status: DistributionStatus::Pending,
        }
    }

    /// Idempotency key: one record per owner and video.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.owner_id, self.video_url)
    }
}
