//! Hand-off of finished videos to the social scheduler.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use vforge_models::{ArtifactRef, DistributionRecord};
use vforge_queue::{DistributionQueue, QueueError};

/// How an enqueue attempt ended. Never affects the request result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionOutcome {
    /// Queue message id
    Enqueued(String),
    /// No platforms to publish to
    NoPlatforms,
    /// No queue configured in this deployment
    Unconfigured,
    /// Same owner and video already queued
    Duplicate,
    Failed,
}

/// Fire-and-observe distribution enqueuer.
#[derive(Clone, Default)]
pub struct DistributionEnqueuer {
    queue: Option<Arc<dyn DistributionQueue>>,
}

impl DistributionEnqueuer {
    pub fn new(queue: Arc<dyn DistributionQueue>) -> Self {
        Self { queue: Some(queue) }
    }

    /// Enqueuer that only logs; used when no queue is configured.
    pub fn disabled() -> Self {
        Self { queue: None }
    }

    pub async fn enqueue(
        &self,
        video: &ArtifactRef,
        owner: &str,
        platforms: &BTreeSet<String>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> DistributionOutcome {
        if platforms.is_empty() {
            warn!(owner = %owner, "shareToSocial requested without platforms, skipping distribution");
            return DistributionOutcome::NoPlatforms;
        }
        let Some(queue) = &self.queue else {
            warn!(owner = %owner, "No distribution queue configured, skipping distribution");
            return DistributionOutcome::Unconfigured;
        };

        let record = DistributionRecord::new(&video.locator, owner, platforms.clone(), scheduled_at);
        match queue.enqueue(&record).await {
            Ok(message_id) => {
                info!(
                    record_id = %record.id,
                    scheduled_at = %record.scheduled_at,
                    "Distribution enqueued"
                );
                DistributionOutcome::Enqueued(message_id)
            }
            Err(QueueError::Duplicate(key)) => {
                info!(key = %key, "Distribution already queued");
                DistributionOutcome::Duplicate
            }
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Distribution enqueue failed");
                DistributionOutcome::Failed
            }
        }
    }
}
