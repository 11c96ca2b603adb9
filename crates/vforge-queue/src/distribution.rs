//! Distribution queue on Redis Streams.

use async_trait::async_trait;
use tracing::{info, warn};

use vforge_models::DistributionRecord;

use crate::error::{QueueError, QueueResult};

/// Deduplication window for identical owner/video records.
pub const DEDUP_TTL_SECS: u64 = 24 * 60 * 60;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    /// Stream name for distribution records
    pub stream_name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vforge:distribution".to_string(),
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("DISTRIBUTION_STREAM").unwrap_or(defaults.stream_name),
        }
    }
}

/// Hands durable videos to the downstream scheduler.
#[async_trait]
pub trait DistributionQueue: Send + Sync {
    /// Append a record, returning its queue message id.
    async fn enqueue(&self, record: &DistributionRecord) -> QueueResult<String>;
}

/// `DistributionQueue` backed by a Redis stream.
pub struct RedisDistributionQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl RedisDistributionQueue {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Check connectivity with PING.
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    fn dedup_key(record: &DistributionRecord) -> String {
        format!("vforge:dedup:{}", record.dedup_key())
    }
}

#[async_trait]
impl DistributionQueue for RedisDistributionQueue {
    async fn enqueue(&self, record: &DistributionRecord) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(record)?;
        let dedup_key = Self::dedup_key(record);

        // SET NX claims the key atomically; nil means a duplicate
        let claimed: Option<String> = redis::cmd("SET")
            .arg(&dedup_key)
            .arg(&record.id)
            .arg("NX")
            .arg("EX")
            .arg(DEDUP_TTL_SECS)
            .query_async(&mut conn)
            .await?;
        if claimed.is_none() {
            warn!(owner = %record.owner_id, video = %record.video_url, "Duplicate distribution rejected");
            return Err(QueueError::Duplicate(record.dedup_key()));
        }

        let message_id: String = match redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("record")
            .arg(&payload)
            .arg("id")
            .arg(&record.id)
            .query_async(&mut conn)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                // release the claim so a retry is not rejected as a duplicate
                let _ = redis::cmd("DEL")
                    .arg(&dedup_key)
                    .query_async::<i64>(&mut conn)
                    .await;
                return Err(QueueError::enqueue_failed(e.to_string()));
            }
        };

        info!(
            record_id = %record.id,
            platforms = record.platforms.len(),
            "Enqueued distribution record with message ID {}",
            message_id
        );
        Ok(message_id)
    }
}
