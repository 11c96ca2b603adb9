//! Dependency probes behind `/ready`.

use async_trait::async_trait;

use vforge_firestore::FirestoreClient;
use vforge_media::check_ffmpeg;
use vforge_ml_client::MlClient;
use vforge_queue::RedisDistributionQueue;
use vforge_storage::R2Client;

/// A dependency the server needs to serve traffic.
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self) -> Result<(), String>;
}

#[async_trait]
impl ReadinessCheck for R2Client {
    fn name(&self) -> &'static str {
        "storage"
    }

    async fn check(&self) -> Result<(), String> {
        self.check_connectivity().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl ReadinessCheck for RedisDistributionQueue {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn check(&self) -> Result<(), String> {
        self.ping().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl ReadinessCheck for FirestoreClient {
    fn name(&self) -> &'static str {
        "firestore"
    }

    /// A missing probe document still proves Firestore is reachable.
    async fn check(&self) -> Result<(), String> {
        self.get_document("_health", "_check")
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl ReadinessCheck for MlClient {
    fn name(&self) -> &'static str {
        "ml"
    }

    async fn check(&self) -> Result<(), String> {
        match self.health_check().await {
            Ok(true) => Ok(()),
            Ok(false) => Err("ML service reported unhealthy".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// FFmpeg binary on `PATH`.
pub struct FfmpegCheck;

#[async_trait]
impl ReadinessCheck for FfmpegCheck {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn check(&self) -> Result<(), String> {
        check_ffmpeg().map(|_| ()).map_err(|e| e.to_string())
    }
}
