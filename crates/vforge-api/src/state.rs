//! Application state.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use vforge_firestore::FirestoreClient;
use vforge_media::FfmpegEngine;
use vforge_ml_client::MlClient;
use vforge_pipeline::{DistributionEnqueuer, PipelineConfig, PipelineDeps, PipelineService};
use vforge_queue::{Broadcaster, BroadcasterConfig, RedisDistributionQueue};
use vforge_storage::R2Client;

use crate::auth::{JwksCache, TokenVerifier};
use crate::config::ApiConfig;
use crate::readiness::{FfmpegCheck, ReadinessCheck};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<PipelineService>,
    pub broadcaster: Broadcaster,
    pub verifier: Arc<dyn TokenVerifier>,
    pub readiness: Arc<Vec<Arc<dyn ReadinessCheck>>>,
}

impl AppState {
    /// State around an already wired pipeline.
    pub fn new(config: ApiConfig, pipeline: PipelineService, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            config,
            broadcaster: pipeline.broadcaster().clone(),
            pipeline: Arc::new(pipeline),
            verifier,
            readiness: Arc::new(Vec::new()),
        }
    }

    pub fn with_readiness(mut self, checks: Vec<Arc<dyn ReadinessCheck>>) -> Self {
        self.readiness = Arc::new(checks);
        self
    }

    /// Wire every collaborator from the environment.
    pub async fn from_env(config: ApiConfig) -> anyhow::Result<Self> {
        let storage = Arc::new(R2Client::from_env().context("R2 storage")?);
        let firestore = Arc::new(FirestoreClient::from_env().context("Firestore")?);
        let ml = Arc::new(MlClient::from_env().context("ML client")?);
        let verifier = JwksCache::from_env().await.context("JWKS cache")?;

        let mut checks: Vec<Arc<dyn ReadinessCheck>> = vec![
            storage.clone() as Arc<dyn ReadinessCheck>,
            firestore.clone(),
            ml.clone(),
            Arc::new(FfmpegCheck),
        ];

        let distribution = match RedisDistributionQueue::from_env() {
            Ok(queue) => {
                let queue = Arc::new(queue);
                checks.push(queue.clone());
                DistributionEnqueuer::new(queue)
            }
            Err(e) => {
                warn!("Distribution queue unavailable, social sharing disabled: {}", e);
                DistributionEnqueuer::disabled()
            }
        };

        let pipeline_config = PipelineConfig::from_env();
        info!(
            work_dir = %pipeline_config.work_dir.display(),
            cleanup = pipeline_config.cleanup_enabled,
            "Pipeline config loaded"
        );

        let broadcaster = Broadcaster::new(BroadcasterConfig::from_env());

        let deps = PipelineDeps {
            media: Arc::new(FfmpegEngine::new()),
            vision: ml.clone(),
            language: ml,
            store: storage,
            entitlements: firestore,
            broadcaster,
            distribution,
        };

        Ok(Self::new(config, PipelineService::new(pipeline_config, deps), Arc::new(verifier))
            .with_readiness(checks))
    }
}
