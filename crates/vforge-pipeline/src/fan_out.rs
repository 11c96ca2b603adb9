//! Concurrent persistence of the final artifact and its derivatives.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use vforge_media::{MediaEngine, MediaError};
use vforge_models::{ArtifactKind, ArtifactRef, FanOutTask, FanOutWarning, ProcessingOptions};
use vforge_storage::{DurableStore, StorageError};

use crate::adapters::input_path;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::executor::RunContext;
use crate::logging::PipelineLogger;
use crate::metrics;
use crate::tracker::ArtifactTracker;

/// Settled fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutOutcome {
    /// Durable primary video
    pub video: ArtifactRef,
    pub gif: Option<ArtifactRef>,
    pub thumbnail: Option<ArtifactRef>,
    pub warnings: Vec<FanOutWarning>,
}

impl FanOutOutcome {
    /// Every durable reference produced.
    pub fn durable_refs(&self) -> Vec<ArtifactRef> {
        std::iter::once(&self.video)
            .chain(self.gif.iter())
            .chain(self.thumbnail.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Error)]
enum DerivativeError {
    #[error("render: {0}")]
    Render(#[source] MediaError),

    #[error("upload: {0}")]
    Upload(#[source] StorageError),
}

impl DerivativeError {
    fn summary(&self, task: FanOutTask) -> String {
        match self {
            DerivativeError::Render(_) => format!("{} generation failed", task),
            DerivativeError::Upload(_) => format!("{} upload failed", task),
        }
    }
}

/// Primary upload plus optional GIF and thumbnail, run together.
pub struct FanOut {
    media: Arc<dyn MediaEngine>,
    store: Arc<dyn DurableStore>,
    config: Arc<PipelineConfig>,
}

impl FanOut {
    pub fn new(
        media: Arc<dyn MediaEngine>,
        store: Arc<dyn DurableStore>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            media,
            store,
            config,
        }
    }

    /// Persist `final_ref` and the requested derivatives.
    ///
    /// All requested tasks start together and are awaited to completion.
    /// A derivative failure becomes a warning; a primary failure fails the
    /// whole call and removes any derivative already persisted. Successful
    /// uploads are promoted out of `tracker` once every task has settled.
    pub async fn finalize(
        &self,
        ctx: &RunContext,
        final_ref: &ArtifactRef,
        options: &ProcessingOptions,
        tracker: &mut ArtifactTracker,
    ) -> PipelineResult<FanOutOutcome> {
        let logger = ctx.logger.for_operation("fan_out");
        let gif_path = ctx.work_dir.join("final.gif");
        let thumbnail_path = ctx.work_dir.join("final.jpg");

        if options.create_gif || options.generate_thumbnail {
            tokio::fs::create_dir_all(&ctx.work_dir).await?;
        }
        if options.create_gif {
            tracker.track(&gif_path);
        }
        if options.generate_thumbnail {
            tracker.track(&thumbnail_path);
        }

        let primary = self.persist_primary(ctx, final_ref);
        let gif = async {
            if options.create_gif {
                Some(
                    self.derive(ctx, FanOutTask::Gif, final_ref, &gif_path, ArtifactKind::Gif)
                        .await,
                )
            } else {
                None
            }
        };
        let thumbnail = async {
            if options.generate_thumbnail {
                Some(
                    self.derive(
                        ctx,
                        FanOutTask::Thumbnail,
                        final_ref,
                        &thumbnail_path,
                        ArtifactKind::Image,
                    )
                    .await,
                )
            } else {
                None
            }
        };

        let (primary, gif, thumbnail) = tokio::join!(primary, gif, thumbnail);
        metrics::record_fan_out(FanOutTask::Primary.as_str(), primary.is_ok());

        let video = match primary {
            Ok(video) => video,
            Err(e) => {
                logger.log_error(&format!("primary upload failed: {}", e));
                self.discard_derivatives([gif, thumbnail]).await;
                return Err(PipelineError::PrimaryUpload(e));
            }
        };
        if let Some(path) = final_ref.local_path() {
            tracker.promote(&path);
        }

        let mut warnings = Vec::new();
        let gif = settle(FanOutTask::Gif, gif, &gif_path, tracker, &mut warnings, &logger);
        let thumbnail = settle(
            FanOutTask::Thumbnail,
            thumbnail,
            &thumbnail_path,
            tracker,
            &mut warnings,
            &logger,
        );

        info!(
            request_id = %ctx.request_id,
            video = %video,
            gif = gif.is_some(),
            thumbnail = thumbnail.is_some(),
            warnings = warnings.len(),
            "Fan-out settled"
        );

        Ok(FanOutOutcome {
            video,
            gif,
            thumbnail,
            warnings,
        })
    }

    /// Upload the final video; an already durable reference passes through.
    async fn persist_primary(
        &self,
        ctx: &RunContext,
        final_ref: &ArtifactRef,
    ) -> Result<ArtifactRef, StorageError> {
        if final_ref.is_durable() {
            return Ok(final_ref.clone());
        }
        let folder = self.config.folder(&format!("videos/{}", ctx.owner));
        let uri = self.store.put(final_ref, &folder).await?;
        Ok(final_ref.promote(uri))
    }

    async fn derive(
        &self,
        ctx: &RunContext,
        task: FanOutTask,
        final_ref: &ArtifactRef,
        output: &Path,
        kind: ArtifactKind,
    ) -> Result<ArtifactRef, DerivativeError> {
        let input = input_path(final_ref);
        let rendered = match task {
            FanOutTask::Thumbnail => self.media.render_thumbnail(&input, output).await,
            _ => self.media.render_gif(&input, output).await,
        };
        rendered.map_err(DerivativeError::Render)?;

        let local = ArtifactRef::ephemeral(output, kind);
        let folder = self
            .config
            .folder(&format!("{}s/{}", task.as_str(), ctx.owner));
        let uri = self
            .store
            .put(&local, &folder)
            .await
            .map_err(DerivativeError::Upload)?;
        Ok(local.promote(uri))
    }

    async fn discard_derivatives(
        &self,
        results: [Option<Result<ArtifactRef, DerivativeError>>; 2],
    ) {
        for artifact in results.into_iter().flatten().flatten() {
            if let Err(e) = self.store.delete(&artifact.locator).await {
                warn!(uri = %artifact.locator, error = %e, "Failed to remove orphaned derivative");
            }
        }
    }
}

fn settle(
    task: FanOutTask,
    result: Option<Result<ArtifactRef, DerivativeError>>,
    local: &Path,
    tracker: &mut ArtifactTracker,
    warnings: &mut Vec<FanOutWarning>,
    logger: &PipelineLogger,
) -> Option<ArtifactRef> {
    let result = result?;
    metrics::record_fan_out(task.as_str(), result.is_ok());
    match result {
        Ok(artifact) => {
            tracker.promote(local);
            Some(artifact)
        }
        Err(e) => {
            logger.log_warning(&format!("{} failed: {}", task, e));
            warnings.push(FanOutWarning {
                task,
                detail: e.summary(task),
            });
            None
        }
    }
}
