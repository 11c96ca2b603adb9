//! Request orchestration.

use std::sync::Arc;

use tracing::Instrument;

use vforge_firestore::EntitlementSource;
use vforge_media::MediaEngine;
use vforge_ml_client::{LanguageService, VisionService};
use vforge_models::{
    ProcessingOptions, ProcessingRequest, SessionEvent, Stage,
};
use vforge_queue::{Broadcaster, SessionHandle};
use vforge_storage::DurableStore;

use crate::adapters::StageRegistry;
use crate::cleanup::CleanupManager;
use crate::config::PipelineConfig;
use crate::distribution::DistributionEnqueuer;
use crate::error::{PipelineError, PipelineResult};
use crate::executor::{ExecutionOutcome, Executor, RunContext};
use crate::fan_out::{FanOut, FanOutOutcome};
use crate::metrics;
use crate::tracker::ArtifactTracker;

/// Collaborators injected at startup.
#[derive(Clone)]
pub struct PipelineDeps {
    pub media: Arc<dyn MediaEngine>,
    pub vision: Arc<dyn VisionService>,
    pub language: Arc<dyn LanguageService>,
    pub store: Arc<dyn DurableStore>,
    pub entitlements: Arc<dyn EntitlementSource>,
    pub broadcaster: Broadcaster,
    pub distribution: DistributionEnqueuer,
}

/// Single entry point for processing requests.
pub struct PipelineService {
    config: Arc<PipelineConfig>,
    entitlements: Arc<dyn EntitlementSource>,
    broadcaster: Broadcaster,
    executor: Executor,
    fan_out: FanOut,
    cleanup: CleanupManager,
    distribution: DistributionEnqueuer,
}

impl PipelineService {
    pub fn new(config: PipelineConfig, deps: PipelineDeps) -> Self {
        let registry = StageRegistry::with_defaults(
            deps.media.clone(),
            deps.vision.clone(),
            deps.language.clone(),
        );
        Self::with_registry(config, deps, registry)
    }

    pub fn with_registry(config: PipelineConfig, deps: PipelineDeps, registry: StageRegistry) -> Self {
        let config = Arc::new(config);
        Self {
            executor: Executor::new(registry, deps.store.clone(), config.clone()),
            fan_out: FanOut::new(deps.media, deps.store, config.clone()),
            cleanup: CleanupManager::new(config.cleanup_enabled),
            entitlements: deps.entitlements,
            broadcaster: deps.broadcaster,
            distribution: deps.distribution,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Process one request end to end.
    ///
    /// Rejections (unauthenticated, insufficient plan, invalid request)
    /// happen before any session, file or upload exists.
    pub async fn process(
        &self,
        caller: Option<&str>,
        source: Option<String>,
        options: ProcessingOptions,
        request_id: &str,
    ) -> PipelineResult<vforge_models::PipelineResult> {
        let uid = caller.ok_or(PipelineError::Unauthenticated)?;
        let ctx = RunContext::new(request_id, uid, &self.config.work_dir);
        let span = ctx.logger.create_span();

        let result = self.run(&ctx, source, options).instrument(span).await;
        metrics::record_run(match &result {
            Ok(_) => "success",
            Err(e) if e.is_rejection() => "rejected",
            Err(_) => "failure",
        });
        result
    }

    async fn run(
        &self,
        ctx: &RunContext,
        source: Option<String>,
        options: ProcessingOptions,
    ) -> PipelineResult<vforge_models::PipelineResult> {
        let plan = self
            .entitlements
            .plan_for(&ctx.owner)
            .await
            .map_err(PipelineError::Entitlement)?;
        if !self.config.is_elevated(plan) {
            ctx.logger
                .log_warning(&format!("plan {} not entitled to processing", plan));
            return Err(PipelineError::Forbidden { plan });
        }

        let request = ProcessingRequest::new(source, options)?;
        let stages = request.stages();
        let session = request
            .realtime()
            .then(|| self.broadcaster.create_session(&ctx.owner));

        ctx.logger.log_start(&format!(
            "{} stage(s), realtime={}, run={}",
            stages.len(),
            session.is_some(),
            ctx.run_id
        ));

        let mut tracker = ArtifactTracker::new();
        let chain = self
            .run_chain(ctx, &request, &stages, session.as_ref(), &mut tracker)
            .await;

        let (execution, fan_out) = match chain {
            Ok(done) => done,
            Err(e) => {
                ctx.logger.log_error(&e.to_string());
                if let Some(session) = &session {
                    session.publish(SessionEvent::error("processing failed"));
                }
                self.cleanup
                    .sweep(ctx, tracker, request.source(), &[])
                    .await;
                return Err(e);
            }
        };

        let durable = fan_out.durable_refs();
        let options = request.options();
        let share = async {
            if options.share_to_social {
                Some(
                    self.distribution
                        .enqueue(
                            &fan_out.video,
                            &ctx.owner,
                            &options.platforms,
                            options.scheduled_at,
                        )
                        .await,
                )
            } else {
                None
            }
        };
        let (report, distribution) = tokio::join!(
            self.cleanup.sweep(ctx, tracker, request.source(), &durable),
            share
        );

        if let Some(session) = &session {
            session.publish(SessionEvent::Done {
                session_id: session.id().clone(),
                video_url: fan_out.video.locator.clone(),
            });
        }

        ctx.logger.log_completion(&format!(
            "features={:?} warnings={} cleaned={} distribution={:?}",
            execution.features_used(),
            fan_out.warnings.len(),
            report.deleted,
            distribution
        ));

        Ok(vforge_models::PipelineResult {
            video_url: fan_out.video.locator,
            gif_url: fan_out.gif.map(|g| g.locator),
            thumbnail_url: fan_out.thumbnail.map(|t| t.locator),
            features_used: execution.features_used(),
            session_id: session.as_ref().map(|s| s.id().clone()),
            warnings: fan_out.warnings,
            request_id: ctx.request_id.clone(),
        })
    }

    async fn run_chain(
        &self,
        ctx: &RunContext,
        request: &ProcessingRequest,
        stages: &[Stage],
        session: Option<&SessionHandle>,
        tracker: &mut ArtifactTracker,
    ) -> PipelineResult<(ExecutionOutcome, FanOutOutcome)> {
        let execution = self
            .executor
            .execute(ctx, request.source(), stages, session, tracker)
            .await?;
        let fan_out = self
            .fan_out
            .finalize(ctx, &execution.final_ref, request.options(), tracker)
            .await?;
        Ok((execution, fan_out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    use serde_json::json;
    use vforge_models::{FanOutTask, PlanTier};
    use vforge_queue::BroadcasterConfig;

    use crate::error::ErrorCategory;
    use crate::testing::{FakeEntitlements, FakeLanguage, FakeMedia, FakeQueue, FakeStore, FakeVision};

    struct Harness {
        dir: tempfile::TempDir,
        media: Arc<FakeMedia>,
        store: Arc<FakeStore>,
        queue: Arc<FakeQueue>,
        entitlements: Arc<FakeEntitlements>,
        broadcaster: Broadcaster,
        service: PipelineService,
    }

    impl Harness {
        fn source(&self) -> String {
            self.dir.path().join("upload.mp4").to_string_lossy().into_owned()
        }

        fn work_root(&self) -> PathBuf {
            self.dir.path().join("work")
        }

        /// Per-run directories created under the work root.
        fn work_dirs(&self) -> Vec<PathBuf> {
            match std::fs::read_dir(self.work_root()) {
                Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
                Err(_) => Vec::new(),
            }
        }
    }

    struct Setup {
        media: FakeMedia,
        store: FakeStore,
        queue: FakeQueue,
        entitlements: FakeEntitlements,
        cleanup: bool,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                media: FakeMedia::default(),
                store: FakeStore::default(),
                queue: FakeQueue::default(),
                entitlements: FakeEntitlements::default()
                    .with_plan("pro-user", PlanTier::Pro)
                    .with_plan("free-user", PlanTier::Free),
                cleanup: true,
            }
        }
    }

    async fn harness(setup: Setup) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("upload.mp4"), b"source")
            .await
            .unwrap();

        let media = Arc::new(setup.media);
        let store = Arc::new(setup.store);
        let queue = Arc::new(setup.queue);
        let entitlements = Arc::new(setup.entitlements);
        let broadcaster = Broadcaster::new(BroadcasterConfig::default());

        let config = PipelineConfig {
            work_dir: dir.path().join("work"),
            cleanup_enabled: setup.cleanup,
            ..Default::default()
        };
        let deps = PipelineDeps {
            media: media.clone(),
            vision: Arc::new(FakeVision::default()),
            language: Arc::new(FakeLanguage::default()),
            store: store.clone(),
            entitlements: entitlements.clone(),
            broadcaster: broadcaster.clone(),
            distribution: DistributionEnqueuer::new(queue.clone()),
        };

        Harness {
            dir,
            media,
            store,
            queue,
            entitlements,
            broadcaster,
            service: PipelineService::new(config, deps),
        }
    }

    fn options(value: serde_json::Value) -> ProcessingOptions {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_crop_captions_gif_scenario() {
        let h = harness(Setup::default()).await;

        let result = h
            .service
            .process(
                Some("pro-user"),
                Some(h.source()),
                options(json!({"autoCrop": true, "generateCaptions": true, "createGif": true})),
                "req-1",
            )
            .await
            .unwrap();

        assert_eq!(
            result.video_url,
            "https://cdn.test/videos/pro-user/02-captioned.mp4"
        );
        assert_eq!(
            result.gif_url.as_deref(),
            Some("https://cdn.test/gifs/pro-user/final.gif")
        );
        assert!(result.thumbnail_url.is_none());
        assert_eq!(result.features_used, vec!["autoCrop", "generateCaptions"]);
        assert!(result.session_id.is_none());
        assert!(result.warnings.is_empty());
        assert_eq!(result.request_id, "req-1");

        // exactly one primary upload, of the final output
        let primaries = h.store.puts_into("videos");
        assert_eq!(primaries.len(), 1);
        let primary = Path::new(&primaries[0]);
        assert_eq!(primary.file_name().unwrap(), "02-captioned.mp4");
        assert_eq!(primary.parent().unwrap().parent(), Some(h.work_root().as_path()));
    }

    #[tokio::test]
    async fn test_cleanup_removes_intermediates_but_not_source() {
        let h = harness(Setup::default()).await;

        h.service
            .process(
                Some("pro-user"),
                Some(h.source()),
                options(json!({"autoCrop": true, "generateCaptions": true})),
                "req-2",
            )
            .await
            .unwrap();

        // intermediates and the uploaded final copy are gone with the run dir
        assert!(h.work_dirs().is_empty());
        assert_eq!(h.store.puts_into("videos").len(), 1);
        assert!(PathBuf::from(h.source()).exists());
    }

    #[tokio::test]
    async fn test_cleanup_disabled_keeps_intermediates() {
        let h = harness(Setup {
            cleanup: false,
            ..Default::default()
        })
        .await;

        h.service
            .process(
                Some("pro-user"),
                Some(h.source()),
                options(json!({"autoCrop": true, "generateCaptions": true})),
                "req-3",
            )
            .await
            .unwrap();

        let dirs = h.work_dirs();
        assert_eq!(dirs.len(), 1);
        assert!(dirs[0].join("01-crop.mp4").exists());
        assert!(dirs[0].join("02-captioned.mp4").exists());
    }

    #[tokio::test]
    async fn test_missing_source_rejected_without_side_effects() {
        let h = harness(Setup::default()).await;

        let err = h
            .service
            .process(
                Some("pro-user"),
                None,
                options(json!({"autoCrop": true, "realtime": true})),
                "req-4",
            )
            .await
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(h.media.ops().is_empty());
        assert_eq!(h.broadcaster.session_count(), 0);
        assert!(h.store.puts().is_empty());
    }

    #[tokio::test]
    async fn test_plan_below_tier_rejected_without_side_effects() {
        let h = harness(Setup::default()).await;

        let err = h
            .service
            .process(
                Some("free-user"),
                Some(h.source()),
                options(json!({"autoCrop": true, "realtime": true})),
                "req-5",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Forbidden { plan: PlanTier::Free }));
        assert_eq!(err.category(), ErrorCategory::Forbidden);
        assert!(h.media.ops().is_empty());
        assert_eq!(h.broadcaster.session_count(), 0);
        assert!(h.store.puts().is_empty());
        assert!(h.work_dirs().is_empty());
    }

    #[tokio::test]
    async fn test_unauthenticated_skips_entitlement_lookup() {
        let h = harness(Setup::default()).await;

        let err = h
            .service
            .process(None, Some(h.source()), ProcessingOptions::default(), "req-6")
            .await
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Unauthorized);
        assert_eq!(h.entitlements.lookups(), 0);
    }

    #[tokio::test]
    async fn test_entitlement_outage_is_unavailable() {
        let h = harness(Setup {
            entitlements: FakeEntitlements::failing(),
            ..Default::default()
        })
        .await;

        let err = h
            .service
            .process(Some("pro-user"), Some(h.source()), ProcessingOptions::default(), "req-7")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Unavailable);
    }

    #[tokio::test]
    async fn test_stage_failure_skips_fan_out_and_cleans_up() {
        let h = harness(Setup {
            media: FakeMedia::default().failing("burn_subtitles"),
            ..Default::default()
        })
        .await;

        let err = h
            .service
            .process(
                Some("pro-user"),
                Some(h.source()),
                options(json!({"autoCrop": true, "generateCaptions": true, "createGif": true})),
                "req-8",
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::StageFailed {
                stage: vforge_models::StageKind::CaptionBurn,
                ..
            }
        ));
        assert_eq!(err.category(), ErrorCategory::ProcessingFailed);
        assert!(h.store.puts().is_empty());
        assert!(!h.media.ops().contains(&"render_gif"));
        assert!(h.work_dirs().is_empty());
        assert!(PathBuf::from(h.source()).exists());
    }

    #[tokio::test]
    async fn test_gif_failure_still_succeeds_with_thumbnail() {
        let h = harness(Setup {
            media: FakeMedia::default().failing("render_gif"),
            ..Default::default()
        })
        .await;

        let result = h
            .service
            .process(
                Some("pro-user"),
                Some(h.source()),
                options(json!({"autoCrop": true, "createGif": true, "generateThumbnail": true})),
                "req-9",
            )
            .await
            .unwrap();

        assert!(result.gif_url.is_none());
        assert!(result.thumbnail_url.is_some());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].task, FanOutTask::Gif);
    }

    #[tokio::test]
    async fn test_primary_upload_failure_fails_request() {
        let h = harness(Setup {
            store: FakeStore::default().failing_folder("videos"),
            ..Default::default()
        })
        .await;

        let err = h
            .service
            .process(
                Some("pro-user"),
                Some(h.source()),
                options(json!({"autoCrop": true})),
                "req-10",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::PrimaryUpload(_)));
        assert_eq!(err.category(), ErrorCategory::ProcessingFailed);
        assert!(h.work_dirs().is_empty());
    }

    #[tokio::test]
    async fn test_no_stages_uploads_source() {
        let h = harness(Setup::default()).await;

        let result = h
            .service
            .process(Some("pro-user"), Some(h.source()), ProcessingOptions::default(), "req-11")
            .await
            .unwrap();

        assert_eq!(result.video_url, "https://cdn.test/videos/pro-user/upload.mp4");
        assert!(result.features_used.is_empty());
        assert!(PathBuf::from(h.source()).exists());
    }

    #[tokio::test]
    async fn test_repeated_request_id_gets_separate_work_dirs() {
        let h = harness(Setup {
            cleanup: false,
            ..Default::default()
        })
        .await;
        let opts = || options(json!({"autoCrop": true}));

        let (a, b) = tokio::join!(
            h.service.process(Some("pro-user"), Some(h.source()), opts(), "../../shared"),
            h.service.process(Some("pro-user"), Some(h.source()), opts(), "../../shared"),
        );
        a.unwrap();
        b.unwrap();

        let dirs = h.work_dirs();
        assert_eq!(dirs.len(), 2);
        assert!(dirs.iter().all(|d| d.parent() == Some(h.work_root().as_path())));

        let primaries = h.store.puts_into("videos");
        assert_eq!(primaries.len(), 2);
        assert_ne!(primaries[0], primaries[1]);
    }

    #[tokio::test]
    async fn test_share_to_social_enqueues_durable_video() {
        let h = harness(Setup::default()).await;

        let result = h
            .service
            .process(
                Some("pro-user"),
                Some(h.source()),
                options(json!({
                    "autoCrop": true,
                    "shareToSocial": true,
                    "platforms": ["tiktok"]
                })),
                "req-12",
            )
            .await
            .unwrap();

        let records = h.queue.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].video_url, result.video_url);
        assert_eq!(records[0].owner_id, "pro-user");
    }

    #[tokio::test]
    async fn test_distribution_failure_does_not_fail_request() {
        let h = harness(Setup {
            queue: FakeQueue::failing(),
            ..Default::default()
        })
        .await;

        let result = h
            .service
            .process(
                Some("pro-user"),
                Some(h.source()),
                options(json!({"shareToSocial": true, "platforms": ["youtube"]})),
                "req-13",
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_realtime_run_streams_session_events() {
        let h = harness(Setup::default()).await;
        let (sub, mut rx) = h.broadcaster.subscriber_channel();
        h.broadcaster.register_connection("pro-user", sub);

        let result = h
            .service
            .process(
                Some("pro-user"),
                Some(h.source()),
                options(json!({"autoCrop": true, "generateCaptions": true, "realtime": true})),
                "req-14",
            )
            .await
            .unwrap();
        let session_id = result.session_id.clone().unwrap();

        let mut types = Vec::new();
        let mut features = Vec::new();
        while let Some(event) = rx.recv().await {
            types.push(event.type_name());
            match event {
                SessionEvent::SessionStart { session_id: id, user_id } => {
                    assert_eq!(id, session_id);
                    assert_eq!(user_id, "pro-user");
                }
                SessionEvent::Progress(p) => {
                    assert!(p.preview_url.is_some());
                    features.push(p.feature);
                }
                SessionEvent::Done { video_url, .. } => {
                    assert_eq!(video_url, result.video_url);
                    break;
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }

        assert_eq!(types, vec!["session-start", "progress", "progress", "done"]);
        assert_eq!(features, vec!["autoCrop", "generateCaptions"]);
        // two previews plus the primary upload
        assert_eq!(h.store.puts().len(), 3);
    }

    #[tokio::test]
    async fn test_realtime_stage_failure_publishes_error() {
        let h = harness(Setup {
            media: FakeMedia::default().failing("crop"),
            ..Default::default()
        })
        .await;
        let (sub, mut rx) = h.broadcaster.subscriber_channel();
        h.broadcaster.register_connection("pro-user", sub);

        let _ = h
            .service
            .process(
                Some("pro-user"),
                Some(h.source()),
                options(json!({"autoCrop": true, "realtime": true})),
                "req-15",
            )
            .await
            .unwrap_err();

        assert!(matches!(rx.recv().await, Some(SessionEvent::SessionStart { .. })));
        match rx.recv().await {
            Some(SessionEvent::Error { message }) => assert_eq!(message, "processing failed"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
