//! Sequential stage executor.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use vforge_models::{ArtifactRef, ProgressEvent, SessionEvent, Stage, StageKind};
use vforge_queue::SessionHandle;
use vforge_storage::DurableStore;

use crate::adapters::StageRegistry;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::PipelineLogger;
use crate::metrics;
use crate::tracker::ArtifactTracker;

/// Per-request execution context.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Caller-visible correlation id. Never used to build paths.
    pub request_id: String,
    /// Server-minted id naming the work dir
    pub run_id: String,
    pub owner: String,
    /// `{work_root}/{run_id}`, private to this run
    pub work_dir: PathBuf,
    pub logger: PipelineLogger,
}

impl RunContext {
    pub fn new(request_id: &str, owner: &str, work_root: &Path) -> Self {
        let run_id = Uuid::new_v4().simple().to_string();
        Self {
            request_id: request_id.to_string(),
            owner: owner.to_string(),
            work_dir: work_root.join(&run_id),
            run_id,
            logger: PipelineLogger::new(request_id, "process"),
        }
    }

    /// Fresh output locator for the `index`-th stage (1-based).
    pub fn stage_output(&self, index: usize, kind: StageKind) -> PathBuf {
        self.work_dir
            .join(format!("{:02}-{}.mp4", index, kind.slug()))
    }
}

/// Result of a completed chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub final_ref: ArtifactRef,
    /// Stages that ran, in order
    pub executed: Vec<StageKind>,
}

impl ExecutionOutcome {
    /// Feature tags reported to the caller.
    pub fn features_used(&self) -> Vec<String> {
        self.executed.iter().map(|k| k.as_str().to_string()).collect()
    }
}

/// Runs stages strictly in sequence, each on the previous stage's output.
pub struct Executor {
    registry: StageRegistry,
    store: Arc<dyn DurableStore>,
    config: Arc<PipelineConfig>,
}

impl Executor {
    pub fn new(
        registry: StageRegistry,
        store: Arc<dyn DurableStore>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            registry,
            store,
            config,
        }
    }

    /// Run `stages` over `source`.
    ///
    /// Every output locator is registered in `tracker` before its adapter
    /// runs, so partial outputs of a failed stage are swept as well. The
    /// first failure aborts the chain.
    pub async fn execute(
        &self,
        ctx: &RunContext,
        source: &ArtifactRef,
        stages: &[Stage],
        session: Option<&SessionHandle>,
        tracker: &mut ArtifactTracker,
    ) -> PipelineResult<ExecutionOutcome> {
        if stages.is_empty() {
            return Ok(ExecutionOutcome {
                final_ref: source.clone(),
                executed: Vec::new(),
            });
        }

        tokio::fs::create_dir_all(&ctx.work_dir).await?;

        let mut current = source.clone();
        let mut executed = Vec::with_capacity(stages.len());

        for (index, stage) in stages.iter().enumerate() {
            let kind = stage.kind();
            let adapter = self
                .registry
                .get(kind)
                .map_err(|e| PipelineError::stage_failed(kind, e))?;

            let output = ctx.stage_output(index + 1, kind);
            tracker.track(&output);
            for side in adapter.side_outputs(&output) {
                tracker.track(side);
            }

            ctx.logger
                .log_progress(&format!("stage {}/{} {}", index + 1, stages.len(), kind));
            let started = Instant::now();
            let result = adapter
                .transform(&current, &output, stage)
                .instrument(tracing::info_span!("stage", stage = %kind))
                .await;
            metrics::record_stage(kind.as_str(), result.is_ok(), started.elapsed().as_secs_f64());

            let next = match result {
                Ok(next) => next,
                Err(cause) => {
                    ctx.logger
                        .log_error(&format!("stage {} failed: {}", kind, cause));
                    return Err(PipelineError::stage_failed(kind, cause));
                }
            };
            if let Some(path) = next.local_path() {
                tracker.track(path);
            }

            current = next;
            executed.push(kind);

            if let Some(session) = session {
                self.publish_progress(ctx, session, kind, &current).await;
            }
        }

        Ok(ExecutionOutcome {
            final_ref: current,
            executed,
        })
    }

    /// Upload a preview (if enabled) and enqueue the progress event.
    ///
    /// Neither step can fail the chain.
    async fn publish_progress(
        &self,
        ctx: &RunContext,
        session: &SessionHandle,
        kind: StageKind,
        artifact: &ArtifactRef,
    ) {
        let preview_url = if self.config.preview_uploads && !artifact.is_durable() {
            let folder = self
                .config
                .folder(&format!("previews/{}", session.id()));
            match self.store.put(artifact, &folder).await {
                Ok(uri) => Some(uri),
                Err(e) => {
                    warn!(
                        request_id = %ctx.request_id,
                        stage = %kind,
                        error = %e,
                        "Preview upload failed, publishing progress without preview"
                    );
                    None
                }
            }
        } else {
            None
        };

        let event = SessionEvent::Progress(ProgressEvent::new(
            session.id().clone(),
            kind.as_str(),
            preview_url,
        ));
        if !session.publish(event) {
            debug!(session_id = %session.id(), stage = %kind, "Progress event not enqueued");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use vforge_models::{
        AutoCropParams, CaptionParams, PrivacyBlurParams, ProcessingOptions, TextToVideoParams,
    };
    use vforge_queue::{Broadcaster, BroadcasterConfig};

    use crate::testing::{CallLog, FakeStore, RecordingAdapter};

    fn registry(log: &CallLog, failing: Option<StageKind>) -> StageRegistry {
        let mut registry = StageRegistry::new();
        for kind in StageKind::ORDERED {
            if Some(kind) == failing {
                registry.register(Arc::new(RecordingAdapter::failing(kind, log.clone())));
            } else {
                registry.register(Arc::new(RecordingAdapter::new(kind, log.clone())));
            }
        }
        registry
    }

    fn all_stages() -> Vec<Stage> {
        vec![
            Stage::AutoCrop(AutoCropParams::default()),
            Stage::TextToVideo(TextToVideoParams {
                text: "hello".into(),
                voice: None,
            }),
            Stage::PrivacyBlur(PrivacyBlurParams::default()),
            Stage::BackgroundRemoval(Default::default()),
            Stage::CaptionBurn(CaptionParams::default()),
        ]
    }

    fn executor(registry: StageRegistry, store: Arc<FakeStore>) -> Executor {
        Executor::new(registry, store, Arc::new(PipelineConfig::default()))
    }

    #[tokio::test]
    async fn test_chain_feeds_each_output_forward() {
        let dir = tempfile::tempdir().unwrap();
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let exec = executor(registry(&log, None), Arc::new(FakeStore::default()));
        let ctx = RunContext::new("req-1", "u1", dir.path());
        let source = ArtifactRef::source("/in/v1.mp4");
        let mut tracker = ArtifactTracker::new();

        let outcome = exec
            .execute(&ctx, &source, &all_stages(), None, &mut tracker)
            .await
            .unwrap();

        let calls = log.lock().unwrap().clone();
        let kinds: Vec<_> = calls.iter().map(|(k, _, _)| *k).collect();
        assert_eq!(kinds, StageKind::ORDERED.to_vec());

        assert_eq!(calls[0].1, "/in/v1.mp4");
        for pair in calls.windows(2) {
            assert_eq!(pair[1].1, pair[0].2.to_string_lossy());
        }
        assert_eq!(outcome.final_ref.locator, calls[4].2.to_string_lossy());
        assert_eq!(
            outcome.features_used(),
            vec![
                "autoCrop",
                "generateFromText",
                "privacyBlur",
                "removeBackground",
                "generateCaptions"
            ]
        );
        assert_eq!(tracker.len(), 5);
        assert!(!tracker.contains(Path::new("/in/v1.mp4")));
    }

    #[tokio::test]
    async fn test_failure_stops_chain() {
        let dir = tempfile::tempdir().unwrap();
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let exec = executor(
            registry(&log, Some(StageKind::PrivacyBlur)),
            Arc::new(FakeStore::default()),
        );
        let ctx = RunContext::new("req-2", "u1", dir.path());
        let mut tracker = ArtifactTracker::new();

        let err = exec
            .execute(
                &ctx,
                &ArtifactRef::source("/in/v1.mp4"),
                &all_stages(),
                None,
                &mut tracker,
            )
            .await
            .unwrap_err();

        match err {
            PipelineError::StageFailed { stage, .. } => assert_eq!(stage, StageKind::PrivacyBlur),
            other => panic!("unexpected error: {other:?}"),
        }
        let kinds: Vec<_> = log.lock().unwrap().iter().map(|(k, _, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![StageKind::AutoCrop, StageKind::TextToVideo, StageKind::PrivacyBlur]
        );
        // the failed stage's locator is tracked too
        assert!(tracker.contains(&ctx.stage_output(3, StageKind::PrivacyBlur)));
    }

    #[tokio::test]
    async fn test_empty_chain_returns_source() {
        let dir = tempfile::tempdir().unwrap();
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let exec = executor(registry(&log, None), Arc::new(FakeStore::default()));
        let ctx = RunContext::new("req-3", "u1", dir.path());
        let source = ArtifactRef::source("https://cdn.test/in.mp4");
        let mut tracker = ArtifactTracker::new();

        let outcome = exec
            .execute(&ctx, &source, &[], None, &mut tracker)
            .await
            .unwrap();

        assert_eq!(outcome.final_ref, source);
        assert!(outcome.executed.is_empty());
        assert!(log.lock().unwrap().is_empty());
        assert!(!ctx.work_dir.exists());
    }

    #[tokio::test]
    async fn test_unregistered_stage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(StageRegistry::new(), Arc::new(FakeStore::default()));
        let ctx = RunContext::new("req-4", "u1", dir.path());
        let options: ProcessingOptions =
            serde_json::from_value(serde_json::json!({"removeBackground": true})).unwrap();

        let err = exec
            .execute(
                &ctx,
                &ArtifactRef::source("/in/v1.mp4"),
                &options.stages(),
                None,
                &mut ArtifactTracker::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::StageFailed {
                stage: StageKind::BackgroundRemoval,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_progress_events_follow_stage_order_with_previews() {
        let dir = tempfile::tempdir().unwrap();
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(FakeStore::default());
        let exec = executor(registry(&log, None), store.clone());
        let ctx = RunContext::new("req-5", "u1", dir.path());

        let broadcaster = Broadcaster::new(BroadcasterConfig::default());
        let (sub, mut rx) = broadcaster.subscriber_channel();
        broadcaster.register_connection("u1", sub);
        let session = broadcaster.create_session("u1");
        let mut tracker = ArtifactTracker::new();

        let stages = vec![
            Stage::AutoCrop(AutoCropParams::default()),
            Stage::CaptionBurn(CaptionParams::default()),
        ];
        exec.execute(
            &ctx,
            &ArtifactRef::source("/in/v1.mp4"),
            &stages,
            Some(&session),
            &mut tracker,
        )
        .await
        .unwrap();

        assert!(matches!(rx.recv().await, Some(SessionEvent::SessionStart { .. })));
        let mut features = Vec::new();
        for _ in 0..2 {
            match rx.recv().await {
                Some(SessionEvent::Progress(p)) => {
                    assert!(p.preview_url.unwrap().contains(&format!("previews/{}", session.id())));
                    features.push(p.feature);
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(features, vec!["autoCrop", "generateCaptions"]);
        assert_eq!(store.puts().len(), 2);
        // previews leave the cleanup set untouched
        assert_eq!(tracker.len(), 2);
    }

    #[tokio::test]
    async fn test_preview_failure_still_publishes_progress() {
        let dir = tempfile::tempdir().unwrap();
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(FakeStore::default().failing_folder("previews"));
        let exec = executor(registry(&log, None), store);
        let ctx = RunContext::new("req-6", "u1", dir.path());

        let broadcaster = Broadcaster::new(BroadcasterConfig::default());
        let session = broadcaster.create_session("u1");
        let (sub, mut rx) = broadcaster.subscriber_channel();
        broadcaster.join(session.id(), sub).await.unwrap();

        exec.execute(
            &ctx,
            &ArtifactRef::source("/in/v1.mp4"),
            &[Stage::AutoCrop(AutoCropParams::default())],
            Some(&session),
            &mut ArtifactTracker::new(),
        )
        .await
        .unwrap();

        match rx.recv().await {
            Some(SessionEvent::Progress(p)) => {
                assert_eq!(p.feature, "autoCrop");
                assert!(p.preview_url.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_work_dir_ignores_caller_request_id() {
        let root = Path::new("/tmp/vforge");
        for request_id in ["/etc/evil", "../../home/app", "same"] {
            let ctx = RunContext::new(request_id, "u1", root);
            assert_eq!(ctx.work_dir.parent(), Some(root));
            assert_eq!(ctx.request_id, request_id);
        }

        let alice = RunContext::new("same", "alice", root);
        let bob = RunContext::new("same", "bob", root);
        assert_ne!(alice.work_dir, bob.work_dir);
        assert_ne!(
            alice.stage_output(1, StageKind::AutoCrop),
            bob.stage_output(1, StageKind::AutoCrop)
        );
    }
}
