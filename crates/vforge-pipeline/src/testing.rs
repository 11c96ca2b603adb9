//! Substitute collaborators for tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use vforge_firestore::{EntitlementSource, FirestoreError, FirestoreResult};
use vforge_media::{ChromaKey, CropRect, MediaEngine, MediaError, MediaResult};
use vforge_ml_client::{LanguageService, MlError, MlResult, VisionService};
use vforge_models::{
    ArtifactKind, ArtifactRef, BlurTarget, DistributionRecord, PlanTier, Region, Stage, StageKind,
};
use vforge_queue::{DistributionQueue, QueueError, QueueResult};
use vforge_storage::{DurableStore, StorageError, StorageResult};

use crate::adapters::StageAdapter;
use crate::error::StageError;

async fn write_output(output: &Path, body: &str) -> std::io::Result<()> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output, body).await
}

/// Media engine that writes placeholder files.
#[derive(Default)]
pub struct FakeMedia {
    calls: Mutex<Vec<(&'static str, PathBuf, PathBuf)>>,
    fail_ops: HashSet<&'static str>,
    crop_rect: Option<CropRect>,
    last_crop: Mutex<Option<Option<CropRect>>>,
    last_blur: Mutex<Option<usize>>,
    last_key: Mutex<Option<ChromaKey>>,
}

impl FakeMedia {
    pub fn with_crop(mut self, rect: CropRect) -> Self {
        self.crop_rect = Some(rect);
        self
    }

    pub fn failing(mut self, op: &'static str) -> Self {
        self.fail_ops.insert(op);
        self
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(|(op, _, _)| *op).collect()
    }

    pub fn calls(&self) -> Vec<(&'static str, PathBuf, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_crop(&self) -> Option<Option<CropRect>> {
        *self.last_crop.lock().unwrap()
    }

    pub fn last_blur_region_count(&self) -> Option<usize> {
        *self.last_blur.lock().unwrap()
    }

    pub fn last_chroma_key(&self) -> Option<ChromaKey> {
        *self.last_key.lock().unwrap()
    }

    async fn produce(&self, op: &'static str, input: &Path, output: &Path) -> MediaResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((op, input.to_path_buf(), output.to_path_buf()));
        if self.fail_ops.contains(op) {
            return Err(MediaError::internal(format!("{} failed", op)));
        }
        write_output(output, op).await?;
        Ok(())
    }
}

#[async_trait]
impl MediaEngine for FakeMedia {
    async fn detect_crop(&self, input: &Path, _limit: u8, _round: u8) -> MediaResult<Option<CropRect>> {
        self.calls
            .lock()
            .unwrap()
            .push(("detect_crop", input.to_path_buf(), PathBuf::new()));
        if self.fail_ops.contains("detect_crop") {
            return Err(MediaError::internal("detect_crop failed"));
        }
        Ok(self.crop_rect)
    }

    async fn crop(&self, input: &Path, output: &Path, rect: Option<CropRect>) -> MediaResult<()> {
        *self.last_crop.lock().unwrap() = Some(rect);
        self.produce("crop", input, output).await
    }

    async fn blur_regions(
        &self,
        input: &Path,
        output: &Path,
        regions: &[Region],
        _strength: u32,
    ) -> MediaResult<()> {
        *self.last_blur.lock().unwrap() = Some(regions.len());
        self.produce("blur_regions", input, output).await
    }

    async fn chroma_key(&self, input: &Path, output: &Path, key: ChromaKey) -> MediaResult<()> {
        *self.last_key.lock().unwrap() = Some(key);
        self.produce("chroma_key", input, output).await
    }

    async fn burn_subtitles(
        &self,
        input: &Path,
        output: &Path,
        _srt: &Path,
        _font_size: u32,
    ) -> MediaResult<()> {
        self.produce("burn_subtitles", input, output).await
    }

    async fn narrate(&self, video: &Path, _audio: &Path, output: &Path) -> MediaResult<()> {
        self.produce("narrate", video, output).await
    }

    async fn render_gif(&self, input: &Path, output: &Path) -> MediaResult<()> {
        self.produce("render_gif", input, output).await
    }

    async fn render_thumbnail(&self, input: &Path, output: &Path) -> MediaResult<()> {
        self.produce("render_thumbnail", input, output).await
    }
}

#[derive(Default)]
pub struct FakeVision {
    regions: Vec<Region>,
    fail: bool,
    requests: Mutex<Vec<Vec<BlurTarget>>>,
}

impl FakeVision {
    pub fn with_regions(regions: Vec<Region>) -> Self {
        Self {
            regions,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn requested_targets(&self) -> Vec<Vec<BlurTarget>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionService for FakeVision {
    async fn detect_regions(&self, _input: &Path, targets: &[BlurTarget]) -> MlResult<Vec<Region>> {
        self.requests.lock().unwrap().push(targets.to_vec());
        if self.fail {
            return Err(MlError::ServiceUnavailable("detector offline".into()));
        }
        Ok(self.regions.clone())
    }
}

pub struct FakeLanguage {
    script: String,
    srt: String,
    script_requests: Mutex<Vec<(String, Option<String>)>>,
}

impl Default for FakeLanguage {
    fn default() -> Self {
        Self {
            script: "Once upon a time there was a cat.".into(),
            srt: "1\n00:00:00,000 --> 00:00:02,000\nhello there\n".into(),
            script_requests: Mutex::new(Vec::new()),
        }
    }
}

impl FakeLanguage {
    pub fn with_script(mut self, script: &str) -> Self {
        self.script = script.to_string();
        self
    }

    pub fn with_srt(mut self, srt: &str) -> Self {
        self.srt = srt.to_string();
        self
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn srt(&self) -> &str {
        &self.srt
    }

    pub fn script_requests(&self) -> Vec<(String, Option<String>)> {
        self.script_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageService for FakeLanguage {
    async fn generate_script(&self, text: &str, content_hint: Option<&str>) -> MlResult<String> {
        self.script_requests
            .lock()
            .unwrap()
            .push((text.to_string(), content_hint.map(str::to_string)));
        Ok(self.script.clone())
    }

    async fn synthesize_speech(
        &self,
        _script: &str,
        _voice: Option<&str>,
        output: &Path,
    ) -> MlResult<()> {
        write_output(output, "mp3").await?;
        Ok(())
    }

    async fn transcribe(&self, _input: &Path) -> MlResult<String> {
        Ok(self.srt.clone())
    }
}

/// Durable store that records uploads and hands back CDN-style URIs.
#[derive(Default)]
pub struct FakeStore {
    puts: Mutex<Vec<(String, String)>>,
    deletes: Mutex<Vec<String>>,
    fail_kinds: HashSet<ArtifactKind>,
    fail_folders: Vec<String>,
}

impl FakeStore {
    pub fn failing_kind(mut self, kind: ArtifactKind) -> Self {
        self.fail_kinds.insert(kind);
        self
    }

    pub fn failing_folder(mut self, folder: &str) -> Self {
        self.fail_folders.push(folder.to_string());
        self
    }

    /// `(locator, folder)` of every put, failed ones included.
    pub fn puts(&self) -> Vec<(String, String)> {
        self.puts.lock().unwrap().clone()
    }

    pub fn puts_into(&self, folder: &str) -> Vec<String> {
        self.puts()
            .into_iter()
            .filter(|(_, f)| f.starts_with(folder))
            .map(|(locator, _)| locator)
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl DurableStore for FakeStore {
    async fn put(&self, local: &ArtifactRef, folder: &str) -> StorageResult<String> {
        self.puts
            .lock()
            .unwrap()
            .push((local.locator.clone(), folder.to_string()));

        let path = local
            .local_path()
            .ok_or_else(|| StorageError::NotLocal(local.locator.clone()))?;
        if self.fail_kinds.contains(&local.kind)
            || self.fail_folders.iter().any(|f| folder.starts_with(f.as_str()))
        {
            return Err(StorageError::upload_failed(folder, "bucket unavailable"));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(format!("https://cdn.test/{}/{}", folder, name))
    }

    async fn delete(&self, uri: &str) -> StorageResult<()> {
        self.deletes.lock().unwrap().push(uri.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeEntitlements {
    plans: HashMap<String, PlanTier>,
    fail: bool,
    lookups: AtomicUsize,
}

impl FakeEntitlements {
    pub fn with_plan(mut self, uid: &str, plan: PlanTier) -> Self {
        self.plans.insert(uid.to_string(), plan);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntitlementSource for FakeEntitlements {
    async fn plan_for(&self, uid: &str) -> FirestoreResult<PlanTier> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(FirestoreError::request_failed("firestore down"));
        }
        Ok(self.plans.get(uid).copied().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct FakeQueue {
    records: Mutex<Vec<DistributionRecord>>,
    fail: bool,
}

impl FakeQueue {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn records(&self) -> Vec<DistributionRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl DistributionQueue for FakeQueue {
    async fn enqueue(&self, record: &DistributionRecord) -> QueueResult<String> {
        self.records.lock().unwrap().push(record.clone());
        if self.fail {
            return Err(QueueError::enqueue_failed("stream unavailable"));
        }
        Ok("1-0".to_string())
    }
}

/// `(kind, input locator, output path)` for every adapter invocation.
pub type CallLog = Arc<Mutex<Vec<(StageKind, String, PathBuf)>>>;

/// Adapter that writes a placeholder output and logs its invocation.
pub struct RecordingAdapter {
    kind: StageKind,
    log: CallLog,
    fail: bool,
}

impl RecordingAdapter {
    pub fn new(kind: StageKind, log: CallLog) -> Self {
        Self {
            kind,
            log,
            fail: false,
        }
    }

    pub fn failing(kind: StageKind, log: CallLog) -> Self {
        Self {
            kind,
            log,
            fail: true,
        }
    }
}

#[async_trait]
impl StageAdapter for RecordingAdapter {
    fn kind(&self) -> StageKind {
        self.kind
    }

    async fn transform(
        &self,
        input: &ArtifactRef,
        output: &Path,
        _stage: &Stage,
    ) -> Result<ArtifactRef, StageError> {
        self.log
            .lock()
            .unwrap()
            .push((self.kind, input.locator.clone(), output.to_path_buf()));
        if self.fail {
            return Err(StageError::failed(format!("{} exploded", self.kind)));
        }
        write_output(output, self.kind.as_str()).await?;
        Ok(ArtifactRef::ephemeral(output, ArtifactKind::Video))
    }
}
