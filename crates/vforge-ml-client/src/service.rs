//! Capabilities consumed by stage adapters.

use std::path::Path;

use async_trait::async_trait;
use vforge_models::{BlurTarget, Region};

use crate::error::MlResult;

/// Object/face detection.
#[async_trait]
pub trait VisionService: Send + Sync {
    /// Regions in `input` matching any of `targets`.
    async fn detect_regions(&self, input: &Path, targets: &[BlurTarget]) -> MlResult<Vec<Region>>;
}

/// Language model, text-to-speech and speech-to-text.
#[async_trait]
pub trait LanguageService: Send + Sync {
    /// Narration script for `text`, optionally conditioned on an existing video.
    async fn generate_script(&self, text: &str, content_hint: Option<&str>) -> MlResult<String>;

    /// Render `script` as speech into `output`.
    async fn synthesize_speech(
        &self,
        script: &str,
        voice: Option<&str>,
        output: &Path,
    ) -> MlResult<()>;

    /// Transcribe the audio track of `input` to SRT.
    async fn transcribe(&self, input: &Path) -> MlResult<String>;
}
