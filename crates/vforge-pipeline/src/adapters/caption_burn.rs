//! Burned-in captions from a transcript.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use vforge_media::MediaEngine;
use vforge_ml_client::LanguageService;
use vforge_models::{ArtifactKind, ArtifactRef, Stage, StageKind};

use super::{input_path, StageAdapter};
use crate::error::StageError;

pub struct CaptionBurnAdapter {
    language: Arc<dyn LanguageService>,
    media: Arc<dyn MediaEngine>,
}

impl CaptionBurnAdapter {
    pub fn new(language: Arc<dyn LanguageService>, media: Arc<dyn MediaEngine>) -> Self {
        Self { language, media }
    }

    fn srt_path(output: &Path) -> PathBuf {
        output.with_extension("srt")
    }
}

#[async_trait]
impl StageAdapter for CaptionBurnAdapter {
    fn kind(&self) -> StageKind {
        StageKind::CaptionBurn
    }

    fn side_outputs(&self, output: &Path) -> Vec<PathBuf> {
        vec![Self::srt_path(output)]
    }

    async fn transform(
        &self,
        input: &ArtifactRef,
        output: &Path,
        stage: &Stage,
    ) -> Result<ArtifactRef, StageError> {
        let Stage::CaptionBurn(params) = stage else {
            return Err(StageError::ParamsMismatch(self.kind()));
        };
        let source = input_path(input);

        let srt = self.language.transcribe(&source).await?;
        if srt.trim().is_empty() {
            // nothing spoken; subtitles filter rejects an empty file
            warn!(input = %input, "Empty transcript, re-encoding without captions");
            self.media.crop(&source, output, None).await?;
            return Ok(ArtifactRef::ephemeral(output, ArtifactKind::Video));
        }

        let srt_path = Self::srt_path(output);
        tokio::fs::write(&srt_path, &srt).await?;

        self.media
            .burn_subtitles(&source, output, &srt_path, params.font_size)
            .await?;
        info!(bytes = srt.len(), "Captions burned");
        Ok(ArtifactRef::ephemeral(output, ArtifactKind::Video))
    }
}
