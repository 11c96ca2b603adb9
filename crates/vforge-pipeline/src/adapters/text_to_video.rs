//! Narrated video from text.
//!
//! The current chain output supplies the visuals and acts as a content hint
//! for the script; the synthesized narration becomes the new audio track.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use vforge_media::MediaEngine;
use vforge_ml_client::LanguageService;
use vforge_models::{ArtifactKind, ArtifactRef, Stage, StageKind};

use super::{input_path, StageAdapter};
use crate::error::StageError;

pub struct TextToVideoAdapter {
    language: Arc<dyn LanguageService>,
    media: Arc<dyn MediaEngine>,
}

impl TextToVideoAdapter {
    pub fn new(language: Arc<dyn LanguageService>, media: Arc<dyn MediaEngine>) -> Self {
        Self { language, media }
    }

    fn audio_path(output: &Path) -> PathBuf {
        output.with_extension("mp3")
    }
}

#[async_trait]
impl StageAdapter for TextToVideoAdapter {
    fn kind(&self) -> StageKind {
        StageKind::TextToVideo
    }

    fn side_outputs(&self, output: &Path) -> Vec<PathBuf> {
        vec![Self::audio_path(output)]
    }

    async fn transform(
        &self,
        input: &ArtifactRef,
        output: &Path,
        stage: &Stage,
    ) -> Result<ArtifactRef, StageError> {
        let Stage::TextToVideo(params) = stage else {
            return Err(StageError::ParamsMismatch(self.kind()));
        };

        let script = self
            .language
            .generate_script(&params.text, Some(&input.locator))
            .await?;
        if script.trim().is_empty() {
            return Err(StageError::failed("language service returned an empty script"));
        }

        let audio = Self::audio_path(output);
        self.language
            .synthesize_speech(&script, params.voice.as_deref(), &audio)
            .await?;

        self.media
            .narrate(&input_path(input), &audio, output)
            .await?;

        info!(chars = script.len(), "Narrated video generated");
        Ok(ArtifactRef::ephemeral(output, ArtifactKind::Video))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vforge_models::TextToVideoParams;

    use crate::testing::{FakeLanguage, FakeMedia};

    fn stage(text: &str) -> Stage {
        Stage::TextToVideo(TextToVideoParams {
            text: text.into(),
            voice: Some("alloy".into()),
        })
    }

    #[tokio::test]
    async fn test_script_speech_then_narrate() {
        let dir = tempfile::tempdir().unwrap();
        let language = Arc::new(FakeLanguage::default());
        let media = Arc::new(FakeMedia::default());
        let adapter = TextToVideoAdapter::new(language.clone(), media.clone());
        let out = dir.path().join("02-narrated.mp4");

        adapter
            .transform(&ArtifactRef::source("/in/v1.mp4"), &out, &stage("a cat story"))
            .await
            .unwrap();

        assert!(out.exists());
        assert!(out.with_extension("mp3").exists());
        assert_eq!(
            language.script_requests(),
            vec![("a cat story".to_string(), Some("/in/v1.mp4".to_string()))]
        );
        assert_eq!(media.ops(), vec!["narrate"]);
    }

    #[tokio::test]
    async fn test_empty_script_fails() {
        let dir = tempfile::tempdir().unwrap();
        let language = Arc::new(FakeLanguage::default().with_script("  "));
        let media = Arc::new(FakeMedia::default());
        let adapter = TextToVideoAdapter::new(language, media.clone());

        let err = adapter
            .transform(
                &ArtifactRef::source("/in/v1.mp4"),
                &dir.path().join("out.mp4"),
                &stage("x"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Failed(_)));
        assert!(media.ops().is_empty());
    }

    #[test]
    fn test_side_outputs_next_to_output() {
        let adapter = TextToVideoAdapter::new(
            Arc::new(FakeLanguage::default()),
            Arc::new(FakeMedia::default()),
        );
        assert_eq!(
            adapter.side_outputs(Path::new("/w/r1/02-narrated.mp4")),
            vec![PathBuf::from("/w/r1/02-narrated.mp3")]
        );
    }
}
