//! Letterbox removal.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use vforge_media::MediaEngine;
use vforge_models::{ArtifactKind, ArtifactRef, Stage, StageKind};

use super::{input_path, StageAdapter};
use crate::error::StageError;

pub struct AutoCropAdapter {
    media: Arc<dyn MediaEngine>,
}

impl AutoCropAdapter {
    pub fn new(media: Arc<dyn MediaEngine>) -> Self {
        Self { media }
    }
}

#[async_trait]
impl StageAdapter for AutoCropAdapter {
    fn kind(&self) -> StageKind {
        StageKind::AutoCrop
    }

    async fn transform(
        &self,
        input: &ArtifactRef,
        output: &Path,
        stage: &Stage,
    ) -> Result<ArtifactRef, StageError> {
        let Stage::AutoCrop(params) = stage else {
            return Err(StageError::ParamsMismatch(self.kind()));
        };
        let source = input_path(input);

        let rect = self
            .media
            .detect_crop(&source, params.limit, params.round)
            .await?;
        debug!(input = %input, crop = ?rect, "Crop detection finished");

        // no border still yields a fresh output
        self.media.crop(&source, output, rect).await?;
        Ok(ArtifactRef::ephemeral(output, ArtifactKind::Video))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vforge_media::CropRect;
    use vforge_models::AutoCropParams;

    use crate::testing::FakeMedia;

    #[tokio::test]
    async fn test_crops_to_detected_rect() {
        let dir = tempfile::tempdir().unwrap();
        let rect = CropRect {
            width: 1920,
            height: 800,
            x: 0,
            y: 140,
        };
        let media = Arc::new(FakeMedia::default().with_crop(rect));
        let adapter = AutoCropAdapter::new(media.clone());
        let out = dir.path().join("01-crop.mp4");

        let result = adapter
            .transform(
                &ArtifactRef::source("/in/v1.mp4"),
                &out,
                &Stage::AutoCrop(AutoCropParams::default()),
            )
            .await
            .unwrap();

        assert_eq!(result, ArtifactRef::ephemeral(&out, ArtifactKind::Video));
        assert!(out.exists());
        assert_eq!(media.ops(), vec!["detect_crop", "crop"]);
        assert_eq!(media.last_crop(), Some(Some(rect)));
    }

    #[tokio::test]
    async fn test_no_border_still_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let media = Arc::new(FakeMedia::default());
        let adapter = AutoCropAdapter::new(media.clone());
        let out = dir.path().join("01-crop.mp4");

        adapter
            .transform(
                &ArtifactRef::source("/in/v1.mp4"),
                &out,
                &Stage::AutoCrop(AutoCropParams::default()),
            )
            .await
            .unwrap();

        assert!(out.exists());
        assert_eq!(media.last_crop(), Some(None));
    }

    #[tokio::test]
    async fn test_rejects_foreign_params() {
        let adapter = AutoCropAdapter::new(Arc::new(FakeMedia::default()));
        let err = adapter
            .transform(
                &ArtifactRef::source("/in/v1.mp4"),
                Path::new("/tmp/out.mp4"),
                &Stage::CaptionBurn(Default::default()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::ParamsMismatch(StageKind::AutoCrop)));
    }
}
