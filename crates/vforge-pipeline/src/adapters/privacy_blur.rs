//! Face and license plate redaction.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use vforge_media::MediaEngine;
use vforge_ml_client::VisionService;
use vforge_models::{ArtifactKind, ArtifactRef, Stage, StageKind};

use super::{input_path, StageAdapter};
use crate::error::StageError;

pub struct PrivacyBlurAdapter {
    vision: Arc<dyn VisionService>,
    media: Arc<dyn MediaEngine>,
}

impl PrivacyBlurAdapter {
    pub fn new(vision: Arc<dyn VisionService>, media: Arc<dyn MediaEngine>) -> Self {
        Self { vision, media }
    }
}

#[async_trait]
impl StageAdapter for PrivacyBlurAdapter {
    fn kind(&self) -> StageKind {
        StageKind::PrivacyBlur
    }

    async fn transform(
        &self,
        input: &ArtifactRef,
        output: &Path,
        stage: &Stage,
    ) -> Result<ArtifactRef, StageError> {
        let Stage::PrivacyBlur(params) = stage else {
            return Err(StageError::ParamsMismatch(self.kind()));
        };
        let source = input_path(input);

        let regions: Vec<_> = self
            .vision
            .detect_regions(&source, &params.targets)
            .await?
            .into_iter()
            .filter(|r| !r.is_empty())
            .collect();
        info!(regions = regions.len(), "Blurring detected regions");

        self.media
            .blur_regions(&source, output, &regions, params.strength)
            .await?;
        Ok(ArtifactRef::ephemeral(output, ArtifactKind::Video))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vforge_models::{BlurTarget, PrivacyBlurParams, Region};

    use crate::testing::{FakeMedia, FakeVision};

    #[tokio::test]
    async fn test_blurs_detected_regions_only() {
        let dir = tempfile::tempdir().unwrap();
        let vision = Arc::new(FakeVision::with_regions(vec![
            Region::new(10, 10, 64, 64),
            Region::new(0, 0, 0, 0),
        ]));
        let media = Arc::new(FakeMedia::default());
        let adapter = PrivacyBlurAdapter::new(vision.clone(), media.clone());
        let out = dir.path().join("03-blurred.mp4");
        let params = PrivacyBlurParams {
            targets: vec![BlurTarget::Faces],
            strength: 12,
        };

        adapter
            .transform(
                &ArtifactRef::source("/in/v1.mp4"),
                &out,
                &Stage::PrivacyBlur(params),
            )
            .await
            .unwrap();

        assert!(out.exists());
        assert_eq!(vision.requested_targets(), vec![vec![BlurTarget::Faces]]);
        assert_eq!(media.last_blur_region_count(), Some(1));
    }

    #[tokio::test]
    async fn test_detection_failure_surfaces() {
        let vision = Arc::new(FakeVision::failing());
        let media = Arc::new(FakeMedia::default());
        let adapter = PrivacyBlurAdapter::new(vision, media.clone());

        let err = adapter
            .transform(
                &ArtifactRef::source("/in/v1.mp4"),
                Path::new("/tmp/never.mp4"),
                &Stage::PrivacyBlur(PrivacyBlurParams::default()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Ml(_)));
        assert!(media.ops().is_empty());
    }
}
