//! Chroma-key background removal.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use vforge_media::{ChromaKey, MediaEngine};
use vforge_models::{ArtifactKind, ArtifactRef, Stage, StageKind};

use super::{input_path, StageAdapter};
use crate::error::StageError;

/// Solid background placed behind keyed pixels.
pub const REPLACEMENT_COLOR: u32 = 0x000000;

pub struct BackgroundRemovalAdapter {
    media: Arc<dyn MediaEngine>,
}

impl BackgroundRemovalAdapter {
    pub fn new(media: Arc<dyn MediaEngine>) -> Self {
        Self { media }
    }
}

#[async_trait]
impl StageAdapter for BackgroundRemovalAdapter {
    fn kind(&self) -> StageKind {
        StageKind::BackgroundRemoval
    }

    async fn transform(
        &self,
        input: &ArtifactRef,
        output: &Path,
        stage: &Stage,
    ) -> Result<ArtifactRef, StageError> {
        let Stage::BackgroundRemoval(params) = stage else {
            return Err(StageError::ParamsMismatch(self.kind()));
        };

        let key = ChromaKey {
            key_color: params.key_color,
            similarity: params.similarity.clamp(0.01, 1.0),
            blend: params.blend.clamp(0.0, 1.0),
            replacement: REPLACEMENT_COLOR,
        };
        self.media
            .chroma_key(&input_path(input), output, key)
            .await?;
        Ok(ArtifactRef::ephemeral(output, ArtifactKind::Video))
    }
}
