//! Stage adapters.
//!
//! One adapter per transform variant. Each takes the current chain output
//! and writes a new video at the locator the executor allocated.

mod auto_crop;
mod background_removal;
mod caption_burn;
mod privacy_blur;
mod text_to_video;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use vforge_media::MediaEngine;
use vforge_ml_client::{LanguageService, VisionService};
use vforge_models::{ArtifactRef, Stage, StageKind};

use crate::error::StageError;

pub use auto_crop::AutoCropAdapter;
pub use background_removal::BackgroundRemovalAdapter;
pub use caption_burn::CaptionBurnAdapter;
pub use privacy_blur::PrivacyBlurAdapter;
pub use text_to_video::TextToVideoAdapter;

/// A single transform capability.
#[async_trait]
pub trait StageAdapter: Send + Sync {
    /// Variant this adapter executes.
    fn kind(&self) -> StageKind;

    /// Auxiliary files the adapter writes next to `output`.
    fn side_outputs(&self, _output: &Path) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Transform `input` into a new artifact at `output`.
    ///
    /// Adapters own their retry policy; the executor never retries.
    async fn transform(
        &self,
        input: &ArtifactRef,
        output: &Path,
        stage: &Stage,
    ) -> Result<ArtifactRef, StageError>;
}

/// Maps each stage kind to its adapter.
#[derive(Clone, Default)]
pub struct StageRegistry {
    adapters: HashMap<StageKind, Arc<dyn StageAdapter>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the production adapters for every variant.
    pub fn with_defaults(
        media: Arc<dyn MediaEngine>,
        vision: Arc<dyn VisionService>,
        language: Arc<dyn LanguageService>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AutoCropAdapter::new(media.clone())));
        registry.register(Arc::new(TextToVideoAdapter::new(
            language.clone(),
            media.clone(),
        )));
        registry.register(Arc::new(PrivacyBlurAdapter::new(vision, media.clone())));
        registry.register(Arc::new(BackgroundRemovalAdapter::new(media.clone())));
        registry.register(Arc::new(CaptionBurnAdapter::new(language, media)));
        registry
    }

    /// Register an adapter, replacing any previous one for its kind.
    pub fn register(&mut self, adapter: Arc<dyn StageAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn get(&self, kind: StageKind) -> Result<Arc<dyn StageAdapter>, StageError> {
        self.adapters
            .get(&kind)
            .cloned()
            .ok_or(StageError::NoAdapter(kind))
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// Path handed to media and ML collaborators for an artifact.
///
/// Durable locators are URLs, which FFmpeg and the inference service read
/// directly.
pub(crate) fn input_path(input: &ArtifactRef) -> PathBuf {
    PathBuf::from(&input.locator)
}
