//! Processing requests and their option mapping.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::ArtifactRef;
use crate::stage::{
    AutoCropParams, BackgroundRemovalParams, BlurTarget, CaptionParams, PrivacyBlurParams, Stage,
    TextToVideoParams,
};

/// Request validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("sourceRef is required")]
    MissingSource,

    #[error("generateFromText.text must not be empty")]
    EmptyText,

    #[error("privacyBlur.targets must not be empty")]
    EmptyBlurTargets,
}

/// `generateFromText` option payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextToVideoOption {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

/// `privacyBlur` accepts either a flag or an explicit target list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PrivacyBlurOption {
    Enabled(bool),
    Targets { targets: Vec<BlurTarget> },
}

impl Default for PrivacyBlurOption {
    fn default() -> Self {
        PrivacyBlurOption::Enabled(false)
    }
}

impl PrivacyBlurOption {
    fn to_params(&self) -> Option<PrivacyBlurParams> {
        match self {
            PrivacyBlurOption::Enabled(false) => None,
            PrivacyBlurOption::Enabled(true) => Some(PrivacyBlurParams::default()),
            PrivacyBlurOption::Targets { targets } => Some(PrivacyBlurParams {
                targets: targets.clone(),
                ..PrivacyBlurParams::default()
            }),
        }
    }
}

/// Recognized feature flags. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingOptions {
    pub auto_crop: bool,
    pub generate_from_text: Option<TextToVideoOption>,
    pub privacy_blur: PrivacyBlurOption,
    pub remove_background: bool,
    pub generate_captions: bool,
    pub realtime: bool,
    pub create_gif: bool,
    pub generate_thumbnail: bool,
    pub share_to_social: bool,
    pub platforms: BTreeSet<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl ProcessingOptions {
    /// Resolve the ordered stage list.
    ///
    /// Evaluation order is fixed: AutoCrop, TextToVideo, PrivacyBlur,
    /// BackgroundRemoval, CaptionBurn.
    pub fn stages(&self) -> Vec<Stage> {
        let mut stages = Vec::with_capacity(5);

        if self.auto_crop {
            stages.push(Stage::AutoCrop(AutoCropParams::default()));
        }
        if let Some(gen) = &self.generate_from_text {
            stages.push(Stage::TextToVideo(TextToVideoParams {
                text: gen.text.clone(),
                voice: gen.voice.clone(),
            }));
        }
        if let Some(params) = self.privacy_blur.to_params() {
            stages.push(Stage::PrivacyBlur(params));
        }
        if self.remove_background {
            stages.push(Stage::BackgroundRemoval(BackgroundRemovalParams::default()));
        }
        if self.generate_captions {
            stages.push(Stage::CaptionBurn(CaptionParams::default()));
        }

        stages
    }

    fn validate(&self) -> Result<(), RequestError> {
        if let Some(gen) = &self.generate_from_text {
            if gen.text.trim().is_empty() {
                return Err(RequestError::EmptyText);
            }
        }
        if let PrivacyBlurOption::Targets { targets } = &self.privacy_blur {
            if targets.is_empty() {
                return Err(RequestError::EmptyBlurTargets);
            }
        }
        Ok(())
    }
}

/// An accepted processing request. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingRequest {
    source: ArtifactRef,
    options: ProcessingOptions,
}

impl ProcessingRequest {
    /// Validate and accept a request.
    pub fn new(source: Option<String>, options: ProcessingOptions) -> Result<Self, RequestError> {
        let source = source
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(RequestError::MissingSource)?;

        options.validate()?;

        Ok(Self {
            source: ArtifactRef::source(source),
            options,
        })
    }

    pub fn source(&self) -> &ArtifactRef {
        &self.source
    }

    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    pub fn realtime(&self) -> bool {
        self.options.realtime
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.options.stages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageKind;

    fn options(json: serde_json::Value) -> ProcessingOptions {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_stage_order_is_fixed() {
        let opts = options(serde_json::json!({
            "generateCaptions": true,
            "removeBackground": true,
            "privacyBlur": true,
            "generateFromText": { "text": "a day at the beach" },
            "autoCrop": true
        }));

        let kinds: Vec<_> = opts.stages().iter().map(Stage::kind).collect();
        assert_eq!(kinds, StageKind::ORDERED.to_vec());
    }

    #[test]
    fn test_privacy_blur_accepts_targets() {
        let opts = options(serde_json::json!({ "privacyBlur": { "targets": ["faces"] } }));
        match &opts.stages()[0] {
            Stage::PrivacyBlur(p) => assert_eq!(p.targets, vec![BlurTarget::Faces]),
            other => panic!("unexpected stage {:?}", other),
        }
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let opts = options(serde_json::json!({ "autoCrop": true, "sepia": true }));
        assert_eq!(opts.stages().len(), 1);
    }

    #[test]
    fn test_missing_source_rejected() {
        let err = ProcessingRequest::new(None, ProcessingOptions::default()).unwrap_err();
        assert_eq!(err, RequestError::MissingSource);

        let err = ProcessingRequest::new(Some("  ".into()), ProcessingOptions::default()).unwrap_err();
        assert_eq!(err, RequestError::MissingSource);
    }

    #[test]
    fn test_empty_text_rejected() {
        let opts = options(serde_json::json!({ "generateFromText": { "text": "" } }));
        let err = ProcessingRequest::new(Some("v1".into()), opts).unwrap_err();
        assert_eq!(err, RequestError::EmptyText);
    }

    #[test]
    fn test_platforms_deduplicated() {
        let opts = options(serde_json::json!({
            "shareToSocial": true,
            "platforms": ["tiktok", "youtube", "tiktok"]
        }));
        assert_eq!(opts.platforms.len(), 2);
    }
}
