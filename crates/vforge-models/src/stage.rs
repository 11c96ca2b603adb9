//! Pipeline stage definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Transform variant tag.
///
/// Declaration order is the fixed evaluation order of the pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum StageKind {
    #[serde(rename = "autoCrop")]
    AutoCrop,
    #[serde(rename = "generateFromText")]
    TextToVideo,
    #[serde(rename = "privacyBlur")]
    PrivacyBlur,
    #[serde(rename = "removeBackground")]
    BackgroundRemoval,
    #[serde(rename = "generateCaptions")]
    CaptionBurn,
}

impl StageKind {
    /// All kinds in evaluation order.
    pub const ORDERED: [StageKind; 5] = [
        StageKind::AutoCrop,
        StageKind::TextToVideo,
        StageKind::PrivacyBlur,
        StageKind::BackgroundRemoval,
        StageKind::CaptionBurn,
    ];

    /// Feature tag reported in `featuresUsed`.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::AutoCrop => "autoCrop",
            StageKind::TextToVideo => "generateFromText",
            StageKind::PrivacyBlur => "privacyBlur",
            StageKind::BackgroundRemoval => "removeBackground",
            StageKind::CaptionBurn => "generateCaptions",
        }
    }

    /// Short slug used in work-dir file names.
    pub fn slug(&self) -> &'static str {
        match self {
            StageKind::AutoCrop => "crop",
            StageKind::TextToVideo => "narrated",
            StageKind::PrivacyBlur => "blurred",
            StageKind::BackgroundRemoval => "keyed",
            StageKind::CaptionBurn => "captioned",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Crop detection parameters (FFmpeg `cropdetect`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AutoCropParams {
    /// Black level threshold (0-255)
    pub limit: u8,
    /// Dimension rounding
    pub round: u8,
}

impl Default for AutoCropParams {
    fn default() -> Self {
        Self { limit: 24, round: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextToVideoParams {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

/// What the privacy blur stage redacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BlurTarget {
    Faces,
    LicensePlates,
}

impl BlurTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlurTarget::Faces => "faces",
            BlurTarget::LicensePlates => "license_plates",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PrivacyBlurParams {
    pub targets: Vec<BlurTarget>,
    /// Box blur radius
    pub strength: u32,
}

impl Default for PrivacyBlurParams {
    fn default() -> Self {
        Self {
            targets: vec![BlurTarget::Faces, BlurTarget::LicensePlates],
            strength: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BackgroundRemovalParams {
    /// RGB key color, e.g. `0x00FF00`
    pub key_color: u32,
    pub similarity: f32,
    pub blend: f32,
}

impl Default for BackgroundRemovalParams {
    fn default() -> Self {
        Self {
            key_color: 0x00FF00,
            similarity: 0.3,
            blend: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionParams {
    pub font_size: u32,
}

impl Default for CaptionParams {
    fn default() -> Self {
        Self { font_size: 24 }
    }
}

/// A configured transform step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "params", rename_all = "camelCase")]
pub enum Stage {
    AutoCrop(AutoCropParams),
    TextToVideo(TextToVideoParams),
    PrivacyBlur(PrivacyBlurParams),
    BackgroundRemoval(BackgroundRemovalParams),
    CaptionBurn(CaptionParams),
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::AutoCrop(_) => StageKind::AutoCrop,
            Stage::TextToVideo(_) => StageKind::TextToVideo,
            Stage::PrivacyBlur(_) => StageKind::PrivacyBlur,
            Stage::BackgroundRemoval(_) => StageKind::BackgroundRemoval,
            Stage::CaptionBurn(_) => StageKind::CaptionBurn,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }
}
