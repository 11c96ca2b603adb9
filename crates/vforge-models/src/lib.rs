//! Shared data models for the VForge pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Processing requests and their feature options
//! - Stage variants and their parameters
//! - Artifact references (ephemeral vs durable)
//! - Real-time session events
//! - Pipeline results and distribution records

pub mod artifact;
pub mod distribution;
pub mod plan;
pub mod rect;
pub mod request;
pub mod result;
pub mod stage;
pub mod ws;

// Re-export common types
pub use artifact::{ArtifactKind, ArtifactRef, Provenance};
pub use distribution::{DistributionRecord, DistributionStatus};
pub use plan::PlanTier;
pub use rect::Region;
pub use request::{
    PrivacyBlurOption, ProcessingOptions, ProcessingRequest, RequestError, TextToVideoOption,
};
pub use result::{FanOutTask, FanOutWarning, PipelineResult};
pub use stage::{
    AutoCropParams, BackgroundRemovalParams, BlurTarget, CaptionParams, PrivacyBlurParams, Stage, StageKind,
    TextToVideoParams,
};
pub use ws::{ClientEvent, ConnectionId, ProgressEvent, SessionEvent, SessionId};
