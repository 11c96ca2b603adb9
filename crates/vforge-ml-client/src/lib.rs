//! Client for the inference, language and speech service.
//!
//! Exposes region detection (faces, license plates), narration script
//! generation, text-to-speech and transcription behind the
//! [`VisionService`] and [`LanguageService`] capabilities.

pub mod client;
pub mod error;
pub mod service;
pub mod types;

pub use client::{MlClient, MlClientConfig};
pub use error::{MlError, MlResult};
pub use service::{LanguageService, VisionService};
