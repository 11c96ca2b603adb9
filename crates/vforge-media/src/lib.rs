//! FFmpeg CLI wrapper for the VForge pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building (multiple inputs, filter graphs)
//! - Progress parsing from `-progress pipe:2`
//! - FFprobe metadata and `cropdetect` parsing
//! - The [`MediaEngine`] capability consumed by stage adapters

pub mod command;
pub mod engine;
pub mod error;
pub mod filters;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegOutput, FfmpegRunner};
pub use engine::{ChromaKey, FfmpegEngine, MediaEngine};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_video, CropRect, VideoInfo};
pub use progress::FfmpegProgress;
