//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg's `-progress pipe:2` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    pub frame: u64,
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (1.5 = 1.5x realtime)
    pub speed: f64,
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Progress percentage given total duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).min(100.0)
    }
}

/// Classification of one stderr line.
#[derive(Debug, PartialEq)]
pub(crate) enum StderrLine {
    /// A progress block finished
    Progress,
    /// A progress key was folded into the running state
    ProgressKey,
    /// Anything else (diagnostics, filter logs)
    Diagnostic,
}

/// Fold one stderr line into `current`.
pub(crate) fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> StderrLine {
    let line = line.trim();

    let Some((key, value)) = line.split_once('=') else {
        return StderrLine::Diagnostic;
    };

    match key {
        "out_time_ms" | "out_time_us" => {
            // out_time_ms is actually microseconds in FFmpeg output
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "fps" => {
            if let Ok(fps) = value.parse() {
                current.fps = fps;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return StderrLine::Progress;
        }
        "bitrate" | "total_size" | "out_time" | "dup_frames" | "drop_frames" | "stream_0_0_q" => {}
        _ => return StderrLine::Diagnostic,
    }

    StderrLine::ProgressKey
}
