//! Media engine capability and its FFmpeg implementation.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use vforge_models::Region;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters;
use crate::probe::{parse_cropdetect, probe_video, CropRect};

/// Chroma-key settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChromaKey {
    pub key_color: u32,
    pub similarity: f32,
    pub blend: f32,
    /// Solid color placed behind keyed pixels
    pub replacement: u32,
}

/// Codec and filter operations used by stage adapters.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Detect letterbox/pillarbox borders. `None` when the frame has none.
    async fn detect_crop(&self, input: &Path, limit: u8, round: u8) -> MediaResult<Option<CropRect>>;

    /// Re-encode `input`, cropping to `rect` when given.
    async fn crop(&self, input: &Path, output: &Path, rect: Option<CropRect>) -> MediaResult<()>;

    /// Blur the given regions. An empty slice re-encodes unchanged.
    async fn blur_regions(
        &self,
        input: &Path,
        output: &Path,
        regions: &[Region],
        strength: u32,
    ) -> MediaResult<()>;

    async fn chroma_key(&self, input: &Path, output: &Path, key: ChromaKey) -> MediaResult<()>;

    async fn burn_subtitles(
        &self,
        input: &Path,
        output: &Path,
        srt: &Path,
        font_size: u32,
    ) -> MediaResult<()>;

    /// Loop `video` under `audio`, ending with the narration.
    async fn narrate(&self, video: &Path, audio: &Path, output: &Path) -> MediaResult<()>;

    async fn render_gif(&self, input: &Path, output: &Path) -> MediaResult<()>;

    async fn render_thumbnail(&self, input: &Path, output: &Path) -> MediaResult<()>;
}

/// `MediaEngine` backed by the ffmpeg/ffprobe CLIs.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    runner: FfmpegRunner,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any single FFmpeg invocation running longer than `secs`.
    pub fn with_timeout(secs: u64) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(secs),
        }
    }

    fn encode(input: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(input, output)
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn detect_crop(&self, input: &Path, limit: u8, round: u8) -> MediaResult<Option<CropRect>> {
        let info = probe_video(input).await?;

        let cmd = FfmpegCommand::analyze(input)
            .video_filter(filters::cropdetect(limit, round))
            .log_level("info");
        let output = self.runner.run(&cmd).await?;

        let rect = parse_cropdetect(&output.diagnostics)
            .filter(|r| !r.is_full_frame(info.width, info.height));
        debug!(input = %input.display(), ?rect, "Crop detection finished");
        Ok(rect)
    }

    async fn crop(&self, input: &Path, output: &Path, rect: Option<CropRect>) -> MediaResult<()> {
        let mut cmd = Self::encode(input, output);
        if let Some(rect) = &rect {
            cmd = cmd.video_filter(filters::crop(rect));
        }
        let cmd = cmd.h264().audio_codec("copy");
        self.runner.run(&cmd).await?;
        Ok(())
    }

    async fn blur_regions(
        &self,
        input: &Path,
        output: &Path,
        regions: &[Region],
        strength: u32,
    ) -> MediaResult<()> {
        let cmd = match filters::blur_regions(regions, strength) {
            Some(graph) => Self::encode(input, output)
                .filter_complex(graph)
                .map("[vout]")
                .map("0:a?"),
            None => Self::encode(input, output),
        };
        let cmd = cmd.h264().audio_codec("copy");
        self.runner.run(&cmd).await?;
        Ok(())
    }

    async fn chroma_key(&self, input: &Path, output: &Path, key: ChromaKey) -> MediaResult<()> {
        let graph = filters::chroma_key(key.key_color, key.similarity, key.blend, key.replacement);
        let cmd = Self::encode(input, output)
            .filter_complex(graph)
            .map("[vout]")
            .map("0:a?")
            .h264()
            .audio_codec("copy");
        self.runner.run(&cmd).await?;
        Ok(())
    }

    async fn burn_subtitles(
        &self,
        input: &Path,
        output: &Path,
        srt: &Path,
        font_size: u32,
    ) -> MediaResult<()> {
        let cmd = Self::encode(input, output)
            .video_filter(filters::subtitles(srt, font_size))
            .h264()
            .audio_codec("copy");
        self.runner.run(&cmd).await?;
        Ok(())
    }

    async fn narrate(&self, video: &Path, audio: &Path, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(video, output)
            .input_arg("-stream_loop")
            .input_arg("-1")
            .add_input(audio)
            .map("0:v")
            .map("1:a")
            .h264()
            .audio_codec("aac")
            .output_arg("-shortest");
        self.runner.run(&cmd).await?;
        info!(output = %output.display(), "Narrated video rendered");
        Ok(())
    }

    async fn render_gif(&self, input: &Path, output: &Path) -> MediaResult<()> {
        let cmd = Self::encode(input, output)
            .duration(filters::GIF_MAX_SECONDS)
            .filter_complex(filters::gif())
            .output_arg("-loop")
            .output_arg("0");
        self.runner.run(&cmd).await?;
        Ok(())
    }

    async fn render_thumbnail(&self, input: &Path, output: &Path) -> MediaResult<()> {
        // Short clips: grab from the middle rather than past the end
        let at = match probe_video(input).await {
            Ok(info) if info.duration > 0.0 => (info.duration / 2.0).min(1.0),
            _ => 0.0,
        };

        let cmd = Self::encode(input, output)
            .seek(at)
            .single_frame()
            .video_filter(filters::thumbnail_scale());
        self.runner.run(&cmd).await?;
        Ok(())
    }
}
