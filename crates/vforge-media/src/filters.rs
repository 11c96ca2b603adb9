//! FFmpeg filter graph builders.

use std::path::Path;

use vforge_models::Region;

use crate::probe::CropRect;

/// GIF frame rate.
pub const GIF_FPS: u32 = 10;
/// GIF output width (height keeps aspect).
pub const GIF_WIDTH: u32 = 480;
/// Maximum GIF length in seconds.
pub const GIF_MAX_SECONDS: f64 = 5.0;
/// Thumbnail output width.
pub const THUMBNAIL_WIDTH: u32 = 480;

/// `cropdetect` filter.
pub fn cropdetect(limit: u8, round: u8) -> String {
    format!("cropdetect=limit={}:round={}:reset=0", limit, round)
}

/// Plain crop filter.
pub fn crop(rect: &CropRect) -> String {
    format!("crop={}:{}:{}:{}", rect.width, rect.height, rect.x, rect.y)
}

/// Filter graph blurring each region and overlaying it back on the frame.
///
/// Output label is `[vout]`. Returns `None` when there is nothing to blur.
pub fn blur_regions(regions: &[Region], strength: u32) -> Option<String> {
    let regions: Vec<&Region> = regions.iter().filter(|r| !r.is_empty()).collect();
    if regions.is_empty() {
        return None;
    }

    let n = regions.len();
    let mut graph = String::new();

    // [0:v]split=N+1[base][r0][r1]...
    graph.push_str(&format!("[0:v]split={}[base]", n + 1));
    for i in 0..n {
        graph.push_str(&format!("[r{}]", i));
    }
    graph.push(';');

    // boxblur radius must fit inside the cropped area
    for (i, region) in regions.iter().enumerate() {
        let radius = strength.min(region.width / 2).min(region.height / 2).max(1);
        graph.push_str(&format!(
            "[r{i}]crop={}:{}:{}:{},boxblur={radius}:1[b{i}];",
            region.width, region.height, region.x, region.y
        ));
    }

    let mut previous = "base".to_string();
    for (i, region) in regions.iter().enumerate() {
        let label = if i + 1 == n {
            "vout".to_string()
        } else {
            format!("v{}", i)
        };
        let enable = match (region.start, region.end) {
            (Some(start), Some(end)) => format!(":enable='between(t,{:.3},{:.3})'", start, end),
            _ => String::new(),
        };
        graph.push_str(&format!(
            "[{previous}][b{i}]overlay={}:{}{enable}[{label}]",
            region.x, region.y
        ));
        if i + 1 != n {
            graph.push(';');
        }
        previous = label;
    }

    Some(graph)
}

/// Chroma-key filter graph replacing the keyed color with a solid background.
///
/// Output label is `[vout]`.
pub fn chroma_key(key_color: u32, similarity: f32, blend: f32, replacement: u32) -> String {
    format!(
        "[0:v]split[bgsrc][fgsrc];\
         [bgsrc]drawbox=c=0x{replacement:06X}:t=fill[bg];\
         [fgsrc]chromakey=0x{key_color:06X}:{similarity:.2}:{blend:.2}[fg];\
         [bg][fg]overlay=format=auto[vout]"
    )
}

/// `subtitles` filter for an SRT file.
pub fn subtitles(srt: &Path, font_size: u32) -> String {
    format!(
        "subtitles='{}':force_style='FontSize={}'",
        escape_filter_path(srt),
        font_size
    )
}

/// Palette-based GIF filter graph.
pub fn gif() -> String {
    format!(
        "fps={GIF_FPS},scale={GIF_WIDTH}:-1:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse"
    )
}

pub fn thumbnail_scale() -> String {
    format!("scale={}:-2", THUMBNAIL_WIDTH)
}

/// Escape a path for use inside a quoted filter argument.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}
