use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::GuardianError;

/// Supported video file extensions
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "3gp", "mpg", "mpeg",
];

/// Frame rate in the three shapes downstream consumers want
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRate {
    /// As a rational, e.g. `30000/1001`
    pub rational: String,
    pub fps: f64,
    /// Reciprocal rational, e.g. `1001/30000`
    pub frame_duration: String,
}

impl FrameRate {
    /// Three decimals, e.g. `29.970`
    pub fn fps_display(&self) -> String {
        format!("{:.3}", self.fps)
    }
}

/// Audio stream with the most channels
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioStreamInfo {
    pub codec: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: u32,
    pub channel_layout: Option<String>,
}

/// Video metadata structure. Every field is optional; probing is best-effort.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoMetadata {
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub codec: Option<String>,
    pub frame_rate: Option<FrameRate>,
    pub audio: Option<AudioStreamInfo>,
}

impl VideoMetadata {
    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

/// Validate that the given file is a supported video file
pub fn validate_video_file(path: &Path) -> crate::error::Result<()> {
    if !path.exists() {
        return Err(GuardianError::InputNotFound {
            path: path.to_path_buf(),
        });
    }

    if !path.is_file() {
        return Err(GuardianError::Processing {
            message: format!("Path is not a file: {}", path.display()),
        });
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if !is_supported_extension(&extension) {
        return Err(GuardianError::UnsupportedFormat {
            extension,
            supported: SUPPORTED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        });
    }

    debug!("Video file validation passed for: {:?}", path);
    Ok(())
}

fn is_supported_extension(extension: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension.to_lowercase().as_str())
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(is_supported_extension)
}

/// Expand files and directories into a sorted list of video files.
///
/// Directories are walked recursively. Files whose stem already ends with
/// `skip_suffix` are earlier outputs and are left out. Explicitly named files
/// are kept as given so validation can report on them.
pub fn collect_inputs(paths: &[PathBuf], skip_suffix: &str) -> Vec<PathBuf> {
    let already_processed = |path: &Path| {
        !skip_suffix.is_empty()
            && path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| stem.ends_with(skip_suffix))
    };

    let mut inputs = Vec::new();
    for path in paths {
        if !path.is_dir() {
            inputs.push(path.clone());
            continue;
        }

        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", path.display(), e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|p| has_supported_extension(p) && !already_processed(p))
            .collect();
        found.sort();

        info!("Found {} video files in {}", found.len(), path.display());
        inputs.extend(found);
    }
    inputs
}

/// Parse frame rate as reported by ffprobe: `30000/1001` or a decimal like `24.0`
pub fn parse_frame_rate(raw: &str) -> Option<FrameRate> {
    let raw = raw.trim();
    if let Some((num, den)) = raw.split_once('/') {
        let numerator: u64 = num.trim().parse().ok()?;
        let denominator: u64 = den.trim().parse().ok()?;
        if denominator == 0 || numerator == 0 {
            return None;
        }
        return Some(FrameRate {
            rational: format!("{}/{}", numerator, denominator),
            fps: numerator as f64 / denominator as f64,
            frame_duration: format!("{}/{}", denominator, numerator),
        });
    }

    let fps: f64 = raw.parse().ok().filter(|f: &f64| f.is_finite() && *f > 0.0)?;
    let millis = (fps * 1000.0) as u64;
    Some(FrameRate {
        rational: format!("{}/1000", millis),
        fps,
        frame_duration: format!("1000/{}", millis),
    })
}

fn as_u32(value: &serde_json::Value) -> Option<u32> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .and_then(|v| u32::try_from(v).ok())
}

fn as_f64(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn as_string(value: &serde_json::Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

fn parse_probe_value(json: &str) -> Result<VideoMetadata> {
    let probe: serde_json::Value =
        serde_json::from_str(json).context("Failed to parse ffprobe JSON output")?;

    let streams = probe
        .get("streams")
        .and_then(|s| s.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut metadata = VideoMetadata {
        duration: probe.pointer("/format/duration").and_then(as_f64),
        ..VideoMetadata::default()
    };

    for stream in streams {
        match stream.get("codec_type").and_then(|t| t.as_str()) {
            Some("video") if metadata.width.is_none() && metadata.codec.is_none() => {
                metadata.width = stream.get("width").and_then(as_u32);
                metadata.height = stream.get("height").and_then(as_u32);
                metadata.codec = stream.get("codec_name").and_then(as_string);
                metadata.frame_rate = stream
                    .get("r_frame_rate")
                    .and_then(|r| r.as_str())
                    .and_then(parse_frame_rate);
            }
            Some("audio") => {
                // Non-numeric channel counts are skipped; ties keep the first.
                let Some(channels) = stream.get("channels").and_then(as_u32) else {
                    continue;
                };
                let current = metadata.audio.as_ref().map_or(0, |a| a.channels);
                if channels > current {
                    metadata.audio = Some(AudioStreamInfo {
                        codec: stream.get("codec_name").and_then(as_string),
                        sample_rate: stream.get("sample_rate").and_then(as_u32),
                        channels,
                        channel_layout: stream.get("channel_layout").and_then(as_string),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(metadata)
}

/// Parse `ffprobe -show_format -show_streams` JSON. Malformed input yields
/// empty metadata.
pub fn parse_probe_json(json: &str) -> VideoMetadata {
    match parse_probe_value(json) {
        Ok(metadata) => {
            debug!("Video metadata: {:?}", metadata);
            metadata
        }
        Err(e) => {
            warn!("{:#}; continuing without media metadata", e);
            VideoMetadata::default()
        }
    }
}
