use anyhow::{anyhow, Context};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GuardianError, Result};
use crate::ffmpeg::MediaTool;
use crate::resources::TempFile;

/// Language suffixes probed for sidecar files, after the bare `<base>.srt`
pub const SIDECAR_LANGUAGES: &[&str] = &["en", "fr", "es", "de", "it"];

/// Embedded codecs that ffmpeg can convert to SRT text
const TEXT_SUBTITLE_CODECS: &[&str] = &["subrip", "mov_text"];

static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\d+):(\d{1,2}):(\d{1,2})[,.](\d{1,3})\s*-->\s*(\d+):(\d{1,2}):(\d{1,2})[,.](\d{1,3})",
    )
    .expect("static pattern is valid")
});

/// One timed line of dialogue
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueLine {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

impl DialogueLine {
    pub fn new(index: usize, start: Duration, end: Duration, text: impl Into<String>) -> Self {
        Self {
            index,
            start,
            end,
            text: text.into(),
        }
    }

    pub fn start_seconds(&self) -> f64 {
        self.start.as_secs_f64()
    }

    pub fn end_seconds(&self) -> f64 {
        self.end.as_secs_f64()
    }
}

/// Subtitle stream entry from an ffprobe listing
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SubtitleStream {
    pub index: usize,
    #[serde(default)]
    pub codec_name: Option<String>,
    #[serde(default)]
    pub disposition: Option<StreamDisposition>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StreamDisposition {
    #[serde(default)]
    pub default: u8,
}

impl SubtitleStream {
    fn is_default(&self) -> bool {
        self.disposition.as_ref().map(|d| d.default == 1).unwrap_or(false)
    }

    fn is_text(&self) -> bool {
        self.codec_name
            .as_deref()
            .map(|c| TEXT_SUBTITLE_CODECS.contains(&c))
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct StreamListing {
    #[serde(default)]
    streams: Vec<SubtitleStream>,
}

/// Parse SRT content into dialogue lines, in file order.
///
/// Blocks without a timestamp line or with `end <= start` are skipped with a
/// warning. Content that has text but yields no valid block is an error.
pub fn parse_srt(content: &str) -> anyhow::Result<Vec<DialogueLine>> {
    let normalized = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");

    let mut lines = Vec::new();
    let mut blocks_seen = 0;

    for block in normalized.split("\n\n") {
        let rows: Vec<&str> = block.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if rows.is_empty() {
            continue;
        }
        blocks_seen += 1;

        let Some(ts_row) = rows.iter().position(|r| TIMESTAMP_REGEX.is_match(r)) else {
            warn!("Skipping subtitle block without timestamp: {:?}", rows[0]);
            continue;
        };
        let caps = TIMESTAMP_REGEX
            .captures(rows[ts_row])
            .ok_or_else(|| anyhow!("timestamp vanished on re-match"))?;
        let start = captured_duration(&caps, 1)?;
        let end = captured_duration(&caps, 5)?;

        let index = ts_row
            .checked_sub(1)
            .and_then(|i| rows[i].parse::<usize>().ok())
            .unwrap_or(lines.len() + 1);

        if end <= start {
            warn!(
                "Skipping subtitle #{} with invalid time range {:?} --> {:?}",
                index, start, end
            );
            continue;
        }

        let text = rows[ts_row + 1..].join("\n");
        lines.push(DialogueLine::new(index, start, end, text));
    }

    if lines.is_empty() && blocks_seen > 0 {
        return Err(anyhow!(
            "No valid subtitle entries found in {} block(s)",
            blocks_seen
        ));
    }

    Ok(lines)
}

fn captured_duration(caps: &Captures, first: usize) -> anyhow::Result<Duration> {
    let field = |i: usize| -> anyhow::Result<u64> {
        caps.get(first + i)
            .ok_or_else(|| anyhow!("missing timestamp field"))?
            .as_str()
            .parse::<u64>()
            .context("timestamp field is not a number")
    };
    let hours = field(0)?;
    let minutes = field(1)?;
    let seconds = field(2)?;
    // "5" after the separator means 500ms
    let frac = caps.get(first + 3).map(|m| m.as_str()).unwrap_or("0");
    let millis: u64 = format!("{:0<3}", frac).parse().context("invalid milliseconds")?;

    hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60 + seconds))
        .and_then(|secs| secs.checked_mul(1000))
        .and_then(|ms| ms.checked_add(millis))
        .map(Duration::from_millis)
        .ok_or_else(|| anyhow!("timestamp out of range"))
}

/// Sidecar files to look for, in priority order
pub fn srt_candidates(video_path: &Path) -> Vec<PathBuf> {
    let base = video_path.with_extension("");
    let base = base.as_os_str().to_string_lossy();

    std::iter::once(format!("{}.srt", base))
        .chain(SIDECAR_LANGUAGES.iter().map(|lang| format!("{}.{}.srt", base, lang)))
        .map(PathBuf::from)
        .collect()
}

/// Parse an ffprobe stream listing. Malformed JSON yields no streams.
pub fn parse_subtitle_streams(json: &str) -> Vec<SubtitleStream> {
    match serde_json::from_str::<StreamListing>(json) {
        Ok(listing) => listing.streams,
        Err(e) => {
            warn!("Failed to parse ffprobe stream listing: {}", e);
            Vec::new()
        }
    }
}

/// Default-flagged text stream first, otherwise the first text stream.
pub fn select_subtitle_stream(streams: &[SubtitleStream]) -> Option<usize> {
    let text: Vec<&SubtitleStream> = streams.iter().filter(|s| s.is_text()).collect();
    text.iter()
        .find(|s| s.is_default())
        .or_else(|| text.first())
        .map(|s| s.index)
}

async fn read_srt_file(path: &Path) -> anyhow::Result<Vec<DialogueLine>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_srt(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load dialogue for a video from a sidecar file or its embedded track.
///
/// Returns `None` when no subtitle data can be obtained; every failure on the
/// way is logged, none is fatal.
pub async fn load_dialogue<T: MediaTool + ?Sized>(
    tool: &T,
    video_path: &Path,
) -> Option<Vec<DialogueLine>> {
    if let Some(sidecar) = srt_candidates(video_path).into_iter().find(|p| p.exists()) {
        info!("Found external SRT file: {}", sidecar.display());
        match read_srt_file(&sidecar).await {
            Ok(lines) => return Some(lines),
            Err(e) => warn!("{:#}; trying embedded subtitles", e),
        }
    } else {
        info!("No external SRT next to {}; trying embedded subtitles", video_path.display());
    }

    load_embedded(tool, video_path).await
}

async fn load_embedded<T: MediaTool + ?Sized>(
    tool: &T,
    video_path: &Path,
) -> Option<Vec<DialogueLine>> {
    match extract_embedded(tool, video_path).await {
        Ok(lines) => lines,
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

/// `Ok(None)` when the container has no text track to convert.
async fn extract_embedded<T: MediaTool + ?Sized>(
    tool: &T,
    video_path: &Path,
) -> Result<Option<Vec<DialogueLine>>> {
    let listing = tool.subtitle_streams(video_path).await?;

    let streams = parse_subtitle_streams(&listing);
    let Some(index) = select_subtitle_stream(&streams) else {
        info!("No embedded text subtitle track found in {}", video_path.display());
        return Ok(None);
    };
    debug!("Selected embedded subtitle stream {}", index);

    let temp = TempFile::new(std::env::temp_dir().join(format!(
        "guardian_subtitle_{}_{}.srt",
        std::process::id(),
        index
    )));

    tool.extract_subtitle(video_path, index, temp.path()).await?;

    let lines = read_srt_file(temp.path())
        .await
        .map_err(|e| GuardianError::Subtitle {
            message: format!("embedded stream {}: {:#}", index, e),
        })?;
    info!("Loaded {} lines from embedded stream {}", lines.len(), index);
    Ok(Some(lines))
}
