use async_trait::async_trait;
use log::{debug, error};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{ffmpeg_error, GuardianError, Result};

/// Captured result of a subprocess that ran to completion
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// The external media toolkit, as seen by the censoring core.
///
/// Probe calls hand back raw text; parsing lives next to the callers so it
/// can be tested without a binary.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Container and stream metadata as ffprobe JSON
    async fn probe(&self, input: &Path) -> Result<String>;

    /// Subtitle stream listing as ffprobe JSON
    async fn subtitle_streams(&self, input: &Path) -> Result<String>;

    /// Write one subtitle stream out as SRT
    async fn extract_subtitle(&self, input: &Path, stream_index: usize, output: &Path) -> Result<()>;

    /// Copy video, re-encode audio through `filter_graph`
    async fn transcode(&self, input: &Path, output: &Path, filter_graph: &str) -> Result<()>;

    /// Decode `[start, start + duration)` through the loudness statistics filter.
    /// An `Err` means the tool could not be run at all.
    async fn analyze_window(&self, media: &Path, start: f64, duration: f64) -> Result<ToolOutput>;
}

/// FFmpeg/ffprobe executables invoked as subprocesses
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Option<Duration>,
}

impl FfmpegTool {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe
    }

    async fn run(&self, program: &Path, args: &[OsString]) -> Result<ToolOutput> {
        let name = program.display().to_string();
        debug!(
            "Executing: {} {}",
            name,
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);
        let child = command.output();

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child)
                .await
                .map_err(|_| GuardianError::Timeout {
                    command: name.clone(),
                    seconds: limit.as_secs(),
                })?,
            None => child.await,
        }
        .map_err(|e| ffmpeg_error(format!("Failed to execute {}: {}", name, e), None))?;

        Ok(ToolOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run_checked(&self, program: &Path, args: &[OsString], what: &str) -> Result<ToolOutput> {
        let output = self.run(program, args).await?;
        if !output.success {
            error!(
                "{} failed (exit code {:?}):\n{}",
                what, output.exit_code, output.stderr
            );
            return Err(ffmpeg_error(
                format!("{} failed with exit code {:?}", what, output.exit_code),
                Some(output.stderr),
            ));
        }
        Ok(output)
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn probe(&self, input: &Path) -> Result<String> {
        let output = self
            .run_checked(&self.ffprobe, &probe_args(input), "ffprobe")
            .await?;
        Ok(output.stdout)
    }

    async fn subtitle_streams(&self, input: &Path) -> Result<String> {
        let output = self
            .run_checked(&self.ffprobe, &subtitle_stream_args(input), "ffprobe subtitle listing")
            .await?;
        Ok(output.stdout)
    }

    async fn extract_subtitle(&self, input: &Path, stream_index: usize, output: &Path) -> Result<()> {
        self.run_checked(
            &self.ffmpeg,
            &extract_subtitle_args(input, stream_index, output),
            "ffmpeg subtitle extraction",
        )
        .await?;
        Ok(())
    }

    async fn transcode(&self, input: &Path, output: &Path, filter_graph: &str) -> Result<()> {
        self.run_checked(
            &self.ffmpeg,
            &transcode_args(input, output, filter_graph),
            "ffmpeg transcode",
        )
        .await?;
        Ok(())
    }

    async fn analyze_window(&self, media: &Path, start: f64, duration: f64) -> Result<ToolOutput> {
        self.run(&self.ffmpeg, &analysis_args(media, start, duration))
            .await
    }
}

fn os_args(parts: &[&str]) -> Vec<OsString> {
    parts.iter().map(OsString::from).collect()
}

pub fn probe_args(input: &Path) -> Vec<OsString> {
    let mut args = os_args(&[
        "-v", "error",
        "-print_format", "json",
        "-show_format",
        "-show_streams",
    ]);
    args.push(input.into());
    args
}

pub fn subtitle_stream_args(input: &Path) -> Vec<OsString> {
    let mut args = os_args(&[
        "-v", "error",
        "-select_streams", "s",
        "-show_entries", "stream=index,codec_name,disposition",
        "-of", "json",
    ]);
    args.push(input.into());
    args
}

pub fn extract_subtitle_args(input: &Path, stream_index: usize, output: &Path) -> Vec<OsString> {
    let mut args = os_args(&["-hide_banner", "-v", "error", "-i"]);
    args.push(input.into());
    args.extend(os_args(&["-map", &format!("0:{}", stream_index), "-c:s", "srt", "-y"]));
    args.push(output.into());
    args
}

/// Video copied untouched, audio re-encoded to AAC through the filter graph.
pub fn transcode_args(input: &Path, output: &Path, filter_graph: &str) -> Vec<OsString> {
    let mut args = os_args(&["-hide_banner", "-i"]);
    args.push(input.into());
    args.extend(os_args(&[
        "-c:v", "copy",
        "-c:a", "aac",
        "-b:a", "192k",
        "-af", filter_graph,
        "-map_metadata", "-1",
        "-movflags", "+faststart",
        "-y",
    ]));
    args.push(output.into());
    args
}

/// Loudness statistics over one window; output is discarded, diagnostics go to stderr.
pub fn analysis_args(media: &Path, start: f64, duration: f64) -> Vec<OsString> {
    let mut args = os_args(&[
        "-hide_banner",
        "-nostats",
        "-ss", &format!("{:.3}", start),
        "-t", &format!("{:.3}", duration.max(0.0)),
        "-i",
    ]);
    args.push(media.into());
    args.extend(os_args(&[
        "-vn",
        "-af", "astats=metadata=1:reset=0,ametadata=mode=print:key=lavfi.astats.Overall.RMS_level",
        "-f", "null",
        "-",
    ]));
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_transcode_args_copy_video_and_filter_audio() {
        let graph = "volume=0:enable='between(t,1.000,2.000)'";
        let args = strings(&transcode_args(
            Path::new("/input/video.mp4"),
            Path::new("/output/censored.mp4"),
            graph,
        ));

        let af = args.iter().position(|a| a == "-af").unwrap();
        assert_eq!(args[af + 1], graph);
        let cv = args.iter().position(|a| a == "-c:v").unwrap();
        assert_eq!(args[cv + 1], "copy");
        let ca = args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(args[ca + 1], "aac");
        assert_eq!(args[args.iter().position(|a| a == "-i").unwrap() + 1], "/input/video.mp4");
        assert_eq!(args.last().unwrap(), "/output/censored.mp4");
    }

    #[test]
    fn test_analysis_args_window() {
        let args = strings(&analysis_args(Path::new("out.mp4"), 1.5, 2.25));

        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss + 1], "1.500");
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "2.250");
        // seek before input so only the window is decoded
        assert!(ss < args.iter().position(|a| a == "-i").unwrap());
        assert!(args.iter().any(|a| a.starts_with("astats")));
        assert_eq!(&args[args.len() - 3..], ["-f", "null", "-"]);
    }

    #[test]
    fn test_extract_subtitle_args_maps_stream() {
        let args = strings(&extract_subtitle_args(Path::new("in.mkv"), 3, Path::new("out.srt")));
        let map = args.iter().position(|a| a == "-map").unwrap();
        assert_eq!(args[map + 1], "0:3");
        assert_eq!(args.last().unwrap(), "out.srt");
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_invocation_error() {
        let tool = FfmpegTool::new(
            "/nonexistent/guardian-test-ffmpeg",
            "/nonexistent/guardian-test-ffprobe",
        )
        .with_timeout(Some(Duration::from_secs(5)));

        let err = tool.probe(Path::new("video.mp4")).await.unwrap_err();
        assert!(matches!(err, GuardianError::FFmpeg { .. }));

        let analysis = tool.analyze_window(Path::new("video.mp4"), 0.0, 1.0).await;
        assert!(analysis.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_tool_times_out() {
        use crate::verify::LoudnessMeasurement;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("stuck-ffmpeg");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let tool = FfmpegTool::new(&script, &script)
            .with_timeout(Some(Duration::from_millis(200)));

        let started = std::time::Instant::now();
        let err = tool
            .transcode(Path::new("in.mp4"), Path::new("out.mp4"), "anull")
            .await
            .unwrap_err();
        assert!(matches!(err, GuardianError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));

        let analysis = tool.analyze_window(Path::new("out.mp4"), 0.0, 1.0).await;
        assert!(matches!(analysis, Err(GuardianError::Timeout { .. })));
        assert_eq!(
            LoudnessMeasurement::from_analysis(analysis),
            LoudnessMeasurement::Unmeasured
        );
    }
}
