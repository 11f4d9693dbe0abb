use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::diagnostics::DiagnosticReport;
use crate::error::{GuardianError, Result};
use crate::escalation::{run_escalation, EscalationSettings};
use crate::ffmpeg::MediaTool;
use crate::profanity::ProfanityMatcher;
use crate::segments::{extract_segments, total_duration};
use crate::subtitles::load_dialogue;
use crate::video::{parse_probe_json, validate_video_file, VideoMetadata};

/// Per-run settings handed to the processor
#[derive(Debug, Clone, PartialEq)]
pub struct CensorSettings {
    pub matching_words: Vec<String>,
    pub escalation: EscalationSettings,
    /// Defaults to the output file's directory
    pub diagnostics_dir: Option<PathBuf>,
    pub write_diagnostics: bool,
}

impl Default for CensorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for CensorSettings {
    fn from(config: &Config) -> Self {
        Self {
            matching_words: config.matching_words.clone(),
            escalation: EscalationSettings {
                max_attempts: if config.full { config.max_attempts } else { 1 },
                verify: config.full,
                threshold_db: config.threshold_db,
            },
            diagnostics_dir: config.diagnostics_dir.clone(),
            write_diagnostics: config.write_diagnostics,
        }
    }
}

/// Result of processing one video
#[derive(Debug)]
pub enum CensorOutcome {
    Censored {
        output: PathBuf,
        report: DiagnosticReport,
        report_path: Option<PathBuf>,
    },
    /// No profane dialogue; the input is the result and no encoding happened
    NothingToCensor { input: PathBuf },
    /// Every allowed attempt failed; no output was left behind
    Failed {
        report: DiagnosticReport,
        report_path: Option<PathBuf>,
    },
}

impl CensorOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, CensorOutcome::Failed { .. })
    }

    /// The file a caller should use: censored output or untouched input
    pub fn result_path(&self) -> Option<&Path> {
        match self {
            CensorOutcome::Censored { output, .. } => Some(output),
            CensorOutcome::NothingToCensor { input } => Some(input),
            CensorOutcome::Failed { .. } => None,
        }
    }
}

/// `<dir>/<stem><suffix>.mp4`
pub fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    input.with_file_name(format!("{}{}.mp4", stem, suffix))
}

/// `input` exists at this point, so an output that does not exist yet is
/// necessarily a different file.
fn resolves_to_same_file(input: &Path, output: &Path) -> bool {
    if input == output {
        return true;
    }
    match (std::fs::canonicalize(input), std::fs::canonicalize(output)) {
        (Ok(input), Ok(output)) => input == output,
        _ => false,
    }
}

/// Subtitle-driven censoring of a single video through a media tool
pub struct GuardianProcessor<T: MediaTool> {
    tool: T,
    matcher: ProfanityMatcher,
    settings: CensorSettings,
}

impl<T: MediaTool> GuardianProcessor<T> {
    pub fn new(tool: T, settings: CensorSettings) -> Self {
        let matcher = ProfanityMatcher::new(&settings.matching_words);
        debug!("Profanity matcher built from {} words", matcher.word_count());
        Self {
            tool,
            matcher,
            settings,
        }
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    pub fn settings(&self) -> &CensorSettings {
        &self.settings
    }

    async fn probe(&self, input: &Path) -> VideoMetadata {
        match self.tool.probe(input).await {
            Ok(json) => {
                let metadata = parse_probe_json(&json);
                if let Some(duration) = metadata.duration {
                    info!("Media duration: {:.2}s", duration);
                }
                if let Some(ref audio) = metadata.audio {
                    info!(
                        "Audio: {} channels ({})",
                        audio.channels,
                        audio.codec.as_deref().unwrap_or("unknown codec")
                    );
                } else {
                    warn!("No audio stream reported for {}", input.display());
                }
                metadata
            }
            Err(e) => {
                warn!("Probe failed for {}: {}", input.display(), e);
                VideoMetadata::default()
            }
        }
    }

    /// Censor `input` into `output`.
    ///
    /// Input errors (missing file, unsupported format, no subtitles) are
    /// returned as `Err`. Encoder trouble is not: it drives escalation and
    /// ends up in the report of a `Failed` outcome.
    pub async fn process_video(&self, input: &Path, output: &Path) -> Result<CensorOutcome> {
        validate_video_file(input)?;
        if resolves_to_same_file(input, output) {
            return Err(GuardianError::Processing {
                message: format!("Output would overwrite input: {}", input.display()),
            });
        }

        info!("Processing {}", input.display());
        let metadata = self.probe(input).await;

        let lines = load_dialogue(&self.tool, input)
            .await
            .ok_or_else(|| GuardianError::NoSubtitles {
                path: input.to_path_buf(),
            })?;

        let segments = extract_segments(&lines, &self.matcher);
        if segments.is_empty() {
            info!("No profanity found in {}; leaving it untouched", input.display());
            return Ok(CensorOutcome::NothingToCensor {
                input: input.to_path_buf(),
            });
        }
        info!(
            "Muting {} segments ({:.2}s total)",
            segments.len(),
            total_duration(&segments)
        );

        let run = run_escalation(&self.tool, input, output, &segments, &self.settings.escalation).await;
        let report = DiagnosticReport::from_run(&run, metadata.duration);
        let report_path = self.persist_report(&report, output);

        if run.success {
            Ok(CensorOutcome::Censored {
                output: output.to_path_buf(),
                report,
                report_path,
            })
        } else {
            Ok(CensorOutcome::Failed {
                report,
                report_path,
            })
        }
    }

    /// Best effort; a failed write never changes the outcome
    fn persist_report(&self, report: &DiagnosticReport, output: &Path) -> Option<PathBuf> {
        if !self.settings.write_diagnostics {
            return None;
        }

        let dir = self.settings.diagnostics_dir.clone().unwrap_or_else(|| {
            output
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });

        match report.persist(&dir) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Could not write diagnostic report: {}", e);
                None
            }
        }
    }
}
