use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::ffmpeg::{MediaTool, ToolOutput};
use crate::segments::CensorSegment;

/// Segments at or below this RMS level count as silenced
pub const DEFAULT_SILENCE_THRESHOLD_DB: f64 = -50.0;

/// Reported for digital silence and for windows the analyzer printed no
/// statistic for
pub const SILENCE_FLOOR_DB: f64 = -100.0;

const LEVEL_VALUE: &str = r"(-inf|-?\d+(?:\.\d+)?)";

/// RMS patterns in priority order. Analyzer output differs between FFmpeg
/// builds; new formats go here, not in the callers.
static RMS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // ametadata=mode=print
        r"lavfi\.astats\.Overall\.RMS_level\s*[=:]\s*",
        // astats end-of-stream summary
        r"RMS level dB:\s*",
        r"RMS_level\s*[=:]\s*",
        r"(?i)rms[ _]level(?:\s*\(?db\)?)?\s*[=:]\s*",
    ]
    .iter()
    .filter_map(|prefix| Regex::new(&format!("{}{}", prefix, LEVEL_VALUE)).ok())
    .collect()
});

/// Pull an RMS level out of free-text analyzer output.
///
/// The first pattern with any match wins, and within it the last match is
/// taken, since the overall figure is printed after the per-channel ones.
/// `-inf` maps to [`SILENCE_FLOOR_DB`].
pub fn parse_rms_level(diagnostics: &str) -> Option<f64> {
    RMS_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(diagnostics)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| parse_level(m.as_str()))
            .last()
    })
}

fn parse_level(raw: &str) -> Option<f64> {
    if raw == "-inf" {
        return Some(SILENCE_FLOOR_DB);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.max(SILENCE_FLOOR_DB))
}

/// What the analyzer told us about one window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoudnessMeasurement {
    Measured(f64),
    /// Ran cleanly and said something, but printed no statistic
    AssumedSilent,
    Unmeasured,
}

impl LoudnessMeasurement {
    /// Classify one analysis run
    pub fn from_analysis(output: Result<ToolOutput>) -> Self {
        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!("Loudness analysis could not run: {}", e);
                return Self::Unmeasured;
            }
        };

        if !output.success {
            warn!(
                "Loudness analysis exited with code {:?}",
                output.exit_code
            );
            return Self::Unmeasured;
        }

        match parse_rms_level(&output.stderr) {
            Some(level) => Self::Measured(level),
            None if output.stderr.trim().is_empty() => Self::Unmeasured,
            None => Self::AssumedSilent,
        }
    }

    pub fn level_db(&self) -> Option<f64> {
        match self {
            Self::Measured(level) => Some(*level),
            Self::AssumedSilent => Some(SILENCE_FLOOR_DB),
            Self::Unmeasured => None,
        }
    }
}

/// Outcome of checking one segment after one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentVerification {
    pub start_seconds: f64,
    pub end_seconds: f64,
    /// `None` when unmeasured
    pub measured_level_db: Option<f64>,
    pub meets_threshold: bool,
    pub assumed_silent: bool,
    pub strategy_level: u32,
}

/// Acoustic check of censored output against an RMS threshold
#[derive(Debug, Clone, Copy)]
pub struct SilenceVerifier {
    threshold_db: f64,
}

impl Default for SilenceVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_SILENCE_THRESHOLD_DB)
    }
}

impl SilenceVerifier {
    pub fn new(threshold_db: f64) -> Self {
        Self { threshold_db }
    }

    pub fn threshold_db(&self) -> f64 {
        self.threshold_db
    }

    /// Apply the threshold. Unmeasured never passes.
    pub fn judge(
        &self,
        segment: &CensorSegment,
        measurement: LoudnessMeasurement,
        strategy_level: u32,
    ) -> SegmentVerification {
        let measured_level_db = measurement.level_db();
        SegmentVerification {
            start_seconds: segment.start_seconds,
            end_seconds: segment.end_seconds,
            measured_level_db,
            meets_threshold: measured_level_db.is_some_and(|level| level <= self.threshold_db),
            assumed_silent: measurement == LoudnessMeasurement::AssumedSilent,
            strategy_level,
        }
    }

    /// Measure `[start, end)` of `media` and judge it
    pub async fn verify_segment<T: MediaTool + ?Sized>(
        &self,
        tool: &T,
        media: &Path,
        segment: &CensorSegment,
        strategy_level: u32,
    ) -> SegmentVerification {
        let analysis = tool
            .analyze_window(media, segment.start_seconds, segment.duration())
            .await;
        let measurement = LoudnessMeasurement::from_analysis(analysis);
        let result = self.judge(segment, measurement, strategy_level);

        match result.measured_level_db {
            Some(level) => info!(
                "Segment {:.3}s-{:.3}s: RMS {:.1} dB ({})",
                segment.start_seconds,
                segment.end_seconds,
                level,
                if result.meets_threshold { "silent" } else { "audible" }
            ),
            None => warn!(
                "Segment {:.3}s-{:.3}s: RMS level unavailable",
                segment.start_seconds, segment.end_seconds
            ),
        }
        if result.assumed_silent {
            debug!("No RMS statistic in analyzer output; treating window as silent");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ffmpeg_error;
    use async_trait::async_trait;

    fn ran(stderr: &str) -> Result<ToolOutput> {
        Ok(ToolOutput {
            success: true,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }

    #[test]
    fn test_metadata_line() {
        assert_eq!(
            parse_rms_level("lavfi.astats.Overall.RMS_level: -55.3"),
            Some(-55.3)
        );
        assert_eq!(
            parse_rms_level("frame:12 pts:1024\nlavfi.astats.Overall.RMS_level=-61.024170\n"),
            Some(-61.02417)
        );
    }

    #[test]
    fn test_last_match_of_first_pattern_wins() {
        let stderr = "\
lavfi.astats.Overall.RMS_level=-20.0
lavfi.astats.Overall.RMS_level=-35.5
[Parsed_astats_0 @ 0x1] RMS level dB: -80.0
lavfi.astats.Overall.RMS_level=-52.5
";
        assert_eq!(parse_rms_level(stderr), Some(-52.5));
    }

    #[test]
    fn test_summary_fallback() {
        let stderr = "\
[Parsed_astats_0 @ 0x55] Channel: 1
[Parsed_astats_0 @ 0x55] RMS level dB: -40.100000
[Parsed_astats_0 @ 0x55] Overall
[Parsed_astats_0 @ 0x55] RMS level dB: -58.250000
";
        assert_eq!(parse_rms_level(stderr), Some(-58.25));
    }

    #[test]
    fn test_negative_infinity_is_floored() {
        assert_eq!(
            parse_rms_level("lavfi.astats.Overall.RMS_level=-inf"),
            Some(SILENCE_FLOOR_DB)
        );
    }

    #[test]
    fn test_no_statistic() {
        assert_eq!(parse_rms_level("Stream #0:1: Audio: aac, 48000 Hz"), None);
        assert_eq!(parse_rms_level(""), None);
    }

    #[test]
    fn test_scenario_measured_pass() {
        let verifier = SilenceVerifier::default();
        let measurement =
            LoudnessMeasurement::from_analysis(ran("lavfi.astats.Overall.RMS_level: -55.3"));
        let result = verifier.judge(&CensorSegment::new(1.0, 3.0), measurement, 1);

        assert_eq!(result.measured_level_db, Some(-55.3));
        assert!(result.meets_threshold);
        assert!(!result.assumed_silent);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let verifier = SilenceVerifier::new(-50.0);
        let seg = CensorSegment::new(0.0, 1.0);
        assert!(verifier.judge(&seg, LoudnessMeasurement::Measured(-50.0), 1).meets_threshold);
        assert!(!verifier.judge(&seg, LoudnessMeasurement::Measured(-49.9), 1).meets_threshold);
    }

    #[test]
    fn test_silent_output_without_statistic_passes() {
        let measurement = LoudnessMeasurement::from_analysis(ran("Output #0, null, to 'pipe:':\n"));
        assert_eq!(measurement, LoudnessMeasurement::AssumedSilent);

        let result = SilenceVerifier::default().judge(&CensorSegment::new(0.0, 1.0), measurement, 2);
        assert!(result.meets_threshold);
        assert!(result.assumed_silent);
        assert_eq!(result.measured_level_db, Some(SILENCE_FLOOR_DB));
    }

    #[test]
    fn test_unmeasured_never_passes() {
        let verifier = SilenceVerifier::default();
        let seg = CensorSegment::new(0.0, 1.0);

        let empty = LoudnessMeasurement::from_analysis(ran("   \n"));
        assert_eq!(empty, LoudnessMeasurement::Unmeasured);

        let crashed = LoudnessMeasurement::from_analysis(Ok(ToolOutput {
            success: false,
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "lavfi.astats.Overall.RMS_level=-90.0".to_string(),
        }));
        assert_eq!(crashed, LoudnessMeasurement::Unmeasured);

        let missing = LoudnessMeasurement::from_analysis(Err(ffmpeg_error("not found", None)));
        assert_eq!(missing, LoudnessMeasurement::Unmeasured);

        let result = verifier.judge(&seg, missing, 3);
        assert!(!result.meets_threshold);
        assert_eq!(result.measured_level_db, None);
    }

    struct FixedAnalyzer {
        stderr: &'static str,
    }

    #[async_trait]
    impl MediaTool for FixedAnalyzer {
        async fn probe(&self, _input: &Path) -> Result<String> {
            Ok(String::new())
        }
        async fn subtitle_streams(&self, _input: &Path) -> Result<String> {
            Ok(String::new())
        }
        async fn extract_subtitle(&self, _input: &Path, _index: usize, _output: &Path) -> Result<()> {
            Ok(())
        }
        async fn transcode(&self, _input: &Path, _output: &Path, _graph: &str) -> Result<()> {
            Ok(())
        }
        async fn analyze_window(&self, _media: &Path, start: f64, duration: f64) -> Result<ToolOutput> {
            assert_eq!(start, 2.0);
            assert!((duration - 2.8).abs() < 1e-9);
            ran(self.stderr)
        }
    }

    #[tokio::test]
    async fn test_verify_segment_uses_segment_window() {
        let tool = FixedAnalyzer {
            stderr: "lavfi.astats.Overall.RMS_level=-30.0",
        };
        let result = SilenceVerifier::default()
            .verify_segment(&tool, Path::new("out.mp4"), &CensorSegment::new(2.0, 4.8), 2)
            .await;

        assert!(!result.meets_threshold);
        assert_eq!(result.measured_level_db, Some(-30.0));
        assert_eq!(result.strategy_level, 2);
    }
}
