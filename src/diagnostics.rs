use chrono::{DateTime, Local};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{GuardianError, IntoGuardianError, Result};
use crate::escalation::CensoringRun;
use crate::segments::total_duration;
use crate::strategy::strategy_for_level;

/// Per-segment row of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDiagnostic {
    pub segment_id: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub actual_rms_db: Option<f64>,
    pub meets_threshold: bool,
    pub strategy_used: Option<String>,
}

/// Structured account of one censoring run, written next to the output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub timestamp: String,
    pub input_video: String,
    pub output_video: String,
    pub overall_success: bool,
    pub verified: bool,
    pub total_segments: usize,
    pub total_censored_duration: f64,
    pub successful_segments: usize,
    pub failed_segments: usize,
    pub attempts_made: u32,
    pub final_strategy_level: u32,
    pub final_strategy_used: String,
    pub media_duration: Option<f64>,
    pub percentage_censored: Option<f64>,
    pub segments: Vec<SegmentDiagnostic>,
    pub recommendations: Vec<String>,
    pub error_messages: Vec<String>,
}

impl DiagnosticReport {
    pub fn from_run(run: &CensoringRun, media_duration: Option<f64>) -> Self {
        Self::from_run_at(run, media_duration, Local::now())
    }

    pub fn from_run_at(
        run: &CensoringRun,
        media_duration: Option<f64>,
        now: DateTime<Local>,
    ) -> Self {
        let segments = segment_rows(run);
        let successful_segments = segments.iter().filter(|s| s.meets_threshold).count();
        let censored = total_duration(&run.segments);
        let media_duration = media_duration.filter(|d| *d > 0.0);

        let mut report = Self {
            timestamp: now.to_rfc3339(),
            input_video: run.input.display().to_string(),
            output_video: run.output.display().to_string(),
            overall_success: run.success,
            verified: run.verified,
            total_segments: segments.len(),
            total_censored_duration: censored,
            successful_segments,
            failed_segments: segments.len() - successful_segments,
            attempts_made: run.attempts_made,
            final_strategy_level: run.final_strategy_level,
            final_strategy_used: strategy_for_level(run.final_strategy_level).name.to_string(),
            media_duration,
            percentage_censored: media_duration.map(|total| censored / total * 100.0),
            segments,
            recommendations: Vec::new(),
            error_messages: run.errors.clone(),
        };
        report.recommendations = recommendations(&report);
        report
    }

    /// `<stem>_diagnostic_<YYYYmmdd_HHMMSS>.json`
    pub fn file_name(&self) -> String {
        let stem = Path::new(&self.input_video)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let stamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.format("%Y%m%d_%H%M%S").to_string())
            .unwrap_or_else(|_| Local::now().format("%Y%m%d_%H%M%S").to_string());
        format!("{}_diagnostic_{}.json", stem, stamp)
    }

    /// Write the report as pretty JSON into `dir`, atomically.
    pub fn persist(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).with_path(dir.to_path_buf())?;
        let path = dir.join(self.file_name());

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| GuardianError::Processing {
                message: format!("Failed to serialize diagnostic report: {}", e),
            })?;

        let mut staging = tempfile::NamedTempFile::new_in(dir).with_path(dir.to_path_buf())?;
        staging
            .write_all(json.as_bytes())
            .with_path(staging.path().to_path_buf())?;
        staging
            .persist(&path)
            .map_err(|e| e.error)
            .with_path(path.clone())?;

        info!("Diagnostic report saved to {}", path.display());
        Ok(path)
    }
}

fn segment_rows(run: &CensoringRun) -> Vec<SegmentDiagnostic> {
    if !run.per_segment_results.is_empty() && run.per_segment_results.len() == run.segments.len() {
        return run
            .per_segment_results
            .iter()
            .enumerate()
            .map(|(i, r)| SegmentDiagnostic {
                segment_id: i + 1,
                start_time: r.start_seconds,
                end_time: r.end_seconds,
                actual_rms_db: r.measured_level_db,
                meets_threshold: r.meets_threshold,
                strategy_used: Some(strategy_for_level(r.strategy_level).name.to_string()),
            })
            .collect();
    }

    // Nothing was measured: quick mode, or every invocation failed.
    run.segments
        .iter()
        .enumerate()
        .map(|(i, s)| SegmentDiagnostic {
            segment_id: i + 1,
            start_time: s.start_seconds,
            end_time: s.end_seconds,
            actual_rms_db: None,
            meets_threshold: run.success,
            strategy_used: run
                .success
                .then(|| strategy_for_level(run.final_strategy_level).name.to_string()),
        })
        .collect()
}

fn errors_mention(report: &DiagnosticReport, needles: &[&str]) -> bool {
    report.error_messages.iter().any(|message| {
        let lower = message.to_lowercase();
        needles.iter().any(|n| lower.contains(n))
    })
}

/// Rule-based hints derived from counts and error text
pub fn recommendations(report: &DiagnosticReport) -> Vec<String> {
    let mut hints = Vec::new();

    if report.total_segments > 0 && report.failed_segments == report.total_segments {
        hints.push(
            "All segments failed: check that FFmpeg is installed correctly and supports the volume, acompressor and agate filters"
                .to_string(),
        );
    } else if report.failed_segments > 0 {
        hints.push(format!(
            "{} of {} segments are still audible: try the 'strict' profile or a higher --max-attempts",
            report.failed_segments, report.total_segments
        ));
    }

    if errors_mention(report, &["permission"]) {
        hints.push("Check file system permissions for the input and output locations".to_string());
    }
    if errors_mention(report, &["not found", "no such file"]) {
        hints.push("Check that the ffmpeg and ffprobe paths are correct".to_string());
    }
    if errors_mention(report, &["timed out"]) {
        hints.push("The encoder timed out: raise --timeout for long videos".to_string());
    }
    if errors_mention(report, &["no such filter", "error initializing filter"]) {
        hints.push("This FFmpeg build is missing required audio filters; install a full build".to_string());
    }

    let unmeasured = report
        .segments
        .iter()
        .any(|s| s.strategy_used.is_some() && s.actual_rms_db.is_none());
    if report.verified && unmeasured {
        hints.push(
            "Some segments could not be measured: the astats filter may be unavailable in this FFmpeg build"
                .to_string(),
        );
    }

    if report.overall_success && report.attempts_made > 1 {
        hints.push(format!(
            "Succeeded only after escalating to the {} strategy; consider starting there for similar content",
            report.final_strategy_used
        ));
    }
    if report.overall_success && !report.verified {
        hints.push("Output was not acoustically verified; run without --quick to confirm silence".to_string());
    }

    debug!("Generated {} recommendations", hints.len());
    hints
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Censoring report for {}", self.input_video)?;
        writeln!(
            f,
            "  Result:     {}",
            match (self.overall_success, self.verified) {
                (true, true) => "SUCCESS (verified)",
                (true, false) => "SUCCESS (unverified)",
                (false, _) => "FAILED",
            }
        )?;
        writeln!(f, "  Output:     {}", self.output_video)?;
        writeln!(
            f,
            "  Strategy:   level {} ({}) after {} attempt(s)",
            self.final_strategy_level, self.final_strategy_used, self.attempts_made
        )?;
        write!(
            f,
            "  Segments:   {} total, {} silent, {} audible, {:.2}s censored",
            self.total_segments,
            self.successful_segments,
            self.failed_segments,
            self.total_censored_duration
        )?;
        if let Some(pct) = self.percentage_censored {
            write!(f, " ({:.2}% of media)", pct)?;
        }
        writeln!(f)?;

        for seg in self.segments.iter().filter(|s| !s.meets_threshold) {
            let level = seg
                .actual_rms_db
                .map(|db| format!("{:.1} dB", db))
                .unwrap_or_else(|| "unmeasured".to_string());
            writeln!(
                f,
                "    #{} {:.3}s-{:.3}s: {}",
                seg.segment_id, seg.start_time, seg.end_time, level
            )?;
        }

        if !self.error_messages.is_empty() {
            writeln!(f, "  Errors:")?;
            for message in &self.error_messages {
                let first_line = message.lines().next().unwrap_or_default();
                writeln!(f, "    - {}", first_line)?;
            }
        }
        if !self.recommendations.is_empty() {
            writeln!(f, "  Recommendations:")?;
            for hint in &self.recommendations {
                writeln!(f, "    - {}", hint)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::CensorSegment;
    use crate::verify::SegmentVerification;
    use chrono::TimeZone;

    fn verification(start: f64, end: f64, db: Option<f64>, pass: bool) -> SegmentVerification {
        SegmentVerification {
            start_seconds: start,
            end_seconds: end,
            measured_level_db: db,
            meets_threshold: pass,
            assumed_silent: false,
            strategy_level: 2,
        }
    }

    fn run(success: bool, results: Vec<SegmentVerification>, errors: Vec<&str>) -> CensoringRun {
        CensoringRun {
            input: PathBuf::from("/videos/movie.mkv"),
            output: PathBuf::from("/videos/movie_censored.mp4"),
            segments: vec![CensorSegment::new(1.0, 3.0), CensorSegment::new(10.0, 12.5)],
            attempts_made: 2,
            final_strategy_level: 2,
            per_segment_results: results,
            success,
            verified: true,
            errors: errors.into_iter().map(String::from).collect(),
        }
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_counts_always_add_up() {
        let cases = vec![
            run(true, vec![verification(1.0, 3.0, Some(-70.0), true), verification(10.0, 12.5, Some(-60.0), true)], vec![]),
            run(false, vec![verification(1.0, 3.0, Some(-70.0), true), verification(10.0, 12.5, Some(-20.0), false)], vec![]),
            run(false, vec![], vec!["Attempt 1 (Basic): FFmpeg error: not found"]),
            run(true, vec![], vec![]),
        ];

        for case in &cases {
            let report = DiagnosticReport::from_run_at(case, None, fixed_time());
            assert_eq!(report.total_segments, 2);
            assert_eq!(
                report.successful_segments + report.failed_segments,
                report.total_segments
            );
        }
    }

    #[test]
    fn test_durations_and_percentage() {
        let report = DiagnosticReport::from_run_at(&run(true, vec![], vec![]), Some(90.0), fixed_time());
        assert!((report.total_censored_duration - 4.5).abs() < 1e-9);
        assert!((report.percentage_censored.unwrap() - 5.0).abs() < 1e-9);

        let unknown = DiagnosticReport::from_run_at(&run(true, vec![], vec![]), Some(0.0), fixed_time());
        assert_eq!(unknown.percentage_censored, None);
    }

    #[test]
    fn test_recommendations() {
        let all_failed = run(
            false,
            vec![verification(1.0, 3.0, Some(-20.0), false), verification(10.0, 12.5, None, false)],
            vec!["Attempt 1 (Basic): FFmpeg error: Permission denied"],
        );
        let report = DiagnosticReport::from_run_at(&all_failed, None, fixed_time());
        assert!(report.recommendations.iter().any(|r| r.contains("installed correctly")));
        assert!(report.recommendations.iter().any(|r| r.contains("permissions")));
        assert!(report.recommendations.iter().any(|r| r.contains("astats")));

        let partial = run(
            false,
            vec![verification(1.0, 3.0, Some(-70.0), true), verification(10.0, 12.5, Some(-20.0), false)],
            vec!["'ffmpeg' timed out after 600 seconds"],
        );
        let report = DiagnosticReport::from_run_at(&partial, None, fixed_time());
        assert!(report.recommendations.iter().any(|r| r.contains("strict")));
        assert!(report.recommendations.iter().any(|r| r.contains("--timeout")));
        assert!(!report.recommendations.iter().any(|r| r.contains("installed correctly")));
    }

    #[test]
    fn test_file_name() {
        let report = DiagnosticReport::from_run_at(&run(true, vec![], vec![]), None, fixed_time());
        assert_eq!(report.file_name(), "movie_diagnostic_20240309_140507.json");
    }

    #[test]
    fn test_persist_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let report = DiagnosticReport::from_run_at(
            &run(
                false,
                vec![verification(1.0, 3.0, Some(-100.0), true), verification(10.0, 12.5, None, false)],
                vec!["Attempt 2 (Enhanced): 1 of 2 segments above threshold"],
            ),
            Some(120.0),
            fixed_time(),
        );

        let path = report.persist(&dir.path().join("reports")).unwrap();
        assert!(path.ends_with("movie_diagnostic_20240309_140507.json"));

        let loaded: DiagnosticReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, report);

        // no staging files left behind
        let entries = std::fs::read_dir(dir.path().join("reports")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_text_summary() {
        let report = DiagnosticReport::from_run_at(
            &run(
                false,
                vec![verification(1.0, 3.0, Some(-70.0), true), verification(10.0, 12.5, Some(-21.5), false)],
                vec!["Attempt 2 (Enhanced): 1 of 2 segments above threshold"],
            ),
            None,
            fixed_time(),
        );
        let text = report.to_string();
        assert!(text.contains("FAILED"));
        assert!(text.contains("#2 10.000s-12.500s: -21.5 dB"));
        assert!(!text.contains("#1 "));
        assert!(text.contains("Recommendations:"));
    }
}
