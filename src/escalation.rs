use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};

use crate::ffmpeg::MediaTool;
use crate::filter::build_filter_graph;
use crate::resources::remove_partial_output;
use crate::segments::CensorSegment;
use crate::strategy::{strategy_for_level, MAX_STRATEGY_LEVEL};
use crate::verify::{SegmentVerification, SilenceVerifier, DEFAULT_SILENCE_THRESHOLD_DB};

/// Knobs for one escalation run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscalationSettings {
    pub max_attempts: u32,
    /// Measure every segment after each attempt. Off means a single
    /// unverified level-1 pass.
    pub verify: bool,
    pub threshold_db: f64,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        Self {
            max_attempts: MAX_STRATEGY_LEVEL,
            verify: true,
            threshold_db: DEFAULT_SILENCE_THRESHOLD_DB,
        }
    }
}

impl EscalationSettings {
    /// Attempts actually allowed: one per strategy level at most, and
    /// exactly one when verification is off.
    pub fn attempt_limit(&self) -> u32 {
        if self.verify {
            self.max_attempts.clamp(1, MAX_STRATEGY_LEVEL)
        } else {
            1
        }
    }
}

/// What happened during one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// The encoder could not be run or exited non-zero
    InvocationFailed(String),
    Verified(Vec<SegmentVerification>),
    /// Encoder succeeded and verification is off
    Unverified,
}

/// Escalation progress. Results are those of the latest attempt that got as
/// far as verification.
#[derive(Debug, Clone, PartialEq)]
pub enum EscalationState {
    Pending {
        attempt: u32,
        results: Vec<SegmentVerification>,
        errors: Vec<String>,
    },
    Succeeded {
        attempt: u32,
        results: Vec<SegmentVerification>,
        errors: Vec<String>,
    },
    Failed {
        attempt: u32,
        results: Vec<SegmentVerification>,
        errors: Vec<String>,
    },
}

impl EscalationState {
    pub fn start() -> Self {
        Self::Pending {
            attempt: 1,
            results: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn attempt(&self) -> u32 {
        match self {
            Self::Pending { attempt, .. }
            | Self::Succeeded { attempt, .. }
            | Self::Failed { attempt, .. } => *attempt,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Transition on the outcome of the current attempt. Terminal states
    /// are returned unchanged.
    pub fn advance(self, outcome: AttemptOutcome, attempt_limit: u32) -> Self {
        let (attempt, mut results, mut errors) = match self {
            Self::Pending {
                attempt,
                results,
                errors,
            } => (attempt, results, errors),
            terminal => return terminal,
        };
        let strategy = strategy_for_level(attempt);

        match outcome {
            AttemptOutcome::Unverified => {
                return Self::Succeeded {
                    attempt,
                    results: Vec::new(),
                    errors,
                }
            }
            AttemptOutcome::Verified(verified) if verified.iter().all(|r| r.meets_threshold) => {
                return Self::Succeeded {
                    attempt,
                    results: verified,
                    errors,
                }
            }
            AttemptOutcome::Verified(verified) => {
                let failing = verified.iter().filter(|r| !r.meets_threshold).count();
                errors.push(format!(
                    "Attempt {} ({}): {} of {} segments above threshold",
                    attempt,
                    strategy.name,
                    failing,
                    verified.len()
                ));
                results = verified;
            }
            AttemptOutcome::InvocationFailed(message) => {
                errors.push(format!("Attempt {} ({}): {}", attempt, strategy.name, message));
            }
        }

        if attempt >= attempt_limit {
            Self::Failed {
                attempt,
                results,
                errors,
            }
        } else {
            Self::Pending {
                attempt: attempt + 1,
                results,
                errors,
            }
        }
    }
}

/// Finalized record of one censoring operation
#[derive(Debug, Clone, PartialEq)]
pub struct CensoringRun {
    pub input: PathBuf,
    pub output: PathBuf,
    pub segments: Vec<CensorSegment>,
    pub attempts_made: u32,
    pub final_strategy_level: u32,
    pub per_segment_results: Vec<SegmentVerification>,
    pub success: bool,
    pub verified: bool,
    pub errors: Vec<String>,
}

impl CensoringRun {
    fn finish(
        input: &Path,
        output: &Path,
        segments: &[CensorSegment],
        verified: bool,
        state: EscalationState,
    ) -> Self {
        let attempts_made = state.attempt();
        let (success, per_segment_results, errors) = match state {
            EscalationState::Succeeded { results, errors, .. } => (true, results, errors),
            EscalationState::Failed { results, errors, .. }
            | EscalationState::Pending { results, errors, .. } => (false, results, errors),
        };

        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            segments: segments.to_vec(),
            attempts_made,
            final_strategy_level: strategy_for_level(attempts_made).level,
            per_segment_results,
            success,
            verified,
            errors,
        }
    }
}

/// Encode `input` into `output` with increasingly aggressive strategies until
/// every segment verifies as silent or the attempt limit is reached.
///
/// `output` is overwritten on every attempt and removed whenever an attempt
/// does not end in success, so a failed run leaves nothing behind.
pub async fn run_escalation<T: MediaTool + ?Sized>(
    tool: &T,
    input: &Path,
    output: &Path,
    segments: &[CensorSegment],
    settings: &EscalationSettings,
) -> CensoringRun {
    let verifier = SilenceVerifier::new(settings.threshold_db);
    let attempt_limit = settings.attempt_limit();
    let mut state = EscalationState::start();

    while let EscalationState::Pending { attempt, .. } = &state {
        let level = *attempt;
        let strategy = strategy_for_level(level);
        let graph = build_filter_graph(strategy, segments);

        info!(
            "Attempt {}/{}: {} strategy on {} segments",
            level,
            attempt_limit,
            strategy.name,
            segments.len()
        );
        debug!("Audio filter graph: {}", graph);

        let outcome = match tool.transcode(input, output, &graph).await {
            Err(e) => {
                error!("Encoder failed at level {}: {}", level, e);
                AttemptOutcome::InvocationFailed(e.to_string())
            }
            Ok(()) if !settings.verify => AttemptOutcome::Unverified,
            Ok(()) => {
                let mut results = Vec::with_capacity(segments.len());
                for segment in segments {
                    results.push(verifier.verify_segment(tool, output, segment, level).await);
                }
                AttemptOutcome::Verified(results)
            }
        };

        state = state.advance(outcome, attempt_limit);
        if !state.is_success() {
            remove_partial_output(output);
        }
    }

    match &state {
        EscalationState::Succeeded { attempt, .. } => {
            info!("Censoring succeeded with strategy level {}", attempt)
        }
        _ => warn!(
            "Censoring failed after {} attempts for {:?}",
            state.attempt(),
            input
        ),
    }

    CensoringRun::finish(input, output, segments, settings.verify, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ffmpeg_error, Result};
    use crate::ffmpeg::ToolOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Encoder whose output only reads as silent from `passes_at` onward
    struct LadderTool {
        passes_at: Option<u32>,
        broken_levels: Vec<u32>,
        transcodes: Mutex<Vec<u32>>,
        analyses: Mutex<usize>,
    }

    impl LadderTool {
        fn new(passes_at: Option<u32>) -> Self {
            Self {
                passes_at,
                broken_levels: Vec::new(),
                transcodes: Mutex::new(Vec::new()),
                analyses: Mutex::new(0),
            }
        }

        fn level_of(graph: &str) -> u32 {
            if graph.contains("agate") {
                3
            } else if graph.contains("-80dB") {
                2
            } else {
                1
            }
        }

        fn transcode_levels(&self) -> Vec<u32> {
            self.transcodes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaTool for LadderTool {
        async fn probe(&self, _input: &Path) -> Result<String> {
            Ok(String::new())
        }
        async fn subtitle_streams(&self, _input: &Path) -> Result<String> {
            Ok(String::new())
        }
        async fn extract_subtitle(&self, _input: &Path, _index: usize, _output: &Path) -> Result<()> {
            Ok(())
        }
        async fn transcode(&self, _input: &Path, output: &Path, graph: &str) -> Result<()> {
            let level = Self::level_of(graph);
            self.transcodes.lock().unwrap().push(level);
            std::fs::write(output, b"partial").unwrap();
            if self.broken_levels.contains(&level) {
                return Err(ffmpeg_error("ffmpeg transcode failed with exit code Some(1)", None));
            }
            Ok(())
        }
        async fn analyze_window(&self, _media: &Path, _start: f64, _duration: f64) -> Result<ToolOutput> {
            *self.analyses.lock().unwrap() += 1;
            let level = self.transcode_levels().last().copied().unwrap_or(0);
            let rms = match self.passes_at {
                Some(pass) if level >= pass => -72.0,
                _ => -24.0,
            };
            Ok(ToolOutput {
                success: true,
                exit_code: Some(0),
                stdout: String::new(),
                stderr: format!("lavfi.astats.Overall.RMS_level={:.1}\n", rms),
            })
        }
    }

    fn segments() -> Vec<CensorSegment> {
        vec![CensorSegment::new(1.0, 2.0), CensorSegment::new(5.0, 6.5)]
    }

    #[tokio::test]
    async fn test_success_at_third_level() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let tool = LadderTool::new(Some(3));

        let run = run_escalation(
            &tool,
            Path::new("in.mp4"),
            &output,
            &segments(),
            &EscalationSettings::default(),
        )
        .await;

        assert!(run.success);
        assert_eq!(run.final_strategy_level, 3);
        assert_eq!(run.attempts_made, 3);
        assert_eq!(tool.transcode_levels(), vec![1, 2, 3]);
        assert_eq!(run.per_segment_results.len(), 2);
        assert!(run.per_segment_results.iter().all(|r| r.strategy_level == 3));
        assert_eq!(run.errors.len(), 2);
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_success_at_level_k_uses_k_invocations() {
        for k in 1..=3 {
            let dir = tempfile::tempdir().unwrap();
            let output = dir.path().join("out.mp4");
            let tool = LadderTool::new(Some(k));

            let run = run_escalation(
                &tool,
                Path::new("in.mp4"),
                &output,
                &segments(),
                &EscalationSettings::default(),
            )
            .await;

            assert!(run.success);
            assert_eq!(run.attempts_made, k);
            assert_eq!(tool.transcode_levels().len(), k as usize);
            assert_eq!(*tool.analyses.lock().unwrap(), 2 * k as usize);
        }
    }

    #[tokio::test]
    async fn test_exhaustion_removes_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let tool = LadderTool::new(None);

        let run = run_escalation(
            &tool,
            Path::new("in.mp4"),
            &output,
            &segments(),
            &EscalationSettings::default(),
        )
        .await;

        assert!(!run.success);
        assert_eq!(run.attempts_made, 3);
        assert_eq!(run.final_strategy_level, 3);
        assert_eq!(run.errors.len(), 3);
        assert!(run.per_segment_results.iter().all(|r| !r.meets_threshold));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_attempt_limit_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let tool = LadderTool::new(Some(3));
        let settings = EscalationSettings {
            max_attempts: 2,
            ..EscalationSettings::default()
        };

        let run = run_escalation(&tool, Path::new("in.mp4"), &output, &segments(), &settings).await;

        assert!(!run.success);
        assert_eq!(tool.transcode_levels(), vec![1, 2]);
        assert_eq!(run.final_strategy_level, 2);
    }

    #[tokio::test]
    async fn test_invocation_failure_escalates() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let mut tool = LadderTool::new(Some(1));
        tool.broken_levels = vec![1];

        let run = run_escalation(
            &tool,
            Path::new("in.mp4"),
            &output,
            &segments(),
            &EscalationSettings::default(),
        )
        .await;

        assert!(run.success);
        assert_eq!(run.final_strategy_level, 2);
        assert_eq!(run.errors.len(), 1);
        assert!(run.errors[0].contains("exit code"));
    }

    #[tokio::test]
    async fn test_every_invocation_failing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let mut tool = LadderTool::new(Some(1));
        tool.broken_levels = vec![1, 2, 3];

        let run = run_escalation(
            &tool,
            Path::new("in.mp4"),
            &output,
            &segments(),
            &EscalationSettings::default(),
        )
        .await;

        assert!(!run.success);
        assert!(run.per_segment_results.is_empty());
        assert_eq!(*tool.analyses.lock().unwrap(), 0);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_quick_mode_single_unverified_pass() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let tool = LadderTool::new(None);
        let settings = EscalationSettings {
            verify: false,
            ..EscalationSettings::default()
        };

        let run = run_escalation(&tool, Path::new("in.mp4"), &output, &segments(), &settings).await;

        assert!(run.success);
        assert!(!run.verified);
        assert_eq!(tool.transcode_levels(), vec![1]);
        assert_eq!(*tool.analyses.lock().unwrap(), 0);
        assert!(output.exists());
    }

    #[test]
    fn test_advance_is_pure() {
        let failing = SegmentVerification {
            start_seconds: 0.0,
            end_seconds: 1.0,
            measured_level_db: Some(-10.0),
            meets_threshold: false,
            assumed_silent: false,
            strategy_level: 1,
        };

        let state = EscalationState::start()
            .advance(AttemptOutcome::Verified(vec![failing.clone()]), 2);
        assert_eq!(state.attempt(), 2);
        assert!(!state.is_terminal());

        let state = state.advance(AttemptOutcome::InvocationFailed("boom".into()), 2);
        match &state {
            EscalationState::Failed { attempt, results, errors } => {
                assert_eq!(*attempt, 2);
                assert_eq!(results, &vec![failing]);
                assert_eq!(errors.len(), 2);
            }
            other => panic!("expected failure, got {:?}", other),
        }

        // terminal states absorb further outcomes
        let again = state.clone().advance(AttemptOutcome::Unverified, 2);
        assert_eq!(again, state);
    }
}
