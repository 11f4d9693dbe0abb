use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::profanity::ProfanityMatcher;
use crate::subtitles::DialogueLine;

/// Time span to mute, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CensorSegment {
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl CensorSegment {
    pub fn new(start_seconds: f64, end_seconds: f64) -> Self {
        Self {
            start_seconds,
            end_seconds,
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end_seconds - self.start_seconds).max(0.0)
    }
}

impl From<&DialogueLine> for CensorSegment {
    fn from(line: &DialogueLine) -> Self {
        Self::new(line.start_seconds(), line.end_seconds())
    }
}

/// One segment per profane line, in subtitle order.
///
/// Overlapping or adjacent segments are deliberately left unmerged: each one
/// becomes its own filter clause downstream.
pub fn extract_segments(lines: &[DialogueLine], matcher: &ProfanityMatcher) -> Vec<CensorSegment> {
    let segments: Vec<CensorSegment> = lines
        .iter()
        .filter(|line| {
            let hit = matcher.is_profane(&line.text);
            if hit {
                debug!(
                    "Subtitle #{} ({:.3}s-{:.3}s) flagged",
                    line.index,
                    line.start_seconds(),
                    line.end_seconds()
                );
            }
            hit
        })
        .map(CensorSegment::from)
        .collect();

    info!(
        "{} of {} subtitle lines contain profanity",
        segments.len(),
        lines.len()
    );
    segments
}

/// Sum of segment durations; overlaps are counted once per segment
pub fn total_duration(segments: &[CensorSegment]) -> f64 {
    segments.iter().map(CensorSegment::duration).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn line(index: usize, start: f64, end: f64, text: &str) -> DialogueLine {
        DialogueLine::new(
            index,
            Duration::from_secs_f64(start),
            Duration::from_secs_f64(end),
            text,
        )
    }

    #[test]
    fn test_single_profane_line() {
        let lines = vec![line(1, 1.0, 3.0, "this is fucking terrible")];
        let segments = extract_segments(&lines, &ProfanityMatcher::default());
        assert_eq!(segments, vec![CensorSegment::new(1.0, 3.0)]);
    }

    #[test]
    fn test_only_matching_lines_in_order() {
        let lines = vec![
            line(1, 1.0, 3.0, "This is fucking terrible!"),
            line(2, 5.0, 7.0, "Clean content here"),
            line(3, 10.0, 12.0, "What the hell is this shit?"),
        ];
        let segments = extract_segments(&lines, &ProfanityMatcher::default());
        assert_eq!(
            segments,
            vec![CensorSegment::new(1.0, 3.0), CensorSegment::new(10.0, 12.0)]
        );
    }

    #[test]
    fn test_overlaps_are_not_merged() {
        let lines = vec![
            line(1, 2.0, 4.0, "damn"),
            line(2, 2.0, 4.0, "damn again"),
            line(3, 3.5, 6.0, "shit"),
            line(4, 6.0, 7.0, "hell"),
        ];
        let segments = extract_segments(&lines, &ProfanityMatcher::default());
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0], segments[1]);
        assert!((total_duration(&segments) - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_matcher_yields_nothing() {
        let empty: [&str; 0] = [];
        let lines = vec![line(1, 0.0, 1.0, "fuck")];
        assert!(extract_segments(&lines, &ProfanityMatcher::new(&empty)).is_empty());
    }

    #[test]
    fn test_sub_second_precision() {
        let lines = vec![line(7, 2.0, 4.8, "bitch")];
        let segments = extract_segments(&lines, &ProfanityMatcher::default());
        assert!((segments[0].start_seconds - 2.0).abs() < 1e-9);
        assert!((segments[0].end_seconds - 4.8).abs() < 1e-9);
        assert!((segments[0].duration() - 2.8).abs() < 1e-9);
    }
}
