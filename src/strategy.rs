use serde::Serialize;

/// One rung of the escalation ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterStrategy {
    pub level: u32,
    pub name: &'static str,
    pub volume_expression: &'static str,
    pub use_format_normalization: bool,
    pub use_compression: bool,
    pub use_null_mixing: bool,
    pub description: &'static str,
}

/// Level used when an undefined level is requested
pub const FALLBACK_LEVEL: u32 = 2;

/// Ordered from least to most aggressive; index `n - 1` holds level `n`.
pub const FILTER_STRATEGIES: [FilterStrategy; 3] = [
    FilterStrategy {
        level: 1,
        name: "Basic",
        volume_expression: "volume=0",
        use_format_normalization: false,
        use_compression: false,
        use_null_mixing: false,
        description: "Time-gated volume=0 on each flagged segment",
    },
    FilterStrategy {
        level: 2,
        name: "Enhanced",
        volume_expression: "volume=-80dB",
        use_format_normalization: true,
        use_compression: true,
        use_null_mixing: false,
        description: "Normalize to s16 stereo, attenuate segments by 80dB, then compress transients",
    },
    FilterStrategy {
        level: 3,
        name: "Aggressive",
        volume_expression: "volume=0",
        use_format_normalization: true,
        use_compression: true,
        use_null_mixing: true,
        description: "Enhanced chain plus deep attenuation, hard mute and a noise gate over the segments",
    },
];

/// Highest defined level
pub const MAX_STRATEGY_LEVEL: u32 = FILTER_STRATEGIES.len() as u32;

/// Look up a level; anything outside the table resolves to level 2.
pub fn strategy_for_level(level: u32) -> &'static FilterStrategy {
    FILTER_STRATEGIES
        .iter()
        .find(|s| s.level == level)
        .unwrap_or(&FILTER_STRATEGIES[(FALLBACK_LEVEL - 1) as usize])
}

/// `(level, name, description)` rows for `--list-strategies`
pub fn list_strategies() -> Vec<(u32, &'static str, &'static str)> {
    FILTER_STRATEGIES
        .iter()
        .map(|s| (s.level, s.name, s.description))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_ordered_by_level() {
        for (i, strategy) in FILTER_STRATEGIES.iter().enumerate() {
            assert_eq!(strategy.level, i as u32 + 1);
        }
        assert_eq!(MAX_STRATEGY_LEVEL, 3);
    }

    #[test]
    fn test_table_contents() {
        let basic = strategy_for_level(1);
        assert_eq!(basic.name, "Basic");
        assert_eq!(basic.volume_expression, "volume=0");
        assert!(!basic.use_format_normalization && !basic.use_compression && !basic.use_null_mixing);

        let enhanced = strategy_for_level(2);
        assert_eq!(enhanced.volume_expression, "volume=-80dB");
        assert!(enhanced.use_format_normalization && enhanced.use_compression);
        assert!(!enhanced.use_null_mixing);

        let aggressive = strategy_for_level(3);
        assert_eq!(aggressive.volume_expression, "volume=0");
        assert!(aggressive.use_format_normalization && aggressive.use_compression);
        assert!(aggressive.use_null_mixing);
    }

    #[test]
    fn test_undefined_level_falls_back_to_enhanced() {
        assert_eq!(strategy_for_level(0).level, 2);
        assert_eq!(strategy_for_level(4).level, 2);
        assert_eq!(strategy_for_level(u32::MAX).name, "Enhanced");
    }
}
