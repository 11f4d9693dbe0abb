use crate::segments::CensorSegment;
use crate::strategy::FilterStrategy;

/// Pass-through graph used when nothing applies
pub const IDENTITY_FILTER: &str = "anull";

/// Canonical 16-bit stereo so later stages behave the same for any source
pub const FORMAT_NORMALIZATION: &str = "aformat=sample_fmts=s16:channel_layouts=stereo";

pub const COMPRESSOR: &str = "acompressor=threshold=-20dB:ratio=20:attack=5:release=50";

const DEEP_ATTENUATION: &str = "volume=-60dB";
const HARD_MUTE: &str = "volume=0";
const NOISE_GATE: &str = "agate=threshold=-90dB:ratio=10";

/// `between(t,start,end)` with millisecond precision
pub fn between_expression(segment: &CensorSegment) -> String {
    format!(
        "between(t,{:.3},{:.3})",
        segment.start_seconds, segment.end_seconds
    )
}

/// Attach a timeline condition to a filter. Single quotes on every platform.
fn gated(filter: &str, condition: &str) -> String {
    format!("{}:enable='{}'", filter, condition)
}

/// Render a strategy and segment list into an `-af` filter chain.
///
/// Stage order is fixed: format normalization, one volume clause per
/// segment, compressor, then the null-mixing stages. The null-mixing stages
/// are gated on the union of all segments so the rest of the track is left
/// alone, and are omitted when there are no segments.
pub fn build_filter_graph(strategy: &FilterStrategy, segments: &[CensorSegment]) -> String {
    let mut stages: Vec<String> = Vec::with_capacity(segments.len() + 5);

    if strategy.use_format_normalization {
        stages.push(FORMAT_NORMALIZATION.to_string());
    }

    stages.extend(
        segments
            .iter()
            .map(|segment| gated(strategy.volume_expression, &between_expression(segment))),
    );

    if strategy.use_compression {
        stages.push(COMPRESSOR.to_string());
    }

    if strategy.use_null_mixing && !segments.is_empty() {
        let any_segment = segments
            .iter()
            .map(between_expression)
            .collect::<Vec<_>>()
            .join("+");
        for stage in [DEEP_ATTENUATION, HARD_MUTE, NOISE_GATE] {
            stages.push(gated(stage, &any_segment));
        }
    }

    if stages.is_empty() {
        IDENTITY_FILTER.to_string()
    } else {
        stages.join(",")
    }
}
