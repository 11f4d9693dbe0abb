// Core modules
pub mod censoring;
pub mod config;
pub mod config_file;
pub mod dependencies;
pub mod diagnostics;
pub mod error;
pub mod escalation;
pub mod ffmpeg;
pub mod filter;
pub mod profanity;
pub mod progress;
pub mod resources;
pub mod segments;
pub mod strategy;
pub mod subtitles;
pub mod verify;
pub mod video;

// Re-export commonly used types
pub use censoring::{default_output_path, CensorOutcome, CensorSettings, GuardianProcessor};
pub use config::{Config, ConfigBuilder};
pub use config_file::{ConfigFile, ProfileConfig};
pub use diagnostics::DiagnosticReport;
pub use error::{GuardianError, Result};
pub use escalation::{run_escalation, CensoringRun, EscalationSettings, EscalationState};
pub use ffmpeg::{FfmpegTool, MediaTool, ToolOutput};
pub use filter::build_filter_graph;
pub use profanity::{ProfanityMatcher, DEFAULT_MATCHING_WORDS};
pub use progress::{ProgressOperation, ProgressTracker};
pub use resources::TempFile;
pub use segments::{extract_segments, CensorSegment};
pub use strategy::{strategy_for_level, FilterStrategy, FILTER_STRATEGIES};
pub use subtitles::{load_dialogue, DialogueLine};
pub use verify::{parse_rms_level, SegmentVerification, SilenceVerifier};
pub use video::VideoMetadata;
