use std::path::{Path, PathBuf};

use crate::censoring::default_output_path;
use crate::error::{config_error, Result};
use crate::profanity::default_matching_words;
use crate::strategy::MAX_STRATEGY_LEVEL;
use crate::verify::DEFAULT_SILENCE_THRESHOLD_DB;

pub const DEFAULT_OUTPUT_SUFFIX: &str = "_censored";
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Configuration structure for the guardian application
#[derive(Debug, Clone)]
pub struct Config {
    pub inputs: Vec<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub output_suffix: String,
    pub matching_words: Vec<String>,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// Verify and escalate; off means one unverified basic pass
    pub full: bool,
    pub max_attempts: u32,
    pub threshold_db: f64,
    pub timeout_secs: Option<u64>,
    pub diagnostics_dir: Option<PathBuf>,
    pub write_diagnostics: bool,
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(config_error("inputs", "At least one input file or directory is required"));
        }

        if self.output_file.is_some() && self.inputs.len() > 1 {
            return Err(config_error(
                "output_file",
                "An explicit output file can only be used with a single input",
            ));
        }

        if self.output_suffix.is_empty() && self.output_file.is_none() {
            return Err(config_error(
                "output_suffix",
                "Output suffix cannot be empty; it would overwrite the input",
            ));
        }

        if self.matching_words.is_empty() {
            return Err(config_error("matching_words", "Matching words list cannot be empty"));
        }

        if !(1..=MAX_STRATEGY_LEVEL).contains(&self.max_attempts) {
            return Err(config_error(
                "max_attempts",
                format!(
                    "Max attempts must be between 1 and {}, got {}",
                    MAX_STRATEGY_LEVEL, self.max_attempts
                ),
            ));
        }

        if !self.threshold_db.is_finite() || self.threshold_db > 0.0 {
            return Err(config_error(
                "threshold_db",
                format!("Threshold must be a dB value at or below 0, got {}", self.threshold_db),
            ));
        }

        if self.timeout_secs == Some(0) {
            return Err(config_error("timeout", "Timeout must be at least one second"));
        }

        Ok(())
    }

    /// Where the censored copy of `input` goes
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        match &self.output_file {
            Some(output) => output.clone(),
            None => default_output_path(input, &self.output_suffix),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output_file: None,
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            matching_words: default_matching_words(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            full: true,
            max_attempts: MAX_STRATEGY_LEVEL,
            threshold_db: DEFAULT_SILENCE_THRESHOLD_DB,
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            diagnostics_dir: None,
            write_diagnostics: true,
        }
    }
}

fn normalize_words(words: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(words.len());
    for word in words {
        let word = word.trim().to_lowercase();
        if !word.is_empty() && !normalized.contains(&word) {
            normalized.push(word);
        }
    }
    normalized
}

/// Builder pattern for Config
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    inputs: Vec<PathBuf>,
    output_file: Option<PathBuf>,
    output_suffix: Option<String>,
    matching_words: Option<Vec<String>>,
    extra_words: Vec<String>,
    ffmpeg_path: Option<PathBuf>,
    ffprobe_path: Option<PathBuf>,
    full: Option<bool>,
    max_attempts: Option<u32>,
    threshold_db: Option<f64>,
    timeout_secs: Option<Option<u64>>,
    diagnostics_dir: Option<PathBuf>,
    write_diagnostics: Option<bool>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, path: PathBuf) -> Self {
        self.inputs.push(path);
        self
    }

    pub fn inputs(mut self, paths: Vec<PathBuf>) -> Self {
        self.inputs = paths;
        self
    }

    pub fn output_file(mut self, path: PathBuf) -> Self {
        self.output_file = Some(path);
        self
    }

    pub fn output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.output_suffix = Some(suffix.into());
        self
    }

    /// Replace the default word list
    pub fn matching_words(mut self, words: Vec<String>) -> Result<Self> {
        let normalized = normalize_words(words);
        if normalized.is_empty() {
            return Err(config_error("matching_words", "No valid words provided"));
        }
        self.matching_words = Some(normalized);
        Ok(self)
    }

    /// Append to whatever list ends up in effect
    pub fn extra_words(mut self, words: Vec<String>) -> Self {
        self.extra_words.extend(normalize_words(words));
        self
    }

    pub fn ffmpeg_path(mut self, path: PathBuf) -> Self {
        self.ffmpeg_path = Some(path);
        self
    }

    pub fn ffprobe_path(mut self, path: PathBuf) -> Self {
        self.ffprobe_path = Some(path);
        self
    }

    pub fn full(mut self, full: bool) -> Self {
        self.full = Some(full);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Result<Self> {
        if !(1..=MAX_STRATEGY_LEVEL).contains(&attempts) {
            return Err(config_error(
                "max_attempts",
                format!("Max attempts must be between 1 and {}, got {}", MAX_STRATEGY_LEVEL, attempts),
            ));
        }
        self.max_attempts = Some(attempts);
        Ok(self)
    }

    pub fn threshold_db(mut self, threshold: f64) -> Result<Self> {
        if !threshold.is_finite() || threshold > 0.0 {
            return Err(config_error(
                "threshold_db",
                format!("Threshold must be a dB value at or below 0, got {}", threshold),
            ));
        }
        self.threshold_db = Some(threshold);
        Ok(self)
    }

    /// `None` disables the subprocess timeout
    pub fn timeout_secs(mut self, seconds: Option<u64>) -> Self {
        self.timeout_secs = Some(seconds);
        self
    }

    pub fn diagnostics_dir(mut self, dir: PathBuf) -> Self {
        self.diagnostics_dir = Some(dir);
        self
    }

    pub fn write_diagnostics(mut self, enabled: bool) -> Self {
        self.write_diagnostics = Some(enabled);
        self
    }

    pub fn build(self) -> Result<Config> {
        let config = self.settings();
        config.validate()?;
        Ok(config)
    }

    /// Resolve defaults without the input checks of [`ConfigBuilder::build`].
    /// Individual values were already checked by their setters.
    pub fn settings(self) -> Config {
        let defaults = Config::default();

        let mut matching_words = self.matching_words.unwrap_or(defaults.matching_words);
        for word in self.extra_words {
            if !matching_words.contains(&word) {
                matching_words.push(word);
            }
        }

        Config {
            inputs: self.inputs,
            output_file: self.output_file,
            output_suffix: self.output_suffix.unwrap_or(defaults.output_suffix),
            matching_words,
            ffmpeg_path: self.ffmpeg_path.unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: self.ffprobe_path.unwrap_or(defaults.ffprobe_path),
            full: self.full.unwrap_or(defaults.full),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            threshold_db: self.threshold_db.unwrap_or(defaults.threshold_db),
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
            diagnostics_dir: self.diagnostics_dir,
            write_diagnostics: self.write_diagnostics.unwrap_or(defaults.write_diagnostics),
        }
    }
}
