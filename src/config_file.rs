use crate::config::{Config, ConfigBuilder};
use crate::error::{GuardianError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Configuration file format that can be serialized to YAML/JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Replaces the built-in word list
    pub matching_words: Option<Vec<String>>,
    /// Appended to the word list in effect
    pub extra_words: Option<Vec<String>>,
    pub output_suffix: Option<String>,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Acoustic verification with escalation
    pub full: Option<bool>,
    pub max_attempts: Option<u32>,
    pub threshold_db: Option<f64>,
    pub timeout_secs: Option<u64>,
    pub diagnostics_dir: Option<PathBuf>,
    pub write_diagnostics: Option<bool>,
    /// Enable progress indicators by default
    pub show_progress: Option<bool>,
    /// Custom profiles
    pub profiles: Option<BTreeMap<String, ProfileConfig>>,
}

/// Profile-specific configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub matching_words: Option<Vec<String>>,
    pub extra_words: Option<Vec<String>>,
    pub full: Option<bool>,
    pub max_attempts: Option<u32>,
    pub threshold_db: Option<f64>,
    pub description: Option<String>,
}

impl ProfileConfig {
    fn apply(&self, mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
        if let Some(ref words) = self.matching_words {
            builder = builder.matching_words(words.clone())?;
        }
        if let Some(ref words) = self.extra_words {
            builder = builder.extra_words(words.clone());
        }
        if let Some(full) = self.full {
            builder = builder.full(full);
        }
        if let Some(attempts) = self.max_attempts {
            builder = builder.max_attempts(attempts)?;
        }
        if let Some(threshold) = self.threshold_db {
            builder = builder.threshold_db(threshold)?;
        }
        Ok(builder)
    }
}

/// Profiles available without any config file
pub fn builtin_profiles() -> BTreeMap<String, ProfileConfig> {
    let mut profiles = BTreeMap::new();

    profiles.insert(
        "strict".to_string(),
        ProfileConfig {
            full: Some(true),
            max_attempts: Some(3),
            threshold_db: Some(-60.0),
            description: Some("Full escalation with a tighter -60 dB silence threshold".to_string()),
            ..Default::default()
        },
    );

    profiles.insert(
        "quick".to_string(),
        ProfileConfig {
            full: Some(false),
            max_attempts: Some(1),
            description: Some("Single basic pass without acoustic verification".to_string()),
            ..Default::default()
        },
    );

    profiles.insert(
        "family".to_string(),
        ProfileConfig {
            extra_words: Some(vec![
                "crap".to_string(),
                "sucks".to_string(),
                "screw you".to_string(),
                "freaking".to_string(),
            ]),
            full: Some(true),
            description: Some("Default words plus milder language, fully verified".to_string()),
            ..Default::default()
        },
    );

    profiles
}

impl ConfigFile {
    /// Load configuration from a YAML file
    pub async fn load_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| GuardianError::FileSystem {
                source: e,
                path: path.as_ref().to_path_buf(),
            })?;

        serde_yaml::from_str(&contents).map_err(|e| GuardianError::Config {
            field: "config_file".to_string(),
            message: format!("Failed to parse YAML config: {}", e),
        })
    }

    /// Load configuration from a JSON file
    pub async fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| GuardianError::FileSystem {
                source: e,
                path: path.as_ref().to_path_buf(),
            })?;

        serde_json::from_str(&contents).map_err(|e| GuardianError::Config {
            field: "config_file".to_string(),
            message: format!("Failed to parse JSON config: {}", e),
        })
    }

    /// Auto-detect and load configuration file based on extension
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Self::load_yaml(path).await,
            Some("json") => Self::load_json(path).await,
            Some(ext) => Err(GuardianError::UnsupportedFormat {
                extension: ext.to_string(),
                supported: vec!["yaml".to_string(), "yml".to_string(), "json".to_string()],
            }),
            None => Err(GuardianError::Config {
                field: "config_file".to_string(),
                message: "Config file must have .yaml, .yml, or .json extension".to_string(),
            }),
        }
    }

    /// Save configuration to YAML file
    pub async fn save_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml_content = serde_yaml::to_string(self).map_err(|e| GuardianError::Config {
            field: "config_file".to_string(),
            message: format!("Failed to serialize config to YAML: {}", e),
        })?;

        fs::write(path.as_ref(), yaml_content)
            .await
            .map_err(|e| GuardianError::FileSystem {
                source: e,
                path: path.as_ref().to_path_buf(),
            })
    }

    /// Save configuration to JSON file
    pub async fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json_content = serde_json::to_string_pretty(self).map_err(|e| GuardianError::Config {
            field: "config_file".to_string(),
            message: format!("Failed to serialize config to JSON: {}", e),
        })?;

        fs::write(path.as_ref(), json_content)
            .await
            .map_err(|e| GuardianError::FileSystem {
                source: e,
                path: path.as_ref().to_path_buf(),
            })
    }

    /// Save to YAML or JSON depending on the extension
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => self.save_yaml(path).await,
            Some("json") => self.save_json(path).await,
            Some(ext) => Err(GuardianError::UnsupportedFormat {
                extension: ext.to_string(),
                supported: vec!["yaml".to_string(), "yml".to_string(), "json".to_string()],
            }),
            None => Err(GuardianError::Config {
                field: "config_file".to_string(),
                message: "Config file must have .yaml, .yml, or .json extension".to_string(),
            }),
        }
    }

    /// Get default config file paths to search
    pub fn default_config_paths() -> Vec<PathBuf> {
        vec![
            PathBuf::from(".guardian.yaml"),
            PathBuf::from(".guardian.yml"),
            PathBuf::from(".guardian.json"),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("guardian")
                .join("config.yaml"),
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
                .join("guardian.yaml"),
        ]
    }

    /// Try to load configuration from default locations
    pub async fn load_from_default_locations() -> Option<Self> {
        for path in Self::default_config_paths() {
            if path.exists() {
                match Self::load(&path).await {
                    Ok(config) => {
                        log::info!("Loaded configuration from: {}", path.display());
                        return Some(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }
        None
    }

    /// Apply this config file to a ConfigBuilder
    pub fn apply_to_builder(&self, mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
        if let Some(ref words) = self.matching_words {
            builder = builder.matching_words(words.clone())?;
        }
        if let Some(ref words) = self.extra_words {
            builder = builder.extra_words(words.clone());
        }
        if let Some(ref suffix) = self.output_suffix {
            builder = builder.output_suffix(suffix.clone());
        }
        if let Some(ref path) = self.ffmpeg_path {
            builder = builder.ffmpeg_path(path.clone());
        }
        if let Some(ref path) = self.ffprobe_path {
            builder = builder.ffprobe_path(path.clone());
        }
        if let Some(full) = self.full {
            builder = builder.full(full);
        }
        if let Some(attempts) = self.max_attempts {
            builder = builder.max_attempts(attempts)?;
        }
        if let Some(threshold) = self.threshold_db {
            builder = builder.threshold_db(threshold)?;
        }
        // 0 disables the timeout, same as on the command line
        if let Some(seconds) = self.timeout_secs {
            builder = builder.timeout_secs((seconds > 0).then_some(seconds));
        }
        if let Some(ref dir) = self.diagnostics_dir {
            builder = builder.diagnostics_dir(dir.clone());
        }
        if let Some(enabled) = self.write_diagnostics {
            builder = builder.write_diagnostics(enabled);
        }

        Ok(builder)
    }

    /// Look up a profile in this file, then among the built-ins
    pub fn profile(&self, name: &str) -> Option<ProfileConfig> {
        self.profiles
            .as_ref()
            .and_then(|p| p.get(name).cloned())
            .or_else(|| builtin_profiles().remove(name))
    }

    /// Apply a specific profile to a ConfigBuilder
    pub fn apply_profile_to_builder(
        &self,
        profile_name: &str,
        builder: ConfigBuilder,
    ) -> Result<ConfigBuilder> {
        let profile = self.profile(profile_name).ok_or_else(|| GuardianError::Config {
            field: "profile".to_string(),
            message: format!(
                "Profile '{}' not found. Available: {}",
                profile_name,
                self.list_profiles().join(", ")
            ),
        })?;

        // First apply base config, then override with profile
        let builder = self.apply_to_builder(builder)?;
        profile.apply(builder)
    }

    /// Built-in and file-defined profile names, sorted
    pub fn list_profiles(&self) -> Vec<String> {
        let mut names: Vec<String> = builtin_profiles().into_keys().collect();
        if let Some(ref profiles) = self.profiles {
            for name in profiles.keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names.sort();
        names
    }
}

/// Snapshot of effective settings. Inputs and the output file are per-run
/// and not carried over.
impl From<&Config> for ConfigFile {
    fn from(config: &Config) -> Self {
        Self {
            matching_words: Some(config.matching_words.clone()),
            extra_words: None,
            output_suffix: Some(config.output_suffix.clone()),
            ffmpeg_path: Some(config.ffmpeg_path.clone()),
            ffprobe_path: Some(config.ffprobe_path.clone()),
            full: Some(config.full),
            max_attempts: Some(config.max_attempts),
            threshold_db: Some(config.threshold_db),
            timeout_secs: Some(config.timeout_secs.unwrap_or(0)),
            diagnostics_dir: config.diagnostics_dir.clone(),
            write_diagnostics: Some(config.write_diagnostics),
            show_progress: None,
            profiles: None,
        }
    }
}
