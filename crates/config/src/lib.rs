//! Configuration loading, validation, and management for CosmoCat.
//!
//! Loads configuration from `~/.cosmocat/config.toml` with environment
//! variable overrides. Validates all settings at startup. Every numeric
//! threshold of the pipeline is a named, defaulted setting here rather than a
//! literal buried in the code that uses it.

use cosmocat_core::engine::GenerationConfig;
use cosmocat_core::store::RetentionPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.cosmocat/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model selection and artifact cache
    #[serde(default)]
    pub model: ModelConfig,

    /// Context window limits
    #[serde(default)]
    pub context: ContextConfig,

    /// Reply/title cleanup thresholds
    #[serde(default)]
    pub sanitizer: SanitizerConfig,

    /// Sampling profiles and the generation deadline
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Chat store backend
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Preset alias (`tinyllama`, `smollm:360m`, ...) or a path to a `.gguf` file
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Read/write cache for weights and tokenizer (default `~/.cosmocat/models`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Fetch missing artifacts from the network into the cache
    #[serde(default = "default_true")]
    pub allow_download: bool,

    /// Prompt tokens kept before generation (oldest dropped first)
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    /// Sampler seed
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_model_name() -> String {
    "tinyllama".into()
}
fn default_true() -> bool {
    true
}
fn default_max_input_tokens() -> usize {
    256
}
fn default_seed() -> u64 {
    299_792_458
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            cache_dir: None,
            allow_download: true,
            max_input_tokens: default_max_input_tokens(),
            seed: default_seed(),
        }
    }
}

impl ModelConfig {
    /// The effective cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("models"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_turn_cap")]
    pub max_user_turns: usize,

    #[serde(default = "default_turn_cap")]
    pub max_assistant_turns: usize,

    /// Budget for the combined length (in characters) of included user turns
    #[serde(default = "default_max_user_chars")]
    pub max_user_chars: usize,
}

fn default_turn_cap() -> usize {
    5
}
fn default_max_user_chars() -> usize {
    5000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_user_turns: default_turn_cap(),
            max_assistant_turns: default_turn_cap(),
            max_user_chars: default_max_user_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizerConfig {
    #[serde(default = "default_reply_max_chars")]
    pub reply_max_chars: usize,

    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,

    /// Replies shorter than this are rejected by the quality gate
    #[serde(default = "default_min_reply_chars")]
    pub min_reply_chars: usize,

    /// Words longer than this are treated as noise
    #[serde(default = "default_max_word_chars")]
    pub max_word_chars: usize,

    /// Words whose share of punctuation exceeds this are treated as noise
    #[serde(default = "default_max_punctuation_ratio")]
    pub max_punctuation_ratio: f32,

    #[serde(default = "default_max_sentences")]
    pub max_sentences: usize,
}

fn default_reply_max_chars() -> usize {
    120
}
fn default_title_max_chars() -> usize {
    50
}
fn default_min_reply_chars() -> usize {
    5
}
fn default_max_word_chars() -> usize {
    30
}
fn default_max_punctuation_ratio() -> f32 {
    0.5
}
fn default_max_sentences() -> usize {
    2
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            reply_max_chars: default_reply_max_chars(),
            title_max_chars: default_title_max_chars(),
            min_reply_chars: default_min_reply_chars(),
            max_word_chars: default_max_word_chars(),
            max_punctuation_ratio: default_max_punctuation_ratio(),
            max_sentences: default_max_sentences(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Deadline for a single `generate` call; the computation is abandoned after it
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "GenerationConfig::reply")]
    pub reply: GenerationConfig,

    #[serde(default = "GenerationConfig::title")]
    pub title: GenerationConfig,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            reply: GenerationConfig::reply(),
            title: GenerationConfig::title(),
        }
    }
}

impl GenerationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `sqlite`, `file` or `memory`
    #[serde(default = "default_store_backend")]
    pub backend: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default = "default_turn_cap")]
    pub max_user_turns: usize,

    #[serde(default = "default_turn_cap")]
    pub max_assistant_turns: usize,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
            max_user_turns: default_turn_cap(),
            max_assistant_turns: default_turn_cap(),
        }
    }
}

impl StoreConfig {
    /// The effective storage path for file-backed stores.
    pub fn path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        let file = match self.backend.as_str() {
            "file" => "chats.jsonl",
            _ => "cosmocats.db",
        };
        AppConfig::config_dir().join(file)
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_user_turns: self.max_user_turns,
            max_assistant_turns: self.max_assistant_turns,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.cosmocat/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `COSMOCAT_MODEL`: model preset or `.gguf` path
    /// - `COSMOCAT_MODEL_DIR`, then `MODEL_DIR`: artifact cache directory
    /// - `COSMOCAT_OFFLINE=1`: never download
    /// - `COSMOCAT_STORE_PATH`: chat store location
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("COSMOCAT_MODEL") {
            self.model.name = model;
        }

        if let Some(dir) = lookup("COSMOCAT_MODEL_DIR").or_else(|| lookup("MODEL_DIR")) {
            self.model.cache_dir = Some(PathBuf::from(dir));
        }

        if let Some(offline) = lookup("COSMOCAT_OFFLINE") {
            if matches!(offline.trim(), "1" | "true" | "yes") {
                self.model.allow_download = false;
            }
        }

        if let Some(path) = lookup("COSMOCAT_STORE_PATH") {
            self.store.path = Some(PathBuf::from(path));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".cosmocat")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        for (label, profile) in [
            ("generation.reply", &self.generation.reply),
            ("generation.title", &self.generation.title),
        ] {
            if !(0.0..=2.0).contains(&profile.temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "{label}.temperature must be between 0.0 and 2.0"
                )));
            }
            if profile.top_p <= 0.0 || profile.top_p > 1.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{label}.top_p must be in (0.0, 1.0]"
                )));
            }
            if profile.repetition_penalty < 1.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{label}.repetition_penalty must be >= 1.0"
                )));
            }
            if profile.max_new_tokens == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{label}.max_new_tokens must be > 0"
                )));
            }
        }

        if self.generation.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "generation.timeout_secs must be >= 1".into(),
            ));
        }

        if self.context.max_user_turns == 0 || self.context.max_assistant_turns == 0 {
            return Err(ConfigError::ValidationError(
                "context turn caps must be >= 1".into(),
            ));
        }

        if self.store.max_user_turns == 0 || self.store.max_assistant_turns == 0 {
            return Err(ConfigError::ValidationError(
                "store turn caps must be >= 1".into(),
            ));
        }

        if self.sanitizer.reply_max_chars < 20 {
            return Err(ConfigError::ValidationError(
                "sanitizer.reply_max_chars must be >= 20".into(),
            ));
        }

        if self.sanitizer.title_max_chars < 10 {
            return Err(ConfigError::ValidationError(
                "sanitizer.title_max_chars must be >= 10".into(),
            ));
        }

        if self.sanitizer.max_sentences == 0 {
            return Err(ConfigError::ValidationError(
                "sanitizer.max_sentences must be >= 1".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.sanitizer.max_punctuation_ratio) {
            return Err(ConfigError::ValidationError(
                "sanitizer.max_punctuation_ratio must be between 0.0 and 1.0".into(),
            ));
        }

        if self.model.max_input_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "model.max_input_tokens must be > 0".into(),
            ));
        }

        if !matches!(self.store.backend.as_str(), "sqlite" | "file" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "unknown store.backend '{}' (expected sqlite, file or memory)",
                self.store.backend
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
