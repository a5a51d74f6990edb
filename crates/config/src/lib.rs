//! Configuration loading, validation, and management for Braid.
//!
//! Loads configuration from `~/.braid/config.toml` with environment
//! variable overrides. Validates all settings at load time. Nothing in the
//! pipeline reads globals: config structs are passed into constructors.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.braid/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BraidConfig {
    /// Defaults applied to completion requests that leave tuning unset
    #[serde(default)]
    pub completion: CompletionDefaults,

    /// Bounds on per-conversation memory buffers
    #[serde(default)]
    pub memory: MemoryLimits,
}

/// Defaults for completion requests, applied at dispatch when the request
/// leaves a field unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionDefaults {
    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Default sampling temperature; `None` leaves it to the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Default nucleus sampling cutoff; `None` leaves it to the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Capacity of the streaming output channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_max_tokens() -> u32 {
    4000
}
fn default_channel_capacity() -> usize {
    128
}

impl Default for CompletionDefaults {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: None,
            top_p: None,
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Bounds on the per-conversation memory buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryLimits {
    /// Maximum characters held per conversation before trimming
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_max_chars() -> usize {
    120_000
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

impl BraidConfig {
    /// Load configuration from the default path (~/.braid/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `BRAID_MAX_TOKENS`
    /// - `BRAID_MEMORY_MAX_CHARS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BRAID_*` environment overrides on top of file values.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(raw) = std::env::var("BRAID_MAX_TOKENS") {
            self.completion.max_tokens = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "BRAID_MAX_TOKENS must be a positive integer, got {raw:?}"
                ))
            })?;
        }

        if let Ok(raw) = std::env::var("BRAID_MEMORY_MAX_CHARS") {
            self.memory.max_chars = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "BRAID_MEMORY_MAX_CHARS must be a positive integer, got {raw:?}"
                ))
            })?;
        }

        Ok(())
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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".braid")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.completion.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "completion.max_tokens must be greater than 0".into(),
            ));
        }

        if let Some(t) = self.completion.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(
                    "completion.temperature must be between 0.0 and 2.0".into(),
                ));
            }
        }

        if let Some(p) = self.completion.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::ValidationError(
                    "completion.top_p must be between 0.0 and 1.0".into(),
                ));
            }
        }

        if self.completion.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "completion.channel_capacity must be greater than 0".into(),
            ));
        }

        // Must leave room for the trim marker plus some content after a trim
        if self.memory.max_chars < 64 {
            return Err(ConfigError::ValidationError(
                "memory.max_chars must be at least 64".into(),
            ));
        }

        Ok(())
    }
}

impl Default for BraidConfig {
    fn default() -> Self {
        Self {
            completion: CompletionDefaults::default(),
            memory: MemoryLimits::default(),
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BraidConfig::default();
        assert_eq!(config.completion.max_tokens, 4000);
        assert_eq!(config.memory.max_chars, 120_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = BraidConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: BraidConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.completion.max_tokens, config.completion.max_tokens);
        assert_eq!(parsed.memory.max_chars, config.memory.max_chars);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = BraidConfig {
            completion: CompletionDefaults {
                temperature: Some(5.0),
                ..CompletionDefaults::default()
            },
            ..BraidConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let config = BraidConfig {
            completion: CompletionDefaults {
                max_tokens: 0,
                ..CompletionDefaults::default()
            },
            ..BraidConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn tiny_memory_bound_rejected() {
        let config = BraidConfig {
            memory: MemoryLimits { max_chars: 10 },
            ..BraidConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = BraidConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().completion.max_tokens, 4000);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[completion]\nmax_tokens = 2048\n\n[memory]\nmax_chars = 50000\n",
        )
        .unwrap();

        let config = BraidConfig::load_from(&path).unwrap();
        assert_eq!(config.completion.max_tokens, 2048);
        assert_eq!(config.memory.max_chars, 50_000);
        // Unset fields fall back to defaults
        assert_eq!(config.completion.channel_capacity, 128);
    }

    // One test owns both BRAID_* vars end to end, so parallel test threads
    // never observe each other's environment.
    #[test]
    fn env_overrides_apply_and_reject_garbage() {
        unsafe {
            std::env::set_var("BRAID_MAX_TOKENS", "1234");
            std::env::set_var("BRAID_MEMORY_MAX_CHARS", "70000");
        }
        let mut config = BraidConfig::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.completion.max_tokens, 1234);
        assert_eq!(config.memory.max_chars, 70_000);

        unsafe {
            std::env::set_var("BRAID_MAX_TOKENS", "lots");
        }
        let mut config = BraidConfig::default();
        match config.apply_env_overrides() {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains("BRAID_MAX_TOKENS"))
            }
            other => panic!("Expected ValidationError, got {other:?}"),
        }

        unsafe {
            std::env::remove_var("BRAID_MAX_TOKENS");
            std::env::remove_var("BRAID_MEMORY_MAX_CHARS");
        }
        let mut config = BraidConfig::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.completion.max_tokens, 4000);
        assert_eq!(config.memory.max_chars, 120_000);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not [valid toml").unwrap();

        match BraidConfig::load_from(&path) {
            Err(ConfigError::ParseError { .. }) => {}
            other => panic!("Expected ParseError, got {other:?}"),
        }
    }
}
