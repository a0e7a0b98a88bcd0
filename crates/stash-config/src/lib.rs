//! Configuration management for Stash.
//!
//! Parses `stash.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! Directive names support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Patch values are expanded the same way when `patch.expand_env` is set
//! (see [`PatchFile`]).

mod expand;
mod patch;

pub use patch::PatchFile;

use serde::Deserialize;
use stash_transform::{ADD, DirectiveSet, REMOVE};
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the supported directive set.
    pub directives: Option<Vec<String>>,
    /// Override environment expansion of patch values.
    pub expand_env: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "stash.toml";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transformer configuration.
    pub transform: TransformConfig,
    /// Patch file configuration.
    pub patch: PatchConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Transformer configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Directives the XML transformer supports.
    pub directives: Vec<String>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            directives: vec![ADD.to_owned(), REMOVE.to_owned()],
        }
    }
}

/// Patch file configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// Expand `${VAR}` references in instruction values.
    pub expand_env: bool,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field or patch key (e.g., "`/server/port`").
        field: String,
        /// Error message (e.g., "${`HTTPS_PORT`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `stash.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading, allowing CLI arguments to take
    /// precedence over config file values. The result is validated last.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails or
    /// the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = std::env::current_dir()
            .ok()
            .and_then(|cwd| Self::discover_config(&cwd))
        {
            Self::load_from_file(&discovered)?
        } else {
            tracing::debug!("No {CONFIG_FILENAME} found, using defaults");
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Directive set for the XML transformer.
    #[must_use]
    pub fn directive_set(&self) -> DirectiveSet {
        self.transform.directives.iter().map(String::as_str).collect()
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(directives) = &settings.directives {
            self.transform.directives.clone_from(directives);
        }
        if let Some(expand_env) = settings.expand_env {
            self.patch.expand_env = expand_env;
        }
    }

    /// Search for config file in `start` and its parents.
    fn discover_config(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;
        config.config_path = Some(path.to_path_buf());

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// An empty directive list is valid: every instruction then falls back to
    /// text replacement.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.transform.directives.len());
        for name in &self.transform.directives {
            require_non_empty(name, "transform.directives")?;
            if name.chars().any(char::is_whitespace) {
                return Err(ConfigError::Validation(format!(
                    "transform.directives: [{name}] contains whitespace"
                )));
            }
            if seen.iter().any(|other| other.eq_ignore_ascii_case(name)) {
                return Err(ConfigError::Validation(format!(
                    "transform.directives: [{name}] is listed more than once"
                )));
            }
            seen.push(name);
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        for name in &mut self.transform.directives {
            *name = expand::expand_env(name, "transform.directives")?;
        }
        Ok(())
    }
}
