//! Configuration management.
//!
//! Configuration can come from:
//! - Environment variables (PLAYBOOK_*)
//! - Config file (~/.config/playbook-engine/config.toml)
//!
//! Environment variables win over the file, the file wins over defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::reporter::{DEFAULT_MAX_EXECUTIONS, DEFAULT_MAX_REPORTERS};

/// Engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Execution cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Reporter fan-out
    #[serde(default)]
    pub reporter: ReporterConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where sub-playbooks are loaded from
    #[serde(default)]
    pub playbooks: PlaybooksConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Executions kept before the oldest is evicted
    #[serde(default = "default_max_executions")]
    pub max_executions: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_executions: default_max_executions(),
        }
    }
}

fn default_max_executions() -> usize {
    DEFAULT_MAX_EXECUTIONS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReporterConfig {
    #[serde(default = "default_max_reporters")]
    pub max_reporters: usize,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            max_reporters: default_max_reporters(),
        }
    }
}

fn default_max_reporters() -> usize {
    DEFAULT_MAX_REPORTERS
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(Error::Config(format!("unknown log format '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "playbook_engine=debug"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybooksConfig {
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    pub fn load() -> Self {
        let mut config = Self::default();

        let path = Self::config_dir().join("config.toml");
        if let Ok(partial) = Self::load_partial_from_path(&path) {
            config.apply_partial(partial);
        }

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Load configuration from an explicit file, then apply env overrides.
    ///
    /// Unlike [`Config::load`], a missing or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let partial: PartialConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::default();
        config.apply_partial(partial);
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Get the config directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("playbook-engine"))
            .unwrap_or_else(|| PathBuf::from(".playbook-engine"))
    }

    fn apply_env_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(parsed) = var("PLAYBOOK_MAX_EXECUTIONS").and_then(|v| v.parse().ok()) {
            self.cache.max_executions = parsed;
        }
        if let Some(parsed) = var("PLAYBOOK_MAX_REPORTERS").and_then(|v| v.parse().ok()) {
            self.reporter.max_reporters = parsed;
        }
        if let Some(level) = var("PLAYBOOK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("PLAYBOOK_LOG_FORMAT").and_then(|v| v.parse().ok()) {
            self.logging.format = format;
        }
        if let Some(dir) = var("PLAYBOOK_DIRECTORY") {
            self.playbooks.directory = Some(PathBuf::from(dir));
        }
    }

    fn load_partial_from_path(path: &Path) -> std::result::Result<PartialConfig, ()> {
        let content = std::fs::read_to_string(path).map_err(|_| ())?;
        toml::from_str(&content).map_err(|_| ())
    }

    fn apply_partial(&mut self, partial: PartialConfig) {
        if let Some(cache) = partial.cache {
            self.cache = cache;
        }
        if let Some(reporter) = partial.reporter {
            self.reporter = reporter;
        }
        if let Some(logging) = partial.logging {
            self.logging = logging;
        }
        if let Some(playbooks) = partial.playbooks {
            self.playbooks = playbooks;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    cache: Option<CacheConfig>,
    reporter: Option<ReporterConfig>,
    logging: Option<LoggingConfig>,
    playbooks: Option<PlaybooksConfig>,
}
