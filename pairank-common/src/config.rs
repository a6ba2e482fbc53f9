//! Configuration loading and config file resolution
//!
//! Settings come from, in priority order:
//! 1. Command-line arguments / environment variables (applied by the binary)
//! 2. TOML config file
//! 3. Built-in defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PAIRANK_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Experiment definition (read-only JSON)
    #[serde(default = "default_experiment_path")]
    pub experiment_path: PathBuf,

    /// Progress snapshot, rewritten after every mutation
    #[serde(default = "default_progress_path")]
    pub progress_path: PathBuf,

    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served under `/static` (input and output images)
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            experiment_path: default_experiment_path(),
            progress_path: default_progress_path(),
            bind_host: default_bind_host(),
            port: default_port(),
            static_dir: None,
            logging: LoggingConfig::default(),
        }
    }
}

fn default_experiment_path() -> PathBuf {
    PathBuf::from("input_data.json")
}

fn default_progress_path() -> PathBuf {
    PathBuf::from("progress_store.json")
}

fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Platform config file location: `<config_dir>/pairank/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pairank").join("config.toml"))
}

/// Config file to read: `explicit`, then [`CONFIG_ENV_VAR`], then the
/// platform default if it exists. `None` means built-in defaults.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    default_config_path().filter(|path| path.exists())
}

/// Load configuration
///
/// An explicitly requested file (`explicit` or [`CONFIG_ENV_VAR`]) must
/// exist. The platform default file is optional; when it is absent the
/// built-in defaults are used.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(explicit) {
        Some(path) => load_toml_config(&path),
        None => Ok(TomlConfig::default()),
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("failed to read config {}: {}", path.display(), e))
    })?;
    let config = toml::from_str(&content).map_err(|e| {
        Error::Config(format!("failed to parse config {}: {}", path.display(), e))
    })?;
    Ok(config)
}
