//! Bootstrap configuration loading and config file resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: defaults are used and the caller
//! warns about it through [`ConfigSource`]. A TOML file that exists but
//! cannot be parsed is an error.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "MOODIFY_CONFIG";

/// Config file name looked up in the platform config directories
pub const CONFIG_FILE_NAME: &str = "moodify-ea.toml";

/// Where the bootstrap configuration came from
///
/// Loading happens before logging is set up, so the caller reports this once
/// its subscriber is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// The resolved file does not exist; built-in defaults
    Missing(PathBuf),
    /// No config file resolved; built-in defaults
    Defaults,
}

impl ConfigSource {
    /// Path of the file actually loaded
    pub fn file(&self) -> Option<&Path> {
        match self {
            ConfigSource::File(path) => Some(path.as_path()),
            ConfigSource::Missing(_) | ConfigSource::Defaults => None,
        }
    }
}

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Path to the emotion table (JSON)
    #[serde(default)]
    pub emotions_path: Option<PathBuf>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Track search; disabled when absent
    #[serde(default)]
    pub track_search: Option<TrackSearchConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request body limit; base64 images are large
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// CORS origins; empty means permissive
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Which facial analysis backend to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierBackend {
    /// Local analyzer program, image passed as a file path
    #[default]
    Command,
    /// Remote analyzer service reached over HTTP
    Http,
}

/// Facial analysis backend settings
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub backend: ClassifierBackend,

    /// Analyzer program (command backend)
    #[serde(default = "default_analyzer_program")]
    pub program: String,

    /// Extra arguments placed before the image path (command backend)
    #[serde(default)]
    pub args: Vec<String>,

    /// Analyzer endpoint (http backend)
    #[serde(default)]
    pub url: Option<String>,

    /// Upper bound on a single classification
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: ClassifierBackend::default(),
            program: default_analyzer_program(),
            args: Vec::new(),
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Spotify track search settings
#[derive(Debug, Clone, Deserialize)]
pub struct TrackSearchConfig {
    pub client_id: String,

    pub client_secret: String,

    #[serde(default = "default_market")]
    pub market: String,

    /// Tracks requested per search query
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Tracks returned to the client
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl TrackSearchConfig {
    /// Settings with the given credentials and default tuning
    pub fn with_credentials(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            market: default_market(),
            page_size: default_page_size(),
            max_results: default_max_results(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
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

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_max_body_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_analyzer_program() -> String {
    "moodify-face-analyzer".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_market() -> String {
    "IN".to_string()
}

fn default_page_size() -> u32 {
    30
}

fn default_max_results() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load the resolved config file, or fall back to defaults when none exists
    pub fn load_or_default(path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        match path {
            Some(path) if path.exists() => {
                Ok((Self::load(path)?, ConfigSource::File(path.to_path_buf())))
            }
            Some(path) => Ok((Self::default(), ConfigSource::Missing(path.to_path_buf()))),
            None => Ok((Self::default(), ConfigSource::Defaults)),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.classifier.timeout_secs == 0 {
            return Err(Error::Config(
                "classifier.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.classifier.backend == ClassifierBackend::Http && self.classifier.url.is_none() {
            return Err(Error::Config(
                "classifier.url is required for the http backend".to_string(),
            ));
        }
        if let Some(search) = &self.track_search {
            if search.client_id.trim().is_empty() || search.client_secret.trim().is_empty() {
                return Err(Error::Config(
                    "track_search.client_id and client_secret must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Resolve the config file path
///
/// Priority: CLI argument → `MOODIFY_CONFIG` → user config dir → `/etc/moodify`.
/// Returns `None` when no candidate exists on disk.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("moodify").join(CONFIG_FILE_NAME));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/moodify").join(CONFIG_FILE_NAME);
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Resolve the emotion table path: CLI/env → TOML → `emotions.json` next to the config file
pub fn resolve_emotions_path(
    cli_arg: Option<&Path>,
    config: &TomlConfig,
    config_path: Option<&Path>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Some(path) = &config.emotions_path {
        // Relative paths are taken relative to the config file
        if path.is_relative() {
            if let Some(dir) = config_path.and_then(Path::parent) {
                return dir.join(path);
            }
        }
        return path.clone();
    }

    config_path
        .and_then(Path::parent)
        .map(|dir| dir.join("emotions.json"))
        .unwrap_or_else(|| PathBuf::from("emotions.json"))
}
