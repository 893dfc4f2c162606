//! Process settings: credentials, endpoints, and run limits.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (OPENAI_API_KEY, TAVILY_API_KEY, ...)
//! 2. Config file (.verifai/config.yaml, searched from the current
//!    directory upwards, then ~/.verifai/config.yaml)
//! 3. Defaults
//!
//! Settings are resolved once at startup and passed explicitly to whatever
//! needs them. Missing credentials fail fast, before any run begins.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::limits::{LimitViolation, RunLimits};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TAVILY_BASE_URL: &str = "https://api.tavily.com";

const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 120;

/// Configuration errors (fatal at startup)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingCredential(&'static str),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub openai: Option<ProviderConfig>,
    #[serde(default)]
    pub tavily: Option<ProviderConfig>,
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub limits: Option<RunLimits>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Resolved settings
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Language model API key
    #[serde(skip_serializing)]
    pub openai_api_key: String,
    /// Language model API base URL
    pub openai_base_url: String,
    /// Search API key
    #[serde(skip_serializing)]
    pub tavily_api_key: String,
    /// Search API base URL
    pub tavily_base_url: String,
    /// Per-request HTTP timeout
    pub request_timeout_seconds: u64,
    /// Run admission limits
    pub limits: RunLimits,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the environment and config file, requiring credentials
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Self::load_unchecked()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings without checking credentials (for inspection)
    pub fn load_unchecked() -> Result<Self, ConfigError> {
        let config_path = find_config_file();
        let file = match config_path {
            Some(ref path) => Some(load_config_file(path)?),
            None => None,
        };

        Self::resolve(file, config_path, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment lookups
    pub fn resolve(
        file: Option<ConfigFile>,
        config_file: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let openai = file.openai.unwrap_or_default();
        let tavily = file.tavily.unwrap_or_default();

        let mut limits = file.limits.unwrap_or_default();
        if let Some(value) = env("VERIFAI_MAX_CONCURRENT_BRANCHES") {
            limits.max_concurrent_branches = parse_env("VERIFAI_MAX_CONCURRENT_BRANCHES", &value)?;
        }
        if let Some(value) = env("VERIFAI_RUN_TIMEOUT_SECONDS") {
            limits.run_timeout_seconds = parse_env("VERIFAI_RUN_TIMEOUT_SECONDS", &value)?;
        }
        if let Some(value) = env("VERIFAI_MAX_INPUT_BYTES") {
            limits.max_input_bytes = parse_env("VERIFAI_MAX_INPUT_BYTES", &value)?;
        }

        let request_timeout_seconds = match env("VERIFAI_REQUEST_TIMEOUT_SECONDS") {
            Some(value) => parse_env("VERIFAI_REQUEST_TIMEOUT_SECONDS", &value)?,
            None => file
                .request_timeout_seconds
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        };

        Ok(Self {
            openai_api_key: env("OPENAI_API_KEY")
                .or(openai.api_key)
                .unwrap_or_default(),
            openai_base_url: env("OPENAI_BASE_URL")
                .or(openai.base_url)
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            tavily_api_key: env("TAVILY_API_KEY")
                .or(tavily.api_key)
                .unwrap_or_default(),
            tavily_base_url: env("TAVILY_BASE_URL")
                .or(tavily.base_url)
                .unwrap_or_else(|| DEFAULT_TAVILY_BASE_URL.to_string()),
            request_timeout_seconds,
            limits,
            config_file,
        })
    }

    /// Check that required credentials are present and limits are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.openai_api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("OPENAI_API_KEY"));
        }
        if self.tavily_api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("TAVILY_API_KEY"));
        }
        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_seconds",
                value: "0".to_string(),
            });
        }
        if let Err(LimitViolation::ZeroLimit { key }) = self.limits.validate() {
            return Err(ConfigError::InvalidValue {
                key,
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Per-request HTTP timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

/// Find config file by searching current directory and parents, then home
fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let config_path = current.join(".verifai").join("config.yaml");
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }
    }

    dirs::home_dir()
        .map(|home| home.join(".verifai").join("config.yaml"))
        .filter(|path| path.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
