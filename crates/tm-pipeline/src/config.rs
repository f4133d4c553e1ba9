//! Pipeline configuration.
//!
//! Parses `threadmark.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `stackexchange.api_base`
//! - `stackexchange.key`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tm_embeds::StackExchangeConfig;
use tm_fetch::{DEFAULT_TIMEOUT, EvictionPolicy};

use crate::pipeline::DEFAULT_MAX_DEPTH;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "threadmark.toml";

/// Pipeline configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rendering limits and link routing.
    pub pipeline: PipelineSection,
    /// Fetch transport and cache eviction.
    pub fetch: FetchSection,
    /// Stack Exchange API access.
    pub stackexchange: StackExchangeSection,
}

/// Rendering configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Maximum embed nesting depth.
    pub max_depth: usize,
    /// Base path prefixed onto root-relative links.
    pub base_path: Option<String>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            base_path: None,
        }
    }
}

/// Fetch configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// Seconds a settled cache entry is kept. Unset keeps entries for the
    /// life of the process.
    pub ttl_secs: Option<u64>,
    /// Maximum number of cache entries.
    pub capacity: Option<usize>,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            ttl_secs: None,
            capacity: None,
        }
    }
}

impl FetchSection {
    /// HTTP request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Eviction policy for the fetch cache.
    #[must_use]
    pub fn policy(&self) -> EvictionPolicy {
        let mut policy = EvictionPolicy::new();
        if let Some(ttl) = self.ttl_secs {
            policy = policy.ttl(Duration::from_secs(ttl));
        }
        if let Some(capacity) = self.capacity {
            policy = policy.capacity(capacity);
        }
        policy
    }
}

/// Stack Exchange API configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StackExchangeSection {
    /// API base URL.
    pub api_base: String,
    /// Site parameter for answer lookups.
    pub site: String,
    /// Response filter id.
    pub filter: String,
    /// API key for higher rate limits. Omitted from requests when unset or
    /// empty, so `${STACKEXCHANGE_KEY:-}` degrades to keyless access.
    pub key: Option<String>,
}

impl Default for StackExchangeSection {
    fn default() -> Self {
        let defaults = StackExchangeConfig::default();
        Self {
            api_base: defaults.api_base,
            site: defaults.site,
            filter: defaults.filter,
            key: None,
        }
    }
}

impl StackExchangeSection {
    /// Convert into the resolver's configuration, dropping an empty key.
    #[must_use]
    pub fn to_config(&self) -> StackExchangeConfig {
        StackExchangeConfig {
            api_base: self.api_base.clone(),
            site: self.site.clone(),
            filter: self.filter.clone(),
            key: self
                .key
                .as_deref()
                .filter(|key| !key.is_empty())
                .map(str::to_owned),
        }
    }
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
        /// Config field path (e.g., "`stackexchange.key`").
        field: String,
        /// Error message (e.g., "${`STACKEXCHANGE_KEY`} not set").
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

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

/// Expand environment variable references in a configuration string.
fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::env(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: e.to_string(),
        })
}

impl PipelineConfig {
    /// Load configuration from file.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise,
    /// searches for `threadmark.toml` in current directory and parents,
    /// falling back to defaults when no file is found.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing
    /// fails.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// Expands environment variable references and validates the result.
    ///
    /// # Errors
    ///
    /// Returns error if parsing, expansion or validation fails.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
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
        Self::parse(&content)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.max_depth == 0 {
            return Err(ConfigError::Validation(
                "pipeline.max_depth must be greater than 0".to_owned(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        require_non_empty(&self.stackexchange.api_base, "stackexchange.api_base")?;
        require_http_url(&self.stackexchange.api_base, "stackexchange.api_base")?;
        require_non_empty(&self.stackexchange.site, "stackexchange.site")?;
        require_non_empty(&self.stackexchange.filter, "stackexchange.filter")?;
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.stackexchange.api_base =
            expand_env(&self.stackexchange.api_base, "stackexchange.api_base")?;
        if let Some(ref key) = self.stackexchange.key {
            self.stackexchange.key = Some(expand_env(key, "stackexchange.key")?);
        }
        Ok(())
    }
}
