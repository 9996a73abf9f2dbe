//! Spine configuration, stored as YAML at `<home>/.spine/config.yaml`.
//!
//! Like the store paths, every loader has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::AgentName;

pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 8;

/// Bounded exponential backoff for stale project writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 10,
            max_delay_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts; for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay after the `attempt`-th failure (1-based): `base * 2^(attempt-1)`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let ms = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpineConfig {
    /// Record store root. `None` means `<home>/.spine/store`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_root: Option<PathBuf>,
    pub max_chain_depth: usize,
    pub retry: RetryPolicy,
    /// Router fallback when no rule matches.
    pub default_agent: AgentName,
    /// Extra agent contracts registered after the built-ins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contracts_file: Option<PathBuf>,
    /// `.tera` files here override the built-in role prompts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<PathBuf>,
}

impl Default for SpineConfig {
    fn default() -> Self {
        Self {
            store_root: None,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            retry: RetryPolicy::default(),
            default_agent: AgentName::from(crate::contracts::SCRIBE),
            contracts_file: None,
            templates_dir: None,
        }
    }
}

impl SpineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chain_depth == 0 {
            return Err(ConfigError::Invalid("max_chain_depth must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.default_agent.as_str().trim().is_empty() {
            return Err(ConfigError::Invalid("default_agent must not be empty".into()));
        }
        Ok(())
    }

    /// Resolved store root for `home`.
    pub fn store_root_at(&self, home: &Path) -> PathBuf {
        self.store_root
            .clone()
            .unwrap_or_else(|| spine_root(home).join("store"))
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.spine`
pub fn spine_root(home: &Path) -> PathBuf {
    home.join(".spine")
}

/// `<home>/.spine/config.yaml`
pub fn config_path(home: &Path) -> PathBuf {
    spine_root(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load the config at `<home>/.spine/config.yaml`; defaults when absent.
pub fn load_at(home: &Path) -> Result<SpineConfig, ConfigError> {
    let path = config_path(home);
    if !path.exists() {
        return Ok(SpineConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config: SpineConfig =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })?;
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<SpineConfig, ConfigError> {
    load_at(&home()?)
}

/// Write the config atomically (`.tmp` + rename).
pub fn save_at(home: &Path, config: &SpineConfig) -> Result<PathBuf, ConfigError> {
    config.validate()?;
    let dir = spine_root(home);
    std::fs::create_dir_all(&dir).map_err(|source| ConfigError::Io {
        path: dir.clone(),
        source,
    })?;
    let path = config_path(home);
    let tmp = path.with_file_name("config.yaml.tmp");
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp, yaml).map_err(|source| ConfigError::Io {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, &path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
