use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::{ensure_private_dir, write_atomic};
use crate::errors::{ResolverError, Result};
use crate::identifier::DEFAULT_HOST_MARKERS;
use crate::remote::RetryPolicy;

/// Name of the configuration file stored inside the config directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Application directory name used under the per-user config and cache dirs.
pub const APP_DIR: &str = "wsresolve";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "WSRESOLVE_";

/// Configuration for the resolver and its workspace cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverConfig {
    /// Age in milliseconds after which the cache is considered stale.
    pub cache_ttl_ms: u64,
    /// Minimum fuzzy score (0.0 to 1.0) for a fuzzy match to count.
    pub fuzzy_threshold: f64,
    /// Maximum concurrent detail requests during a sync.
    pub sync_concurrency: usize,
    /// Whether a cache miss or stale cache triggers a sync.
    pub auto_sync: bool,
    /// Directory holding the cache document and the sync lock.
    pub cache_dir: PathBuf,
    /// Age in milliseconds after which a sync lock is considered abandoned.
    pub lock_stale_ms: u64,
    /// Hostname fragments that mark an input as a URL of the remote system.
    pub host_markers: Vec<String>,
    /// Retry policy applied to remote directory calls.
    pub retry: RetryPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 3_600_000,
            fuzzy_threshold: 0.7,
            sync_concurrency: 3,
            auto_sync: true,
            cache_dir: default_cache_dir(),
            lock_stale_ms: 300_000,
            host_markers: DEFAULT_HOST_MARKERS.iter().map(|s| s.to_string()).collect(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ResolverConfig {
    /// A default configuration rooted at `cache_dir`.
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(ResolverError::Config {
                message: format!(
                    "fuzzyThreshold must be between 0.0 and 1.0, got {}",
                    self.fuzzy_threshold
                ),
            });
        }
        if self.sync_concurrency == 0 {
            return Err(ResolverError::Config {
                message: "syncConcurrency must be at least 1".to_string(),
            });
        }
        if self.lock_stale_ms == 0 {
            return Err(ResolverError::Config {
                message: "lockStaleMs must be greater than 0".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ResolverError::Config {
                message: "retry.maxAttempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Applies `WSRESOLVE_*` overrides read through `lookup`.
    ///
    /// Taking the lookup as a closure keeps this testable without touching
    /// the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(&env_key("CACHE_TTL_MS")) {
            self.cache_ttl_ms = parse_env("CACHE_TTL_MS", &v)?;
        }
        if let Some(v) = lookup(&env_key("FUZZY_THRESHOLD")) {
            self.fuzzy_threshold = parse_env("FUZZY_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup(&env_key("SYNC_CONCURRENCY")) {
            self.sync_concurrency = parse_env("SYNC_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup(&env_key("AUTO_SYNC")) {
            self.auto_sync = parse_bool("AUTO_SYNC", &v)?;
        }
        if let Some(v) = lookup(&env_key("CACHE_DIR")) {
            self.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(&env_key("LOCK_STALE_MS")) {
            self.lock_stale_ms = parse_env("LOCK_STALE_MS", &v)?;
        }
        Ok(())
    }
}

/// Returns the per-user cache directory for the workspace cache.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

/// Returns the path of the user configuration file, if a config dir exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILENAME))
}

/// Loads the configuration: defaults, then the config file, then the
/// environment.
///
/// A missing config file is not an error. `path` overrides the default
/// config file location.
pub fn load_config(path: Option<&Path>) -> Result<ResolverConfig> {
    let config_path = path.map(Path::to_path_buf).or_else(default_config_path);
    let mut config = match config_path {
        Some(p) if p.exists() => read_config_file(&p)?,
        _ => ResolverConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

fn read_config_file(config_path: &Path) -> Result<ResolverConfig> {
    let contents = fs::read_to_string(config_path).map_err(|e| ResolverError::Config {
        message: format!(
            "failed to read config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    serde_json::from_str(&contents).map_err(|e| ResolverError::Config {
        message: format!(
            "failed to parse config file '{}': {}",
            config_path.display(),
            e
        ),
    })
}

/// Saves the configuration to `config_path` with the same atomic write the
/// cache store uses.
pub async fn save_config(config_path: &Path, config: &ResolverConfig) -> Result<()> {
    let config_error = |action: &str, e: &dyn std::fmt::Display| ResolverError::Config {
        message: format!("failed to {} '{}': {}", action, config_path.display(), e),
    };

    if let Some(parent) = config_path.parent() {
        ensure_private_dir(parent)
            .await
            .map_err(|e| config_error("create directory for", &e))?;
    }
    let json = serde_json::to_vec_pretty(config).map_err(|e| config_error("serialize", &e))?;
    write_atomic(config_path, &json)
        .await
        .map_err(|e| config_error("write", &e))
}

fn env_key(suffix: &str) -> String {
    format!("{ENV_PREFIX}{suffix}")
}

fn parse_env<T: std::str::FromStr>(suffix: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ResolverError::Config {
        message: format!("invalid value '{}' for {}", value, env_key(suffix)),
    })
}

fn parse_bool(suffix: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ResolverError::Config {
            message: format!("invalid value '{}' for {}", value, env_key(suffix)),
        }),
    }
}
