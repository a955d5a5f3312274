//! Configuration management for stockcache

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::adapter::MAX_ENTRY_BYTES;
use crate::cache::policy::StalenessPolicy;
use crate::cache::retry::RetryPolicy;
use crate::cache::store::DEFAULT_QUOTA_BYTES;
use crate::error::{ConfigError, Result};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the inventory API, e.g. `https://stock.example.com/api`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Bearer token for the API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Tenant sent with every request and folded into cache keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(default)]
    pub cache: CacheSettings,
}

/// Tunables for the response cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// TTL for successful entries
    #[serde(default = "default_expiration_secs")]
    pub expiration_secs: u64,

    /// TTL for failure placeholders
    #[serde(default = "default_error_ttl_secs")]
    pub error_ttl_secs: u64,

    /// Largest single record the store accepts
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: usize,

    /// Total bytes the store may hold
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_auto_refresh_interval_secs")]
    pub auto_refresh_interval_secs: u64,
}

fn default_expiration_secs() -> u64 {
    300
}

fn default_error_ttl_secs() -> u64 {
    30
}

fn default_max_entry_bytes() -> usize {
    MAX_ENTRY_BYTES
}

fn default_quota_bytes() -> usize {
    DEFAULT_QUOTA_BYTES
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_auto_refresh_interval_secs() -> u64 {
    60
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            expiration_secs: default_expiration_secs(),
            error_ttl_secs: default_error_ttl_secs(),
            max_entry_bytes: default_max_entry_bytes(),
            quota_bytes: default_quota_bytes(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            auto_refresh_interval_secs: default_auto_refresh_interval_secs(),
        }
    }
}

impl CacheSettings {
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_secs)
    }

    pub fn auto_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.auto_refresh_interval_secs)
    }

    pub fn staleness(&self) -> StalenessPolicy {
        StalenessPolicy {
            error_ttl: Duration::from_secs(self.error_ttl_secs),
        }
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".stockcache").join("config.yaml"))
    }

    /// Explicit path if given, otherwise the default location
    pub fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::default_path(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_at(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;

        Ok(config)
    }

    /// Load from `path`, or start from defaults when no file exists yet
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load_at(path) {
            Err(crate::error::Error::Config(ConfigError::NotFound)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Save configuration to a specific path
    pub fn save_at(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(path, contents)?;

        // Token inside: owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Reject settings the cache cannot work with
    pub fn validate(&self) -> Result<()> {
        if let Some(ref url) = self.api_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "api_url must start with http:// or https://, got {}",
                url
            ))
            .into());
        }

        let cache = &self.cache;
        if cache.expiration_secs == 0 {
            return Err(ConfigError::Invalid("cache.expiration_secs must be > 0".into()).into());
        }
        if cache.max_entry_bytes == 0 || cache.quota_bytes == 0 {
            return Err(ConfigError::Invalid("cache byte limits must be > 0".into()).into());
        }
        if cache.max_entry_bytes > cache.quota_bytes {
            return Err(ConfigError::Invalid(format!(
                "cache.max_entry_bytes ({}) exceeds cache.quota_bytes ({})",
                cache.max_entry_bytes, cache.quota_bytes
            ))
            .into());
        }
        if cache.auto_refresh_interval_secs == 0 {
            return Err(
                ConfigError::Invalid("cache.auto_refresh_interval_secs must be > 0".into()).into(),
            );
        }

        Ok(())
    }

    /// The API URL, or an error pointing at `init`
    pub fn require_api_url(&self) -> Result<&str> {
        self.api_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingApiUrl.into())
    }
}
