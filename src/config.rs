//! Configuration management for the dataset cache
//!
//! This module provides TOML configuration with multi-location discovery,
//! an explicit initialization step and zero-config defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{MemoryCacheConfig, ProviderConfig};
use crate::constants::{config as config_files, logging, memory, provider, store};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Snapshot store settings
    pub store: StoreConfigToml,
    /// Provider locking settings
    pub provider: ProviderConfigToml,
    /// Memory tier settings
    pub memory: MemoryConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly snapshot store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfigToml {
    /// Snapshot root directory (None = user cache directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

/// TOML-friendly provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfigToml {
    /// Wait for a dataset's memory lock before the miss path starts over
    #[serde(with = "humantime_serde")]
    pub lock_timeout: Duration,
}

impl Default for ProviderConfigToml {
    fn default() -> Self {
        Self {
            lock_timeout: provider::DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// TOML-friendly memory tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfigToml {
    /// Maximum resident collections
    pub max_entries: usize,
    /// Age after which a resident collection is dropped (None = never)
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,
    /// Interval between sweeps of expired entries
    #[serde(with = "humantime_serde")]
    pub maintenance_interval: Duration,
}

impl Default for MemoryConfigToml {
    fn default() -> Self {
        Self {
            max_entries: memory::DEFAULT_MAX_ENTRIES,
            ttl: None,
            maintenance_interval: memory::DEFAULT_MAINTENANCE_INTERVAL,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the override path or the first file found
    ///
    /// Falls back to defaults when no file exists, but an explicitly given
    /// path that does not exist is an error.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        let config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Write a default configuration file to `path` (or the user config location)
    ///
    /// Returns the path written. An existing file is only replaced with `force`.
    pub async fn initialize_default(path: Option<PathBuf>, force: bool) -> ConfigResult<PathBuf> {
        let config_path = match path {
            Some(path) => path,
            None => Self::default_config_path()?,
        };

        if config_path.exists() && !force {
            return Err(ConfigError::InvalidValue {
                field: "path".to_string(),
                value: config_path.display().to_string(),
                reason: "File already exists, use --force to overwrite".to_string(),
            });
        }

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| ConfigError::Io {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        tokio::fs::write(&config_path, Self::generate_default_config_content())
            .await
            .map_err(|source| ConfigError::Io {
                path: config_path.clone(),
                source,
            })?;

        info!("Created default configuration at {}", config_path.display());
        Ok(config_path)
    }

    /// Find configuration file in standard locations
    pub fn find_config_file() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|path| {
            let found = path.exists();
            if found {
                debug!("Found config file: {}", path.display());
            }
            found
        })
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            // Project-local config
            PathBuf::from(".").join(config_files::LOCAL_CONFIG_FILE),
            PathBuf::from(".").join(config_files::FALLBACK_CONFIG_FILE),
        ];
        // User config
        if let Ok(user_path) = Self::default_config_path() {
            paths.push(user_path);
        }
        // System config (Unix only)
        #[cfg(unix)]
        paths.push(PathBuf::from(config_files::SYSTEM_CONFIG_PATH));
        paths
    }

    /// Default config file path for the current user
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or(ConfigError::NoSystemDirectory { kind: "config" })?;
        Ok(config_dir.join(store::APP_DIR_NAME).join("config.toml"))
    }

    /// Default snapshot root for the current user
    pub fn default_store_root() -> ConfigResult<PathBuf> {
        let cache_dir = dirs::cache_dir().ok_or(ConfigError::NoSystemDirectory { kind: "cache" })?;
        Ok(cache_dir
            .join(store::APP_DIR_NAME)
            .join(store::SNAPSHOT_DIR_NAME))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> ConfigResult<()> {
        let runtime = self.provider_config();
        runtime.validate().map_err(|reason| ConfigError::InvalidValue {
            field: "provider/memory".to_string(),
            value: format!(
                "lock_timeout={}, maintenance_interval={}",
                humantime::format_duration(runtime.lock_timeout),
                humantime::format_duration(runtime.maintenance_interval)
            ),
            reason,
        })?;

        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: self.logging.level.clone(),
                reason: "Expected error, warn, info, debug, trace or a filter directive".to_string(),
            });
        }
        Ok(())
    }

    /// Snapshot root, resolving the default when none is configured
    pub fn store_root(&self) -> ConfigResult<PathBuf> {
        match &self.store.root {
            Some(root) => Ok(root.clone()),
            None => Self::default_store_root(),
        }
    }

    /// Runtime provider configuration
    pub fn provider_config(&self) -> ProviderConfig {
        let mut memory = MemoryCacheConfig::default().with_max_entries(self.memory.max_entries);
        memory.ttl = self.memory.ttl;

        ProviderConfig::default()
            .with_lock_timeout(self.provider.lock_timeout)
            .with_maintenance_interval(self.memory.maintenance_interval)
            .with_memory(memory)
    }

    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> ConfigResult<(PathBuf, ProviderConfig)> {
        Ok((self.store_root()?, self.provider_config()))
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        let default_root = Self::default_store_root()
            .unwrap_or_else(|_| PathBuf::from("./snapshots"));

        format!(
            r#"# Dataset Cache Configuration
# You can customize any of these settings to suit your needs.

[store]
# Snapshot directory (leave commented to use the system default)
# Default: {}
# root = "/var/lib/dataset-cache/snapshots"

[provider]
# How long a cache miss waits for a busy dataset before starting over
lock_timeout = "{}"

[memory]
# Maximum number of collections kept in memory
max_entries = {}
# Drop collections from memory after this age (uncomment to enable)
# ttl = "30m"
# Interval between sweeps of expired collections
maintenance_interval = "{}"

[logging]
level = "{}"  # error, warn, info, debug, trace
"#,
            default_root.display(),
            humantime::format_duration(provider::DEFAULT_LOCK_TIMEOUT),
            memory::DEFAULT_MAX_ENTRIES,
            humantime::format_duration(memory::DEFAULT_MAINTENANCE_INTERVAL),
            logging::DEFAULT_LOG_LEVEL
        )
    }
}
