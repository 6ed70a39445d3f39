//! Configuration structures for the data provider

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::memory::MemoryCacheConfig;
use crate::constants::{memory, provider};

/// Configuration for the data provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// How long a miss waits for the dataset's memory lock before starting over
    #[serde(with = "humantime_serde")]
    pub lock_timeout: Duration,
    /// Interval between maintenance sweeps of the memory tier
    #[serde(with = "humantime_serde")]
    pub maintenance_interval: Duration,
    /// Memory tier configuration
    pub memory: MemoryCacheConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            lock_timeout: provider::DEFAULT_LOCK_TIMEOUT,
            maintenance_interval: memory::DEFAULT_MAINTENANCE_INTERVAL,
            memory: MemoryCacheConfig::default(),
        }
    }
}

impl ProviderConfig {
    /// Set the memory lock timeout
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    pub fn with_memory(mut self, memory: MemoryCacheConfig) -> Self {
        self.memory = memory;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.lock_timeout.is_zero() {
            return Err("Lock timeout cannot be zero".to_string());
        }

        if self.maintenance_interval.is_zero() {
            return Err("Maintenance interval cannot be zero".to_string());
        }

        if self.memory.ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err("Memory TTL cannot be zero".to_string());
        }

        Ok(())
    }
}
