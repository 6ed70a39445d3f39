//! Application constants for the dataset cache
//!
//! This module centralizes constants used throughout the crate, organized by
//! functional domain.

use std::time::Duration;

/// Snapshot file format constants
pub mod snapshot {
    /// Magic bytes at the start of every snapshot file
    pub const MAGIC: &[u8; 4] = b"DSNP";

    /// Current snapshot framing version
    pub const FORMAT_VERSION: u32 = 1;

    /// Length of the fixed prefix: magic + format version + MD5 digest
    pub const PREFIX_LEN: usize = 4 + 4 + 16;

    /// File extension for snapshot files
    pub const EXTENSION: &str = "snap";

    /// Separator between the entity name and the version marker
    pub const VERSION_MARKER: &str = "_v";

    /// Marker between the namespace and the dataset id in file names
    pub const DATASET_MARKER: &str = "_dataset_";
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";
}

/// Binary store behaviour
pub mod store {
    use super::Duration;

    /// Pause before the single retry of a failed clear
    pub const CLEAR_RETRY_DELAY: Duration = Duration::from_millis(100);

    /// Application directory name under the user cache/config directories
    pub const APP_DIR_NAME: &str = "dataset-cache";

    /// Subdirectory holding snapshots under the application cache directory
    pub const SNAPSHOT_DIR_NAME: &str = "snapshots";
}

/// Data provider behaviour
pub mod provider {
    use super::Duration;

    /// Default wait for a dataset lock before retrying the miss path
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Memory tier defaults
pub mod memory {
    use super::Duration;

    /// Default maximum number of resident collections
    pub const DEFAULT_MAX_ENTRIES: usize = 256;

    /// Default interval between maintenance sweeps
    pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);
}

/// Logging and debugging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";

    /// Crate target used for the log filter directive
    pub const LOG_TARGET: &str = "dataset_cache";
}

/// Configuration file discovery
pub mod config {
    /// Project-local configuration file name
    pub const LOCAL_CONFIG_FILE: &str = "dataset-cache.toml";

    /// Generic local configuration file name
    pub const FALLBACK_CONFIG_FILE: &str = "config.toml";

    /// System-wide configuration path (Unix only)
    #[cfg(unix)]
    pub const SYSTEM_CONFIG_PATH: &str = "/etc/dataset-cache/config.toml";
}

pub use files::TEMP_FILE_SUFFIX;
pub use provider::DEFAULT_LOCK_TIMEOUT;
pub use snapshot::EXTENSION as SNAPSHOT_EXTENSION;
