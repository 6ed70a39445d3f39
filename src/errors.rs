//! Error types for the dataset cache
//!
//! Errors are grouped by the component that raises them. Storage errors are
//! split so that callers can tell a misconfigured deployment (fatal) from a
//! damaged snapshot file (recoverable by regenerating it).

use std::path::PathBuf;
use thiserror::Error;

/// Snapshot storage errors raised by the binary store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Storage directory could not be created
    #[error("Failed to create storage directory {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic file I/O failure
    #[error("Snapshot I/O failed for {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot file does not exist
    #[error("Snapshot not found: {path}")]
    NotFound { path: PathBuf },

    /// Framing or checksum of the snapshot file is damaged
    #[error("Snapshot corrupted at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Snapshot body could not be decoded
    #[error("Failed to decode snapshot {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: rmp_serde::decode::Error,
    },

    /// Collection could not be encoded
    #[error("Failed to encode snapshot for {path}")]
    Encode {
        path: PathBuf,
        #[source]
        source: rmp_serde::encode::Error,
    },

    /// Snapshot decoded but describes a different dataset or entity type
    #[error("Snapshot {path} is incompatible: {reason}")]
    Incompatible { path: PathBuf, reason: String },

    /// Identifier cannot be used as a path segment
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidSegment {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    /// Deleting snapshots failed twice
    #[error("Failed to clear snapshots under {path} after retry")]
    ClearFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Errors that indicate a broken deployment rather than a damaged file
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::DirectoryCreation { .. }
                | StoreError::InvalidSegment { .. }
                | StoreError::ClearFailed { .. }
        )
    }

    /// Path the error refers to, when there is one
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            StoreError::DirectoryCreation { path, .. }
            | StoreError::Io { path, .. }
            | StoreError::NotFound { path }
            | StoreError::Corrupt { path, .. }
            | StoreError::Decode { path, .. }
            | StoreError::Encode { path, .. }
            | StoreError::Incompatible { path, .. }
            | StoreError::ClearFailed { path, .. } => Some(path),
            StoreError::InvalidSegment { .. } => None,
        }
    }
}

/// Errors surfaced by the data provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// A request could not be satisfied; operator action is required
    #[error("Unable to provide {entity_type} for dataset {dataset}")]
    Fatal {
        dataset: String,
        entity_type: String,
        #[source]
        source: StoreError,
    },

    /// The caller-supplied loader failed
    #[error(transparent)]
    Upstream(anyhow::Error),

    /// Snapshots could not be removed during invalidation
    #[error("Invalidation of {scope} failed")]
    Invalidation {
        scope: String,
        #[source]
        source: StoreError,
    },

    /// Storage could not be opened or addressed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProviderError {
    /// Whether the error came from the caller-supplied loader
    pub fn is_upstream(&self) -> bool {
        matches!(self, ProviderError::Upstream(_))
    }

    /// Whether the error is the fatal, non-retried kind
    pub fn is_fatal(&self) -> bool {
        match self {
            ProviderError::Fatal { .. } | ProviderError::Invalidation { .. } => true,
            ProviderError::Store(e) => e.is_fatal(),
            ProviderError::Upstream(_) => false,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read or written
    #[error("Configuration file I/O failed: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be rendered as TOML
    #[error("Failed to serialize configuration")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// The platform exposes no user config/cache directory
    #[error("Could not determine the user {kind} directory")]
    NoSystemDirectory { kind: &'static str },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Storage error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Provider error
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Output encoding error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Store(StoreError::Corrupt { .. })
            | AppError::Store(StoreError::Decode { .. })
            | AppError::Store(StoreError::Incompatible { .. })
            | AppError::Store(StoreError::NotFound { .. })
            | AppError::Store(StoreError::Io { .. }) => true,

            AppError::Provider(e) => !e.is_fatal() && !e.is_upstream(),

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Store(_) => "storage",
            AppError::Provider(_) => "provider",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Json(_) => "output",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Storage result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Provider result type alias
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
