//! Data models for cached datasets and entity collections
//!
//! A cached collection is addressed by a [`CacheKey`]: the dataset it belongs
//! to plus the entity type (with its schema version) of its records.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};

/// Immutable, shared view of an ordered entity collection
pub type Collection<T> = Arc<Vec<T>>;

/// Reference to one logical dataset (e.g. one study extract)
///
/// Identity is the `(namespace, id)` pair; `name` and `display_name` are
/// descriptive and do not take part in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRef {
    /// Storage namespace (the dataset "type" discriminator)
    pub namespace: String,
    /// Opaque dataset identifier
    pub id: String,
    /// Short name
    pub name: String,
    /// Human readable name
    pub display_name: String,
}

impl DatasetRef {
    /// Create a dataset reference whose names default to the id
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            namespace: namespace.into(),
            name: id.clone(),
            display_name: id.clone(),
            id,
        }
    }

    /// Attach a short and a display name
    pub fn with_names(mut self, name: impl Into<String>, display_name: impl Into<String>) -> Self {
        self.name = name.into();
        self.display_name = display_name.into();
        self
    }

    /// Key used by the per-dataset lock registries
    pub fn lock_key(&self) -> DatasetKey {
        DatasetKey {
            namespace: self.namespace.clone(),
            id: self.id.clone(),
        }
    }

    /// Check that namespace and id are usable as path segments
    pub fn validate(&self) -> StoreResult<()> {
        validate_segment("dataset namespace", &self.namespace)?;
        validate_segment("dataset id", &self.id)
    }
}

impl PartialEq for DatasetRef {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.id == other.id
    }
}

impl Eq for DatasetRef {}

impl Hash for DatasetRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.id)
    }
}

/// Identity of a dataset without its descriptive names
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatasetKey {
    pub namespace: String,
    pub id: String,
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.id)
    }
}

/// A class of entity records together with its schema version
///
/// The version is part of the snapshot file name, so bumping it makes every
/// older snapshot unreachable without a migration step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    pub version: u32,
}

impl EntityType {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Same entity type with a different schema version
    pub fn with_version(&self, version: u32) -> Self {
        Self {
            name: self.name.clone(),
            version,
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        validate_segment("entity type", &self.name)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// Record type that knows its own entity type
///
/// ```rust
/// use dataset_cache::app::Entity;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct AdverseEvent {
///     subject: String,
///     term: String,
/// }
///
/// impl Entity for AdverseEvent {
///     const NAME: &'static str = "adverse-events";
///     const VERSION: u32 = 3;
/// }
///
/// assert_eq!(AdverseEvent::entity_type().version, 3);
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Entity type name used in snapshot file names
    const NAME: &'static str;
    /// Schema version, bump whenever the serialized shape changes
    const VERSION: u32;

    fn entity_type() -> EntityType {
        EntityType::new(Self::NAME, Self::VERSION)
    }
}

/// Addressable unit of both cache tiers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub dataset: DatasetRef,
    pub entity_type: EntityType,
}

impl CacheKey {
    pub fn new(dataset: DatasetRef, entity_type: EntityType) -> Self {
        Self {
            dataset,
            entity_type,
        }
    }

    /// Whether the key belongs to the given dataset
    pub fn belongs_to(&self, dataset: &DatasetRef) -> bool {
        self.dataset == *dataset
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.dataset, self.entity_type)
    }
}

/// Reject identifiers that would escape or alter the snapshot directory layout
pub fn validate_segment(kind: &'static str, value: &str) -> StoreResult<()> {
    let reason = if value.is_empty() {
        Some("must not be empty")
    } else if value == "." || value == ".." {
        Some("must not be a relative path component")
    } else if value.contains(['/', '\\']) {
        Some("must not contain path separators")
    } else if value.contains('\0') {
        Some("must not contain NUL bytes")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StoreError::InvalidSegment {
            kind,
            value: value.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
