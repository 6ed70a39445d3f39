//! Snapshot path generation and file name parsing
//!
//! Layout:
//! `{root}/{namespace}/{dataset_id}/{entity}_v{version}_{namespace}_dataset_{dataset_id}.snap`
//!
//! The path is a pure function of its inputs, so separate processes (or the
//! same process after a restart) agree on snapshot locations without an index.

use std::path::{Path, PathBuf};

use crate::app::models::{validate_segment, DatasetRef, EntityType};
use crate::constants::snapshot;
use crate::errors::StoreResult;

/// Path generation utility for snapshot files
pub struct PathGenerator;

impl PathGenerator {
    /// Snapshot path for one entity type of one dataset
    pub fn snapshot_path(
        root: &Path,
        entity_type: &EntityType,
        dataset: &DatasetRef,
    ) -> StoreResult<PathBuf> {
        entity_type.validate()?;
        let mut path = Self::dataset_dir(root, &dataset.namespace, &dataset.id)?;
        path.push(Self::file_name(entity_type, dataset));
        Ok(path)
    }

    /// Snapshot file name, without directories
    pub fn file_name(entity_type: &EntityType, dataset: &DatasetRef) -> String {
        format!(
            "{}{}{}_{}{}{}.{}",
            entity_type.name,
            snapshot::VERSION_MARKER,
            entity_type.version,
            dataset.namespace,
            snapshot::DATASET_MARKER,
            dataset.id,
            snapshot::EXTENSION
        )
    }

    /// Directory holding every dataset of a namespace
    pub fn namespace_dir(root: &Path, namespace: &str) -> StoreResult<PathBuf> {
        validate_segment("dataset namespace", namespace)?;
        Ok(root.join(namespace))
    }

    /// Directory holding every snapshot of one dataset
    pub fn dataset_dir(root: &Path, namespace: &str, dataset_id: &str) -> StoreResult<PathBuf> {
        validate_segment("dataset id", dataset_id)?;
        Ok(Self::namespace_dir(root, namespace)?.join(dataset_id))
    }

    /// Temporary sibling used while a snapshot is being written
    pub fn temp_path(final_path: &Path) -> PathBuf {
        let mut name = final_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(crate::constants::TEMP_FILE_SUFFIX);
        final_path.with_file_name(name)
    }

    /// Whether a path looks like a snapshot file
    pub fn is_snapshot_path(path: &Path) -> bool {
        path.extension()
            .is_some_and(|extension| extension == snapshot::EXTENSION)
    }
}

/// Components recovered from a snapshot file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotName {
    pub entity: String,
    pub version: u32,
    pub namespace: String,
    pub dataset_id: String,
}

impl SnapshotName {
    /// Parse `{entity}_v{version}_{namespace}_dataset_{id}.snap`
    ///
    /// Entity names may themselves contain `_v`; the last marker followed by
    /// digits and `_` is the version marker.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{}", snapshot::EXTENSION))?;
        let (head, dataset_id) = stem.rsplit_once(snapshot::DATASET_MARKER)?;

        let mut search_end = head.len();
        while let Some(pos) = head[..search_end].rfind(snapshot::VERSION_MARKER) {
            let rest = &head[pos + snapshot::VERSION_MARKER.len()..];
            if let Some((digits, namespace)) = rest.split_once('_') {
                if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                    let version = digits.parse().ok()?;
                    let entity = &head[..pos];
                    if entity.is_empty() || namespace.is_empty() || dataset_id.is_empty() {
                        return None;
                    }
                    return Some(Self {
                        entity: entity.to_string(),
                        version,
                        namespace: namespace.to_string(),
                        dataset_id: dataset_id.to_string(),
                    });
                }
            }
            search_end = pos;
        }
        None
    }

    /// Parse the file name component of a path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(Self::parse)
    }

    pub fn entity_type(&self) -> EntityType {
        EntityType::new(self.entity.clone(), self.version)
    }
}
