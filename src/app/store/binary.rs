//! Binary snapshot store
//!
//! Pure I/O over the snapshot directory tree. The store has no concurrency
//! policy of its own; callers serialize access per dataset.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::app::models::{DatasetRef, EntityType};
use crate::constants::store;
use crate::errors::{StoreError, StoreResult};

use super::path::PathGenerator;
use super::snapshot::{self, SnapshotHeader};
use super::stats::DirectoryScanner;

/// Durable storage of entity collections, one file per (entity type, version, dataset)
#[derive(Debug, Clone)]
pub struct BinaryStore {
    root: PathBuf,
}

impl BinaryStore {
    /// Open a store rooted at `root`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DirectoryCreation` if the root cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        Self::ensure_directory_exists(&root).await?;
        info!("Opened snapshot store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic snapshot path for `entity_type` of `dataset`
    pub fn path_for(&self, entity_type: &EntityType, dataset: &DatasetRef) -> StoreResult<PathBuf> {
        PathGenerator::snapshot_path(&self.root, entity_type, dataset)
    }

    pub async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    /// Serialize `records` to `path` using temp file + rename
    ///
    /// # Errors
    ///
    /// `StoreError::DirectoryCreation` if the parent directory cannot be
    /// created (not retried), `StoreError::Encode` or `StoreError::Io` otherwise.
    pub async fn write<T: Serialize>(
        &self,
        path: &Path,
        entity_type: &EntityType,
        dataset: &DatasetRef,
        records: &[T],
    ) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            Self::ensure_directory_exists(parent).await?;
        }

        let header = SnapshotHeader::new(entity_type, dataset, records.len());
        let bytes = snapshot::encode(path, &header, records)?;
        let temp_path = PathGenerator::temp_path(path);

        fs::write(&temp_path, &bytes).await.map_err(|source| {
            error!("Failed to write temporary snapshot: {}", source);
            StoreError::Io {
                path: temp_path.clone(),
                source,
            }
        })?;

        if let Err(source) = fs::rename(&temp_path, path).await {
            error!("Failed to rename temporary snapshot: {}", source);
            let _ = fs::remove_file(&temp_path).await;
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }

        info!(
            "Wrote snapshot {} ({} records, {} bytes)",
            path.display(),
            records.len(),
            bytes.len()
        );
        Ok(())
    }

    /// Deserialize the snapshot at `path`, checking it holds `entity_type` of `dataset`
    ///
    /// # Errors
    ///
    /// `NotFound`, `Io`, `Corrupt`, `Decode` or `Incompatible`; all of them
    /// mean the file must be regenerated.
    pub async fn read<T: DeserializeOwned>(
        &self,
        path: &Path,
        entity_type: &EntityType,
        dataset: &DatasetRef,
    ) -> StoreResult<Vec<T>> {
        let bytes = fs::read(path).await.map_err(|source| match source.kind() {
            ErrorKind::NotFound => StoreError::NotFound {
                path: path.to_path_buf(),
            },
            _ => StoreError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;

        let (header, records) = snapshot::decode::<T>(path, &bytes)?;
        if let Some(reason) = header.mismatch(entity_type, dataset) {
            return Err(StoreError::Incompatible {
                path: path.to_path_buf(),
                reason,
            });
        }

        debug!(
            "Read snapshot {} ({} records)",
            path.display(),
            records.len()
        );
        Ok(records)
    }

    /// Delete snapshots in the given scope and return how many were removed
    ///
    /// - no filters: everything below the root (the root itself is kept)
    /// - namespace only: that namespace directory
    /// - namespace and dataset: that dataset directory
    /// - dataset only: that dataset id under every namespace
    ///
    /// A failed deletion is retried once after a short pause; a second
    /// failure is `StoreError::ClearFailed`.
    pub async fn clear(&self, namespace: Option<&str>, dataset_id: Option<&str>) -> StoreResult<usize> {
        let targets = match (namespace, dataset_id) {
            (Some(ns), Some(id)) => vec![PathGenerator::dataset_dir(&self.root, ns, id)?],
            (Some(ns), None) => vec![PathGenerator::namespace_dir(&self.root, ns)?],
            (None, Some(id)) => {
                crate::app::models::validate_segment("dataset id", id)?;
                self.child_directories(&self.root)
                    .await?
                    .into_iter()
                    .map(|ns_dir| ns_dir.join(id))
                    .collect()
            }
            (None, None) => self.children(&self.root).await?,
        };

        let mut removed = 0;
        for target in targets {
            removed += Self::remove_with_retry(&target).await?;
        }

        info!(
            "Cleared {} snapshots (namespace: {:?}, dataset: {:?})",
            removed, namespace, dataset_id
        );
        Ok(removed)
    }

    async fn remove_with_retry(target: &Path) -> StoreResult<usize> {
        let (count, _) = DirectoryScanner::scan_snapshots(target).await;

        match Self::remove_path(target).await {
            Ok(()) => Ok(count),
            Err(first) => {
                warn!(
                    "Failed to remove {} ({}), retrying once",
                    target.display(),
                    first
                );
                tokio::time::sleep(store::CLEAR_RETRY_DELAY).await;
                Self::remove_path(target).await.map_err(|source| {
                    error!("Failed to remove {} after retry: {}", target.display(), source);
                    StoreError::ClearFailed {
                        path: target.to_path_buf(),
                        source,
                    }
                })?;
                Ok(count)
            }
        }
    }

    async fn remove_path(target: &Path) -> std::io::Result<()> {
        let metadata = match fs::symlink_metadata(target).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let result = if metadata.is_dir() {
            fs::remove_dir_all(target).await
        } else {
            fs::remove_file(target).await
        };

        match result {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    async fn children(&self, dir: &Path) -> StoreResult<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };

        let mut children = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => children.push(entry.path()),
                Ok(None) => break,
                Err(source) => {
                    return Err(StoreError::Io {
                        path: dir.to_path_buf(),
                        source,
                    })
                }
            }
        }
        Ok(children)
    }

    async fn child_directories(&self, dir: &Path) -> StoreResult<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for child in self.children(dir).await? {
            if fs::metadata(&child).await.is_ok_and(|m| m.is_dir()) {
                dirs.push(child);
            }
        }
        Ok(dirs)
    }

    /// Ensure a directory exists, creating it if necessary
    async fn ensure_directory_exists(path: &Path) -> StoreResult<()> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            fs::create_dir_all(path).await.map_err(|source| {
                error!("Failed to create storage directory {}: {}", path.display(), source);
                StoreError::DirectoryCreation {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            debug!("Created storage directory: {}", path.display());
        }
        Ok(())
    }
}
