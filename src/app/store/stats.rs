//! Snapshot store statistics and disk usage scanning

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use super::path::{PathGenerator, SnapshotName};

/// Summary of what the snapshot store holds on disk
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// Store root directory
    pub root: PathBuf,
    /// Number of snapshot files
    pub snapshot_count: usize,
    /// Total size of snapshot files in bytes
    pub total_bytes: u64,
    /// Snapshot files per namespace
    pub per_namespace: BTreeMap<String, usize>,
    /// Files whose name does not follow the snapshot naming scheme
    pub unrecognized: usize,
}

impl StoreStats {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            snapshot_count: 0,
            total_bytes: 0,
            per_namespace: BTreeMap::new(),
            unrecognized: 0,
        }
    }

    /// Collect statistics for the tree under `root`
    pub async fn collect(root: &Path) -> Self {
        let scan_root = root.to_path_buf();
        let stats = Self::new(root.to_path_buf());

        tokio::task::spawn_blocking(move || {
            let mut stats = stats;
            for file in DirectoryScanner::snapshot_files(&scan_root) {
                stats.record(&file);
            }
            stats
        })
        .await
        .unwrap_or_else(|e| {
            warn!("Failed to scan snapshot directory: {}", e);
            Self::new(root.to_path_buf())
        })
    }

    fn record(&mut self, path: &Path) {
        self.snapshot_count += 1;
        if let Ok(metadata) = std::fs::metadata(path) {
            self.total_bytes += metadata.len();
        }
        match SnapshotName::from_path(path) {
            Some(name) => *self.per_namespace.entry(name.namespace).or_default() += 1,
            None => self.unrecognized += 1,
        }
    }

    /// Format total size in human-readable format
    pub fn format_total_size(&self) -> String {
        format_bytes(self.total_bytes)
    }
}

/// Directory scanner for snapshot files
pub struct DirectoryScanner;

impl DirectoryScanner {
    /// Count snapshot files below `dir` and their total size
    pub async fn scan_snapshots(dir: &Path) -> (usize, u64) {
        let dir = dir.to_path_buf();

        tokio::task::spawn_blocking(move || Self::scan_directory_sync(&dir))
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to scan snapshot directory: {}", e);
                (0, 0)
            })
    }

    /// Blocking variant of [`DirectoryScanner::scan_snapshots`]
    pub fn scan_directory_sync(dir: &Path) -> (usize, u64) {
        Self::snapshot_files(dir)
            .iter()
            .fold((0, 0), |(count, size), path| {
                let len = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                (count + 1, size + len)
            })
    }

    /// Every snapshot file below `dir`, sorted; `dir` may itself be a file
    pub fn snapshot_files(dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        if dir.is_file() {
            if PathGenerator::is_snapshot_path(dir) {
                files.push(dir.to_path_buf());
            }
        } else {
            Self::collect_recursive(dir, &mut files);
        }
        files.sort();
        files
    }

    fn collect_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                Self::collect_recursive(&path, files);
            } else if path.is_file() && PathGenerator::is_snapshot_path(&path) {
                files.push(path);
            }
        }
    }
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: u64 = 1024;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD as f64 && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD as f64;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
