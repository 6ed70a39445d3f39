//! Snapshot integrity checking
//!
//! Verification needs no record type: the framing, digest and header of each
//! snapshot are checked, and the header is compared with the file name. Files
//! are not locked while being verified, so run this against a quiescent
//! store or accept that an in-flight rewrite may be reported as corrupt.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::app::models::validate_segment;
use crate::errors::StoreResult;

use super::path::SnapshotName;
use super::snapshot;
use super::stats::DirectoryScanner;

/// Snapshot verification report
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    /// Total files checked
    pub files_checked: usize,
    /// Files that passed verification
    pub files_verified: usize,
    /// Files that failed verification
    pub files_failed: usize,
    /// Files removed because they failed verification
    pub files_pruned: usize,
    /// Valid snapshots shadowed by a newer schema version of the same entity
    pub stale_files: Vec<PathBuf>,
    /// Total verification time
    #[serde(with = "humantime_serde")]
    pub verification_time: Duration,
    /// Failed files with details
    pub failed_files: Vec<VerificationFailure>,
}

/// Details about a verification failure
#[derive(Debug, Clone, Serialize)]
pub struct VerificationFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl VerificationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get verification success rate as percentage
    pub fn success_rate(&self) -> f64 {
        if self.files_checked == 0 {
            0.0
        } else {
            (self.files_verified as f64 / self.files_checked as f64) * 100.0
        }
    }

    pub fn is_successful(&self) -> bool {
        self.files_failed == 0
    }

    fn add_verified(&mut self) {
        self.files_checked += 1;
        self.files_verified += 1;
    }

    fn add_failed(&mut self, path: PathBuf, reason: String) {
        self.files_checked += 1;
        self.files_failed += 1;
        self.failed_files.push(VerificationFailure { path, reason });
    }
}

/// Which snapshots to verify and what to do with failures
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub namespace: Option<String>,
    pub dataset_id: Option<String>,
    /// Delete files that fail verification
    pub prune: bool,
}

pub struct SnapshotVerifier;

impl SnapshotVerifier {
    /// Verify every snapshot below `root` within the optional scope
    ///
    /// # Errors
    ///
    /// Only invalid scope segments are errors; unreadable files are reported.
    pub async fn verify_tree(root: &Path, options: &VerifyOptions) -> StoreResult<VerificationReport> {
        let start = Instant::now();
        let mut report = VerificationReport::new();

        if let Some(namespace) = &options.namespace {
            validate_segment("dataset namespace", namespace)?;
        }
        if let Some(id) = &options.dataset_id {
            validate_segment("dataset id", id)?;
        }

        let scan_root = root.to_path_buf();
        let files = tokio::task::spawn_blocking(move || DirectoryScanner::snapshot_files(&scan_root))
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to list snapshot files: {}", e);
                Vec::new()
            });

        let mut valid: Vec<(PathBuf, SnapshotName)> = Vec::new();
        for path in files {
            let name = SnapshotName::from_path(&path);
            if !Self::in_scope(name.as_ref(), options) {
                continue;
            }

            match Self::verify_file(&path, name.as_ref()).await {
                Ok(()) => {
                    report.add_verified();
                    if let Some(name) = name {
                        valid.push((path, name));
                    }
                }
                Err(reason) => {
                    debug!("Snapshot {} failed verification: {}", path.display(), reason);
                    if options.prune {
                        match fs::remove_file(&path).await {
                            Ok(()) => report.files_pruned += 1,
                            Err(e) => warn!("Failed to prune {}: {}", path.display(), e),
                        }
                    }
                    report.add_failed(path, reason);
                }
            }
        }

        report.stale_files = Self::find_stale(&valid);
        report.verification_time = start.elapsed();

        info!(
            "Verified {} snapshots: {} ok, {} failed, {} pruned, {} stale",
            report.files_checked,
            report.files_verified,
            report.files_failed,
            report.files_pruned,
            report.stale_files.len()
        );
        Ok(report)
    }

    /// Check one file, returning the failure reason
    pub async fn verify_file(path: &Path, name: Option<&SnapshotName>) -> Result<(), String> {
        let name = name.ok_or_else(|| "file name does not follow the snapshot naming scheme".to_string())?;
        let bytes = fs::read(path)
            .await
            .map_err(|e| format!("unreadable: {}", e))?;
        let header = snapshot::inspect(path, &bytes).map_err(|e| e.to_string())?;

        if header.entity_type != name.entity
            || header.schema_version != name.version
            || header.namespace != name.namespace
            || header.dataset_id != name.dataset_id
        {
            return Err(format!(
                "header describes {} v{} of {}/{}, file name does not",
                header.entity_type, header.schema_version, header.namespace, header.dataset_id
            ));
        }

        let in_place = path.parent().is_some_and(|dataset_dir| {
            dataset_dir.ends_with(Path::new(&name.namespace).join(&name.dataset_id))
        });
        if !in_place {
            return Err("snapshot is outside its dataset directory".to_string());
        }
        Ok(())
    }

    fn in_scope(name: Option<&SnapshotName>, options: &VerifyOptions) -> bool {
        if options.namespace.is_none() && options.dataset_id.is_none() {
            return true;
        }
        let Some(name) = name else {
            return false;
        };
        options
            .namespace
            .as_ref()
            .map_or(true, |ns| *ns == name.namespace)
            && options
                .dataset_id
                .as_ref()
                .map_or(true, |id| *id == name.dataset_id)
    }

    fn find_stale(valid: &[(PathBuf, SnapshotName)]) -> Vec<PathBuf> {
        let mut newest: HashMap<(&str, &str, &str), u32> = HashMap::new();
        for (_, name) in valid {
            let group = (
                name.namespace.as_str(),
                name.dataset_id.as_str(),
                name.entity.as_str(),
            );
            let entry = newest.entry(group).or_insert(name.version);
            *entry = (*entry).max(name.version);
        }

        valid
            .iter()
            .filter(|(_, name)| {
                let group = (
                    name.namespace.as_str(),
                    name.dataset_id.as_str(),
                    name.entity.as_str(),
                );
                newest.get(&group).is_some_and(|max| name.version < *max)
            })
            .map(|(path, _)| path.clone())
            .collect()
    }
}
