//! Snapshot file framing and codec
//!
//! ```text
//! +-------+----------------+-------------+---------------------------+
//! | DSNP  | format (u32le) | md5(body)   | body (MessagePack, named) |
//! +-------+----------------+-------------+---------------------------+
//!    4            4              16
//! ```
//!
//! The body is a map `{ header, records }`. Fields are encoded by name, so
//! records gain tolerance to added optional fields, and the header can be
//! decoded without knowing the record type (see [`inspect`]).

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

use crate::app::models::{DatasetRef, EntityType};
use crate::constants::snapshot;
use crate::errors::{StoreError, StoreResult};

/// Descriptive header stored alongside the records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub entity_type: String,
    pub schema_version: u32,
    pub namespace: String,
    pub dataset_id: String,
    pub written_at: DateTime<Utc>,
    pub record_count: u64,
}

impl SnapshotHeader {
    pub fn new(entity_type: &EntityType, dataset: &DatasetRef, record_count: usize) -> Self {
        Self {
            entity_type: entity_type.name.clone(),
            schema_version: entity_type.version,
            namespace: dataset.namespace.clone(),
            dataset_id: dataset.id.clone(),
            written_at: Utc::now(),
            record_count: record_count as u64,
        }
    }

    /// Reason the header does not describe `entity_type` of `dataset`, if any
    pub fn mismatch(&self, entity_type: &EntityType, dataset: &DatasetRef) -> Option<String> {
        if self.entity_type != entity_type.name || self.schema_version != entity_type.version {
            return Some(format!(
                "holds {} v{}, expected {}",
                self.entity_type, self.schema_version, entity_type
            ));
        }
        if self.namespace != dataset.namespace || self.dataset_id != dataset.id {
            return Some(format!(
                "holds dataset {}/{}, expected {}",
                self.namespace, self.dataset_id, dataset
            ));
        }
        None
    }
}

#[derive(Serialize)]
struct SnapshotBodyRef<'a, T> {
    header: &'a SnapshotHeader,
    records: &'a [T],
}

#[derive(Deserialize)]
struct SnapshotBody<T> {
    header: SnapshotHeader,
    records: Vec<T>,
}

/// Encode a full snapshot file image
pub fn encode<T: Serialize>(
    path: &Path,
    header: &SnapshotHeader,
    records: &[T],
) -> StoreResult<Vec<u8>> {
    let body = rmp_serde::to_vec_named(&SnapshotBodyRef { header, records }).map_err(|source| {
        StoreError::Encode {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let digest = md5::compute(&body);
    let mut buf = Vec::with_capacity(snapshot::PREFIX_LEN + body.len());
    buf.extend_from_slice(snapshot::MAGIC);
    buf.extend_from_slice(&snapshot::FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&digest.0);
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Decode a snapshot file image into its header and records
pub fn decode<T: DeserializeOwned>(
    path: &Path,
    bytes: &[u8],
) -> StoreResult<(SnapshotHeader, Vec<T>)> {
    let body = checked_body(path, bytes)?;
    let decoded: SnapshotBody<T> =
        rmp_serde::from_slice(body).map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((decoded.header, decoded.records))
}

/// Validate framing and digest, then decode only the header
pub fn inspect(path: &Path, bytes: &[u8]) -> StoreResult<SnapshotHeader> {
    let body = checked_body(path, bytes)?;
    let decoded: SnapshotBody<IgnoredAny> =
        rmp_serde::from_slice(body).map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(decoded.header)
}

fn checked_body<'a>(path: &Path, bytes: &'a [u8]) -> StoreResult<&'a [u8]> {
    let corrupt = |reason: String| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < snapshot::PREFIX_LEN {
        return Err(corrupt(format!(
            "file is {} bytes, shorter than the {} byte prefix",
            bytes.len(),
            snapshot::PREFIX_LEN
        )));
    }
    if &bytes[0..4] != snapshot::MAGIC {
        return Err(corrupt("bad magic".to_string()));
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..8]);
    let version = u32::from_le_bytes(version);
    if version != snapshot::FORMAT_VERSION {
        return Err(corrupt(format!("unsupported format version {}", version)));
    }

    let body = &bytes[snapshot::PREFIX_LEN..];
    let digest = md5::compute(body);
    if digest.0[..] != bytes[8..snapshot::PREFIX_LEN] {
        return Err(corrupt("checksum mismatch".to_string()));
    }
    Ok(body)
}
