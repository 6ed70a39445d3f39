//! Durable snapshot tier
//!
//! This module provides the on-disk side of the dataset cache:
//!
//! - **Path generation** ([`path`]): deterministic, versioned snapshot locations
//! - **Snapshot format** ([`snapshot`]): framed, checksummed MessagePack files
//! - **Binary store** ([`binary`]): atomic writes, validated reads, scoped clears
//! - **Statistics** ([`stats`]): directory scanning and disk usage
//! - **Verification** ([`verification`]): integrity checks without record types
//!
//! The store itself applies no locking; the provider serializes access per dataset.

pub mod binary;
pub mod path;
pub mod snapshot;
pub mod stats;
pub mod verification;

pub use binary::BinaryStore;
pub use path::{PathGenerator, SnapshotName};
pub use snapshot::SnapshotHeader;
pub use stats::{format_bytes, DirectoryScanner, StoreStats};
pub use verification::{SnapshotVerifier, VerificationFailure, VerificationReport, VerifyOptions};
