//! Core application logic for the dataset cache
//!
//! This module contains the cache components: data models, the per-dataset
//! lock registry, the reclaimable memory tier, the durable snapshot store and
//! the provider that orchestrates them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dataset_cache::app::{DataProvider, DatasetRef, Entity, ProviderConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct LabValue {
//!     subject: String,
//!     value: f64,
//! }
//!
//! impl Entity for LabValue {
//!     const NAME: &'static str = "lab-values";
//!     const VERSION: u32 = 1;
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = DataProvider::open("/var/cache/datasets", ProviderConfig::default()).await?;
//! let dataset = DatasetRef::new("study", "D1").with_names("d1", "Dataset One");
//!
//! let labs = provider
//!     .get::<LabValue, _, _>(&dataset, |_| async {
//!         // query the warehouse here
//!         Ok::<_, anyhow::Error>(Vec::new())
//!     })
//!     .await?;
//! println!("{} lab values", labs.len());
//! # Ok(())
//! # }
//! ```

pub mod locks;
pub mod memory;
pub mod models;
pub mod provider;
pub mod store;

// Re-export main public API
pub use locks::KeyedLock;
pub use memory::{MemoryCache, MemoryCacheConfig, MemoryStats, SlotHandle};
pub use models::{CacheKey, Collection, DatasetKey, DatasetRef, Entity, EntityType};
pub use provider::{DataProvider, MaintenanceTask, ProviderConfig, ProviderStats};
pub use store::{
    BinaryStore, PathGenerator, SnapshotName, SnapshotVerifier, StoreStats, VerificationReport,
    VerifyOptions,
};
