//! Dataset loading through memory and snapshot tiers
//!
//! The provider is the only component that applies locking. It composes:
//!
//! - [`config`] - timeouts and memory tier limits
//! - [`manager`] - the [`DataProvider`] itself: `get_data` and invalidation
//! - [`maintenance`] - background sweep of expired memory entries
//!
//! # Examples
//!
//! ```rust,no_run
//! use dataset_cache::app::{DataProvider, DatasetRef, EntityType, ProviderConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = DataProvider::open("/var/cache/datasets", ProviderConfig::default()).await?;
//! let dataset = DatasetRef::new("study", "D1");
//! let entity = EntityType::new("adverse-events", 1);
//!
//! let events = provider
//!     .get_data(&entity, &dataset, |_| async {
//!         Ok(vec!["A".to_string(), "B".to_string(), "C".to_string()])
//!     })
//!     .await?;
//! assert_eq!(events.len(), 3);
//!
//! provider.invalidate_dataset(&dataset).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod maintenance;

#[cfg(test)]
mod tests;

pub use config::ProviderConfig;
pub use manager::{DataProvider, ProviderStats};
pub use maintenance::MaintenanceTask;
