//! Prelude module for the dataset cache library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use dataset_cache::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dataset_cache::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::load(None).await?;
//!     let provider = Arc::new(DataProvider::open(config.store_root()?, config.provider_config()).await?);
//!
//!     let dataset = DatasetRef::new("study", "D1");
//!     let ids = provider
//!         .get_data(&EntityType::new("subject-ids", 1), &dataset, |_| async {
//!             Ok::<_, anyhow::Error>(vec![1u64, 2, 3])
//!         })
//!         .await?;
//!     println!("{} subjects", ids.len());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, ProviderError, Result, StoreError};

// Essential app components that are used in most integrations
pub use crate::app::{
    BinaryStore,
    // Data types
    Collection,
    // Orchestration
    DataProvider,
    DatasetRef,
    Entity,
    EntityType,
    MaintenanceTask,
    MemoryCacheConfig,
    ProviderConfig,
    ProviderStats,
};

// Configuration
pub use crate::config::AppConfig;
