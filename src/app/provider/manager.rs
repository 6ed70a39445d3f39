//! Two-tier data provider
//!
//! Requests resolve against the memory tier first. A miss takes the dataset's
//! memory lock (bounded wait), then its disk lock for the whole
//! check, populate, read-back sequence, so the loader runs at most once per
//! miss no matter how many callers arrive together. Lock order is always
//! global, then memory, then disk.
//!
//! The locks are reentrant for the task running a loader: a loader may call
//! back into the provider for another entity type of the dataset it is
//! loading, and that call reuses the locks its caller already holds.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, error, info, warn};

use crate::app::locks::KeyedLock;
use crate::app::memory::{MemoryCache, MemoryStats};
use crate::app::models::{
    validate_segment, CacheKey, Collection, DatasetKey, DatasetRef, Entity, EntityType,
};
use crate::app::store::BinaryStore;
use crate::errors::{ProviderError, ProviderResult, StoreError};

use super::config::ProviderConfig;

tokio::task_local! {
    /// Datasets whose memory and disk locks the current task holds while a
    /// loader runs
    static HELD_DATASETS: HashSet<DatasetKey>;
}

fn held_datasets() -> HashSet<DatasetKey> {
    HELD_DATASETS.try_with(Clone::clone).unwrap_or_default()
}

/// Counters describing provider behaviour
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStats {
    /// Requests answered from the memory tier
    pub memory_hits: u64,
    /// Collections read back from snapshots
    pub disk_reads: u64,
    /// Times a loader was invoked
    pub loader_invocations: u64,
    /// Unreadable snapshots regenerated from the loader
    pub corruption_recoveries: u64,
    /// Memory lock waits that expired and were retried
    pub lock_timeouts: u64,
    /// Datasets that have been requested at least once
    pub known_datasets: usize,
    pub memory: MemoryStats,
}

#[derive(Default)]
struct Counters {
    memory_hits: AtomicU64,
    disk_reads: AtomicU64,
    loader_invocations: AtomicU64,
    corruption_recoveries: AtomicU64,
    lock_timeouts: AtomicU64,
}

/// Loads entity collections through the memory and snapshot tiers
pub struct DataProvider {
    config: ProviderConfig,
    store: BinaryStore,
    memory: MemoryCache,
    memory_locks: KeyedLock<DatasetKey>,
    disk_locks: KeyedLock<DatasetKey>,
    global: RwLock<()>,
    counters: Counters,
}

impl DataProvider {
    pub fn new(store: BinaryStore, config: ProviderConfig) -> Self {
        let memory = MemoryCache::new(config.memory.clone());
        Self {
            config,
            store,
            memory,
            memory_locks: KeyedLock::new(),
            disk_locks: KeyedLock::new(),
            global: RwLock::new(()),
            counters: Counters::default(),
        }
    }

    /// Open the snapshot store at `root` and build a provider over it
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Store` if the root directory cannot be created.
    pub async fn open(
        root: impl Into<std::path::PathBuf>,
        config: ProviderConfig,
    ) -> ProviderResult<Self> {
        let store = BinaryStore::open(root).await?;
        Ok(Self::new(store, config))
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn store(&self) -> &BinaryStore {
        &self.store
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    /// Collection of `entity_type` records for `dataset`
    ///
    /// `loader` produces the authoritative records on a snapshot miss. It may
    /// be called a second time if the snapshot it produced cannot be read back,
    /// so it must be deterministic and free of side effects.
    ///
    /// A loader may itself call `get_data` for other entity types of the same
    /// dataset; the nested call runs under the locks already held. Tasks the
    /// loader spawns do not inherit those locks.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Upstream` with the loader's error, unchanged
    /// - `ProviderError::Fatal` when the snapshot cannot be written, or cannot
    ///   be read after one regeneration
    /// - `ProviderError::Store` for identifiers unusable as path segments
    pub async fn get_data<T, F, Fut>(
        &self,
        entity_type: &EntityType,
        dataset: &DatasetRef,
        loader: F,
    ) -> ProviderResult<Collection<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: Fn(&DatasetRef) -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<T>>>,
    {
        dataset.validate()?;
        entity_type.validate()?;

        let held = held_datasets();
        // a loader further up this task already holds the global lock shared
        let _global = if held.is_empty() {
            Some(self.global.read().await)
        } else {
            None
        };
        let key = CacheKey::new(dataset.clone(), entity_type.clone());
        let lock_key = dataset.lock_key();

        if held.contains(&lock_key) {
            if let Some(collection) = self.memory_hit::<T>(&key) {
                debug!("Memory hit for {} inside loader", key);
                return Ok(collection);
            }
            debug!("Reentrant load of {}", key);
            let collection = self
                .load_through_disk(entity_type, dataset, &held, &loader)
                .await?;
            self.memory.put(key, Arc::clone(&collection));
            return Ok(collection);
        }

        loop {
            if let Some(collection) = self.memory_hit::<T>(&key) {
                debug!("Memory hit for {}", key);
                return Ok(collection);
            }
            debug!("Memory miss for {}", key);

            let memory_lock = self.memory_locks.lock_for(&lock_key);
            let _memory_guard =
                match tokio::time::timeout(self.config.lock_timeout, memory_lock.write_owned()).await
                {
                    Ok(guard) => guard,
                    Err(_) => {
                        self.counters.lock_timeouts.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            "Timed out after {:?} waiting for memory lock of {}, retrying",
                            self.config.lock_timeout, dataset
                        );
                        continue;
                    }
                };

            // another caller may have populated the slot while we waited
            if let Some(collection) = self.memory_hit::<T>(&key) {
                debug!("Memory hit for {} after lock wait", key);
                return Ok(collection);
            }

            let disk_lock = self.disk_locks.lock_for(&lock_key);
            let _disk_guard = disk_lock.write_owned().await;

            let collection = self
                .load_through_disk(entity_type, dataset, &held, &loader)
                .await?;
            self.memory.put(key, Arc::clone(&collection));
            return Ok(collection);
        }
    }

    /// Typed convenience over [`DataProvider::get_data`]
    pub async fn get<T, F, Fut>(&self, dataset: &DatasetRef, loader: F) -> ProviderResult<Collection<T>>
    where
        T: Entity,
        F: Fn(&DatasetRef) -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<T>>>,
    {
        self.get_data(&T::entity_type(), dataset, loader).await
    }

    /// Drop every cached collection and snapshot
    ///
    /// Waits for in-flight loads to finish and blocks new ones until done.
    /// Returns the number of snapshot files removed. Memory entries are
    /// dropped even when removing the snapshots fails.
    pub async fn invalidate_all(&self) -> ProviderResult<usize> {
        let _global = self.global.write().await;
        let _guards = self.lock_datasets(|_| true).await;

        let evicted = self.memory.remove_matching(|_| true);
        let removed = self
            .store
            .clear(None, None)
            .await
            .map_err(|source| invalidation_error("all datasets", source))?;

        info!(
            "Invalidated all datasets: {} snapshots removed, {} memory entries dropped",
            removed, evicted
        );
        Ok(removed)
    }

    /// Drop every cached collection and snapshot of one namespace
    pub async fn invalidate_namespace(&self, namespace: &str) -> ProviderResult<usize> {
        validate_segment("dataset namespace", namespace)?;

        let _global = self.global.write().await;
        let _guards = self.lock_datasets(|key| key.namespace == namespace).await;

        let evicted = self
            .memory
            .remove_matching(|key| key.dataset.namespace == namespace);
        let removed = self
            .store
            .clear(Some(namespace), None)
            .await
            .map_err(|source| invalidation_error(&format!("namespace {}", namespace), source))?;

        info!(
            "Invalidated namespace {}: {} snapshots removed, {} memory entries dropped",
            namespace, removed, evicted
        );
        Ok(removed)
    }

    /// Drop every cached collection and snapshot of one dataset
    ///
    /// Requests for other datasets keep running while this executes.
    pub async fn invalidate_dataset(&self, dataset: &DatasetRef) -> ProviderResult<usize> {
        dataset.validate()?;

        let _global = self.global.read().await;
        let lock_key = dataset.lock_key();
        let _memory_guard = self.memory_locks.lock_for(&lock_key).write_owned().await;
        let _disk_guard = self.disk_locks.lock_for(&lock_key).write_owned().await;

        let evicted = self.memory.remove_matching(|key| key.belongs_to(dataset));
        let removed = self
            .store
            .clear(Some(&dataset.namespace), Some(&dataset.id))
            .await
            .map_err(|source| invalidation_error(&format!("dataset {}", dataset), source))?;

        info!(
            "Invalidated dataset {}: {} snapshots removed, {} memory entries dropped",
            dataset, removed, evicted
        );
        Ok(removed)
    }

    pub fn stats(&self) -> ProviderStats {
        ProviderStats {
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            disk_reads: self.counters.disk_reads.load(Ordering::Relaxed),
            loader_invocations: self.counters.loader_invocations.load(Ordering::Relaxed),
            corruption_recoveries: self.counters.corruption_recoveries.load(Ordering::Relaxed),
            lock_timeouts: self.counters.lock_timeouts.load(Ordering::Relaxed),
            known_datasets: self.memory_locks.len(),
            memory: self.memory.stats(),
        }
    }

    /// Resident, non-empty collection for `key`
    ///
    /// An empty collection counts as a miss and is served from its snapshot.
    fn memory_hit<T>(&self, key: &CacheKey) -> Option<Collection<T>>
    where
        T: Send + Sync + 'static,
    {
        let handle = self.memory.get_or_create_placeholder(key);
        let collection = self.memory.resolve::<T>(&handle)?;
        if collection.is_empty() {
            return None;
        }
        self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
        Some(collection)
    }

    /// Read the snapshot, creating it first if needed; caller holds the disk lock
    async fn load_through_disk<T, F, Fut>(
        &self,
        entity_type: &EntityType,
        dataset: &DatasetRef,
        held: &HashSet<DatasetKey>,
        loader: &F,
    ) -> ProviderResult<Collection<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: Fn(&DatasetRef) -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<T>>>,
    {
        let path = self.store.path_for(entity_type, dataset)?;

        if !self.store.exists(&path).await {
            debug!("No snapshot for {} of {}, loading", entity_type, dataset);
            self.populate(&path, entity_type, dataset, held, loader).await?;
        }

        match self.store.read::<T>(&path, entity_type, dataset).await {
            Ok(records) => {
                self.counters.disk_reads.fetch_add(1, Ordering::Relaxed);
                Ok(Arc::new(records))
            }
            Err(first) => {
                warn!(
                    "Snapshot for {} of {} unreadable ({}), regenerating",
                    entity_type, dataset, first
                );
                self.counters
                    .corruption_recoveries
                    .fetch_add(1, Ordering::Relaxed);

                self.populate(&path, entity_type, dataset, held, loader).await?;
                match self.store.read::<T>(&path, entity_type, dataset).await {
                    Ok(records) => {
                        self.counters.disk_reads.fetch_add(1, Ordering::Relaxed);
                        Ok(Arc::new(records))
                    }
                    Err(source) => {
                        error!(
                            "Snapshot for {} of {} still unreadable after regeneration: {}",
                            entity_type, dataset, source
                        );
                        Err(fatal_error(entity_type, dataset, source))
                    }
                }
            }
        }
    }

    async fn populate<T, F, Fut>(
        &self,
        path: &std::path::Path,
        entity_type: &EntityType,
        dataset: &DatasetRef,
        held: &HashSet<DatasetKey>,
        loader: &F,
    ) -> ProviderResult<()>
    where
        T: Serialize,
        F: Fn(&DatasetRef) -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<T>>>,
    {
        self.counters
            .loader_invocations
            .fetch_add(1, Ordering::Relaxed);
        let mut scope = held.clone();
        scope.insert(dataset.lock_key());
        let records = HELD_DATASETS
            .scope(scope, loader(dataset))
            .await
            .map_err(ProviderError::Upstream)?;

        self.store
            .write(path, entity_type, dataset, &records)
            .await
            .map_err(|source| {
                error!(
                    "Failed to write snapshot for {} of {}: {}",
                    entity_type, dataset, source
                );
                fatal_error(entity_type, dataset, source)
            })
    }

    /// Exclusive memory and disk locks of every known dataset matching `predicate`
    async fn lock_datasets<P>(&self, predicate: P) -> Vec<OwnedRwLockWriteGuard<()>>
    where
        P: Fn(&DatasetKey) -> bool,
    {
        let mut guards = Vec::new();
        for (_, lock) in self.memory_locks.matching(&predicate) {
            guards.push(lock.write_owned().await);
        }
        for (_, lock) in self.disk_locks.matching(&predicate) {
            guards.push(lock.write_owned().await);
        }
        guards
    }
}

fn fatal_error(entity_type: &EntityType, dataset: &DatasetRef, source: StoreError) -> ProviderError {
    ProviderError::Fatal {
        dataset: dataset.to_string(),
        entity_type: entity_type.to_string(),
        source,
    }
}

fn invalidation_error(scope: &str, source: StoreError) -> ProviderError {
    error!("Invalidation of {} failed: {}", scope, source);
    ProviderError::Invalidation {
        scope: scope.to_string(),
        source,
    }
}

impl std::fmt::Debug for DataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataProvider")
            .field("root", &self.store.root())
            .field("config", &self.config)
            .field("known_datasets", &self.memory_locks.len())
            .finish()
    }
}
