//! Reclaimable in-process cache tier
//!
//! Every [`CacheKey`] maps to a slot. A slot may be empty (a placeholder), or
//! hold a type-erased collection. Residents can disappear at any time: they
//! are evicted least-recently-used when the tier grows beyond `max_entries`,
//! dropped once older than `ttl`, and dropped wholesale by
//! [`MemoryCache::reclaim_all`]. Callers treat an empty slot exactly like a
//! miss and fall back to the disk tier.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::models::{CacheKey, Collection};
use crate::constants::memory;

/// Memory tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Maximum number of resident collections (0 = keep nothing)
    pub max_entries: usize,
    /// Age after which a resident collection is dropped
    #[serde(default, with = "humantime_serde")]
    pub ttl: Option<Duration>,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: memory::DEFAULT_MAX_ENTRIES,
            ttl: None,
        }
    }
}

impl MemoryCacheConfig {
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

struct Resident {
    value: Arc<dyn Any + Send + Sync>,
    stored_at: Instant,
}

/// Cell shared by every caller that asked for the same key
pub struct CacheSlot {
    resident: RwLock<Option<Resident>>,
    last_access: AtomicU64,
}

impl CacheSlot {
    fn empty() -> Self {
        Self {
            resident: RwLock::new(None),
            last_access: AtomicU64::new(0),
        }
    }

    /// Whether a collection is currently held
    pub fn is_resident(&self) -> bool {
        self.resident.read().is_some()
    }

    fn clear(&self) -> bool {
        self.resident.write().take().is_some()
    }
}

/// Handle on a slot; stays valid after the slot is evicted, but then resolves to nothing
pub type SlotHandle = Arc<CacheSlot>;

/// Counters describing memory tier behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub slots: usize,
    pub resident: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl MemoryStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Best-effort cache from [`CacheKey`] to collections
pub struct MemoryCache {
    config: MemoryCacheConfig,
    slots: DashMap<CacheKey, SlotHandle>,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl MemoryCache {
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            config,
            slots: DashMap::new(),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &MemoryCacheConfig {
        &self.config
    }

    /// Slot for `key`, inserting an empty placeholder if there is none
    pub fn get_or_create_placeholder(&self, key: &CacheKey) -> SlotHandle {
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(slot.value());
        }
        Arc::clone(
            self.slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(CacheSlot::empty()))
                .value(),
        )
    }

    /// Collection held by `handle`, if it is still resident and of type `T`
    pub fn resolve<T>(&self, handle: &CacheSlot) -> Option<Collection<T>>
    where
        T: Send + Sync + 'static,
    {
        let found = {
            let resident = handle.resident.read();
            match resident.as_ref() {
                Some(r) if self.is_expired(r) => None,
                Some(r) => Arc::clone(&r.value).downcast::<Vec<T>>().ok(),
                None => None,
            }
        };

        match found {
            Some(collection) => {
                handle.last_access.store(self.tick(), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(collection)
            }
            None => {
                if self.expire_slot(handle) {
                    self.expirations.fetch_add(1, Ordering::Relaxed);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `collection` under `key`, evicting the least recently used
    /// residents if the tier is over capacity
    pub fn put<T>(&self, key: CacheKey, collection: Collection<T>)
    where
        T: Send + Sync + 'static,
    {
        let slot = self.get_or_create_placeholder(&key);
        {
            let mut resident = slot.resident.write();
            *resident = Some(Resident {
                value: collection,
                stored_at: Instant::now(),
            });
        }
        slot.last_access.store(self.tick(), Ordering::Relaxed);
        debug!("Memory tier stored {}", key);

        self.enforce_capacity();
    }

    /// Remove every slot whose key satisfies `predicate`
    ///
    /// Removed slots are emptied first, so outstanding handles resolve to a miss.
    pub fn remove_matching<P>(&self, predicate: P) -> usize
    where
        P: Fn(&CacheKey) -> bool,
    {
        let mut removed = 0;
        self.slots.retain(|key, slot| {
            if predicate(key) {
                slot.clear();
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Drop residents older than the configured TTL
    pub fn purge_expired(&self) -> usize {
        if self.config.ttl.is_none() {
            return 0;
        }

        let mut purged = 0;
        for entry in self.slots.iter() {
            if self.expire_slot(entry.value()) {
                purged += 1;
            }
        }
        self.expirations.fetch_add(purged as u64, Ordering::Relaxed);
        purged
    }

    /// Drop every resident collection while keeping the placeholders
    pub fn reclaim_all(&self) -> usize {
        let reclaimed = self
            .slots
            .iter()
            .filter(|entry| entry.value().clear())
            .count();
        self.evictions.fetch_add(reclaimed as u64, Ordering::Relaxed);
        reclaimed
    }

    /// Number of slots, resident or not
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn resident_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().is_resident())
            .count()
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            slots: self.len(),
            resident: self.resident_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn is_expired(&self, resident: &Resident) -> bool {
        self.config
            .ttl
            .is_some_and(|ttl| resident.stored_at.elapsed() >= ttl)
    }

    fn expire_slot(&self, slot: &CacheSlot) -> bool {
        let mut resident = slot.resident.write();
        if resident.as_ref().is_some_and(|r| self.is_expired(r)) {
            *resident = None;
            true
        } else {
            false
        }
    }

    fn enforce_capacity(&self) {
        let mut residents: Vec<(u64, SlotHandle)> = self
            .slots
            .iter()
            .filter(|entry| entry.value().is_resident())
            .map(|entry| {
                (
                    entry.value().last_access.load(Ordering::Relaxed),
                    Arc::clone(entry.value()),
                )
            })
            .collect();

        if residents.len() <= self.config.max_entries {
            return;
        }

        residents.sort_by_key(|(tick, _)| *tick);
        let excess = residents.len() - self.config.max_entries;
        let mut evicted = 0u64;
        for (_, slot) in residents.into_iter().take(excess) {
            if slot.clear() {
                evicted += 1;
            }
        }
        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        debug!("Memory tier evicted {} collections", evicted);
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(MemoryCacheConfig::default())
    }
}
