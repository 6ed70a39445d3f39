//! Per-key lock registry
//!
//! One `RwLock` is created lazily for every key and lives for the rest of the
//! process. Get-or-create goes through the sharded map's entry API, so two
//! callers racing on a new key always receive the same lock without a
//! registry-wide mutex.
//!
//! Entries are never evicted; the registry is bounded by the number of
//! distinct datasets touched, which is small compared to request volume.
//!
//! The locks themselves are not reentrant. The provider tracks which
//! datasets a task already holds and skips re-acquiring them.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;

/// Registry handing out one shared/exclusive lock per key
pub struct KeyedLock<K>
where
    K: Eq + Hash,
{
    locks: DashMap<K, Arc<RwLock<()>>>,
}

impl<K> KeyedLock<K>
where
    K: Eq + Hash + Clone + Ord,
{
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Lock for `key`, created on first request
    pub fn lock_for(&self, key: &K) -> Arc<RwLock<()>> {
        if let Some(existing) = self.locks.get(key) {
            return Arc::clone(existing.value());
        }

        Arc::clone(
            self.locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(RwLock::new(())))
                .value(),
        )
    }

    /// Registered locks whose key satisfies `predicate`, sorted by key
    ///
    /// Callers acquiring several locks must do so in the returned order.
    pub fn matching<P>(&self, predicate: P) -> Vec<(K, Arc<RwLock<()>>)>
    where
        P: Fn(&K) -> bool,
    {
        let mut matched: Vec<(K, Arc<RwLock<()>>)> = self
            .locks
            .iter()
            .filter(|entry| predicate(entry.key()))
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        matched.sort_by(|a, b| a.0.cmp(&b.0));
        matched
    }

    /// Number of keys seen so far
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<K> Default for KeyedLock<K>
where
    K: Eq + Hash + Clone + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for KeyedLock<K>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedLock")
            .field("keys", &self.locks.len())
            .finish()
    }
}
