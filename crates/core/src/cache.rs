//! Memoizing cache for expensive, effectively-constant queries
//!
//! Hardware identity (CPU model, GPU names, total memory) never changes while
//! the process runs, but some of it is slow to obtain. `SampleCache` computes
//! each key at most once and hands out clones afterwards. There is no eviction;
//! `reset()` drops everything at once.

use once_cell::sync::OnceCell;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe single-flight cache.
///
/// Each key maps to its own `OnceCell`, so a slow computation for one key
/// never holds the map lock and never blocks readers of other keys.
pub struct SampleCache<V = Value> {
    entries: RwLock<HashMap<String, Arc<OnceCell<V>>>>,
}

impl<V: Clone> SampleCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached value for `key`, running `compute` if this is the
    /// first request.
    ///
    /// Concurrent callers for the same uncached key wait for the single
    /// in-progress computation and all receive its result.
    pub fn get_or_compute<F>(&self, key: &str, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        self.cell(key).get_or_init(compute).clone()
    }

    /// Cached value without computing anything
    pub fn get(&self, key: &str) -> Option<V> {
        self.read_entries()
            .get(key)
            .and_then(|cell| cell.get().cloned())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of computed entries
    pub fn len(&self) -> usize {
        self.read_entries()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. A computation still running keeps its own cell and
    /// its result is not visible after the reset.
    pub fn reset(&self) {
        let mut entries = self.write_entries();
        let dropped = entries.len();
        entries.clear();
        log::debug!("Sample cache reset ({} entries dropped)", dropped);
    }

    fn cell(&self, key: &str) -> Arc<OnceCell<V>> {
        // Phase 1: existing cell (read lock)
        if let Some(cell) = self.read_entries().get(key) {
            return Arc::clone(cell);
        }

        // Phase 2: insert, re-checking under the write lock in case another
        // thread created it in between
        let mut entries = self.write_entries();
        Arc::clone(
            entries
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        )
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<OnceCell<V>>>> {
        // Recover from a poisoned lock - entries are write-once so still valid
        self.entries.read().unwrap_or_else(|poisoned| {
            log::warn!("Sample cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<OnceCell<V>>>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            log::warn!("Sample cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl<V: Clone> Default for SampleCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
