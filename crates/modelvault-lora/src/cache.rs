//! Decoded adapter cache
//!
//! Keeps the most recently *inserted* adapters decoded in memory. Eviction
//! is first-in first-out: reading an entry never moves it, so an adapter
//! used on every request is still evicted once enough new ones arrive.

use crate::adapter::AdapterWeights;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Default number of cached adapters
pub const DEFAULT_MAX_ENTRIES: usize = 5;

/// Cached adapter payload
#[derive(Debug, Clone)]
pub struct CachedWeight {
    pub path: PathBuf,
    pub payload: Arc<AdapterWeights>,
    /// Insertion sequence number
    pub sequence: u64,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total lookups
    pub lookups: u64,
    /// Cache hits
    pub hits: u64,
    /// Cache misses
    pub misses: u64,
    /// Insertions
    pub insertions: u64,
    /// Evictions
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: VecDeque<CachedWeight>,
    next_sequence: u64,
    stats: CacheStats,
}

/// Bounded FIFO cache of decoded adapters, keyed by file path
#[derive(Debug)]
pub struct WeightCache {
    max_entries: usize,
    inner: Mutex<Inner>,
}

impl WeightCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Cached payload for `path`
    pub fn get(&self, path: &Path) -> Option<Arc<AdapterWeights>> {
        let mut inner = self.inner.lock();
        inner.stats.lookups += 1;

        let found = inner
            .entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| Arc::clone(&e.payload));
        if found.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        found
    }

    /// Insert a payload and evict the oldest entries while over capacity.
    ///
    /// Returns the payload now cached for `path` (an earlier admission wins
    /// when two callers race) and the evicted paths.
    pub fn admit(
        &self,
        path: PathBuf,
        payload: Arc<AdapterWeights>,
    ) -> (Arc<AdapterWeights>, Vec<PathBuf>) {
        let mut inner = self.inner.lock();

        if let Some(existing) = inner.entries.iter().find(|e| e.path == path) {
            return (Arc::clone(&existing.payload), Vec::new());
        }

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.entries.push_back(CachedWeight {
            path,
            payload: Arc::clone(&payload),
            sequence,
        });
        inner.stats.insertions += 1;

        let mut evicted = Vec::new();
        while inner.entries.len() > self.max_entries {
            if let Some(oldest) = inner.entries.pop_front() {
                debug!(sequence = oldest.sequence, "Evicting {:?}", oldest.path);
                inner.stats.evictions += 1;
                evicted.push(oldest.path);
            }
        }

        (payload, evicted)
    }

    /// Check if a path is cached
    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock().entries.iter().any(|e| e.path == path)
    }

    /// Cached paths, oldest first
    pub fn paths(&self) -> Vec<PathBuf> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|e| e.path.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Clear all cached entries
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }
}

impl Default for WeightCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}
