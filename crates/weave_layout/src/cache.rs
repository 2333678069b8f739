//! Symmetric similarity cache with TTL expiry and LRU eviction.
//!
//! Keys are unordered pairs within a scope, so `(a, b)` and `(b, a)` share
//! one entry. Expired entries are dropped when read; when the cache is full
//! the least recently used entry makes room.

use crate::config::CacheConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use weave_core::{NodeId, SharedClock};

/// Fixed per-entry bookkeeping estimate (map slots, recency index, timestamps).
const ENTRY_OVERHEAD_BYTES: usize = 96;

/// Unordered node pair within a cache scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    scope: String,
    lo: NodeId,
    hi: NodeId,
}

impl PairKey {
    pub fn new(scope: &str, a: &str, b: &str) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self {
            scope: scope.to_string(),
            lo: lo.to_string(),
            hi: hi.to_string(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn ids(&self) -> (&str, &str) {
        (&self.lo, &self.hi)
    }

    fn heap_bytes(&self) -> usize {
        self.scope.len() + self.lo.len() + self.hi.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    value: f64,
    inserted_at: f64,
    touched: u64,
}

/// Cache counters and size snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
    pub expired_count: u64,
    pub size: usize,
    pub capacity: usize,
    pub memory_bytes: usize,
}

impl CacheStatistics {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hit_count + self.miss_count;
        if lookups == 0 {
            0.0
        } else {
            self.hit_count as f64 / lookups as f64
        }
    }
}

pub struct SimilarityCache {
    entries: HashMap<PairKey, CacheEntry>,
    /// touch sequence -> key, oldest first
    recency: BTreeMap<u64, PairKey>,
    next_touch: u64,
    config: CacheConfig,
    clock: SharedClock,
    stats: CacheStatistics,
    key_bytes: usize,
}

impl fmt::Debug for SimilarityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimilarityCache")
            .field("size", &self.entries.len())
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl SimilarityCache {
    pub fn new(clock: SharedClock) -> Self {
        Self::with_config(clock, CacheConfig::default())
    }

    pub fn with_config(clock: SharedClock, config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            next_touch: 0,
            config,
            clock,
            stats: CacheStatistics::default(),
            key_bytes: 0,
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &CacheEntry, now: f64) -> bool {
        now - entry.inserted_at >= self.config.ttl_ms
    }

    fn touch(&mut self, key: &PairKey) {
        let seq = self.next_touch;
        self.next_touch += 1;
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.touched);
            entry.touched = seq;
            self.recency.insert(seq, key.clone());
        }
    }

    fn remove(&mut self, key: &PairKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.touched);
        self.key_bytes -= key.heap_bytes();
        Some(entry)
    }

    /// Cached score for the pair, counting a hit or a miss.
    pub fn get(&mut self, key: &PairKey) -> Option<f64> {
        let now = self.clock.now_ms();
        match self.entries.get(key).copied() {
            Some(entry) if self.is_expired(&entry, now) => {
                self.remove(key);
                self.stats.expired_count += 1;
                self.stats.miss_count += 1;
                None
            }
            Some(entry) => {
                self.touch(key);
                self.stats.hit_count += 1;
                Some(entry.value)
            }
            None => {
                self.stats.miss_count += 1;
                None
            }
        }
    }

    /// Cached score without touching counters or recency.
    pub fn peek(&self, key: &PairKey) -> Option<f64> {
        let now = self.clock.now_ms();
        self.entries
            .get(key)
            .filter(|entry| !self.is_expired(entry, now))
            .map(|entry| entry.value)
    }

    pub fn insert(&mut self, key: PairKey, value: f64) {
        let now = self.clock.now_ms();
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.value = value;
            entry.inserted_at = now;
            self.touch(&key);
            return;
        }
        while self.entries.len() >= self.config.capacity {
            let Some((_, oldest)) = self.recency.pop_first() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&oldest) {
                self.key_bytes -= oldest.heap_bytes();
                self.stats.eviction_count += 1;
                tracing::trace!(scope = oldest.scope(), age_ms = now - entry.inserted_at, "similarity cache eviction");
            }
        }
        let touched = self.next_touch;
        self.next_touch += 1;
        self.key_bytes += key.heap_bytes();
        self.recency.insert(touched, key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                touched,
            },
        );
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let expired: Vec<PairKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        self.stats.expired_count += expired.len() as u64;
        if !expired.is_empty() {
            tracing::debug!(removed = expired.len(), remaining = self.entries.len(), "expired similarity entries removed");
        }
        expired.len()
    }

    /// Drop all entries. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.key_bytes = 0;
    }

    pub fn reset_statistics(&mut self) {
        self.stats = CacheStatistics::default();
    }

    /// Approximate heap usage in bytes.
    pub fn memory_estimate(&self) -> usize {
        self.key_bytes * 2 + self.entries.len() * (ENTRY_OVERHEAD_BYTES + std::mem::size_of::<PairKey>() * 2)
    }

    pub fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            size: self.entries.len(),
            capacity: self.config.capacity,
            memory_bytes: self.memory_estimate(),
            ..self.stats
        }
    }
}
