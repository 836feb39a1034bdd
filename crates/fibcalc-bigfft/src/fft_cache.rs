//! Thread-safe LRU cache of forward transforms.
//!
//! Doubling loops transform operands that change slowly from one step to
//! the next and frequently transform the same value twice in one step, so
//! point-value forms are worth keeping. Entries are deep copies; callers
//! never share a buffer with the cache.
//!
//! The key hash only narrows the search. Each entry keeps the operand words
//! it was computed from, and a lookup hits only when those words match.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::RwLock;
use tracing::debug;

use crate::fft_poly::PolValues;

/// Default entry bound.
pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// Operands shorter than this many bits are never cached.
pub const DEFAULT_MIN_BIT_LEN: usize = 100_000;

/// Cache knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Whether lookups and inserts happen at all.
    pub enabled: bool,
    /// Maximum number of retained transforms.
    pub max_entries: usize,
    /// Minimum operand bit length worth caching.
    pub min_bit_len: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            min_bit_len: DEFAULT_MIN_BIT_LEN,
        }
    }
}

/// Content hash plus transform shape. Equal keys may still belong to
/// different operands; see [`TransformCache::lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransformKey {
    hash: u64,
    words: usize,
    k: u32,
    m: usize,
    n: usize,
}

impl TransformKey {
    /// Key for transforming `words`, cut into `m`-word chunks, with order `k`
    /// into a ring of width `n`.
    #[must_use]
    pub fn new(words: &[u64], k: u32, m: usize, n: usize) -> Self {
        let mut hash = FNV_OFFSET;
        hash = fnv1a(hash, u64::from(k));
        hash = fnv1a(hash, m as u64);
        hash = fnv1a(hash, n as u64);
        for &w in words {
            hash = fnv1a(hash, w);
        }
        Self {
            hash,
            words: words.len(),
            k,
            m,
            n,
        }
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(mut hash: u64, word: u64) -> u64 {
    for byte in word.to_le_bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries displaced by newer ones.
    pub evictions: u64,
    /// Entries currently held.
    pub size: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0.0 when there were none.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CachedTransform {
    source: Box<[u64]>,
    values: PolValues,
}

/// Bounded LRU map from [`TransformKey`] to point-value forms.
pub struct TransformCache {
    config: RwLock<CacheConfig>,
    entries: RwLock<LruCache<TransformKey, CachedTransform>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl TransformCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity(config.max_entries))),
            config: RwLock::new(config),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> CacheConfig {
        *self.config.read()
    }

    /// Whether an operand of `bits` bits should go through the cache.
    #[must_use]
    pub fn accepts(&self, bits: usize) -> bool {
        let config = self.config.read();
        config.enabled && bits >= config.min_bit_len
    }

    /// Look up the transform of `words` under `key` and hand it to `copy`
    /// while it is pinned. An entry whose source words differ from `words`
    /// is a miss.
    ///
    /// The read lock covers the copy; recency is updated afterwards under
    /// a short write lock.
    pub fn lookup<R>(
        &self,
        key: &TransformKey,
        words: &[u64],
        copy: impl FnOnce(&PolValues) -> R,
    ) -> Option<R> {
        let found = {
            let entries = self.entries.read();
            entries
                .peek(key)
                .filter(|entry| *entry.source == *words)
                .map(|entry| copy(&entry.values))
        };
        match found {
            Some(out) => {
                self.entries.write().promote(key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(out)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Deep copy of the transform of `words` stored under `key`.
    pub fn get(&self, key: &TransformKey, words: &[u64]) -> Option<PolValues> {
        self.lookup(key, words, PolValues::clone)
    }

    /// Store deep copies of `words` and their transform `values` under `key`.
    ///
    /// A different operand already held under the same key is replaced.
    pub fn put(&self, key: TransformKey, words: &[u64], values: &PolValues) {
        if !self.config.read().enabled {
            return;
        }
        let entry = CachedTransform {
            source: words.into(),
            values: values.clone(),
        };
        let displaced = self.entries.write().push(key, entry);
        if let Some((old, _)) = displaced {
            if old != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and zero the counters.
    pub fn clear(&self) {
        self.entries.write().clear();
        self.reset_stats();
    }

    /// Apply a new configuration, shrinking or clearing as needed.
    pub fn reconfigure(&self, config: CacheConfig) {
        let mut entries = self.entries.write();
        let before = entries.len();
        if config.enabled {
            entries.resize(capacity(config.max_entries));
        } else {
            entries.clear();
        }
        let dropped = before.saturating_sub(entries.len());
        self.evictions.fetch_add(dropped as u64, Ordering::Relaxed);
        *self.config.write() = config;
        debug!(
            enabled = config.enabled,
            max_entries = config.max_entries,
            min_bit_len = config.min_bit_len,
            dropped,
            "transform cache reconfigured"
        );
    }

    /// Snapshot the counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.len(),
        }
    }

    /// Zero the counters.
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for TransformCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformCache")
            .field("config", &self.config())
            .field("stats", &self.stats())
            .finish()
    }
}

fn capacity(max_entries: usize) -> NonZeroUsize {
    NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN)
}
