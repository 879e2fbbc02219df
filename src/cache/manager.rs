//! DataBlock Cache - Public Facade
//!
//! Coordinates the arena, index and eviction policy behind one mutex.
//! Filesystem reads and codec work always run outside the lock; the lock
//! only ever covers in-memory bookkeeping and byte copies.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::arena::Arena;
use super::compression::{Codec, CompressionAlgorithm};
use super::id::BlockId;
use super::index::{BlockEntry, BlockIndex};
use super::metrics::{CacheMetrics, LatencyTracker, MetricsSnapshot};
use super::policy::EvictionPolicy;
use super::stat::{StatCache, DEFAULT_STAT_REFRESH};
use super::DEFAULT_CAPACITY;
use crate::error::{Error, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Arena size in bytes, allocated once
    pub capacity: usize,
    /// Store blocks LZ4-compressed when that makes them smaller
    pub compression: bool,
    /// Memoize existence and directory probes
    pub stat_cache_enabled: bool,
    /// Interval between stat cache flushes (`None` = never)
    pub stat_refresh: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            compression: false,
            stat_cache_enabled: true,
            stat_refresh: Some(DEFAULT_STAT_REFRESH),
        }
    }
}

impl CacheConfig {
    /// Default configuration with the given arena size
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    pub fn with_stat_cache(mut self, enabled: bool) -> Self {
        self.stat_cache_enabled = enabled;
        self
    }

    pub fn with_stat_refresh(mut self, interval: Option<Duration>) -> Self {
        self.stat_refresh = interval;
        self
    }

    /// Reject configurations that can never cache anything
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::Config("cache capacity must be non-zero".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Handles and Stats
// =============================================================================

/// Where a stored block ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockHandle {
    /// Identifier derived from the filename
    pub id: BlockId,
    /// Offset into the arena
    pub offset: usize,
    /// Bytes occupied in the arena
    pub stored_len: usize,
    /// Length before compression
    pub original_len: usize,
    /// Reads served since insertion
    pub popularity: u64,
    /// Stored bytes are compressed
    pub compressed: bool,
}

impl BlockHandle {
    fn from_entry(id: BlockId, entry: &BlockEntry) -> Self {
        Self {
            id,
            offset: entry.offset,
            stored_len: entry.stored_len,
            original_len: entry.original_len,
            popularity: entry.popularity,
            compressed: entry.compressed,
        }
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Arena capacity in bytes
    pub capacity: usize,
    /// Bytes in use (the arena tail)
    pub used: usize,
    /// Bytes available
    pub free: usize,
    /// Resident blocks
    pub entries: usize,
    /// Compression algorithm for new stores
    pub compression: CompressionAlgorithm,
    /// Memoized stat answers
    pub stat_entries: usize,
    /// Counter totals
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
}

impl CacheStats {
    /// Fraction of the arena in use (0.0 - 1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.used as f64 / self.capacity as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DataBlock cache")?;
        writeln!(f, "  capacity:     {} bytes", self.capacity)?;
        writeln!(
            f,
            "  used:         {} bytes ({:.1}%)",
            self.used,
            self.utilization() * 100.0
        )?;
        writeln!(f, "  free:         {} bytes", self.free)?;
        writeln!(f, "  entries:      {}", self.entries)?;
        writeln!(f, "  compression:  {}", self.compression)?;
        writeln!(
            f,
            "  hits:         {} (ratio {:.3})",
            self.counters.hits, self.counters.hit_ratio
        )?;
        writeln!(f, "  misses:       {}", self.counters.misses)?;
        writeln!(f, "  stores:       {}", self.counters.stores)?;
        writeln!(f, "  evictions:    {}", self.counters.evictions)?;
        writeln!(f, "  removals:     {}", self.counters.removals)?;
        writeln!(f, "  disk reads:   {}", self.counters.disk_reads)?;
        writeln!(f, "  read latency: {}us", self.counters.read_latency_us)?;
        write!(f, "  stat entries: {}", self.stat_entries)
    }
}

// =============================================================================
// Locked State
// =============================================================================

/// Everything the cache mutex guards
#[derive(Debug)]
struct CacheState {
    arena: Arena,
    index: BlockIndex,
    /// Set on the first store that needed eviction; reset by clear
    full_warned: bool,
}

impl CacheState {
    fn new(capacity: usize) -> Self {
        Self {
            arena: Arena::new(capacity),
            index: BlockIndex::new(),
            full_warned: false,
        }
    }

    /// Bump popularity and copy the stored bytes out
    ///
    /// Returns (stored_bytes, compressed, seq).
    fn lookup(&mut self, id: &BlockId) -> Option<(Bytes, bool, u64)> {
        let entry = self.index.get_mut(id)?;
        entry.record_access();
        let (offset, len, compressed) = (entry.offset, entry.stored_len, entry.compressed);
        let seq = entry.seq();
        Some((
            Bytes::copy_from_slice(self.arena.slice(offset, len)),
            compressed,
            seq,
        ))
    }

    /// Shift survivors left so `[0, tail)` is again exactly their union
    fn compact(&mut self) {
        let mut cursor = 0;
        for id in self.index.by_offset() {
            if let Some(entry) = self.index.get_mut(&id) {
                if entry.offset != cursor {
                    self.arena.overwrite(cursor, entry.offset, entry.stored_len);
                    entry.offset = cursor;
                }
                cursor += entry.stored_len;
            }
        }
        self.arena.shrink(cursor);
    }

    /// Remove an entry and tighten the arena
    fn remove(&mut self, id: &BlockId) -> Option<BlockEntry> {
        let removed = self.index.delete(id)?;
        self.compact();
        Some(removed)
    }

    /// Remove `id` only if it is still the entry stamped `seq`
    fn remove_if_current(&mut self, id: &BlockId, seq: u64) -> Option<BlockEntry> {
        if self.index.get(id)?.seq() != seq {
            return None;
        }
        self.remove(id)
    }

    fn clear(&mut self) {
        self.index.clear();
        self.arena.clear();
        self.full_warned = false;
    }
}

// =============================================================================
// Cache Facade
// =============================================================================

/// Bounded file content cache over a single contiguous byte arena
pub struct DataBlockCache {
    state: Mutex<CacheState>,
    policy: EvictionPolicy,
    codec: Codec,
    metrics: CacheMetrics,
    stat: StatCache,
    config: CacheConfig,
}

impl DataBlockCache {
    /// Create a cache; the arena is allocated here and never grows
    pub fn new(config: CacheConfig) -> Self {
        debug!(
            capacity = config.capacity,
            compression = config.compression,
            stat_cache = config.stat_cache_enabled,
            "Creating DataBlock cache"
        );
        Self {
            state: Mutex::new(CacheState::new(config.capacity)),
            policy: EvictionPolicy::default(),
            codec: Codec::new(CompressionAlgorithm::from_enabled(config.compression)),
            metrics: CacheMetrics::new(),
            stat: StatCache::new(config.stat_cache_enabled, config.stat_refresh),
            config,
        }
    }

    /// Create a cache after validating the configuration
    pub fn try_new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Cache of `capacity` bytes with every other setting at its default
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(CacheConfig::new(capacity))
    }

    /// Return the contents of `filename`
    ///
    /// Hits bump the block's popularity. On a miss, `allow_disk` decides
    /// between `NotCached` and reading the file, which is then offered to
    /// [`DataBlockCache::store`]. The file's bytes are returned even if that
    /// store fails.
    pub fn read(&self, filename: &str, allow_disk: bool) -> Result<Bytes> {
        let tracker = LatencyTracker::start();
        let id = BlockId::from_name(filename);

        let hit = self.state.lock().lookup(&id);
        if let Some((stored, compressed, seq)) = hit {
            self.metrics.record_hit();
            return match self.codec.decode(stored, compressed) {
                Ok(data) => {
                    trace!(file = filename, id = %id, len = data.len(), "Cache hit");
                    self.metrics.record_read_latency(tracker.elapsed());
                    Ok(data)
                }
                Err(e) => {
                    warn!("Dropping undecodable block for {}: {}", filename, e);
                    // A concurrent store may have replaced the block meanwhile
                    if self.state.lock().remove_if_current(&id, seq).is_some() {
                        self.metrics.record_removal();
                    }
                    Err(e)
                }
            };
        }

        self.metrics.record_miss();
        if !allow_disk {
            return Err(Error::NotCached {
                name: filename.to_string(),
            });
        }

        let data = Bytes::from(read_file(filename)?);
        self.metrics.record_disk_read();

        if let Err(e) = self.store(filename, &data) {
            debug!("Serving {} uncached: {}", filename, e);
        }
        Ok(data)
    }

    /// Copy `data` into the arena under `filename`
    ///
    /// Fails with `AlreadyStored` (nothing changes) when identical bytes are
    /// resident, `TooLarge` when the encoded block exceeds the capacity, or a
    /// codec error. Different bytes under the same name replace the old block.
    pub fn store(&self, filename: &str, data: &[u8]) -> Result<BlockHandle> {
        let id = BlockId::from_name(filename);
        let (stored, compressed) = self.codec.encode(data)?;
        let capacity = self.config.capacity;

        if stored.len() > capacity {
            self.metrics.record_rejected();
            return Err(Error::TooLarge {
                size: stored.len(),
                capacity,
            });
        }

        let mut state = self.state.lock();

        if let Some(existing) = state.index.get(&id) {
            let same = existing.compressed == compressed
                && state.arena.slice(existing.offset, existing.stored_len) == stored.as_ref();
            if same {
                self.metrics.record_already_stored();
                return Err(Error::AlreadyStored {
                    name: filename.to_string(),
                });
            }
            debug!(file = filename, id = %id, "Replacing changed block");
            state.remove(&id);
        }

        if state.arena.free() < stored.len() {
            let plan = self
                .policy
                .plan(&state.index, capacity, state.arena.tail(), stored.len())
                .ok_or(Error::TooLarge {
                    size: stored.len(),
                    capacity,
                })?;

            if !state.full_warned {
                state.full_warned = true;
                warn!(
                    capacity,
                    entries = state.index.len(),
                    "DataBlock cache is full, evicting least popular blocks"
                );
            }

            for victim in &plan.victims {
                state.index.delete(victim);
            }
            state.compact();
            self.metrics.record_evictions(plan.len() as u64);
            debug!(
                victims = plan.len(),
                freed = plan.freed,
                tail = state.arena.tail(),
                "Evicted blocks"
            );
        }

        let (offset, stored_len) = state.arena.append(&stored).ok_or(Error::TooLarge {
            size: stored.len(),
            capacity,
        })?;
        let entry = BlockEntry::new(offset, stored_len, data.len(), compressed);
        let handle = BlockHandle::from_entry(id, &entry);
        state.index.put(id, entry);
        drop(state);

        self.metrics.record_store();
        debug!(
            file = filename,
            id = %id,
            offset,
            stored_len,
            original_len = data.len(),
            compressed,
            "Stored block"
        );
        Ok(handle)
    }

    /// Drop `filename` from the cache and compact; absent names are fine
    ///
    /// Returns whether a block was removed.
    pub fn remove(&self, filename: &str) -> bool {
        let id = BlockId::from_name(filename);
        let removed = self.state.lock().remove(&id).is_some();
        if removed {
            self.metrics.record_removal();
            debug!(file = filename, id = %id, "Removed block");
        }
        removed
    }

    /// Drop every block and re-arm the full warning
    pub fn clear(&self) {
        self.state.lock().clear();
        debug!("Cleared DataBlock cache");
    }

    /// Snapshot of sizes and counters
    pub fn stats(&self) -> CacheStats {
        let (used, entries) = {
            let state = self.state.lock();
            (state.arena.tail(), state.index.len())
        };
        CacheStats {
            capacity: self.config.capacity,
            used,
            free: self.config.capacity - used,
            entries,
            compression: self.codec.algorithm(),
            stat_entries: self.stat.len(),
            counters: self.metrics.snapshot(),
        }
    }

    /// True iff no block is resident
    pub fn is_empty(&self) -> bool {
        self.state.lock().index.is_empty()
    }

    /// Number of resident blocks
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    /// Whether `filename` is resident
    pub fn contains(&self, filename: &str) -> bool {
        self.state.lock().index.contains(&BlockId::from_name(filename))
    }

    /// Placement of `filename`, if resident
    pub fn handle(&self, filename: &str) -> Option<BlockHandle> {
        let id = BlockId::from_name(filename);
        let state = self.state.lock();
        state
            .index
            .get(&id)
            .map(|entry| BlockHandle::from_entry(id, entry))
    }

    /// Every resident block, ordered by arena offset
    pub fn layout(&self) -> Vec<BlockHandle> {
        let state = self.state.lock();
        state
            .index
            .by_offset()
            .into_iter()
            .filter_map(|id| {
                state
                    .index
                    .get(&id)
                    .map(|entry| BlockHandle::from_entry(id, entry))
            })
            .collect()
    }

    /// Copy of the arena's used prefix `[0, tail)`
    pub fn arena_bytes(&self) -> Vec<u8> {
        let state = self.state.lock();
        state.arena.slice(0, state.arena.tail()).to_vec()
    }

    /// Arena capacity in bytes
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Configuration the cache was built with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Existence / directory probe cache
    pub fn stat_cache(&self) -> &StatCache {
        &self.stat
    }

    /// Live counters
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Check arena/index invariants; used by tests
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let state = self.state.lock();
        let tail = state.arena.tail();
        assert!(tail <= state.arena.capacity());

        let mut cursor = 0;
        for id in state.index.by_offset() {
            let entry = state.index.get(&id).unwrap();
            assert_eq!(entry.offset, cursor, "gap or overlap before {}", id);
            assert!(entry.end() <= tail);
            cursor = entry.end();
        }
        assert_eq!(cursor, tail, "stored lengths do not sum to tail");
        assert_eq!(state.index.stored_bytes(), tail);
    }

    #[cfg(test)]
    pub(crate) fn full_warned(&self) -> bool {
        self.state.lock().full_warned
    }
}

impl fmt::Debug for DataBlockCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataBlockCache")
            .field("config", &self.config)
            .field("policy", &self.policy.name)
            .field("codec", &self.codec)
            .finish()
    }
}

/// Read a whole file, mapping a missing file to `NotFound`
fn read_file(filename: &str) -> Result<Vec<u8>> {
    fs::read(filename).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::NotFound {
            path: filename.to_string(),
        },
        _ => Error::Io(e),
    })
}

// =============================================================================
// Tests
// =============================================================================
