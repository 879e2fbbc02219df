//! DataBlock Cache
//!
//! Bounded in-process file content cache built on one contiguous byte arena,
//! plus a memo of filesystem existence/directory probes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                         DataBlockCache (facade)                          │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │  Mutex ─┬─ Arena      [blk0][blk1][blk2]......[tail)      fixed size     │
//! │         ├─ BlockIndex BlockId -> (offset, len, popularity)               │
//! │         └─ full-warning latch                                            │
//! │                                                                          │
//! │  EvictionPolicy (least popular, oldest first)   Codec (none / LZ4)       │
//! │  CacheMetrics (atomics, lock-free reads)                                 │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │  StatCache: exists map (RwLock) | is_dir map (RwLock) | refresh thread   │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Read path
//!
//! filename → [`BlockId`] → index hit? copy slice out, bump popularity,
//! decode → bytes. On a miss, optionally read from disk and store.
//!
//! # Design Principles
//!
//! - The arena is allocated once and never grows
//! - Payloads stay contiguous: every removal is followed by one compaction
//! - No I/O while the cache lock is held

mod arena;
mod id;
mod index;
mod manager;
mod metrics;
mod policy;
pub mod compression;
pub mod stat;

#[cfg(test)]
mod proptest;

pub use arena::Arena;
pub use compression::{Codec, CompressionAlgorithm, Compressor};
pub use id::{normalize_path, BlockId};
pub use index::{BlockEntry, BlockIndex};
pub use manager::{BlockHandle, CacheConfig, CacheStats, DataBlockCache};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use policy::{EvictionPlan, EvictionPolicy};
pub use stat::{StatCache, DEFAULT_STAT_REFRESH};

/// Default arena capacity (64MB)
pub const DEFAULT_CAPACITY: usize = 64 * 1024 * 1024;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CAPACITY, 64 * 1024 * 1024);
        assert_eq!(CacheConfig::default().capacity, DEFAULT_CAPACITY);
    }
}
