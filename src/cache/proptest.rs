//! Property-Based Tests for the DataBlock Cache
//!
//! Drives random store/read/remove/clear sequences against small arenas and
//! checks after every step that:
//!
//! 1. **Layout**: entries tile `[0, tail)` exactly, with no gaps or overlap
//! 2. **Fidelity**: a successful read returns the bytes last stored
//! 3. **Removal**: a removed name reads back as not cached
//! 4. **Idempotence**: repeated identical stores never move the arena

#![cfg(test)]

use std::collections::HashMap;

use proptest::prelude::*;

use super::{CacheConfig, DataBlockCache};

// =============================================================================
// Property Strategies
// =============================================================================

const NAMES: [&str; 6] = ["a", "./b", "css/c.css", "d.js", "img/e.png", "f"];

#[derive(Debug, Clone)]
enum Op {
    Store(usize, Vec<u8>),
    Read(usize),
    Remove(usize),
    Clear,
}

/// Payloads up to 12 bytes; small alphabets so repeats happen
fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..4, 0..12)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..NAMES.len(), payload_strategy()).prop_map(|(n, data)| Op::Store(n, data)),
        4 => (0..NAMES.len()).prop_map(Op::Read),
        2 => (0..NAMES.len()).prop_map(Op::Remove),
        1 => Just(Op::Clear),
    ]
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 1..60)
}

fn cache(capacity: usize, compression: bool) -> DataBlockCache {
    DataBlockCache::new(
        CacheConfig::new(capacity)
            .with_compression(compression)
            .with_stat_cache(false),
    )
}

fn run_ops(cache: &DataBlockCache, ops: &[Op]) -> Result<(), TestCaseError> {
    // Last bytes stored per name; eviction may drop them from the cache
    let mut model: HashMap<&str, Vec<u8>> = HashMap::new();

    for op in ops {
        match op {
            Op::Store(n, data) => {
                let name = NAMES[*n];
                let before = cache.arena_bytes();
                match cache.store(name, data) {
                    Ok(handle) => {
                        prop_assert_eq!(handle.original_len, data.len());
                        prop_assert_eq!(handle.popularity, 0);
                        model.insert(name, data.clone());
                    }
                    Err(e) if e.is_already_stored() => {
                        prop_assert_eq!(model.get(name), Some(data));
                        prop_assert_eq!(cache.arena_bytes(), before);
                    }
                    Err(e) => prop_assert!(false, "unexpected store error: {}", e),
                }
            }
            Op::Read(n) => {
                let name = NAMES[*n];
                match cache.read(name, false) {
                    Ok(bytes) => {
                        let got = bytes.to_vec();
                        prop_assert_eq!(Some(&got), model.get(name));
                    }
                    Err(e) => {
                        prop_assert!(e.is_not_cached(), "unexpected read error: {}", e);
                        prop_assert!(!cache.contains(name));
                    }
                }
            }
            Op::Remove(n) => {
                let name = NAMES[*n];
                cache.remove(name);
                prop_assert!(cache.read(name, false).unwrap_err().is_not_cached());
            }
            Op::Clear => {
                cache.clear();
                prop_assert!(cache.is_empty());
                prop_assert_eq!(cache.stats().used, 0);
            }
        }

        cache.assert_consistent();
        let stats = cache.stats();
        prop_assert!(stats.used <= stats.capacity);
        prop_assert_eq!(stats.used + stats.free, stats.capacity);
    }

    Ok(())
}

// =============================================================================
// Layout and Fidelity Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Invariants hold for random operation sequences on a tight arena
    #[test]
    fn prop_random_ops_uncompressed(ops in ops_strategy()) {
        let cache = cache(16, false);
        run_ops(&cache, &ops)?;
    }

    /// Same with compression enabled; reads still return the raw bytes
    #[test]
    fn prop_random_ops_compressed(ops in ops_strategy()) {
        let cache = cache(16, true);
        run_ops(&cache, &ops)?;
    }

    /// Store then read is byte-exact whenever the payload fits
    #[test]
    fn prop_store_read_roundtrip(
        data in prop::collection::vec(any::<u8>(), 0..512),
        compress in any::<bool>()
    ) {
        let cache = cache(512, compress);
        cache.store("file", &data).unwrap();
        let got = cache.read("file", false).unwrap();
        prop_assert_eq!(got.as_ref(), data.as_slice());
    }

    /// Empty payloads interleaved with real ones keep the arena tiled
    #[test]
    fn prop_empty_payloads_keep_layout(lens in prop::collection::vec(0usize..4, 1..20)) {
        let cache = cache(16, false);
        for (i, len) in lens.iter().enumerate() {
            let _ = cache.store(NAMES[i % NAMES.len()], &vec![i as u8; *len]);
            cache.assert_consistent();
        }
        cache.remove(NAMES[0]);
        cache.assert_consistent();
    }

    /// One byte over capacity is always rejected on an empty cache
    #[test]
    fn prop_over_capacity_rejected(capacity in 1usize..64) {
        let cache = cache(capacity, false);
        let err = cache.store("big", &vec![0xAA; capacity + 1]).unwrap_err();
        prop_assert!(err.is_too_large());
        prop_assert!(cache.is_empty());
    }
}
