//! Block Identifiers
//!
//! Fixed-width keys derived from filenames. Two names that hash alike share a
//! slot; the cache treats that as the same file.

use std::fmt;

use serde::Serialize;

/// Strip a single leading `./` so that `./a` and `a` name the same block
#[inline]
pub fn normalize_path(name: &str) -> &str {
    name.strip_prefix("./").unwrap_or(name)
}

/// Opaque identifier for a cached file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BlockId(u64);

impl BlockId {
    /// Derive the identifier for a filename (normalized first)
    pub fn from_name(name: &str) -> Self {
        Self(Self::fx_hash(normalize_path(name).as_bytes()))
    }

    /// Wrap a raw identifier value
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identifier value
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Fast non-cryptographic hash (FxHash algorithm)
    #[inline]
    fn fx_hash(bytes: &[u8]) -> u64 {
        const SEED: u64 = 0x517cc1b727220a95;
        let mut hash = SEED;
        for &byte in bytes {
            hash = hash.rotate_left(5) ^ (byte as u64);
            hash = hash.wrapping_mul(SEED);
        }
        hash
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<&str> for BlockId {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

// =============================================================================
// Tests
// =============================================================================
