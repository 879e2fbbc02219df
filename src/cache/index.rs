//! Block Index
//!
//! Maps identifiers to the arena slice holding their payload, with the
//! popularity counter and insertion order the eviction policy ranks by.

use std::collections::HashMap;

use super::id::BlockId;

/// Where one cached payload lives in the arena
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    /// Offset into the arena
    pub offset: usize,
    /// Bytes occupied in the arena
    pub stored_len: usize,
    /// Length before compression
    pub original_len: usize,
    /// Successful reads since insertion
    pub popularity: u64,
    /// Stored bytes are LZ4 encoded
    pub compressed: bool,
    /// Insertion order, assigned by the index
    seq: u64,
}

impl BlockEntry {
    /// Create an entry with zero popularity
    pub fn new(offset: usize, stored_len: usize, original_len: usize, compressed: bool) -> Self {
        Self {
            offset,
            stored_len,
            original_len,
            popularity: 0,
            compressed,
            seq: 0,
        }
    }

    /// End offset (exclusive)
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.stored_len
    }

    /// Insertion sequence number (lower = older)
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Record a successful read and return the new count
    #[inline]
    pub fn record_access(&mut self) -> u64 {
        self.popularity += 1;
        self.popularity
    }
}

/// Identifier to entry mapping
#[derive(Debug, Default)]
pub struct BlockIndex {
    entries: HashMap<BlockId, BlockEntry>,
    next_seq: u64,
}

impl BlockIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry
    pub fn get(&self, id: &BlockId) -> Option<&BlockEntry> {
        self.entries.get(id)
    }

    /// Look up an entry for update
    pub fn get_mut(&mut self, id: &BlockId) -> Option<&mut BlockEntry> {
        self.entries.get_mut(id)
    }

    /// Insert an entry, stamping it with the next insertion sequence
    ///
    /// Returns the entry previously stored under `id`, if any.
    pub fn put(&mut self, id: BlockId, mut entry: BlockEntry) -> Option<BlockEntry> {
        entry.seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(id, entry)
    }

    /// Remove an entry
    pub fn delete(&mut self, id: &BlockId) -> Option<BlockEntry> {
        self.entries.remove(id)
    }

    /// Check if an identifier is present
    pub fn contains(&self, id: &BlockId) -> bool {
        self.entries.contains_key(id)
    }

    /// Iterate over all entries (arbitrary order)
    pub fn iter(&self) -> impl Iterator<Item = (&BlockId, &BlockEntry)> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Sum of stored lengths across all entries
    pub fn stored_bytes(&self) -> usize {
        self.iter().map(|(_, e)| e.stored_len).sum()
    }

    /// Entry with the lowest popularity, ties broken by oldest insertion
    ///
    /// Identifiers for which `skip` returns true are not considered.
    pub fn least_popular<F>(&self, skip: F) -> Option<BlockId>
    where
        F: Fn(&BlockId) -> bool,
    {
        self.entries
            .iter()
            .filter(|(id, _)| !skip(id))
            .min_by_key(|(_, e)| (e.popularity, e.seq))
            .map(|(id, _)| *id)
    }

    /// Identifiers in arena order, lowest offset first
    ///
    /// A zero-length entry shares its offset with the block appended after
    /// it; insertion order breaks the tie so the empty entry comes first.
    pub fn by_offset(&self) -> Vec<BlockId> {
        let mut ids: Vec<(usize, u64, BlockId)> = self
            .iter()
            .map(|(id, e)| (e.offset, e.seq, *id))
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, _, id)| id).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
