//! Byte Arena
//!
//! One fixed-size contiguous buffer holding every cached payload back to back.
//! Writes always land at the tail; the tail only moves down on compaction
//! and clear. The arena knows nothing about entries.

/// Fixed-capacity byte buffer with a single tail cursor
pub struct Arena {
    /// Backing storage, allocated once
    buf: Box<[u8]>,
    /// First unused byte
    tail: usize,
}

impl Arena {
    /// Allocate an arena of `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            tail: 0,
        }
    }

    /// Total capacity in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Current tail offset (bytes in use)
    #[inline]
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Bytes available after the tail
    #[inline]
    pub fn free(&self) -> usize {
        self.buf.len() - self.tail
    }

    /// Append `src` at the tail
    ///
    /// Returns (offset, length), or `None` when the free space is too small.
    pub fn append(&mut self, src: &[u8]) -> Option<(usize, usize)> {
        if src.len() > self.free() {
            return None;
        }
        let offset = self.tail;
        self.buf[offset..offset + src.len()].copy_from_slice(src);
        self.tail += src.len();
        Some((offset, src.len()))
    }

    /// Read-only view of `[offset, offset + len)`
    ///
    /// Panics if the range reaches past the tail.
    #[inline]
    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        assert!(
            offset + len <= self.tail,
            "slice {}+{} past tail {}",
            offset,
            len,
            self.tail
        );
        &self.buf[offset..offset + len]
    }

    /// Move `len` bytes from `src_offset` down to `dst`
    ///
    /// Compaction only: the caller guarantees `dst <= src_offset` and that the
    /// destination belonged to entries already evicted or already moved.
    pub fn overwrite(&mut self, dst: usize, src_offset: usize, len: usize) {
        debug_assert!(dst <= src_offset);
        debug_assert!(src_offset + len <= self.tail);
        if dst != src_offset && len > 0 {
            self.buf.copy_within(src_offset..src_offset + len, dst);
        }
    }

    /// Pull the tail down to `new_tail`
    ///
    /// The caller guarantees nothing references bytes at or above `new_tail`.
    pub fn shrink(&mut self, new_tail: usize) {
        assert!(
            new_tail <= self.tail,
            "shrink to {} above tail {}",
            new_tail,
            self.tail
        );
        self.tail = new_tail;
    }

    /// Forget every payload
    pub fn clear(&mut self) {
        self.tail = 0;
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity())
            .field("tail", &self.tail)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
