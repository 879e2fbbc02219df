//! Block Compression
//!
//! Single-shot LZ4 transform between raw file bytes and the bytes kept in the
//! arena. A block is always encoded or decoded in one call so the arena never
//! holds a partial stream.
//!
//! # Example
//!
//! ```
//! use datablock::cache::compression::{Codec, CompressionAlgorithm};
//!
//! let codec = Codec::new(CompressionAlgorithm::Lz4);
//!
//! let data = b"Hello, this is test data. Hello, this is test data. Hello again!";
//! let (stored, compressed) = codec.encode(data).unwrap();
//!
//! let decoded = codec.decode(stored, compressed).unwrap();
//! assert_eq!(decoded.as_ref(), data);
//! ```

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::Serialize;

// =============================================================================
// Compression Algorithm
// =============================================================================

/// Supported compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum CompressionAlgorithm {
    /// No compression
    #[default]
    None,
    /// LZ4 - fast compression
    Lz4,
}

impl CompressionAlgorithm {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            CompressionAlgorithm::None => "none",
            CompressionAlgorithm::Lz4 => "lz4",
        }
    }

    /// Algorithm for the cache's on/off compression switch
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            CompressionAlgorithm::Lz4
        } else {
            CompressionAlgorithm::None
        }
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Compressor Trait
// =============================================================================

/// Trait for compression implementations
pub trait Compressor: Send + Sync {
    /// Get the algorithm identifier
    fn algorithm(&self) -> CompressionAlgorithm;

    /// Compress data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress data
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

// =============================================================================
// No-Op Compressor
// =============================================================================

/// Pass-through compressor (no compression)
pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::None
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

// =============================================================================
// LZ4 Compressor
// =============================================================================

/// LZ4 block compressor
///
/// Output carries a 4-byte size prefix so decoding needs no side channel.
pub struct Lz4Compressor {
    level: i32,
}

impl Lz4Compressor {
    /// Create new LZ4 compressor with default settings
    pub fn new() -> Self {
        Self { level: 4 }
    }

    /// Create with custom compression level
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Default for Lz4Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for Lz4Compressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lz4
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::compress(
            data,
            Some(lz4::block::CompressionMode::HIGHCOMPRESSION(self.level)),
            true,
        )
        .map_err(|e| Error::CompressionFailed {
            algorithm: "LZ4".into(),
            reason: e.to_string(),
        })
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::decompress(data, None).map_err(|e| Error::DecompressionFailed {
            algorithm: "LZ4".into(),
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// Codec
// =============================================================================

/// The cache's encode/decode step
///
/// Encoding keeps the raw bytes (flag `false`) whenever compression is off or
/// does not make the block smaller. Errors are returned, never swallowed.
pub struct Codec {
    algorithm: CompressionAlgorithm,
    noop: NoopCompressor,
    lz4: Lz4Compressor,
}

impl Codec {
    /// Create a codec for the given algorithm
    pub fn new(algorithm: CompressionAlgorithm) -> Self {
        Self {
            algorithm,
            noop: NoopCompressor,
            lz4: Lz4Compressor::new(),
        }
    }

    /// Configured algorithm
    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    /// Whether stores attempt compression at all
    pub fn is_enabled(&self) -> bool {
        self.algorithm != CompressionAlgorithm::None
    }

    fn compressor(&self, algorithm: CompressionAlgorithm) -> &dyn Compressor {
        match algorithm {
            CompressionAlgorithm::None => &self.noop,
            CompressionAlgorithm::Lz4 => &self.lz4,
        }
    }

    /// Encode raw file bytes for the arena
    ///
    /// Returns (stored_bytes, compressed).
    pub fn encode(&self, data: &[u8]) -> Result<(Bytes, bool)> {
        if !self.is_enabled() || data.is_empty() {
            return Ok((Bytes::copy_from_slice(data), false));
        }

        let compressed = self.compressor(self.algorithm).compress(data)?;
        if compressed.len() < data.len() {
            Ok((Bytes::from(compressed), true))
        } else {
            Ok((Bytes::copy_from_slice(data), false))
        }
    }

    /// Decode bytes copied out of the arena
    ///
    /// Uncompressed blocks are handed back as-is.
    pub fn decode(&self, stored: Bytes, compressed: bool) -> Result<Bytes> {
        if !compressed {
            return Ok(stored);
        }
        let raw = self.compressor(CompressionAlgorithm::Lz4).decompress(&stored)?;
        Ok(Bytes::from(raw))
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(CompressionAlgorithm::None)
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}
