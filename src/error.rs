//! Error types for the DataBlock cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the DataBlock cache
#[derive(Error, Debug)]
pub enum Error {
    /// Lookup without disk fallback found nothing in the arena
    #[error("Not cached: {name}")]
    NotCached { name: String },

    /// The filesystem reported no such file
    #[error("File not found on disk: {path}")]
    NotFound { path: String },

    /// Identical content is already resident under this identifier
    #[error("Already stored: {name}")]
    AlreadyStored { name: String },

    /// Payload does not fit even in an empty arena
    #[error("Payload of {size} bytes exceeds cache capacity of {capacity} bytes")]
    TooLarge { size: usize, capacity: usize },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Compression Errors
    // =========================================================================
    /// Compression failed
    #[error("Compression with {algorithm} failed: {reason}")]
    CompressionFailed { algorithm: String, reason: String },

    /// Decompression failed
    #[error("Decompression with {algorithm} failed: {reason}")]
    DecompressionFailed { algorithm: String, reason: String },
}

impl Error {
    /// True for a miss with disk fallback disallowed
    pub fn is_not_cached(&self) -> bool {
        matches!(self, Error::NotCached { .. })
    }

    /// True when a store was a no-op because the bytes were already resident
    pub fn is_already_stored(&self) -> bool {
        matches!(self, Error::AlreadyStored { .. })
    }

    /// True when the payload can never fit; callers should serve the file directly
    pub fn is_too_large(&self) -> bool {
        matches!(self, Error::TooLarge { .. })
    }

    /// True for encoder or decoder failures
    pub fn is_codec(&self) -> bool {
        matches!(
            self,
            Error::CompressionFailed { .. } | Error::DecompressionFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TooLarge {
            size: 9,
            capacity: 8,
        };
        assert_eq!(
            err.to_string(),
            "Payload of 9 bytes exceeds cache capacity of 8 bytes"
        );

        let err = Error::NotCached {
            name: "index.html".into(),
        };
        assert_eq!(err.to_string(), "Not cached: index.html");
    }

    #[test]
    fn test_error_predicates() {
        assert!(Error::NotCached { name: "a".into() }.is_not_cached());
        assert!(Error::AlreadyStored { name: "a".into() }.is_already_stored());
        assert!(Error::TooLarge {
            size: 2,
            capacity: 1
        }
        .is_too_large());
        assert!(Error::DecompressionFailed {
            algorithm: "lz4".into(),
            reason: "corrupt".into()
        }
        .is_codec());
        assert!(!Error::Config("bad".into()).is_codec());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
