//! DataBlock - In-Process File Content Cache
//!
//! Serves file bytes from a bounded, single-buffer arena so hot static assets
//! skip the filesystem. Recently used contents are packed back to back in one
//! fixed-size allocation, optionally LZ4-compressed, and the least popular
//! blocks are evicted when a new one does not fit.
//!
//! # Architecture
//!
//! ```text
//! request handlers ──read(name)──▶ DataBlockCache ──miss──▶ filesystem
//!                                      │    ▲
//!                                  store│    │hit
//!                                      ▼    │
//!                                 Arena + BlockIndex
//!
//! request handlers ──exists/is_dir──▶ StatCache ──miss──▶ fs::metadata
//! ```
//!
//! # Example
//!
//! ```
//! use datablock::cache::{CacheConfig, DataBlockCache};
//!
//! let cache = DataBlockCache::new(CacheConfig::new(1024).with_stat_cache(false));
//! cache.store("index.html", b"<h1>hello</h1>").unwrap();
//!
//! let page = cache.read("./index.html", false).unwrap();
//! assert_eq!(page.as_ref(), b"<h1>hello</h1>");
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Arena, index, eviction, compression, stat cache and the facade
//! - [`error`] - Error types

pub mod cache;
pub mod error;

// Re-export commonly used types
pub use cache::{BlockHandle, CacheConfig, CacheStats, DataBlockCache, StatCache};
pub use error::{Error, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
