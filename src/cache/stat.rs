//! Stat Cache
//!
//! Memoizes "does this path exist" and "is this path a directory" answers.
//! Each question has its own map behind its own `RwLock`, so existence
//! probes never contend with directory probes. A background thread wipes
//! both maps every refresh interval; answers are authoritative until then.
//!
//! Filesystem probes run outside both locks.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use super::id::normalize_path;

/// Default interval between bulk flushes
pub const DEFAULT_STAT_REFRESH: Duration = Duration::from_secs(60);

/// The two memo tables
#[derive(Debug, Default)]
struct StatMaps {
    exists: RwLock<HashMap<String, bool>>,
    is_dir: RwLock<HashMap<String, bool>>,
}

impl StatMaps {
    fn flush(&self) {
        self.exists.write().clear();
        self.is_dir.write().clear();
    }

    fn len(&self) -> usize {
        self.exists.read().len() + self.is_dir.read().len()
    }

    /// Read-locked lookup, falling back to `probe` outside the lock
    fn lookup<F>(map: &RwLock<HashMap<String, bool>>, path: &str, probe: F) -> bool
    where
        F: FnOnce(&str) -> bool,
    {
        if let Some(&answer) = map.read().get(path) {
            return answer;
        }

        let answer = probe(path);
        map.write().insert(path.to_string(), answer);
        answer
    }
}

/// Background flush loop; stops when the shutdown sender is dropped
struct Refresher {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Refresher {
    fn spawn(maps: Arc<StatMaps>, interval: Duration) -> Option<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);
        let ticker = channel::tick(interval);

        let spawned = std::thread::Builder::new()
            .name("datablock-stat-refresh".into())
            .spawn(move || {
                debug!(interval_ms = interval.as_millis() as u64, "Stat refresher started");
                loop {
                    channel::select! {
                        recv(ticker) -> _ => {
                            maps.flush();
                            trace!("Stat cache flushed");
                        }
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                debug!("Stat refresher stopped");
            });

        match spawned {
            Ok(handle) => Some(Self {
                shutdown: Some(shutdown_tx),
                handle: Some(handle),
            }),
            Err(e) => {
                warn!("Failed to start stat refresher, entries will never expire: {}", e);
                None
            }
        }
    }

    fn stop(&mut self) {
        // Disconnecting the channel wakes the select
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Concurrent memo of path existence and directory-ness
pub struct StatCache {
    /// `None` when disabled: every call hits the filesystem
    maps: Option<Arc<StatMaps>>,
    refresher: Mutex<Option<Refresher>>,
    refresh: Option<Duration>,
}

impl StatCache {
    /// Create a stat cache
    ///
    /// When enabled with a refresh interval, a background thread flushes both
    /// maps on that interval until [`StatCache::close`] or drop. Enabled with
    /// no interval (or a zero one) means entries never expire.
    pub fn new(enabled: bool, refresh: Option<Duration>) -> Self {
        if !enabled {
            return Self::disabled();
        }

        let maps = Arc::new(StatMaps::default());
        let refresh = refresh.filter(|interval| !interval.is_zero());
        let refresher = refresh.and_then(|interval| Refresher::spawn(Arc::clone(&maps), interval));

        Self {
            maps: Some(maps),
            refresher: Mutex::new(refresher),
            refresh,
        }
    }

    /// A pass-through stat cache with no maps and no locks
    pub fn disabled() -> Self {
        Self {
            maps: None,
            refresher: Mutex::new(None),
            refresh: None,
        }
    }

    /// Whether answers are memoized
    pub fn is_enabled(&self) -> bool {
        self.maps.is_some()
    }

    /// Configured flush interval
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh
    }

    /// Whether `path` exists
    pub fn exists(&self, path: &str) -> bool {
        let path = normalize_path(path);
        match &self.maps {
            Some(maps) => StatMaps::lookup(&maps.exists, path, probe_exists),
            None => probe_exists(path),
        }
    }

    /// Whether `path` is a directory
    ///
    /// `.` is always a directory and never probed.
    pub fn is_dir(&self, path: &str) -> bool {
        let path = normalize_path(path);
        if path == "." {
            return true;
        }
        match &self.maps {
            Some(maps) => StatMaps::lookup(&maps.is_dir, path, probe_is_dir),
            None => probe_is_dir(path),
        }
    }

    /// Drop every memoized answer now
    pub fn flush(&self) {
        if let Some(maps) = &self.maps {
            maps.flush();
        }
    }

    /// Number of memoized answers across both maps
    pub fn len(&self) -> usize {
        self.maps.as_ref().map_or(0, |maps| maps.len())
    }

    /// Check if nothing is memoized
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the background refresher
    ///
    /// Memoized answers stay valid until the next explicit [`StatCache::flush`].
    pub fn close(&self) {
        if let Some(mut refresher) = self.refresher.lock().take() {
            refresher.stop();
        }
    }
}

impl Drop for StatCache {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for StatCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatCache")
            .field("enabled", &self.is_enabled())
            .field("refresh", &self.refresh)
            .field("entries", &self.len())
            .finish()
    }
}

fn probe_exists(path: &str) -> bool {
    fs::metadata(Path::new(path)).is_ok()
}

fn probe_is_dir(path: &str) -> bool {
    fs::metadata(Path::new(path))
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

// =============================================================================
// Tests
// =============================================================================
