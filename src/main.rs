//! DataBlock cache warmer
//!
//! Reads files through a [`DataBlockCache`] the way a static file server
//! would, then reports what ended up resident.
//!
//! ```text
//! datablock --capacity 1048576 --compress --rounds 3 ./public
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use datablock::cache::{CacheConfig, DataBlockCache, StatCache, DEFAULT_CAPACITY};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Warm a DataBlock cache from files on disk and report its stats
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files or directories (directories are expanded one level)
    #[arg(required = true)]
    paths: Vec<String>,

    /// Arena capacity in bytes
    #[arg(long, env = "DATABLOCK_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Store blocks LZ4-compressed
    #[arg(long, env = "DATABLOCK_COMPRESS")]
    compress: bool,

    /// Stat cache refresh interval in seconds (0 = never refresh)
    #[arg(long, env = "DATABLOCK_STAT_REFRESH_SECONDS", default_value = "60")]
    stat_refresh_seconds: u64,

    /// Probe the filesystem on every existence check
    #[arg(long, env = "DATABLOCK_NO_STAT_CACHE")]
    no_stat_cache: bool,

    /// How many times to read every file
    #[arg(long, default_value = "2")]
    rounds: usize,

    /// Concurrent readers
    #[arg(long, default_value = "8")]
    concurrency: usize,

    /// Print stats as JSON
    #[arg(long)]
    json: bool,

    /// Also print every resident block
    #[arg(long)]
    layout: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn cache_config(&self) -> CacheConfig {
        let refresh = match self.stat_refresh_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        CacheConfig::new(self.capacity)
            .with_compression(self.compress)
            .with_stat_cache(!self.no_stat_cache)
            .with_stat_refresh(refresh)
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting DataBlock cache warmer");
    info!("  Capacity: {} bytes", args.capacity);
    info!("  Compression: {}", args.compress);
    info!("  Stat cache: {}", !args.no_stat_cache);
    info!("  Rounds: {}", args.rounds);

    let cache = Arc::new(
        DataBlockCache::try_new(args.cache_config()).context("invalid cache configuration")?,
    );

    let files = collect_files(cache.stat_cache(), &args.paths)
        .context("failed to list input paths")?;
    info!("Found {} files", files.len());

    for round in 1..=args.rounds {
        let started = Instant::now();
        let (ok, failed) = read_all(&cache, &files, args.concurrency.max(1)).await;
        info!(
            round,
            ok,
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Round complete"
        );
    }

    let stats = cache.stats();
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("failed to encode stats")?
        );
    } else {
        println!("{}", stats);
    }

    if args.layout {
        for block in cache.layout() {
            println!(
                "{} offset={} stored={} original={} popularity={} compressed={}",
                block.id,
                block.offset,
                block.stored_len,
                block.original_len,
                block.popularity,
                block.compressed
            );
        }
    }

    cache.stat_cache().close();
    Ok(())
}

/// Expand directories one level and drop paths that do not exist
fn collect_files(stat: &StatCache, paths: &[String]) -> Result<Vec<String>> {
    let mut files = Vec::new();

    for path in paths {
        if stat.is_dir(path) {
            let entries =
                std::fs::read_dir(path).with_context(|| format!("reading directory {}", path))?;
            for entry in entries {
                let entry = entry.with_context(|| format!("listing {}", path))?;
                let child = entry.path().to_string_lossy().into_owned();
                if !stat.is_dir(&child) {
                    files.push(child);
                }
            }
        } else if stat.exists(path) {
            files.push(path.clone());
        } else {
            warn!("Skipping missing path {}", path);
        }
    }

    Ok(files)
}

/// Read every file through the cache on the blocking pool
async fn read_all(
    cache: &Arc<DataBlockCache>,
    files: &[String],
    concurrency: usize,
) -> (usize, usize) {
    let results: Vec<bool> = stream::iter(files.iter().cloned())
        .map(|file| {
            let cache = Arc::clone(cache);
            async move {
                let outcome = tokio::task::spawn_blocking(move || {
                    cache.read(&file, true).map_err(|e| (file, e))
                })
                .await;
                match outcome {
                    Ok(Ok(data)) => {
                        debug!(len = data.len(), "Read file");
                        true
                    }
                    Ok(Err((file, e))) => {
                        warn!("Failed to read {}: {}", file, e);
                        false
                    }
                    Err(e) => {
                        warn!("Reader task failed: {}", e);
                        false
                    }
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let ok = results.iter().filter(|ok| **ok).count();
    (ok, results.len() - ok)
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
