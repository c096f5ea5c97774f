//! Result Cache - operator command
//!
//! Inspects and invalidates the persisted result cache.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use result_cache::{spawn_configured_sweep_task, CacheConfig, CacheStats, ResultCache};

/// Inspect and invalidate the analysis result cache.
#[derive(Debug, Parser)]
#[command(name = "result-cache", version, about)]
struct Cli {
    /// Cache directory (overrides RESULT_CACHE_DIR)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show entry counts, sizes and hit rates
    Stats {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove all entries, or only those of one operation
    Clear {
        /// Operation to invalidate
        operation: Option<String>,
    },
    /// Remove expired entries
    Sweep,
    /// Show the TTL an operation's results are cached for
    Ttl {
        /// Operation identifier
        operation: String,
    },
    /// Sweep expired entries every RESULT_CACHE_SWEEP_INTERVAL seconds until stopped
    Watch,
}

/// Main entry point for the operator command.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber (stderr, so stdout stays parseable)
/// 2. Load configuration from environment variables and flags
/// 3. Open the persisted cache
/// 4. Run the requested command
#[tokio::main]
async fn main() -> Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "result_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = CacheConfig::from_env();
    if let Some(dir) = cli.dir {
        config = config.with_cache_dir(dir);
    }
    info!(
        "Configuration loaded: dir={}, max_entries={}, max_size_bytes={}, default_ttl={}s, sweep_interval={}s",
        config.cache_dir.display(),
        config.max_entries,
        config.max_size_bytes,
        config.default_ttl,
        config.sweep_interval
    );

    let cache = ResultCache::open(&config).await;

    match cli.command {
        Command::Stats { json } => {
            let stats = cache.stats().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
            }
        }
        Command::Clear { operation } => {
            let removed = cache.clear(operation.as_deref()).await;
            println!("Removed {} entries", removed);
        }
        Command::Sweep => {
            let removed = cache.sweep().await;
            println!("Removed {} expired entries", removed);
        }
        Command::Ttl { operation } => {
            println!("{}s", cache.ttl_for(&operation).as_secs());
        }
        Command::Watch => {
            let Some(sweep_handle) = spawn_configured_sweep_task(cache.clone(), &config) else {
                bail!("sweeping is disabled (RESULT_CACHE_SWEEP_INTERVAL=0)");
            };
            shutdown_signal().await?;
            sweep_handle.abort();
            info!("Sweep task stopped");
        }
    }

    // Surface persistence trouble to the operator, unlike get/set callers
    cache.flush().await?;
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    #[cfg(unix)]
    let terminate = terminate.recv();

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        result = signal::ctrl_c() => {
            result?;
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
    Ok(())
}

fn print_stats(stats: &CacheStats) {
    println!("Entries:    {}", stats.total_entries);
    println!("Size:       {} bytes", stats.total_size_bytes);
    println!(
        "Hit rate:   {:.1}% ({} hits, {} misses)",
        stats.hit_rate * 100.0,
        stats.total_hits,
        stats.total_misses
    );
    println!("Evictions:  {}", stats.evictions);

    if stats.operations.is_empty() {
        return;
    }

    println!();
    println!(
        "{:<28} {:>8} {:>12} {:>8} {:>8} {:>8}",
        "OPERATION", "ENTRIES", "BYTES", "HITS", "MISSES", "RATE"
    );
    for (operation, op) in &stats.operations {
        println!(
            "{:<28} {:>8} {:>12} {:>8} {:>8} {:>7.1}%",
            operation,
            op.entries,
            op.size_bytes,
            op.hits,
            op.misses,
            op.hit_rate * 100.0
        );
    }
}
