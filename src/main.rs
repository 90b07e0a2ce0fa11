//! Nebulapool - Connection pool probe
//!
//! Loads a pool configuration, initializes a pool of TCP connections and runs
//! concurrent borrow/return rounds against it, reporting pool statistics.

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use nebulapool::config::load_config;
use nebulapool::driver::TcpDriver;
use nebulapool::pool::DataSource;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Nebulapool - exercise a bounded connection pool against a TCP service
#[derive(Parser, Debug)]
#[command(name = "nebulapool")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,

    /// Number of concurrent borrowers
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Borrow/return rounds per borrower
    #[arg(long, default_value_t = 10)]
    rounds: usize,

    /// How long each borrower holds a connection, in milliseconds
    #[arg(long, default_value_t = 50)]
    hold_millis: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, args.json_log)?;

    // Load configuration
    let config = load_config(&args.config)?;

    info!("Nebulapool v{}", nebulapool::VERSION);
    info!("Configuration loaded from: {:?}", args.config);
    info!("Pooling connections to: {}", config.datasource.url);

    let pool = DataSource::new(config, TcpDriver::with_defaults());
    pool.init().await.context("Failed to initialize pool")?;

    let hold = Duration::from_millis(args.hold_millis);
    let rounds = args.rounds;
    let borrowers = (0..args.concurrency).map(|id| {
        let pool = pool.clone();
        async move {
            let mut failures = 0usize;
            for _ in 0..rounds {
                match pool.acquire().await {
                    Ok(conn) => {
                        tokio::time::sleep(hold).await;
                        if let Err(e) = pool.release(conn).await {
                            warn!("Borrower {}: release failed: {}", id, e);
                            failures += 1;
                        }
                    }
                    Err(e) if e.is_transient() => {
                        warn!("Borrower {}: acquire failed: {}", id, e);
                        failures += 1;
                    }
                    Err(e) => {
                        error!("Borrower {}: giving up: {}", id, e);
                        failures += 1;
                        break;
                    }
                }
            }
            failures
        }
    });

    let failures: usize = tokio::select! {
        results = join_all(borrowers) => results.into_iter().sum(),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            0
        }
    };

    let status = pool.status().await;
    let stats = pool.stats();
    info!(
        "Pool size={}, busy={}, idle={}",
        status.total, status.busy, status.idle
    );
    info!(
        "Created={}, acquired={}, released={}, replaced={}, waits={}, timeouts={}, failures={}",
        stats.total_created,
        stats.total_acquired,
        stats.total_released,
        stats.total_replaced,
        stats.total_waits,
        stats.total_timeouts,
        failures
    );

    pool.shutdown().await;
    Ok(())
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
