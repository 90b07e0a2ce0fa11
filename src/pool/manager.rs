//! Pool manager for statistics and lifecycle signals
//!
//! Holds the counters shared by every pool operation and the shutdown signal
//! observed by background tasks.

use crate::config::PoolConfig;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// Statistics for the connection pool
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Total raw connections created (init, growth and replacement)
    pub total_created: AtomicUsize,
    /// Connections currently lent out
    pub in_use_count: AtomicUsize,
    /// Total successful acquisitions
    pub total_acquired: AtomicUsize,
    /// Total releases
    pub total_released: AtomicUsize,
    /// Total stale connections replaced by validation
    pub total_replaced: AtomicUsize,
    /// Total times a caller had to wait
    pub total_waits: AtomicUsize,
    /// Total waits that ended without a connection
    pub total_timeouts: AtomicUsize,
}

impl PoolStats {
    /// Create new pool stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw connection creation
    pub fn record_created(&self) {
        self.total_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection acquisition
    pub fn record_acquired(&self) {
        self.total_acquired.fetch_add(1, Ordering::Relaxed);
        self.in_use_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection release
    pub fn record_released(&self) {
        self.total_released.fetch_add(1, Ordering::Relaxed);
        self.in_use_count.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a stale connection replacement
    pub fn record_replaced(&self) {
        self.total_replaced.fetch_add(1, Ordering::Relaxed);
        self.total_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a caller entering the wait window
    pub fn record_wait(&self) {
        self.total_waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a wait that ran out of time
    pub fn record_timeout(&self) {
        self.total_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current stats snapshot
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            total_created: self.total_created.load(Ordering::Relaxed),
            in_use_count: self.in_use_count.load(Ordering::Relaxed),
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            total_replaced: self.total_replaced.load(Ordering::Relaxed),
            total_waits: self.total_waits.load(Ordering::Relaxed),
            total_timeouts: self.total_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pool statistics
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub total_created: usize,
    pub in_use_count: usize,
    pub total_acquired: usize,
    pub total_released: usize,
    pub total_replaced: usize,
    pub total_waits: usize,
    pub total_timeouts: usize,
}

/// Pool manager for background maintenance
#[derive(Debug, Clone)]
pub struct PoolManager {
    /// Configuration
    config: PoolConfig,
    /// Statistics
    stats: Arc<PoolStats>,
    /// Shutdown signal
    shutdown: Arc<Notify>,
    /// Whether shutdown has been requested
    is_shutdown: Arc<AtomicBool>,
}

impl PoolManager {
    /// Create a new pool manager
    pub fn new(config: PoolConfig, stats: Arc<PoolStats>) -> Self {
        PoolManager {
            config,
            stats,
            shutdown: Arc::new(Notify::new()),
            is_shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get pool statistics
    pub fn stats(&self) -> &Arc<PoolStats> {
        &self.stats
    }

    /// Signal shutdown to every background task
    pub fn shutdown(&self) {
        self.is_shutdown.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    /// Period of the idle validation task, if it runs at all
    pub fn idle_interval(&self) -> Option<Duration> {
        self.config.idle_interval()
    }

    /// Wait for shutdown signal
    ///
    /// Returns immediately if shutdown was already requested.
    pub async fn wait_shutdown(&self) {
        let notified = self.shutdown.notified();
        if self.is_shutdown() {
            return;
        }
        notified.await;
    }

    /// Log pool health status
    pub fn log_health(&self) {
        let stats = self.stats.snapshot();
        debug!(
            "Pool health: created={}, in_use={}, acquired={}, released={}, replaced={}, waits={}, timeouts={}",
            stats.total_created,
            stats.in_use_count,
            stats.total_acquired,
            stats.total_released,
            stats.total_replaced,
            stats.total_waits,
            stats.total_timeouts
        );
    }
}
