//! Pooled data source implementation
//!
//! Owns the ordered slot collection and implements init, acquire, release,
//! growth and validation. Every scan or mutation of the slots happens under a
//! single pool-wide lock.

use super::connection::{PooledConnection, ReturnedConnection};
use super::manager::{PoolManager, PoolStats, PoolStatsSnapshot};
use super::slot::Slot;
use crate::config::Config;
use crate::driver::{Driver, RawConnection};
use crate::error::{PoolError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Point-in-time view of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of pooled connections
    pub total: usize,
    /// Connections lent out
    pub busy: usize,
    /// Connections available for lending
    pub idle: usize,
    /// Longest time any idle connection has gone unused
    pub longest_idle: Duration,
}

/// State shared between the data source, lent connections and background tasks
pub(crate) struct Shared<D: Driver> {
    /// Immutable configuration
    config: Config,
    /// Factory for raw connections
    driver: D,
    /// Pooled connections in insertion order
    slots: Mutex<Vec<Slot<D::Connection>>>,
    /// Broadcast on every release and on shutdown
    available: Notify,
    /// Set once init has completed
    initialized: AtomicBool,
    /// Statistics and shutdown signal
    manager: PoolManager,
    /// Channel for connections returned by drop
    pub(crate) return_tx: mpsc::Sender<ReturnedConnection<D::Connection>>,
    /// Receiving end, taken by the return handler at init
    return_rx: Mutex<Option<mpsc::Receiver<ReturnedConnection<D::Connection>>>>,
}

/// A bounded pool of connections produced by a [`Driver`]
///
/// Cloning is cheap; all clones share the same pool.
pub struct DataSource<D: Driver> {
    shared: Arc<Shared<D>>,
}

impl<D: Driver> Clone for DataSource<D> {
    fn clone(&self) -> Self {
        DataSource {
            shared: self.shared.clone(),
        }
    }
}

impl<D: Driver> std::fmt::Debug for DataSource<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("config", &self.shared.config)
            .field("driver", &self.shared.driver)
            .finish_non_exhaustive()
    }
}

impl<D: Driver> DataSource<D> {
    /// Create an uninitialized pool; call [`DataSource::init`] before use
    pub fn new(config: Config, driver: D) -> Self {
        let stats = Arc::new(PoolStats::new());
        let manager = PoolManager::new(config.pool.clone(), stats);

        // Lent connections never outnumber max_size
        let (return_tx, return_rx) = mpsc::channel(config.pool.max_size.max(1));

        DataSource {
            shared: Arc::new(Shared {
                config,
                driver,
                slots: Mutex::new(Vec::new()),
                available: Notify::new(),
                initialized: AtomicBool::new(false),
                manager,
                return_tx,
                return_rx: Mutex::new(Some(return_rx)),
            }),
        }
    }

    /// Validate configuration, check the driver and create `min_size` connections
    ///
    /// Calling it again after success is a no-op.
    pub async fn init(&self) -> Result<()> {
        self.shared.init().await
    }

    /// Borrow a connection for exclusive use
    pub async fn acquire(&self) -> Result<PooledConnection<D>> {
        self.shared.acquire().await
    }

    /// Return a connection to the pool
    pub async fn release(&self, conn: PooledConnection<D>) -> Result<()> {
        self.shared.release(conn).await
    }

    /// Validate every idle connection, replacing stale ones
    ///
    /// Returns the number of connections replaced. This is what the idle
    /// validation task runs on each tick.
    pub async fn validate_idle(&self) -> Result<usize> {
        self.shared.validate_idle().await
    }

    /// Close the pool: wake waiters, stop background tasks, close idle connections
    pub async fn shutdown(&self) {
        self.shared.shutdown().await
    }

    /// Snapshot of pool occupancy
    pub async fn status(&self) -> PoolStatus {
        let slots = self.shared.slots.lock().await;
        let busy = slots.iter().filter(|s| s.is_busy()).count();
        let longest_idle = slots
            .iter()
            .filter(|s| !s.is_busy())
            .map(|s| s.idle_time())
            .max()
            .unwrap_or_default();
        PoolStatus {
            total: slots.len(),
            busy,
            idle: slots.len() - busy,
            longest_idle,
        }
    }

    /// Snapshot of pool counters
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.shared.manager.stats().snapshot()
    }

    /// The configuration this pool was built with
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Whether [`DataSource::shutdown`] has been called
    pub fn is_closed(&self) -> bool {
        self.shared.manager.is_shutdown()
    }
}

impl<D: Driver> Shared<D> {
    async fn init(self: &Arc<Self>) -> Result<()> {
        let mut slots = self.slots.lock().await;
        if self.manager.is_shutdown() {
            return Err(PoolError::Closed);
        }
        if self.initialized.load(Ordering::SeqCst) {
            debug!("Pool already initialized");
            return Ok(());
        }

        self.config.validate().map_err(PoolError::Configuration)?;

        let datasource = &self.config.datasource;
        self.driver
            .check(&datasource.driver, &datasource.url)
            .await
            .map_err(PoolError::Driver)?;

        let min_size = self.config.pool.min_size;
        info!("Initializing connection pool: {} connections", min_size);

        let mut created = Vec::with_capacity(min_size);
        for _ in 0..min_size {
            created.push(Slot::idle(self.create_connection().await?));
        }
        *slots = created;
        self.initialized.store(true, Ordering::SeqCst);
        log_digest(&slots);
        drop(slots);

        if let Some(rx) = self.return_rx.lock().await.take() {
            self.spawn_return_handler(rx);
        }
        if let Some(period) = self.manager.idle_interval() {
            self.spawn_idle_validation(period);
        }

        info!("Connection pool initialized");
        Ok(())
    }

    async fn acquire(self: &Arc<Self>) -> Result<PooledConnection<D>> {
        let started = Instant::now();
        let deadline = self.config.pool.max_wait().map(|wait| started + wait);
        let mut waited = false;

        loop {
            let mut slots = self.slots.lock().await;

            if self.manager.is_shutdown() {
                return Err(if waited {
                    PoolError::WaitInterrupted
                } else {
                    PoolError::Closed
                });
            }
            if !self.initialized.load(Ordering::SeqCst) {
                return Err(PoolError::Closed);
            }

            // 1. First free slot in insertion order
            if let Some(index) = slots.iter().position(|s| !s.is_busy()) {
                let conn = self.lend_slot(&mut slots, index).await?;
                return Ok(conn);
            }

            // 2. Grow by exactly one
            let max_size = self.config.pool.max_size;
            if slots.len() < max_size {
                let conn = self.create_connection().await?;
                slots.push(Slot::lent());
                let index = slots.len() - 1;
                self.manager.stats().record_acquired();
                debug!("Pool grew to {} connections", slots.len());
                log_digest(&slots);
                return Ok(PooledConnection::new(conn, index, self));
            }

            // 3. Saturated: fail fast or wait for a release
            let Some(deadline) = deadline else {
                return Err(PoolError::PoolExhausted { max_size });
            };
            if Instant::now() >= deadline {
                self.manager.stats().record_timeout();
                return Err(PoolError::AcquireTimeout {
                    waited: started.elapsed(),
                });
            }

            // Registered before the lock is released so no release is missed
            let notified = self.available.notified();
            drop(slots);

            if !waited {
                self.manager.stats().record_wait();
                debug!("Pool saturated, waiting for a free connection");
            }
            waited = true;

            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }

    /// Validate slot `index` on borrow, then mark it busy and hand it out
    ///
    /// The connection stays in its slot until validation succeeds, so a
    /// cancelled borrow leaves the slot idle.
    async fn lend_slot(
        self: &Arc<Self>,
        slots: &mut [Slot<D::Connection>],
        index: usize,
    ) -> Result<PooledConnection<D>> {
        let slot = &mut slots[index];

        if self.config.pool.test_on_borrow {
            let Some(conn) = slot.idle_mut() else {
                return Err(PoolError::Closed);
            };
            if let Err(e) = self.check_valid(conn).await {
                warn!("Validation on borrow failed for slot {}: {}", index, e);
                return Err(e);
            }
        }

        let Some(conn) = slot.lend() else {
            return Err(PoolError::Closed);
        };
        self.manager.stats().record_acquired();
        log_digest(slots);
        Ok(PooledConnection::new(conn, index, self))
    }

    pub(crate) async fn release(self: &Arc<Self>, conn: PooledConnection<D>) -> Result<()> {
        if !conn.belongs_to(self) {
            return Err(PoolError::ForeignConnection);
        }
        // Detach only under the lock; dropped before that, the handle
        // goes back through the return channel
        let mut slots = self.slots.lock().await;
        match conn.detach() {
            Some((index, raw)) => self.return_to_slot(&mut slots, index, raw).await,
            None => Ok(()),
        }
    }

    async fn release_slot(&self, index: usize, conn: D::Connection) -> Result<()> {
        let mut slots = self.slots.lock().await;
        self.return_to_slot(&mut slots, index, conn).await
    }

    /// Put `conn` back into slot `index`, then validate it in place on return
    async fn return_to_slot(
        &self,
        slots: &mut [Slot<D::Connection>],
        index: usize,
        mut conn: D::Connection,
    ) -> Result<()> {
        if self.manager.is_shutdown() {
            self.manager.stats().record_released();
            if let Err(e) = conn.close().await {
                debug!("Failed to close connection released after shutdown: {:#}", e);
            }
            return Ok(());
        }

        match slots.get_mut(index) {
            Some(slot) if slot.is_busy() => slot.restore(conn),
            _ => {
                warn!("Released connection has no busy slot {}", index);
                return Err(PoolError::ForeignConnection);
            }
        }

        self.manager.stats().record_released();
        log_digest(slots);
        // Waiters only get the lock after validation completes
        self.available.notify_waiters();

        if !self.config.pool.test_on_return {
            return Ok(());
        }
        let Some(conn) = slots[index].idle_mut() else {
            return Ok(());
        };
        let result = self.check_valid(conn).await.map(|_| ());
        if let Err(e) = &result {
            warn!("Validation on return failed for slot {}: {}", index, e);
        }
        result
    }

    async fn validate_idle(&self) -> Result<usize> {
        let mut slots = self.slots.lock().await;
        let mut replaced = 0;
        let mut first_error = None;

        for (index, slot) in slots.iter_mut().enumerate() {
            let Some(conn) = slot.idle_mut() else {
                continue;
            };
            match self.check_valid(conn).await {
                Ok(true) => {
                    debug!("Replaced stale idle connection in slot {}", index);
                    replaced += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Idle validation failed for slot {}: {}", index, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(replaced),
        }
    }

    /// Liveness check; replaces a dead connection in place
    ///
    /// Returns whether the connection was replaced.
    async fn check_valid(&self, conn: &mut D::Connection) -> Result<bool> {
        if !self.config.pool.validation_enabled() {
            return Ok(false);
        }

        let timeout = self.config.pool.validation_timeout();
        let alive = match tokio::time::timeout(timeout, conn.is_valid(timeout)).await {
            Ok(checked) => checked.map_err(PoolError::ValidationFailed)?,
            Err(_) => {
                return Err(PoolError::ValidationFailed(anyhow::anyhow!(
                    "liveness check timed out after {:?}",
                    timeout
                )))
            }
        };
        if alive {
            return Ok(false);
        }

        let fresh = self
            .driver
            .connect(&self.config.datasource)
            .await
            .map_err(PoolError::ValidationFailed)?;
        let mut stale = std::mem::replace(conn, fresh);
        self.manager.stats().record_replaced();
        if let Err(e) = stale.close().await {
            debug!("Failed to close stale connection: {:#}", e);
        }
        Ok(true)
    }

    async fn create_connection(&self) -> Result<D::Connection> {
        let conn = self
            .driver
            .connect(&self.config.datasource)
            .await
            .map_err(PoolError::Driver)?;
        self.manager.stats().record_created();
        Ok(conn)
    }

    async fn shutdown(&self) {
        let mut slots = self.slots.lock().await;
        if self.manager.is_shutdown() {
            return;
        }
        self.manager.shutdown();
        self.available.notify_waiters();

        for slot in slots.iter_mut() {
            if let Some(mut conn) = slot.lend() {
                if let Err(e) = conn.close().await {
                    debug!("Failed to close idle connection: {:#}", e);
                }
            }
        }
        slots.clear();

        self.manager.log_health();
        info!("Connection pool shut down");
    }

    /// Run the return handler for dropped connections
    fn spawn_return_handler(
        self: &Arc<Self>,
        mut rx: mpsc::Receiver<ReturnedConnection<D::Connection>>,
    ) {
        let pool = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(returned) = rx.recv().await {
                let Some(shared) = pool.upgrade() else {
                    break;
                };
                if let Err(e) = shared.release_slot(returned.slot, returned.conn).await {
                    warn!("Failed to return dropped connection: {}", e);
                }
            }
            debug!("Return handler stopped");
        });
    }

    /// Run idle validation at a fixed rate, first tick one period after init
    fn spawn_idle_validation(self: &Arc<Self>, period: Duration) {
        let pool = Arc::downgrade(self);
        let manager = self.manager.clone();
        info!("Idle validation every {:?}", period);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = manager.wait_shutdown() => break,
                    _ = ticker.tick() => {
                        let Some(shared) = pool.upgrade() else {
                            break;
                        };
                        // Failures are already logged per slot
                        let _ = shared.validate_idle().await;
                        manager.log_health();
                    }
                }
            }
            info!("Idle validation shutting down");
        });
    }
}

/// Log pool size and the busy flag of every slot
fn log_digest<C>(slots: &[Slot<C>]) {
    let flags: Vec<&str> = slots
        .iter()
        .map(|s| if s.is_busy() { "busy" } else { "idle" })
        .collect();
    debug!("Pool status: size={}, slots=[{}]", slots.len(), flags.join(","));
}
