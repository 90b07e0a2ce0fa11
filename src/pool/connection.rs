//! Pooled connection handle
//!
//! The caller-facing handle for a lent connection. It owns the raw connection
//! until it is released, and keeps a non-owning back-reference to the pool so
//! it can find its way home.

use super::datasource::Shared;
use crate::driver::Driver;
use crate::error::{PoolError, Result};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};
use tracing::warn;

/// A connection lent out by a [`DataSource`](super::DataSource)
///
/// Release it with [`DataSource::release`](super::DataSource::release) or
/// [`PooledConnection::release`] to observe validation errors. Dropping it
/// returns the connection to the pool in the background.
pub struct PooledConnection<D: Driver> {
    /// The raw connection (Option to allow detaching on release)
    conn: Option<D::Connection>,
    /// Index of the slot this connection belongs to
    slot: usize,
    /// Back-reference to the owning pool
    pool: Weak<Shared<D>>,
}

/// A connection being returned to the pool by the drop path
pub(crate) struct ReturnedConnection<C> {
    /// Slot index
    pub slot: usize,
    /// The raw connection
    pub conn: C,
}

impl<D: Driver> PooledConnection<D> {
    pub(crate) fn new(conn: D::Connection, slot: usize, pool: &Arc<Shared<D>>) -> Self {
        PooledConnection {
            conn: Some(conn),
            slot,
            pool: Arc::downgrade(pool),
        }
    }

    /// Whether the connection is lent out; true for as long as the handle exists
    pub fn is_busy(&self) -> bool {
        self.conn.is_some()
    }

    /// Index of the pool slot backing this connection
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Get a reference to the raw connection
    pub fn connection(&self) -> &D::Connection {
        self.conn.as_ref().expect("connection already released")
    }

    /// Get a mutable reference to the raw connection
    pub fn connection_mut(&mut self) -> &mut D::Connection {
        self.conn.as_mut().expect("connection already released")
    }

    /// Swap in a different raw connection, returning the previous one
    pub fn set_connection(&mut self, conn: D::Connection) -> D::Connection {
        std::mem::replace(self.connection_mut(), conn)
    }

    /// Return the connection to its pool through the back-reference
    pub async fn release(self) -> Result<()> {
        match self.pool.upgrade() {
            Some(shared) => shared.release(self).await,
            None => Err(PoolError::Closed),
        }
    }

    pub(crate) fn belongs_to(&self, pool: &Arc<Shared<D>>) -> bool {
        std::ptr::eq(self.pool.as_ptr(), Arc::as_ptr(pool))
    }

    /// Take the raw connection out so that drop does nothing
    pub(crate) fn detach(mut self) -> Option<(usize, D::Connection)> {
        let slot = self.slot;
        self.conn.take().map(|conn| (slot, conn))
    }
}

impl<D: Driver> Deref for PooledConnection<D> {
    type Target = D::Connection;

    fn deref(&self) -> &Self::Target {
        self.connection()
    }
}

impl<D: Driver> DerefMut for PooledConnection<D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection_mut()
    }
}

impl<D: Driver> fmt::Debug for PooledConnection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl<D: Driver> Drop for PooledConnection<D> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        // Pool gone: the raw connection is dropped with us
        if let Some(shared) = self.pool.upgrade() {
            let returned = ReturnedConnection {
                slot: self.slot,
                conn,
            };
            if shared.return_tx.try_send(returned).is_err() {
                warn!("Could not return dropped connection for slot {}", self.slot);
            }
        }
    }
}
