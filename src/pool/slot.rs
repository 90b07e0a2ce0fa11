//! Pool slot structure
//!
//! Represents one position in the pool's ordered collection. The slot owns
//! the raw connection while it is idle; while lent, the handle lives in the
//! caller's [`PooledConnection`](super::PooledConnection) and the slot is empty.

use std::time::{Duration, Instant};

/// A pool slot with metadata
#[derive(Debug)]
pub(crate) struct Slot<C> {
    /// The idle connection, `None` while lent out
    conn: Option<C>,
    /// When the slot was last lent or returned
    last_used: Instant,
}

impl<C> Slot<C> {
    /// Create a slot holding an idle connection
    pub fn idle(conn: C) -> Self {
        Slot {
            conn: Some(conn),
            last_used: Instant::now(),
        }
    }

    /// Create a slot whose connection is lent out from the start
    pub fn lent() -> Self {
        Slot {
            conn: None,
            last_used: Instant::now(),
        }
    }

    /// Whether the connection is currently held by a caller
    pub fn is_busy(&self) -> bool {
        self.conn.is_none()
    }

    /// Take the connection out for lending
    pub fn lend(&mut self) -> Option<C> {
        let conn = self.conn.take();
        if conn.is_some() {
            self.last_used = Instant::now();
        }
        conn
    }

    /// Put a lent connection back
    pub fn restore(&mut self, conn: C) {
        self.conn = Some(conn);
        self.last_used = Instant::now();
    }

    /// Mutable access to the idle connection
    pub fn idle_mut(&mut self) -> Option<&mut C> {
        self.conn.as_mut()
    }

    /// Get the time since last lend or return
    pub fn idle_time(&self) -> Duration {
        self.last_used.elapsed()
    }
}
