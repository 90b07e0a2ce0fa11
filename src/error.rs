//! Error types for Nebulapool
//!
//! This module defines the error taxonomy surfaced by the pool.

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the pool API
pub type Result<T> = std::result::Result<T, PoolError>;

/// Main error type for pool operations
#[derive(Error, Debug)]
pub enum PoolError {
    /// Missing or invalid configuration at init
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No free connection, no capacity left and waiting is disabled
    #[error("Pool exhausted: all {max_size} connections are busy")]
    PoolExhausted {
        /// Configured maximum pool size
        max_size: usize,
    },

    /// The wait window elapsed without a connection becoming free
    #[error("Timed out after {waited:?} waiting for a free connection")]
    AcquireTimeout {
        /// How long the caller actually waited
        waited: Duration,
    },

    /// A waiting caller was interrupted by pool shutdown
    #[error("Interrupted while waiting for a free connection")]
    WaitInterrupted,

    /// Liveness check or replacement connection failed
    #[error("Connection validation failed: {0:#}")]
    ValidationFailed(#[source] anyhow::Error),

    /// The driver could not be loaded or a raw connection could not be created
    #[error("Driver error: {0:#}")]
    Driver(#[source] anyhow::Error),

    /// The pool is not initialized or has been shut down
    #[error("Pool is closed")]
    Closed,

    /// The connection was lent by a different pool
    #[error("Connection does not belong to this pool")]
    ForeignConnection,
}

impl PoolError {
    /// Whether a later `acquire` may succeed without any configuration change
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PoolError::PoolExhausted { .. }
                | PoolError::AcquireTimeout { .. }
                | PoolError::ValidationFailed(_)
                | PoolError::Driver(_)
        )
    }
}
