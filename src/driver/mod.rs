//! Driver module for Nebulapool
//!
//! The pool never creates raw connections itself. A [`Driver`] verifies that
//! the configured driver is usable and produces [`RawConnection`]s on demand.

mod tcp;

pub use tcp::{SocketOpts, TcpConnection, TcpDriver, TCP_DRIVER};

use crate::config::DataSourceConfig;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

/// Capability surface the pool needs from a raw connection
#[async_trait]
pub trait RawConnection: Debug + Send + Sync + 'static {
    /// Report whether the connection is still alive
    ///
    /// Fails only when the check itself cannot complete.
    async fn is_valid(&self, timeout: Duration) -> Result<bool>;

    /// Close the connection; called on stale handles and at shutdown
    async fn close(&mut self) -> Result<()>;
}

/// Factory producing raw connections for the pool
#[async_trait]
pub trait Driver: Debug + Send + Sync + 'static {
    /// The connection type produced by this driver
    type Connection: RawConnection;

    /// Verify at startup that the driver can serve `driver`/`url`
    async fn check(&self, driver: &str, url: &str) -> Result<()>;

    /// Open a new raw connection
    async fn connect(&self, config: &DataSourceConfig) -> Result<Self::Connection>;
}

#[async_trait]
impl<D: Driver> Driver for std::sync::Arc<D> {
    type Connection = D::Connection;

    async fn check(&self, driver: &str, url: &str) -> Result<()> {
        (**self).check(driver, url).await
    }

    async fn connect(&self, config: &DataSourceConfig) -> Result<Self::Connection> {
        (**self).connect(config).await
    }
}
