//! Connection pool module for Nebulapool
//!
//! This module provides the pooled data source and the handle type it lends
//! out. Connections are created by a [`Driver`](crate::driver::Driver) and
//! reused across callers up to a configured maximum.

mod connection;
mod datasource;
mod manager;
mod slot;

pub use connection::PooledConnection;
pub use datasource::{DataSource, PoolStatus};
pub use manager::{PoolManager, PoolStats, PoolStatsSnapshot};

use crate::config::Config;
use crate::driver::Driver;
use crate::error::Result;

/// Create and initialize a data source with the given configuration
pub async fn create_pool<D: Driver>(config: Config, driver: D) -> Result<DataSource<D>> {
    let pool = DataSource::new(config, driver);
    pool.init().await?;
    Ok(pool)
}
