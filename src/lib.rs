//! # Nebulapool - Bounded Connection Pool
//!
//! Nebulapool sits between application code and a database driver. It keeps
//! a bounded set of connections created by an external driver factory and
//! lends them out to callers, growing on demand and validating connections
//! so that stale handles are replaced transparently.
//!
//! ## Features
//!
//! - **Bounded growth**: starts with `min_size` connections, grows one at a
//!   time up to `max_size`
//! - **Bounded waiting**: a saturated pool either fails fast or waits up to
//!   `max_wait_millis` for a release
//! - **Validation**: optional liveness checks on borrow, on return and on a
//!   fixed idle schedule
//! - **Driver agnostic**: any [`driver::Driver`] implementation can back the
//!   pool; a plain TCP driver is included
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nebulapool::config::load_config;
//! use nebulapool::driver::TcpDriver;
//! use nebulapool::pool::DataSource;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("nebulapool.toml")?;
//!     let pool = DataSource::new(config, TcpDriver::with_defaults());
//!     pool.init().await?;
//!
//!     let conn = pool.acquire().await?;
//!     // use conn.stream() ...
//!     pool.release(conn).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! caller -> DataSource::acquire -> (first free | grow | wait) -> PooledConnection
//! caller -> DataSource::release -> validate? -> idle -> wake waiters
//! idle task -> validate every idle connection on a fixed schedule
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod driver;
pub mod error;
pub mod pool;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{PoolError, Result};
pub use pool::{DataSource, PooledConnection};

/// Version of the Nebulapool library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
