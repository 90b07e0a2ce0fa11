//! Test utilities and mocks for Nebulapool
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use nebulapool::config::{Config, DataSourceConfig, PoolConfig};
use nebulapool::driver::{Driver, RawConnection};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// Shared state behind every mock connection
#[derive(Debug, Default)]
pub struct MockState {
    next_id: AtomicU64,
    connects: AtomicUsize,
    invalid: Mutex<HashSet<u64>>,
    broken_checks: Mutex<HashSet<u64>>,
    closed: Mutex<Vec<u64>>,
    fail_connect: AtomicBool,
    fail_check: AtomicBool,
    check_delay_millis: AtomicU64,
}

impl MockState {
    /// Make connection `id` report itself dead
    pub fn invalidate(&self, id: u64) {
        self.invalid.lock().unwrap().insert(id);
    }

    /// Make the liveness check of connection `id` fail outright
    pub fn break_check(&self, id: u64) {
        self.broken_checks.lock().unwrap().insert(id);
    }

    /// Make every subsequent connect fail
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make the startup driver check fail
    pub fn set_fail_check(&self, fail: bool) {
        self.fail_check.store(fail, Ordering::SeqCst);
    }

    /// Make every liveness check take `delay` before answering
    pub fn set_check_delay(&self, delay: Duration) {
        self.check_delay_millis
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of successful connects so far
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Ids of closed connections, in close order
    pub fn closed(&self) -> Vec<u64> {
        self.closed.lock().unwrap().clone()
    }
}

/// Driver handing out numbered in-memory connections (ids start at 1)
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    pub state: Arc<MockState>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

/// In-memory connection identified by its creation order
#[derive(Debug)]
pub struct MockConnection {
    pub id: u64,
    state: Arc<MockState>,
}

#[async_trait]
impl RawConnection for MockConnection {
    async fn is_valid(&self, _timeout: Duration) -> Result<bool> {
        let delay = self.state.check_delay_millis.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.state.broken_checks.lock().unwrap().contains(&self.id) {
            bail!("liveness check on connection {} failed", self.id);
        }
        Ok(!self.state.invalid.lock().unwrap().contains(&self.id))
    }

    async fn close(&mut self) -> Result<()> {
        self.state.closed.lock().unwrap().push(self.id);
        Ok(())
    }
}

#[async_trait]
impl Driver for MockDriver {
    type Connection = MockConnection;

    async fn check(&self, driver: &str, _url: &str) -> Result<()> {
        if self.state.fail_check.load(Ordering::SeqCst) {
            bail!("driver {:?} not available", driver);
        }
        Ok(())
    }

    async fn connect(&self, _config: &DataSourceConfig) -> Result<Self::Connection> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            id,
            state: self.state.clone(),
        })
    }
}

/// Test configuration builder
pub struct TestConfigBuilder {
    driver: String,
    url: String,
    pool: PoolConfig,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        TestConfigBuilder {
            driver: "mock".to_string(),
            url: "mock://localhost/test".to_string(),
            pool: PoolConfig {
                min_size: 0,
                max_size: 4,
                max_wait_millis: 0,
                test_on_borrow: false,
                test_on_return: false,
                test_on_idle_interval_seconds: 0,
                validation_query: String::new(),
                validation_timeout_seconds: 1,
            },
        }
    }
}

impl TestConfigBuilder {
    /// Create a new test config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set driver identifier
    pub fn driver(mut self, driver: &str) -> Self {
        self.driver = driver.to_string();
        self
    }

    /// Set connection url
    pub fn url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// Set min and max pool size
    pub fn size(mut self, min: usize, max: usize) -> Self {
        self.pool.min_size = min;
        self.pool.max_size = max;
        self
    }

    /// Set the wait window
    pub fn max_wait_millis(mut self, millis: i64) -> Self {
        self.pool.max_wait_millis = millis;
        self
    }

    /// Enable validation with the given marker query
    pub fn validation_query(mut self, query: &str) -> Self {
        self.pool.validation_query = query.to_string();
        self
    }

    /// Validate on borrow
    pub fn test_on_borrow(mut self, enabled: bool) -> Self {
        self.pool.test_on_borrow = enabled;
        self
    }

    /// Validate on return
    pub fn test_on_return(mut self, enabled: bool) -> Self {
        self.pool.test_on_return = enabled;
        self
    }

    /// Idle validation period
    pub fn idle_interval_secs(mut self, secs: u64) -> Self {
        self.pool.test_on_idle_interval_seconds = secs;
        self
    }

    /// Liveness check timeout
    pub fn validation_timeout_secs(mut self, secs: u64) -> Self {
        self.pool.validation_timeout_seconds = secs;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        Config {
            datasource: DataSourceConfig {
                driver: self.driver,
                url: self.url,
                user: Some("tester".to_string()),
                password: Some("secret".to_string()),
            },
            pool: self.pool,
        }
    }
}

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Accept connections forever, keeping every accepted socket open
pub async fn spawn_holding_server() -> (SocketAddr, Arc<Mutex<Vec<TcpStream>>>) {
    let (listener, addr) = create_test_listener().await;
    let accepted = Arc::new(Mutex::new(Vec::new()));
    let sink = accepted.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            sink.lock().unwrap().push(stream);
        }
    });
    (addr, accepted)
}

/// Poll `check` until it holds or `timeout` elapses
pub async fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_test_listener() {
        let (listener, addr) = create_test_listener().await;
        assert!(addr.port() > 0);
        drop(listener);
    }

    #[test]
    fn test_config_builder() {
        let config = TestConfigBuilder::new()
            .size(1, 3)
            .max_wait_millis(250)
            .validation_query("SELECT 1")
            .test_on_borrow(true)
            .build();

        assert_eq!(config.datasource.driver, "mock");
        assert_eq!(config.pool.min_size, 1);
        assert_eq!(config.pool.max_size, 3);
        assert_eq!(config.pool.max_wait_millis, 250);
        assert!(config.pool.test_on_borrow);
        assert!(!config.pool.test_on_return);
    }

    #[tokio::test]
    async fn test_mock_driver_numbers_connections() {
        let driver = MockDriver::new();
        let config = DataSourceConfig::default();
        let first = driver.connect(&config).await.unwrap();
        let second = driver.connect(&config).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(driver.state.connects(), 2);

        driver.state.invalidate(1);
        assert!(!first.is_valid(Duration::from_secs(1)).await.unwrap());
        assert!(second.is_valid(Duration::from_secs(1)).await.unwrap());
    }
}
