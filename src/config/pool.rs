//! Connection pool configuration
//!
//! Defines pool sizing, wait and validation policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default minimum pool size
fn default_min_size() -> usize {
    10
}

/// Default maximum pool size
fn default_max_size() -> usize {
    300
}

/// Default maximum wait in milliseconds
fn default_max_wait_millis() -> i64 {
    60_000
}

/// Default idle validation interval in seconds
fn default_test_on_idle_interval_seconds() -> u64 {
    60
}

/// Default validation timeout in seconds
fn default_validation_timeout_seconds() -> u64 {
    5
}

/// Connection pool configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of connections created at init
    #[serde(default = "default_min_size")]
    pub min_size: usize,

    /// Upper bound on the number of pooled connections
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// How long `acquire` may wait on a saturated pool; `<= 0` fails fast
    #[serde(default = "default_max_wait_millis")]
    pub max_wait_millis: i64,

    /// Validate a connection before lending it
    #[serde(default)]
    pub test_on_borrow: bool,

    /// Validate a connection when it is released
    #[serde(default)]
    pub test_on_return: bool,

    /// Period of the idle validation task in seconds; 0 disables it
    #[serde(default = "default_test_on_idle_interval_seconds")]
    pub test_on_idle_interval_seconds: u64,

    /// Validation marker; blank disables all validation
    #[serde(default)]
    pub validation_query: String,

    /// Liveness check timeout in seconds
    #[serde(default = "default_validation_timeout_seconds")]
    pub validation_timeout_seconds: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            min_size: default_min_size(),
            max_size: default_max_size(),
            max_wait_millis: default_max_wait_millis(),
            test_on_borrow: false,
            test_on_return: false,
            test_on_idle_interval_seconds: default_test_on_idle_interval_seconds(),
            validation_query: String::new(),
            validation_timeout_seconds: default_validation_timeout_seconds(),
        }
    }
}

impl PoolConfig {
    /// Validate the pool configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.min_size > self.max_size {
            return Err(format!(
                "min_size ({}) cannot be greater than max_size ({})",
                self.min_size, self.max_size
            ));
        }
        Ok(())
    }

    /// Wait window for a saturated pool, `None` when waiting is disabled
    pub fn max_wait(&self) -> Option<Duration> {
        if self.max_wait_millis <= 0 {
            None
        } else {
            Some(Duration::from_millis(self.max_wait_millis as u64))
        }
    }

    /// Whether any validation is performed at all
    pub fn validation_enabled(&self) -> bool {
        !self.validation_query.trim().is_empty()
    }

    /// Period of the idle validation task, `None` when it must not run
    pub fn idle_interval(&self) -> Option<Duration> {
        if !self.validation_enabled() || self.test_on_idle_interval_seconds == 0 {
            return None;
        }
        Some(Duration::from_secs(self.test_on_idle_interval_seconds))
    }

    /// Timeout handed to the liveness check
    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_seconds)
    }
}
