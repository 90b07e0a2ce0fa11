//! Data source configuration
//!
//! Identifies the driver and the target the driver connects to.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Driver and connection target
    #[serde(default)]
    pub datasource: DataSourceConfig,

    /// Pool sizing and validation policy
    #[serde(default)]
    pub pool: super::PoolConfig,
}

/// Driver and connection target
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct DataSourceConfig {
    /// Driver identifier (e.g., "tcp")
    #[serde(default)]
    pub driver: String,

    /// Connection URI (e.g., "tcp://db.example.com:5432")
    #[serde(default)]
    pub url: String,

    /// User name passed to the driver
    #[serde(default)]
    pub user: Option<String>,

    /// Password passed to the driver
    #[serde(default)]
    pub password: Option<String>,
}

impl DataSourceConfig {
    /// Validate the data source configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.driver.trim().is_empty() && self.url.trim().is_empty() {
            return Err("datasource driver and url are both missing".to_string());
        }
        Ok(())
    }
}

impl Config {
    /// Validate the full configuration
    pub fn validate(&self) -> Result<(), String> {
        self.datasource.validate()?;
        self.pool.validate()
    }
}
