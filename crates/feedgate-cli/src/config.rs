//! Feeder station configuration.
//!
//! Layers: built-in defaults < TOML file < command-line flags.

use anyhow::{Context, Result};
use feedgate_core::constants::DEFAULT_BAUD_RATE;
use feedgate_core::SystemClock;
use feedgate_storage::{DatabaseConfig, FeedingPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings read from `feedgate.toml`
///
/// ```toml
/// serial_port = "/dev/ttyUSB0"
/// database_path = "/var/lib/feedgate/feedgate.db"
/// utc_offset_secs = -10800
///
/// [policy]
/// ration_size = 0.5
/// min_interval_secs = 600
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeederConfig {
    /// Serial device of the WL-134 reader
    pub serial_port: String,
    pub baud_rate: u32,
    pub database_path: String,
    /// Offset of the local calendar day from UTC, in seconds
    pub utc_offset_secs: i32,
    /// Deadline for one store operation
    pub operation_timeout_ms: u64,
    pub policy: FeedingPolicy,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyS0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            database_path: "feedgate.db".to_string(),
            utc_offset_secs: 0,
            operation_timeout_ms: 5_000,
            policy: FeedingPolicy::default(),
        }
    }
}

impl FeederConfig {
    /// Load the TOML file at `path`, or the defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.policy.validate()?;
        Ok(config)
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(&self.database_path)
            .operation_timeout(Duration::from_millis(self.operation_timeout_ms))
    }

    pub fn clock(&self) -> Result<SystemClock> {
        SystemClock::new()
            .with_utc_offset(self.utc_offset_secs)
            .context("Invalid utc_offset_secs")
    }
}
