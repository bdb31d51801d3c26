//! Run configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SquashError};
use crate::github::PAGE_SIZE;

/// Pause between consecutive settings updates when none is configured.
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(1);

/// Configuration for a synchronization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Minimum pause between consecutive settings updates.
    pub throttle: Duration,
    /// Update every owned repository, compliant or not.
    pub force: bool,
    /// Repositories requested per GraphQL page.
    pub page_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self {
            throttle: DEFAULT_THROTTLE,
            force: false,
            page_size: PAGE_SIZE,
        }
    }

    /// Sets the pause between updates.
    pub fn throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Enables force mode.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Sets the GraphQL page size.
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }
}

/// Parse a `--sleep` value: a non-negative, finite number of seconds.
pub fn parse_sleep_seconds(value: &str) -> Result<Duration> {
    let trimmed = value.trim();
    let seconds: f64 = trimmed.parse().map_err(|_| {
        SquashError::InvalidConfig(format!("sleep must be a number of seconds, got '{}'", value))
    })?;

    Duration::try_from_secs_f64(seconds).map_err(|_| {
        let problem = if seconds.is_sign_negative() {
            "must not be negative"
        } else {
            "must be a finite number of seconds small enough to represent"
        };
        SquashError::InvalidConfig(format!("sleep {}, got '{}'", problem, value))
    })
}
