//! Process collector configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_top_n() -> usize {
    10
}

fn default_shutdown_timeout() -> u64 {
    2000
}

/// Process collector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Entries kept per affinity bucket
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Initial filter text (case-insensitive name substring or exact pid)
    #[serde(default)]
    pub filter: String,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

impl ProcessConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            filter: String::new(),
            shutdown_timeout_ms: default_shutdown_timeout(),
        }
    }
}
