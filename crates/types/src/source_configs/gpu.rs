//! GPU provider configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Polling the command-line tool faster than this hammers the driver
pub const MIN_TOOL_POLL_INTERVAL_MS: u64 = 1000;

fn default_prefer_native() -> bool {
    true
}

fn default_tool_program() -> String {
    "nvidia-smi".to_string()
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_tool_timeout() -> u64 {
    1500
}

fn default_shutdown_timeout() -> u64 {
    2000
}

/// GPU provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuConfig {
    /// Try the native binding before the command-line tool
    #[serde(default = "default_prefer_native")]
    pub prefer_native: bool,
    /// Name or path of the vendor command-line tool
    #[serde(default = "default_tool_program")]
    pub tool_program: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_ms: u64,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

impl GpuConfig {
    /// Poll interval, never below the tool minimum
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_TOOL_POLL_INTERVAL_MS))
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            prefer_native: default_prefer_native(),
            tool_program: default_tool_program(),
            poll_interval_ms: default_poll_interval(),
            tool_timeout_ms: default_tool_timeout(),
            shutdown_timeout_ms: default_shutdown_timeout(),
        }
    }
}
