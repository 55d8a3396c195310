//! Error taxonomy for telemetry collection
//!
//! None of these ever reach the foreground loop: each component absorbs them
//! at its boundary and degrades to a missing marker, a cached value or an
//! empty result.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A single metric read failed this tick
    #[error("transient query failure for {metric}: {reason}")]
    TransientQuery { metric: &'static str, reason: String },

    /// Native binding or external tool is absent
    #[error("{0} is not available")]
    Unavailable(String),

    /// External tool did not finish within its bound
    #[error("{program} timed out after {timeout:?}")]
    ToolTimeout { program: String, timeout: Duration },

    /// External tool exited unsuccessfully
    #[error("{program} failed: {reason}")]
    ToolFailed { program: String, reason: String },

    /// Output could not be parsed
    #[error("failed to parse {what}: {input:?}")]
    Parse { what: &'static str, input: String },

    /// Work finished after its owner was shut down
    #[error("{0} has been shut down")]
    ShutDown(&'static str),
}

impl TelemetryError {
    pub fn transient(metric: &'static str, reason: impl ToString) -> Self {
        TelemetryError::TransientQuery {
            metric,
            reason: reason.to_string(),
        }
    }

    pub fn parse(what: &'static str, input: impl Into<String>) -> Self {
        TelemetryError::Parse {
            what,
            input: input.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TelemetryError::ToolTimeout {
            program: "nvidia-smi".to_string(),
            timeout: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "nvidia-smi timed out after 1.5s");

        let err = TelemetryError::transient("disk", "no /proc/diskstats");
        assert!(err.to_string().contains("disk"));
    }
}
