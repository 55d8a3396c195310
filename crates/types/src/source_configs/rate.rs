//! Rate aggregator configuration types.

use serde::{Deserialize, Serialize};

use crate::rate::RateUnit;

fn default_tau_secs() -> f64 {
    10.0
}

/// Rate aggregator configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
    /// Baseline decay time constant in seconds
    #[serde(default = "default_tau_secs")]
    pub tau_secs: f64,
    #[serde(default)]
    pub display_unit: RateUnit,
}

impl RateConfig {
    /// Time constant, falling back to the default when not strictly positive
    pub fn tau(&self) -> f64 {
        if self.tau_secs.is_finite() && self.tau_secs > 0.0 {
            self.tau_secs
        } else {
            log::warn!(
                "Invalid baseline time constant {}s, using {}s",
                self.tau_secs,
                default_tau_secs()
            );
            default_tau_secs()
        }
    }
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            tau_secs: default_tau_secs(),
            display_unit: RateUnit::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_positive_tau_falls_back() {
        let config = RateConfig {
            tau_secs: 0.0,
            ..RateConfig::default()
        };
        assert_eq!(config.tau(), 10.0);
    }
}
