//! Counter pairs, rate estimates and display units.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Bytes per binary unit
const BYTES_PER_KIB: f64 = 1024.0;
const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Bytes per decimal unit
const BYTES_PER_KB: f64 = 1_000.0;
const BYTES_PER_MB: f64 = 1_000_000.0;
const BYTES_PER_GB: f64 = 1_000_000_000.0;

/// Two cumulative counters read together (e.g. bytes sent / bytes received),
/// stamped with the instant they were read at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCounterPair {
    pub first: u64,
    pub second: u64,
    pub captured_at: Instant,
}

impl RawCounterPair {
    pub fn new(first: u64, second: u64, captured_at: Instant) -> Self {
        Self {
            first,
            second,
            captured_at,
        }
    }
}

/// Cumulative counter streams that each get their own rate baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterStream {
    NetworkUp,
    NetworkDown,
    DiskRead,
    DiskWrite,
}

impl CounterStream {
    pub const ALL: [CounterStream; 4] = [
        CounterStream::NetworkUp,
        CounterStream::NetworkDown,
        CounterStream::DiskRead,
        CounterStream::DiskWrite,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CounterStream::NetworkUp => "net up",
            CounterStream::NetworkDown => "net down",
            CounterStream::DiskRead => "disk read",
            CounterStream::DiskWrite => "disk write",
        }
    }
}

/// Instantaneous rate (bytes per second) plus the decaying baseline used to
/// scale a display axis. `rate` is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RateEstimate {
    pub rate: f64,
    pub baseline: f64,
}

impl RateEstimate {
    pub fn new(rate: f64, baseline: f64) -> Self {
        Self {
            rate: rate.max(0.0),
            baseline: baseline.max(0.0),
        }
    }

    /// Rate and baseline converted to a display unit
    pub fn in_unit(&self, unit: RateUnit) -> (f64, f64) {
        (unit.convert(self.rate), unit.convert(self.baseline))
    }
}

/// Display units for byte rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RateUnit {
    BytesPerSec,
    KiBPerSec,
    #[default]
    MiBPerSec,
    GiBPerSec,
    KBPerSec,
    MBPerSec,
    GBPerSec,
}

impl RateUnit {
    /// Convert a bytes-per-second value to this unit
    pub fn convert(&self, bytes_per_sec: f64) -> f64 {
        match self {
            RateUnit::BytesPerSec => bytes_per_sec,
            RateUnit::KiBPerSec => bytes_per_sec / BYTES_PER_KIB,
            RateUnit::MiBPerSec => bytes_per_sec / BYTES_PER_MIB,
            RateUnit::GiBPerSec => bytes_per_sec / BYTES_PER_GIB,
            RateUnit::KBPerSec => bytes_per_sec / BYTES_PER_KB,
            RateUnit::MBPerSec => bytes_per_sec / BYTES_PER_MB,
            RateUnit::GBPerSec => bytes_per_sec / BYTES_PER_GB,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            RateUnit::BytesPerSec => "B/s",
            RateUnit::KiBPerSec => "KiB/s",
            RateUnit::MiBPerSec => "MiB/s",
            RateUnit::GiBPerSec => "GiB/s",
            RateUnit::KBPerSec => "KB/s",
            RateUnit::MBPerSec => "MB/s",
            RateUnit::GBPerSec => "GB/s",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_mebibyte_per_second_conversion() {
        let estimate = RateEstimate::new(1_048_576.0, 1_048_576.0);

        let (mib, _) = estimate.in_unit(RateUnit::MiBPerSec);
        let (mb, _) = estimate.in_unit(RateUnit::MBPerSec);

        assert!((mib - 1.0).abs() < 1e-12);
        assert!((mb - 1.048576).abs() < 1e-12);
    }

    #[test]
    fn test_negative_rate_is_clamped() {
        let estimate = RateEstimate::new(-5.0, -1.0);
        assert_eq!(estimate.rate, 0.0);
        assert_eq!(estimate.baseline, 0.0);
    }

    #[test]
    fn test_rate_unit_serialization() {
        let json = serde_json::to_string(&RateUnit::KBPerSec).unwrap();
        let unit: RateUnit = serde_json::from_str(&json).unwrap();
        assert_eq!(unit, RateUnit::KBPerSec);
        assert_eq!(unit.suffix(), "KB/s");
    }
}
