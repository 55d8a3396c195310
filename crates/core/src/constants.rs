//! Shared constants for the telemetry engine

use std::time::Duration;

/// Default foreground tick (100ms)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Default cadence for process-table refreshes
pub const DEFAULT_PROCESS_INTERVAL: Duration = Duration::from_millis(2000);

/// Default cadence for reading GPU accessors
pub const DEFAULT_GPU_INTERVAL: Duration = Duration::from_millis(1000);

/// Upper bound on core buckets, guards against a bogus core count
pub const MAX_TRACKED_CORES: usize = 4096;

/// Bytes per GiB, for human-readable memory totals
pub const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;
