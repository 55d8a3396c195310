//! rg-sampler-types: Shared data types for the rg-Sampler telemetry engine.
//!
//! This crate contains pure data types (samples, counter pairs, rate
//! estimates, GPU readings, process snapshots and the per-component
//! configuration structs) shared by every rg-Sampler crate. It has no
//! dependency on any OS or vendor facility.

pub mod gpu;
pub mod metrics;
pub mod process;
pub mod rate;
pub mod sample;
pub mod source_configs;

// Re-export commonly used types at the crate root for convenience
pub use gpu::{GpuBackendKind, GpuReading, VramInfo};
pub use metrics::{
    CpuFrequency, DiskCounters, MemoryStats, MetricBatch, MetricKind, NetworkCounters,
    SensorTemperature,
};
pub use process::{AffinityBucket, ProcessBucket, ProcessInfo, ProcessRecord, ProcessSnapshot};
pub use rate::{CounterStream, RateEstimate, RateUnit, RawCounterPair};
pub use sample::{Sample, SampleValue, SourceTag};
pub use source_configs::{GpuConfig, ProcessConfig, RateConfig};
