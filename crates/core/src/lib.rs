//! rg-sampler-core: Caching, rate aggregation and error types for rg-Sampler.
//!
//! This crate contains the stateful pieces that sit between raw collectors
//! and the consumer: the single-flight `SampleCache`, the per-stream
//! `RateAggregator`, the error taxonomy and shared constants.

pub mod cache;
pub mod constants;
pub mod error;
pub mod rate;

pub use cache::SampleCache;
pub use constants::{
    BYTES_PER_GIB, DEFAULT_GPU_INTERVAL, DEFAULT_PROCESS_INTERVAL, DEFAULT_TICK_INTERVAL, MAX_TRACKED_CORES,
};
pub use error::TelemetryError;
pub use rate::{decay_factor, RateAggregator, RateTracker};

// Re-export types used in public signatures for convenience
pub use rg_sampler_types::{CounterStream, RateConfig, RateEstimate, RateUnit, RawCounterPair};
