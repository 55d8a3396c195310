//! rg-Sampler: non-blocking hardware/OS telemetry sampling
//!
//! This library composes the telemetry components into a consumer-owned tick:
//! - Configuration management
//! - `TelemetryEngine`, which drives the synchronous collector, the rate
//!   aggregator, the background process collector and the GPU provider

pub mod config;
pub mod engine;

// Re-export commonly used types
pub use config::SamplerConfig;
pub use engine::{Cadence, TelemetryEngine, TickReport};
pub use rg_sampler_core::{RateAggregator, SampleCache, TelemetryError};
pub use rg_sampler_sources::{GpuTelemetryProvider, ProcessSnapshotCollector, SynchronousCollector};
