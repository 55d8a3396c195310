//! Configuration types for the telemetry components.

pub mod gpu;
pub mod process;
pub mod rate;

// Re-export all config types for convenience
pub use gpu::GpuConfig;
pub use process::ProcessConfig;
pub use rate::RateConfig;
