//! rg-sampler-sources: Telemetry collectors for rg-Sampler.
//!
//! - `SynchronousCollector` reads the fast per-tick counters
//! - `ProcessSnapshotCollector` enumerates the process table off-thread
//! - `GpuTelemetryProvider` negotiates NVML / nvidia-smi / nothing
//! - `system_info` memoizes hardware identity through a `SampleCache`

mod collector;
mod command;
mod counters;
mod diskstats;
pub mod gpu;
pub mod process;
pub mod system_info;

pub use collector::SynchronousCollector;
pub use command::{run_tool, run_tool_blocking};
pub use counters::{cpu_sensor_temperatures, CounterSource, SysinfoCounters};
pub use diskstats::parse_diskstats;
pub use gpu::{GpuSnapshot, GpuTelemetryProvider, GpuTool, NativeGpu, NvidiaSmi, ToolReading};
pub use process::{
    build_snapshot, matches_filter, parse_cpu_list, ProcessEnumerator, ProcessSnapshotCollector,
    SysinfoEnumerator,
};
