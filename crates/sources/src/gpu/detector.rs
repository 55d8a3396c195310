//! GPU backend negotiation

use super::backend::{GpuSnapshot, GpuTool, NativeGpu};
use super::poller::ToolPoller;
use super::smi::NvidiaSmi;
use super::Backend;
use arc_swap::ArcSwap;
use rg_sampler_types::GpuConfig;
use std::sync::Arc;

/// Try the native binding
pub(super) fn probe_native() -> Option<Box<dyn NativeGpu>> {
    #[cfg(feature = "nvidia")]
    {
        match super::nvidia::NvmlBinding::init() {
            Ok(binding) => Some(Box::new(binding)),
            Err(e) => {
                log::info!("NVML: Not available ({})", e);
                None
            }
        }
    }

    #[cfg(not(feature = "nvidia"))]
    {
        log::info!("NVML: NVIDIA support not compiled in");
        None
    }
}

/// Find the command-line tool on PATH
pub(super) fn locate_tool(config: &GpuConfig) -> Option<NvidiaSmi> {
    match which::which(&config.tool_program) {
        Ok(path) => {
            log::info!("Found {} at {}", config.tool_program, path.display());
            Some(NvidiaSmi::new(path, config.tool_timeout()))
        }
        Err(e) => {
            log::info!("{}: Not available ({})", config.tool_program, e);
            None
        }
    }
}

/// Pick the first backend that reports at least one device: native binding,
/// then command-line tool, then nothing.
pub(super) fn select_backend<T: GpuTool>(
    config: &GpuConfig,
    native: Option<Box<dyn NativeGpu>>,
    tool: Option<T>,
    published: &Arc<ArcSwap<GpuSnapshot>>,
) -> Backend {
    if let Some(native) = native {
        match native.names() {
            Ok(names) if !names.is_empty() => {
                log::warn!("GPU backend: native ({} device(s))", names.len());
                log_devices(&names);
                published.store(Arc::new(GpuSnapshot::named(names)));
                return Backend::Native(native);
            }
            Ok(_) => log::info!("Native GPU binding reports no devices"),
            Err(e) => log::info!("Native GPU binding unusable: {:#}", e),
        }
    }

    if let Some(tool) = tool {
        let program = tool.program();
        match ToolPoller::start(tool, config, Arc::clone(published)) {
            Ok((poller, names)) => {
                log::warn!("GPU backend: {} ({} device(s))", program, names.len());
                log_devices(&names);
                return Backend::ExternalTool(poller);
            }
            Err(e) => log::info!("{} unusable: {}", program, e),
        }
    }

    log::warn!("No GPU telemetry backend available");
    Backend::None
}

fn log_devices(names: &[String]) {
    for (index, name) in names.iter().enumerate() {
        log::info!("  [{}] {}", index, name);
    }
}
