//! Memoized hardware and OS identity
//!
//! Everything here is constant for the life of the process, so each value is
//! computed once per injected `SampleCache` and cloned afterwards.

use crate::command::run_tool_blocking;
use crate::gpu::GpuTelemetryProvider;
use rg_sampler_core::{SampleCache, TelemetryError};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

const CPU_MODEL_KEY: &str = "cpu_model";
const LOGICAL_CORES_KEY: &str = "logical_cores";
const OS_NAME_KEY: &str = "os_name";
const KERNEL_VERSION_KEY: &str = "kernel_version";
const HOST_NAME_KEY: &str = "host_name";
const TOTAL_MEMORY_KEY: &str = "total_memory";
const GPU_NAMES_KEY: &str = "gpu_names";
const MEMORY_CLOCK_KEY: &str = "memory_clock_mhz";

const MEMORY_CLOCK_TIMEOUT: Duration = Duration::from_secs(2);

fn cpu_system() -> System {
    System::new_with_specifics(RefreshKind::new().with_cpu(CpuRefreshKind::new()))
}

pub fn cpu_model_name(cache: &SampleCache) -> String {
    let value = cache.get_or_compute(CPU_MODEL_KEY, || {
        let system = cpu_system();
        let brand = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| "Unknown CPU".to_string());
        log::debug!("CPU model: {}", brand);
        json!(brand)
    });
    value.as_str().unwrap_or("Unknown CPU").to_string()
}

/// Logical core count, at least 1
pub fn logical_core_count(cache: &SampleCache) -> usize {
    let value = cache.get_or_compute(LOGICAL_CORES_KEY, || {
        let count = cpu_system().cpus().len().max(1);
        log::debug!("Logical cores: {}", count);
        json!(count)
    });
    value.as_u64().map_or(1, |count| count.max(1) as usize)
}

pub fn os_long_name(cache: &SampleCache) -> String {
    string_entry(cache, OS_NAME_KEY, System::long_os_version)
}

pub fn kernel_version(cache: &SampleCache) -> String {
    string_entry(cache, KERNEL_VERSION_KEY, System::kernel_version)
}

pub fn host_name(cache: &SampleCache) -> String {
    string_entry(cache, HOST_NAME_KEY, System::host_name)
}

/// Installed RAM in bytes
pub fn total_memory(cache: &SampleCache) -> u64 {
    let value = cache.get_or_compute(TOTAL_MEMORY_KEY, || {
        let system = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::new().with_ram()),
        );
        json!(system.total_memory())
    });
    value.as_u64().unwrap_or(0)
}

/// RAM clock in MHz as reported by `dmidecode -t memory`.
///
/// `dmidecode` needs root; without it (or off Linux) this is 0. Either way
/// the tool runs at most once per cache.
pub fn memory_clock_mhz(cache: &SampleCache) -> f64 {
    let value = cache.get_or_compute(MEMORY_CLOCK_KEY, || {
        let mhz = query_memory_clock().unwrap_or_else(|e| {
            log::debug!("Memory clock unavailable: {}", e);
            0.0
        });
        json!(mhz)
    });
    value.as_f64().unwrap_or(0.0)
}

fn query_memory_clock() -> Result<f64, TelemetryError> {
    if !cfg!(target_os = "linux") {
        return Err(TelemetryError::Unavailable("dmidecode".to_string()));
    }
    let output = run_tool_blocking(
        Path::new("dmidecode"),
        &["-t", "memory"],
        MEMORY_CLOCK_TIMEOUT,
    )?;
    parse_memory_speed(&output).ok_or_else(|| TelemetryError::parse("dmidecode memory speed", output))
}

/// First populated `Speed:` value of a `dmidecode -t memory` listing.
/// Newer versions print MT/s where older ones print MHz.
pub fn parse_memory_speed(output: &str) -> Option<f64> {
    output
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(key, _)| key.trim().ends_with("Speed"))
        .find_map(|(_, value)| {
            let mut parts = value.split_whitespace();
            let speed = parts.next()?.parse::<f64>().ok()?;
            matches!(parts.next(), Some("MHz" | "MT/s"))
                .then_some(speed)
                .filter(|speed| *speed > 0.0)
        })
}

/// Device names, resolved once through the provider
pub fn gpu_names(cache: &SampleCache, provider: &GpuTelemetryProvider) -> Vec<String> {
    let value = cache.get_or_compute(GPU_NAMES_KEY, || json!(provider.names()));
    value
        .as_array()
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn string_entry(cache: &SampleCache, key: &str, query: fn() -> Option<String>) -> String {
    let value = cache.get_or_compute(key, || json!(query().unwrap_or_else(|| "Unknown".to_string())));
    value.as_str().unwrap_or("Unknown").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_memoized() {
        let cache = SampleCache::new();

        let cores = logical_core_count(&cache);
        assert!(cores >= 1);
        assert!(cache.contains(LOGICAL_CORES_KEY));
        assert_eq!(logical_core_count(&cache), cores);

        let model = cpu_model_name(&cache);
        assert!(!model.is_empty());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_preseeded_entries_win() {
        let cache = SampleCache::new();
        cache.get_or_compute(HOST_NAME_KEY, || json!("bench-host"));
        cache.get_or_compute(LOGICAL_CORES_KEY, || json!(6));

        assert_eq!(host_name(&cache), "bench-host");
        assert_eq!(logical_core_count(&cache), 6);
    }

    #[test]
    fn test_memory_speed_from_dmidecode() {
        let output = "\
Handle 0x0040, DMI type 17, 92 bytes
Memory Device
\tSize: No Module Installed
\tSpeed: Unknown
\tConfigured Memory Speed: Unknown

Handle 0x0041, DMI type 17, 92 bytes
Memory Device
\tSize: 16 GB
\tSpeed: 3200 MT/s
\tConfigured Memory Speed: 2933 MT/s
";
        assert_eq!(parse_memory_speed(output), Some(3200.0));
        assert_eq!(parse_memory_speed("\tSpeed: 2400 MHz\n"), Some(2400.0));
        assert_eq!(parse_memory_speed("\tSpeed: Unknown\n"), None);
        assert_eq!(parse_memory_speed(""), None);
    }

    #[test]
    fn test_memory_clock_is_memoized() {
        let cache = SampleCache::new();
        let first = memory_clock_mhz(&cache);
        assert!(first >= 0.0);
        assert!(cache.contains(MEMORY_CLOCK_KEY));

        cache.reset();
        cache.get_or_compute(MEMORY_CLOCK_KEY, || json!(2666.0));
        assert_eq!(memory_clock_mhz(&cache), 2666.0);
    }

    #[test]
    fn test_gpu_names_without_backend() {
        let cache = SampleCache::new();
        let provider = GpuTelemetryProvider::unavailable();
        assert!(gpu_names(&cache, &provider).is_empty());
        assert!(cache.contains(GPU_NAMES_KEY));
    }
}
