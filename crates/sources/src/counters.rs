//! Fast counter reads backed by sysinfo

use anyhow::{anyhow, Result};
use rg_sampler_types::{
    CpuFrequency, DiskCounters, MemoryStats, NetworkCounters, SensorTemperature,
};
use sysinfo::{Components, CpuRefreshKind, MemoryRefreshKind, Networks, RefreshKind, System};

/// Sensor chips that report CPU package or core temperatures
const CPU_SENSOR_CHIPS: [&str; 4] = ["coretemp", "k10temp", "cpu_thermal", "cpu-thermal"];

/// A source of the per-tick system counters.
///
/// Each read is independent: an `Err` only affects that metric for the
/// current batch.
pub trait CounterSource: Send {
    /// Aggregate CPU utilization in percent
    fn cpu_percent(&mut self) -> Result<f32>;

    /// Per-core utilization in percent, in core order
    fn per_core_percent(&mut self) -> Result<Vec<f32>>;

    fn cpu_frequency(&mut self) -> Result<CpuFrequency>;

    /// Readings of the CPU temperature sensors, in °C
    fn cpu_temperatures(&mut self) -> Result<Vec<SensorTemperature>>;

    fn memory(&mut self) -> Result<MemoryStats>;

    /// Cumulative bytes over all interfaces
    fn network_counters(&mut self) -> Result<NetworkCounters>;

    /// Cumulative bytes over all whole disks
    fn disk_counters(&mut self) -> Result<DiskCounters>;
}

/// `CounterSource` reading through sysinfo and procfs
pub struct SysinfoCounters {
    system: System,
    networks: Networks,
    components: Components,
}

impl SysinfoCounters {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );

        let components = Components::new_with_refreshed_list();
        log::info!("Temperature sensors discovered: {}", components.len());

        Self {
            system,
            networks: Networks::new_with_refreshed_list(),
            components,
        }
    }
}

impl Default for SysinfoCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for SysinfoCounters {
    fn cpu_percent(&mut self) -> Result<f32> {
        self.system.refresh_cpu_usage();
        if self.system.cpus().is_empty() {
            return Err(anyhow!("No CPUs reported"));
        }
        Ok(self.system.global_cpu_usage())
    }

    // Reuses the usage refreshed by `cpu_percent`; a second refresh this
    // close to the first would measure a near-zero window.
    fn per_core_percent(&mut self) -> Result<Vec<f32>> {
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return Err(anyhow!("No CPUs reported"));
        }
        Ok(cpus.iter().map(|cpu| cpu.cpu_usage()).collect())
    }

    fn cpu_frequency(&mut self) -> Result<CpuFrequency> {
        self.system.refresh_cpu_frequency();
        let per_core_mhz: Vec<f64> = self
            .system
            .cpus()
            .iter()
            .map(|cpu| cpu.frequency() as f64)
            .collect();

        if per_core_mhz.is_empty() {
            return Err(anyhow!("No CPU frequency data"));
        }

        let current_mhz = per_core_mhz.iter().sum::<f64>() / per_core_mhz.len() as f64;
        Ok(CpuFrequency {
            current_mhz,
            per_core_mhz,
        })
    }

    fn cpu_temperatures(&mut self) -> Result<Vec<SensorTemperature>> {
        self.components.refresh();
        let readings = cpu_sensor_temperatures(
            self.components
                .iter()
                .map(|component| (component.label(), component.temperature())),
        );

        if readings.is_empty() {
            return Err(anyhow!("No CPU temperature sensors"));
        }
        Ok(readings)
    }

    fn memory(&mut self) -> Result<MemoryStats> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            return Err(anyhow!("Memory totals unavailable"));
        }
        let used = self.system.used_memory();

        Ok(MemoryStats {
            total,
            used,
            available: self.system.available_memory(),
            percent: used as f64 / total as f64 * 100.0,
            swap_total: self.system.total_swap(),
            swap_used: self.system.used_swap(),
        })
    }

    fn network_counters(&mut self) -> Result<NetworkCounters> {
        self.networks.refresh();

        let mut counters = NetworkCounters::default();
        for (_name, data) in self.networks.iter() {
            counters.bytes_sent = counters.bytes_sent.saturating_add(data.total_transmitted());
            counters.bytes_recv = counters.bytes_recv.saturating_add(data.total_received());
        }
        Ok(counters)
    }

    fn disk_counters(&mut self) -> Result<DiskCounters> {
        read_disk_counters()
    }
}

/// Keep the readings of known CPU sensor chips. Labels are prefixed with the
/// chip name (`coretemp Package id 0`, `k10temp Tctl`); non-positive and
/// non-finite values are dropped.
pub fn cpu_sensor_temperatures<'a>(
    components: impl IntoIterator<Item = (&'a str, f32)>,
) -> Vec<SensorTemperature> {
    components
        .into_iter()
        .filter(|(label, celsius)| {
            let label = label.to_lowercase();
            CPU_SENSOR_CHIPS.iter().any(|chip| label.contains(chip))
                && celsius.is_finite()
                && *celsius > 0.0
        })
        .map(|(label, celsius)| SensorTemperature {
            label: label.to_string(),
            celsius,
        })
        .collect()
}

#[cfg(target_os = "linux")]
fn read_disk_counters() -> Result<DiskCounters> {
    let content = std::fs::read_to_string("/proc/diskstats")?;
    crate::diskstats::parse_diskstats(&content, |name| {
        std::path::Path::new("/sys/block").join(name).exists()
    })
}

#[cfg(not(target_os = "linux"))]
fn read_disk_counters() -> Result<DiskCounters> {
    Err(anyhow!("Disk counters are only read from procfs"))
}
