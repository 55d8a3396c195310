//! Per-tick counter batch types

use std::time::Instant;

/// Metrics read by the synchronous collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    CpuPercent,
    PerCorePercent,
    CpuFrequency,
    Memory,
    Network,
    Disk,
    CpuTemperature,
}

impl MetricKind {
    pub const ALL: [MetricKind; 7] = [
        MetricKind::CpuPercent,
        MetricKind::PerCorePercent,
        MetricKind::CpuFrequency,
        MetricKind::CpuTemperature,
        MetricKind::Memory,
        MetricKind::Network,
        MetricKind::Disk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::CpuPercent => "cpu",
            MetricKind::PerCorePercent => "cpu_percpu",
            MetricKind::CpuFrequency => "cpu_freq",
            MetricKind::Memory => "memory",
            MetricKind::Network => "network",
            MetricKind::Disk => "disk",
            MetricKind::CpuTemperature => "cpu_temp",
        }
    }
}

/// CPU clock readings in MHz
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CpuFrequency {
    pub current_mhz: f64,
    pub per_core_mhz: Vec<f64>,
}

/// One CPU temperature sensor
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SensorTemperature {
    pub label: String,
    pub celsius: f32,
}

/// RAM and swap in bytes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MemoryStats {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent: f64,
    pub swap_total: u64,
    pub swap_used: u64,
}

/// Cumulative network byte counters summed over interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

/// Cumulative disk byte counters summed over whole disks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Result of one synchronous collection pass. `None` marks a metric whose
/// read failed this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricBatch {
    pub cpu_percent: Option<f32>,
    pub per_core_percent: Option<Vec<f32>>,
    pub cpu_frequency: Option<CpuFrequency>,
    pub cpu_temperatures: Option<Vec<SensorTemperature>>,
    pub memory: Option<MemoryStats>,
    pub network: Option<NetworkCounters>,
    pub disk: Option<DiskCounters>,
    pub captured_at: Instant,
}

impl MetricBatch {
    /// A batch with every metric missing
    pub fn empty(captured_at: Instant) -> Self {
        Self {
            cpu_percent: None,
            per_core_percent: None,
            cpu_frequency: None,
            cpu_temperatures: None,
            memory: None,
            network: None,
            disk: None,
            captured_at,
        }
    }

    pub fn is_missing(&self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::CpuPercent => self.cpu_percent.is_none(),
            MetricKind::PerCorePercent => self.per_core_percent.is_none(),
            MetricKind::CpuFrequency => self.cpu_frequency.is_none(),
            MetricKind::CpuTemperature => self.cpu_temperatures.is_none(),
            MetricKind::Memory => self.memory.is_none(),
            MetricKind::Network => self.network.is_none(),
            MetricKind::Disk => self.disk.is_none(),
        }
    }

    pub fn missing(&self) -> Vec<MetricKind> {
        MetricKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.is_missing(*kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch_reports_everything_missing() {
        let batch = MetricBatch::empty(Instant::now());
        assert_eq!(batch.missing(), MetricKind::ALL.to_vec());
    }

    #[test]
    fn test_missing_lists_only_failed_reads() {
        let mut batch = MetricBatch::empty(Instant::now());
        batch.cpu_percent = Some(12.5);
        batch.network = Some(NetworkCounters::default());

        let missing = batch.missing();
        assert!(!missing.contains(&MetricKind::CpuPercent));
        assert!(!missing.contains(&MetricKind::Network));
        assert!(missing.contains(&MetricKind::Disk));
        assert_eq!(missing.len(), 5);
    }
}
