//! Per-tick synchronous batch collection

use crate::counters::{CounterSource, SysinfoCounters};
use anyhow::Result;
use rg_sampler_core::TelemetryError;
use rg_sampler_types::{MetricBatch, MetricKind};
use std::time::Instant;

/// Reads the fast counters once per tick.
///
/// Every read is attempted; a failing read leaves its field `None` and never
/// prevents the others.
pub struct SynchronousCollector {
    source: Box<dyn CounterSource>,
}

impl SynchronousCollector {
    pub fn new() -> Self {
        Self::with_source(Box::new(SysinfoCounters::new()))
    }

    pub fn with_source(source: Box<dyn CounterSource>) -> Self {
        Self { source }
    }

    pub fn collect_batch(&mut self) -> MetricBatch {
        let captured_at = Instant::now();
        let source = self.source.as_mut();

        let batch = MetricBatch {
            cpu_percent: keep(MetricKind::CpuPercent, source.cpu_percent()),
            per_core_percent: keep(MetricKind::PerCorePercent, source.per_core_percent()),
            cpu_frequency: keep(MetricKind::CpuFrequency, source.cpu_frequency()),
            cpu_temperatures: keep(MetricKind::CpuTemperature, source.cpu_temperatures()),
            memory: keep(MetricKind::Memory, source.memory()),
            network: keep(MetricKind::Network, source.network_counters()),
            disk: keep(MetricKind::Disk, source.disk_counters()),
            captured_at,
        };

        log::trace!(
            "Collected batch in {:?} ({} missing)",
            captured_at.elapsed(),
            batch.missing().len()
        );
        batch
    }
}

impl Default for SynchronousCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn keep<T>(kind: MetricKind, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!(
                "{}",
                TelemetryError::transient(kind.as_str(), format!("{:#}", e))
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use rg_sampler_types::{
        CpuFrequency, DiskCounters, MemoryStats, NetworkCounters, SensorTemperature,
    };

    /// Scripted source; `failing` reads return errors
    struct FakeCounters {
        failing: Vec<MetricKind>,
        network: u64,
    }

    impl FakeCounters {
        fn check(&self, kind: MetricKind) -> Result<()> {
            if self.failing.contains(&kind) {
                Err(anyhow!("{} unavailable", kind.as_str()))
            } else {
                Ok(())
            }
        }
    }

    impl CounterSource for FakeCounters {
        fn cpu_percent(&mut self) -> Result<f32> {
            self.check(MetricKind::CpuPercent).map(|_| 12.5)
        }

        fn per_core_percent(&mut self) -> Result<Vec<f32>> {
            self.check(MetricKind::PerCorePercent)
                .map(|_| vec![10.0, 15.0])
        }

        fn cpu_frequency(&mut self) -> Result<CpuFrequency> {
            self.check(MetricKind::CpuFrequency).map(|_| CpuFrequency {
                current_mhz: 3000.0,
                per_core_mhz: vec![3000.0, 3000.0],
            })
        }

        fn cpu_temperatures(&mut self) -> Result<Vec<SensorTemperature>> {
            self.check(MetricKind::CpuTemperature).map(|_| {
                vec![SensorTemperature {
                    label: "coretemp Package id 0".to_string(),
                    celsius: 48.0,
                }]
            })
        }

        fn memory(&mut self) -> Result<MemoryStats> {
            self.check(MetricKind::Memory).map(|_| MemoryStats {
                total: 100,
                used: 25,
                available: 75,
                percent: 25.0,
                swap_total: 0,
                swap_used: 0,
            })
        }

        fn network_counters(&mut self) -> Result<NetworkCounters> {
            self.check(MetricKind::Network)?;
            self.network += 1000;
            Ok(NetworkCounters {
                bytes_sent: self.network,
                bytes_recv: self.network * 2,
            })
        }

        fn disk_counters(&mut self) -> Result<DiskCounters> {
            self.check(MetricKind::Disk).map(|_| DiskCounters {
                read_bytes: 4096,
                write_bytes: 8192,
            })
        }
    }

    #[test]
    fn test_full_batch() {
        let mut collector = SynchronousCollector::with_source(Box::new(FakeCounters {
            failing: Vec::new(),
            network: 0,
        }));

        let batch = collector.collect_batch();
        assert!(batch.missing().is_empty());
        assert_eq!(batch.cpu_percent, Some(12.5));
        assert_eq!(batch.per_core_percent, Some(vec![10.0, 15.0]));
        assert_eq!(batch.cpu_temperatures.unwrap()[0].celsius, 48.0);
        assert_eq!(batch.network.unwrap().bytes_recv, 2000);
    }

    #[test]
    fn test_failed_read_is_isolated() {
        let mut collector = SynchronousCollector::with_source(Box::new(FakeCounters {
            failing: vec![
                MetricKind::Network,
                MetricKind::CpuFrequency,
                MetricKind::CpuTemperature,
            ],
            network: 0,
        }));

        let batch = collector.collect_batch();
        assert_eq!(
            batch.missing(),
            vec![
                MetricKind::CpuFrequency,
                MetricKind::CpuTemperature,
                MetricKind::Network
            ]
        );
        assert_eq!(batch.memory.unwrap().percent, 25.0);
        assert_eq!(batch.disk.unwrap().write_bytes, 8192);
    }

    #[test]
    fn test_counters_advance_between_batches() {
        let mut collector = SynchronousCollector::with_source(Box::new(FakeCounters {
            failing: Vec::new(),
            network: 0,
        }));

        let first = collector.collect_batch();
        let second = collector.collect_batch();
        assert!(second.captured_at >= first.captured_at);
        assert_eq!(
            second.network.unwrap().bytes_sent - first.network.unwrap().bytes_sent,
            1000
        );
    }
}
