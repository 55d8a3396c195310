//! Consumer-owned tick composing every telemetry component
//!
//! The engine is driven from a single foreground loop. Each `tick` reads the
//! fast counters synchronously, feeds the rate aggregator, and only ever
//! *requests* slow work: process collection runs on its own worker and GPU
//! polling on its own thread.

mod cadence;

pub use cadence::Cadence;

use crate::config::SamplerConfig;
use anyhow::Result;
use rg_sampler_core::{RateAggregator, SampleCache, TelemetryError};
use rg_sampler_sources::{system_info, GpuTelemetryProvider, ProcessSnapshotCollector, SynchronousCollector};
use rg_sampler_types::{
    CounterStream, GpuReading, MetricBatch, ProcessSnapshot, RateEstimate, RawCounterPair, Sample,
    SampleValue, SourceTag,
};
use std::collections::HashMap;
use std::time::Instant;

/// Everything one tick produced
#[derive(Debug, Clone)]
pub struct TickReport {
    pub batch: MetricBatch,
    /// Latest estimate for every counter stream
    pub rates: HashMap<CounterStream, RateEstimate>,
    /// Set when a process collection was requested this tick
    pub process_requested: bool,
    /// A snapshot that finished since the previous tick
    pub processes: Option<ProcessSnapshot>,
    /// Set when the GPU cadence elapsed and a backend is available
    pub gpu: Option<Vec<GpuReading>>,
}

impl TickReport {
    pub fn rate(&self, stream: CounterStream) -> RateEstimate {
        self.rates.get(&stream).copied().unwrap_or_default()
    }

    /// Flatten the report into tagged samples
    pub fn samples(&self) -> Vec<Sample> {
        let at = self.batch.captured_at;
        let mut samples = Vec::new();

        if let Some(cpu) = self.batch.cpu_percent {
            samples.push(Sample::scalar(f64::from(cpu), SourceTag::Cpu, at));
        }
        if let Some(cores) = &self.batch.per_core_percent {
            let values = cores.iter().map(|c| f64::from(*c)).collect();
            samples.push(Sample::new(SampleValue::Vector(values), SourceTag::Cpu, at));
        }
        if let Some(memory) = &self.batch.memory {
            samples.push(Sample::scalar(memory.percent, SourceTag::Memory, at));
        }
        if self.batch.network.is_some() {
            let values = vec![
                self.rate(CounterStream::NetworkUp).rate,
                self.rate(CounterStream::NetworkDown).rate,
            ];
            samples.push(Sample::new(SampleValue::Vector(values), SourceTag::Network, at));
        }
        if self.batch.disk.is_some() {
            let values = vec![
                self.rate(CounterStream::DiskRead).rate,
                self.rate(CounterStream::DiskWrite).rate,
            ];
            samples.push(Sample::new(SampleValue::Vector(values), SourceTag::Disk, at));
        }
        if let Some(gpus) = &self.gpu {
            let values = gpus
                .iter()
                .filter_map(|g| g.utilization.map(f64::from))
                .collect();
            samples.push(Sample::new(SampleValue::Vector(values), SourceTag::Gpu, at));
        }
        if let Some(snapshot) = &self.processes {
            samples.push(Sample::scalar(
                snapshot.process_count as f64,
                SourceTag::Process,
                snapshot.captured_at,
            ));
        }

        samples
    }
}

/// Owns one of each telemetry component
pub struct TelemetryEngine {
    cache: SampleCache,
    collector: SynchronousCollector,
    rates: RateAggregator,
    processes: ProcessSnapshotCollector,
    gpu: GpuTelemetryProvider,
    process_cadence: Cadence,
    gpu_cadence: Cadence,
    filter: String,
    last_tick: Option<Instant>,
    shut_down: bool,
}

impl TelemetryEngine {
    /// Build the engine on the real system primitives
    pub fn new(config: &SamplerConfig) -> Result<Self> {
        log::warn!("=== Starting telemetry engine ===");

        let collector = SynchronousCollector::new();
        let processes = ProcessSnapshotCollector::new(&config.process)?;
        let gpu = GpuTelemetryProvider::new(&config.gpu);

        Ok(Self::with_components(config, collector, processes, gpu))
    }

    pub fn with_components(
        config: &SamplerConfig,
        collector: SynchronousCollector,
        processes: ProcessSnapshotCollector,
        gpu: GpuTelemetryProvider,
    ) -> Self {
        Self {
            cache: SampleCache::new(),
            collector,
            rates: RateAggregator::new(&config.rate),
            processes,
            gpu,
            process_cadence: Cadence::new(config.process_interval()),
            gpu_cadence: Cadence::new(config.gpu_interval()),
            filter: config.process.filter.clone(),
            last_tick: None,
            shut_down: false,
        }
    }

    pub fn cache(&self) -> &SampleCache {
        &self.cache
    }

    pub fn gpu(&self) -> &GpuTelemetryProvider {
        &self.gpu
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Applies from the next process collection
    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    pub fn core_count(&self) -> usize {
        system_info::logical_core_count(&self.cache)
    }

    /// Run one foreground tick. Never blocks on process enumeration or the
    /// GPU tool.
    pub fn tick(&mut self, now: Instant) -> Result<TickReport, TelemetryError> {
        if self.shut_down {
            return Err(TelemetryError::ShutDown("telemetry engine"));
        }

        let dt = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last_tick = Some(now);

        let batch = self.collector.collect_batch();

        if let Some(network) = batch.network {
            self.rates.update_pair(
                (CounterStream::NetworkUp, CounterStream::NetworkDown),
                RawCounterPair::new(network.bytes_sent, network.bytes_recv, batch.captured_at),
            );
        }
        if let Some(disk) = batch.disk {
            self.rates.update_pair(
                (CounterStream::DiskRead, CounterStream::DiskWrite),
                RawCounterPair::new(disk.read_bytes, disk.write_bytes, batch.captured_at),
            );
        }
        let rates = CounterStream::ALL
            .iter()
            .map(|stream| (*stream, self.rates.estimate(*stream)))
            .collect();

        let process_requested = self.process_cadence.advance(dt);
        if process_requested {
            self.processes.collect_async(self.core_count(), &self.filter);
        }
        let processes = self.processes.get_result();

        let gpu = if self.gpu_cadence.advance(dt) && self.gpu.backend().is_available() {
            Some(self.gpu.readings())
        } else {
            None
        };

        log::trace!("Tick took {:?}", now.elapsed());

        Ok(TickReport {
            batch,
            rates,
            process_requested,
            processes,
            gpu,
        })
    }

    /// Stop both background components. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        log::warn!("=== Stopping telemetry engine ===");
        self.processes.shutdown();
        self.gpu.shutdown();
    }
}

impl Drop for TelemetryEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
