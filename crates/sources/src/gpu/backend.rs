//! GPU backend seams

use anyhow::Result;
use rg_sampler_core::TelemetryError;
use rg_sampler_types::VramInfo;
use std::future::Future;
use std::time::Instant;

/// In-process vendor binding, queried synchronously on every accessor call
pub trait NativeGpu: Send + Sync {
    fn names(&self) -> Result<Vec<String>>;

    /// Utilization in percent, per device
    fn utilizations(&self) -> Result<Vec<f32>>;

    fn vram(&self) -> Result<Vec<VramInfo>>;

    /// Graphics clock in MHz, per device
    fn frequencies(&self) -> Result<Vec<f32>>;

    /// Core temperature in °C, per device; `None` where a device has no sensor
    fn temperatures(&self) -> Result<Vec<Option<f32>>>;
}

/// Vendor command-line tool, driven only from the poller thread
pub trait GpuTool: Send + 'static {
    /// Name used in logs and errors
    fn program(&self) -> String;

    fn query_names(&self) -> impl Future<Output = Result<Vec<String>, TelemetryError>>;

    fn poll(&self) -> impl Future<Output = Result<ToolReading, TelemetryError>>;
}

/// One poll of the command-line tool. An empty field means "not reported"
/// and leaves the published value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolReading {
    pub utilizations: Vec<f32>,
    pub vram: Vec<VramInfo>,
    pub frequencies: Vec<f32>,
    pub temperatures: Vec<Option<f32>>,
}

/// Last published GPU values, shared between the poller and the accessors.
/// A metric list stays empty until that metric has been measured once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpuSnapshot {
    pub names: Vec<String>,
    pub utilizations: Vec<f32>,
    pub vram: Vec<VramInfo>,
    pub frequencies: Vec<f32>,
    pub temperatures: Vec<Option<f32>>,
    /// `None` until the first successful metric query
    pub captured_at: Option<Instant>,
}

impl GpuSnapshot {
    /// Device names only, nothing measured yet
    pub fn named(names: Vec<String>) -> Self {
        Self {
            names,
            ..Self::default()
        }
    }

    pub(super) fn merged(&self, reading: ToolReading) -> Self {
        let mut next = self.clone();
        if !reading.utilizations.is_empty() {
            next.utilizations = reading.utilizations;
        }
        if !reading.vram.is_empty() {
            next.vram = reading.vram;
        }
        if !reading.frequencies.is_empty() {
            next.frequencies = reading.frequencies;
        }
        if !reading.temperatures.is_empty() {
            next.temperatures = reading.temperatures;
        }
        next.captured_at = Some(Instant::now());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_unreported_fields() {
        let base = GpuSnapshot::named(vec!["GPU".to_string()]);
        assert!(base.utilizations.is_empty());
        assert!(base.captured_at.is_none());

        let first = base.merged(ToolReading {
            frequencies: vec![1500.0],
            ..ToolReading::default()
        });
        let next = first.merged(ToolReading {
            utilizations: vec![50.0],
            ..ToolReading::default()
        });

        assert_eq!(next.utilizations, vec![50.0]);
        assert_eq!(next.frequencies, vec![1500.0]);
        assert!(next.temperatures.is_empty());
        assert_eq!(next.names, base.names);
        assert!(next.captured_at.is_some());
    }
}
