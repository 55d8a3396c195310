//! GPU telemetry
//!
//! `GpuTelemetryProvider` negotiates one backend at construction:
//!
//! - `Native`: an in-process binding (NVML), queried on every accessor call
//! - `ExternalTool`: `nvidia-smi`, polled on a background thread; accessors
//!   read the last published values
//! - `None`: every accessor returns an empty list

mod backend;
mod detector;
#[cfg(feature = "nvidia")]
mod nvidia;
mod poller;
mod smi;

pub use backend::{GpuSnapshot, GpuTool, NativeGpu, ToolReading};
#[cfg(feature = "nvidia")]
pub use nvidia::NvmlBinding;
pub use smi::{parse_metrics, parse_names, NvidiaSmi};

use arc_swap::ArcSwap;
use poller::ToolPoller;
use rg_sampler_types::{GpuBackendKind, GpuConfig, GpuReading, VramInfo};
use std::sync::Arc;
use std::time::Instant;

enum Backend {
    Native(Box<dyn NativeGpu>),
    ExternalTool(ToolPoller),
    None,
}

/// Uniform per-device GPU readings over whichever backend is available.
///
/// Accessors never fail: a failing native query returns the last good
/// values (empty if there are none yet), and the external tool path only
/// ever reads cached values.
pub struct GpuTelemetryProvider {
    backend: Backend,
    published: Arc<ArcSwap<GpuSnapshot>>,
}

impl GpuTelemetryProvider {
    /// Detect and negotiate the backend for this machine
    pub fn new(config: &GpuConfig) -> Self {
        log::warn!("=== Detecting GPU telemetry backend ===");

        let native = if config.prefer_native {
            detector::probe_native()
        } else {
            None
        };
        let tool = detector::locate_tool(config);

        Self::negotiate(config, native, tool)
    }

    /// Negotiate between explicit candidates
    pub fn negotiate<T: GpuTool>(
        config: &GpuConfig,
        native: Option<Box<dyn NativeGpu>>,
        tool: Option<T>,
    ) -> Self {
        let published = Arc::new(ArcSwap::from_pointee(GpuSnapshot::default()));
        let backend = detector::select_backend(config, native, tool, &published);
        Self { backend, published }
    }

    /// A provider with no backend
    pub fn unavailable() -> Self {
        Self {
            backend: Backend::None,
            published: Arc::new(ArcSwap::from_pointee(GpuSnapshot::default())),
        }
    }

    pub fn backend(&self) -> GpuBackendKind {
        match self.backend {
            Backend::Native(_) => GpuBackendKind::Native,
            Backend::ExternalTool(_) => GpuBackendKind::ExternalTool,
            Backend::None => GpuBackendKind::None,
        }
    }

    pub fn names(&self) -> Vec<String> {
        match &self.backend {
            Backend::Native(gpu) => {
                self.native_read("names", gpu.names(), false, |s| &mut s.names)
            }
            Backend::ExternalTool(_) => self.published.load().names.clone(),
            Backend::None => Vec::new(),
        }
    }

    /// Utilization in percent, per device
    pub fn utils(&self) -> Vec<f32> {
        match &self.backend {
            Backend::Native(gpu) => {
                self.native_read("utilization", gpu.utilizations(), true, |s| &mut s.utilizations)
            }
            Backend::ExternalTool(_) => self.published.load().utilizations.clone(),
            Backend::None => Vec::new(),
        }
    }

    pub fn vram_info(&self) -> Vec<VramInfo> {
        match &self.backend {
            Backend::Native(gpu) => self.native_read("vram", gpu.vram(), true, |s| &mut s.vram),
            Backend::ExternalTool(_) => self.published.load().vram.clone(),
            Backend::None => Vec::new(),
        }
    }

    /// Graphics clock in MHz, per device
    pub fn frequencies(&self) -> Vec<f32> {
        match &self.backend {
            Backend::Native(gpu) => {
                self.native_read("frequency", gpu.frequencies(), true, |s| &mut s.frequencies)
            }
            Backend::ExternalTool(_) => self.published.load().frequencies.clone(),
            Backend::None => Vec::new(),
        }
    }

    /// Core temperature in °C, per device
    pub fn temperatures(&self) -> Vec<Option<f32>> {
        match &self.backend {
            Backend::Native(gpu) => {
                self.native_read("temperature", gpu.temperatures(), true, |s| {
                    &mut s.temperatures
                })
            }
            Backend::ExternalTool(_) => self.published.load().temperatures.clone(),
            Backend::None => Vec::new(),
        }
    }

    /// All values assembled per device. Empty until at least one metric
    /// has been measured.
    pub fn readings(&self) -> Vec<GpuReading> {
        if let Backend::Native(_) = self.backend {
            // Refresh every field through the binding first
            self.names();
            self.utils();
            self.vram_info();
            self.frequencies();
            self.temperatures();
        }

        let backend = self.backend();
        if !backend.is_available() {
            return Vec::new();
        }

        let snapshot = self.published.load();
        let Some(captured_at) = snapshot.captured_at else {
            return Vec::new();
        };
        snapshot
            .names
            .iter()
            .enumerate()
            .map(|(index, name)| GpuReading {
                index,
                name: name.clone(),
                utilization: snapshot.utilizations.get(index).copied(),
                vram: snapshot.vram.get(index).copied(),
                frequency_mhz: snapshot.frequencies.get(index).copied(),
                temperature: snapshot.temperatures.get(index).copied().flatten(),
                backend,
                captured_at,
            })
            .collect()
    }

    /// Stop background polling. Safe to call more than once; accessors keep
    /// returning the last published values.
    pub fn shutdown(&self) {
        if let Backend::ExternalTool(poller) = &self.backend {
            poller.shutdown();
        }
    }

    /// Record a successful native query, or fall back to the last good values
    fn native_read<T: Clone>(
        &self,
        what: &str,
        result: anyhow::Result<Vec<T>>,
        measured: bool,
        field: fn(&mut GpuSnapshot) -> &mut Vec<T>,
    ) -> Vec<T> {
        match result {
            Ok(values) => {
                // Readers of other fields may publish concurrently
                self.published.rcu(|current| {
                    let mut next = GpuSnapshot::clone(current);
                    *field(&mut next) = values.clone();
                    if measured {
                        next.captured_at = Some(Instant::now());
                    }
                    next
                });
                values
            }
            Err(e) => {
                log::debug!("Native GPU {} query failed, using last values: {:#}", what, e);
                let mut snapshot = GpuSnapshot::clone(&self.published.load());
                std::mem::take(field(&mut snapshot))
            }
        }
    }
}

impl Drop for GpuTelemetryProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use rg_sampler_core::TelemetryError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeNative {
        names: Vec<String>,
        failing: Arc<AtomicBool>,
        util: f32,
    }

    impl FakeNative {
        fn check(&self) -> anyhow::Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err(anyhow!("driver went away"))
            } else {
                Ok(())
            }
        }
    }

    impl NativeGpu for FakeNative {
        fn names(&self) -> anyhow::Result<Vec<String>> {
            self.check().map(|_| self.names.clone())
        }

        fn utilizations(&self) -> anyhow::Result<Vec<f32>> {
            self.check().map(|_| vec![self.util; self.names.len()])
        }

        fn vram(&self) -> anyhow::Result<Vec<VramInfo>> {
            self.check()
                .map(|_| vec![VramInfo::from_mib(512.0, 4096.0); self.names.len()])
        }

        fn frequencies(&self) -> anyhow::Result<Vec<f32>> {
            self.check().map(|_| vec![1800.0; self.names.len()])
        }

        fn temperatures(&self) -> anyhow::Result<Vec<Option<f32>>> {
            self.check().map(|_| vec![Some(55.0); self.names.len()])
        }
    }

    /// Lists devices but every metric query fails
    struct MetricsDownNative;

    impl NativeGpu for MetricsDownNative {
        fn names(&self) -> anyhow::Result<Vec<String>> {
            Ok(vec!["GPU 0".to_string()])
        }

        fn utilizations(&self) -> anyhow::Result<Vec<f32>> {
            Err(anyhow!("utilization not supported"))
        }

        fn vram(&self) -> anyhow::Result<Vec<VramInfo>> {
            Err(anyhow!("vram not supported"))
        }

        fn frequencies(&self) -> anyhow::Result<Vec<f32>> {
            Err(anyhow!("clocks not supported"))
        }

        fn temperatures(&self) -> anyhow::Result<Vec<Option<f32>>> {
            Err(anyhow!("no sensor"))
        }
    }

    struct FakeTool {
        names: Vec<String>,
        polls: Arc<AtomicUsize>,
        fail_polls: bool,
        names_delay: Duration,
    }

    impl FakeTool {
        fn new(names: &[&str], polls: Arc<AtomicUsize>) -> Self {
            Self {
                names: names.iter().map(|n| n.to_string()).collect(),
                polls,
                fail_polls: false,
                names_delay: Duration::ZERO,
            }
        }
    }

    impl GpuTool for FakeTool {
        fn program(&self) -> String {
            "fake-smi".to_string()
        }

        async fn query_names(&self) -> Result<Vec<String>, TelemetryError> {
            tokio::time::sleep(self.names_delay).await;
            Ok(self.names.clone())
        }

        async fn poll(&self) -> Result<ToolReading, TelemetryError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if self.fail_polls {
                return Err(TelemetryError::ToolFailed {
                    program: "fake-smi".to_string(),
                    reason: "exit status 9".to_string(),
                });
            }
            let count = self.names.len();
            Ok(ToolReading {
                utilizations: vec![33.0; count],
                vram: vec![VramInfo::from_mib(100.0, 1000.0); count],
                frequencies: vec![1410.0; count],
                temperatures: vec![Some(47.0); count],
            })
        }
    }

    fn config() -> GpuConfig {
        GpuConfig {
            tool_timeout_ms: 200,
            shutdown_timeout_ms: 2000,
            ..GpuConfig::default()
        }
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_no_backend_returns_empty_lists() {
        let provider = GpuTelemetryProvider::negotiate::<FakeTool>(&config(), None, None);
        assert_eq!(provider.backend(), GpuBackendKind::None);
        assert!(provider.names().is_empty());
        assert!(provider.utils().is_empty());
        assert!(provider.vram_info().is_empty());
        assert!(provider.frequencies().is_empty());
        assert!(provider.temperatures().is_empty());
        assert!(provider.readings().is_empty());

        let provider = GpuTelemetryProvider::unavailable();
        assert_eq!(provider.backend(), GpuBackendKind::None);
        assert!(provider.readings().is_empty());
    }

    #[test]
    fn test_native_preferred_over_tool() {
        let polls = Arc::new(AtomicUsize::new(0));
        let native = FakeNative {
            names: vec!["RTX Fake".to_string()],
            failing: Arc::new(AtomicBool::new(false)),
            util: 71.0,
        };
        let provider = GpuTelemetryProvider::negotiate(
            &config(),
            Some(Box::new(native)),
            Some(FakeTool::new(&["RTX Fake"], Arc::clone(&polls))),
        );

        assert_eq!(provider.backend(), GpuBackendKind::Native);
        assert_eq!(provider.utils(), vec![71.0]);
        assert_eq!(polls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_native_failure_returns_last_good_values() {
        let failing = Arc::new(AtomicBool::new(false));
        let native = FakeNative {
            names: vec!["GPU A".to_string(), "GPU B".to_string()],
            failing: Arc::clone(&failing),
            util: 20.0,
        };
        let provider =
            GpuTelemetryProvider::negotiate::<FakeTool>(&config(), Some(Box::new(native)), None);

        assert_eq!(provider.utils(), vec![20.0, 20.0]);
        assert_eq!(provider.frequencies(), vec![1800.0, 1800.0]);

        failing.store(true, Ordering::SeqCst);
        assert_eq!(provider.utils(), vec![20.0, 20.0]);
        assert_eq!(provider.frequencies(), vec![1800.0, 1800.0]);
        assert_eq!(provider.names().len(), 2);

        let readings = provider.readings();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[1].name, "GPU B");
        assert_eq!(readings[1].backend, GpuBackendKind::Native);
    }

    #[test]
    fn test_native_without_devices_falls_back_to_tool() {
        let polls = Arc::new(AtomicUsize::new(0));
        let native = FakeNative {
            names: Vec::new(),
            failing: Arc::new(AtomicBool::new(false)),
            util: 0.0,
        };
        let provider = GpuTelemetryProvider::negotiate(
            &config(),
            Some(Box::new(native)),
            Some(FakeTool::new(&["Tool GPU"], Arc::clone(&polls))),
        );

        assert_eq!(provider.backend(), GpuBackendKind::ExternalTool);
        assert_eq!(provider.names(), vec!["Tool GPU"]);
        provider.shutdown();
    }

    #[test]
    fn test_tool_publishes_polled_values() {
        let polls = Arc::new(AtomicUsize::new(0));
        let provider = GpuTelemetryProvider::negotiate(
            &config(),
            None,
            Some(FakeTool::new(&["GPU 0", "GPU 1"], Arc::clone(&polls))),
        );

        assert_eq!(provider.backend(), GpuBackendKind::ExternalTool);
        assert!(wait_until(|| provider.utils() == vec![33.0, 33.0]));
        assert_eq!(provider.frequencies(), vec![1410.0, 1410.0]);
        assert_eq!(provider.temperatures(), vec![Some(47.0), Some(47.0)]);

        let readings = provider.readings();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].temperature, Some(47.0));
        assert_eq!(readings[0].utilization, Some(33.0));
        assert!((readings[1].vram.unwrap().used_mib() - 100.0).abs() < 1e-9);

        provider.shutdown();
        provider.shutdown();
        assert_eq!(provider.utils(), vec![33.0, 33.0]);
    }

    #[test]
    fn test_failed_polls_report_nothing_measured() {
        let polls = Arc::new(AtomicUsize::new(0));
        let mut tool = FakeTool::new(&["GPU 0"], Arc::clone(&polls));
        tool.fail_polls = true;
        let provider = GpuTelemetryProvider::negotiate(&config(), None, Some(tool));

        assert!(wait_until(|| polls.load(Ordering::SeqCst) >= 2));
        assert_eq!(provider.names(), vec!["GPU 0"]);
        assert!(provider.utils().is_empty());
        assert!(provider.vram_info().is_empty());
        assert!(provider.frequencies().is_empty());
        assert!(provider.temperatures().is_empty());
        assert!(provider.readings().is_empty());
        provider.shutdown();
    }

    #[test]
    fn test_native_never_measured_reports_empty() {
        let provider = GpuTelemetryProvider::negotiate::<FakeTool>(
            &config(),
            Some(Box::new(MetricsDownNative)),
            None,
        );

        assert_eq!(provider.backend(), GpuBackendKind::Native);
        assert_eq!(provider.names(), vec!["GPU 0"]);
        assert!(provider.utils().is_empty());
        assert!(provider.vram_info().is_empty());
        assert!(provider.frequencies().is_empty());
        assert!(provider.temperatures().is_empty());
        assert!(provider.readings().is_empty());
    }

    #[test]
    fn test_concurrent_native_reads_keep_every_field() {
        let failing = Arc::new(AtomicBool::new(false));
        let native = FakeNative {
            names: vec!["GPU A".to_string()],
            failing: Arc::clone(&failing),
            util: 12.0,
        };
        let provider =
            GpuTelemetryProvider::negotiate::<FakeTool>(&config(), Some(Box::new(native)), None);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        provider.utils();
                        provider.frequencies();
                        provider.temperatures();
                        provider.vram_info();
                    }
                });
            }
        });

        failing.store(true, Ordering::SeqCst);
        assert_eq!(provider.utils(), vec![12.0]);
        assert_eq!(provider.frequencies(), vec![1800.0]);
        assert_eq!(provider.temperatures(), vec![Some(55.0)]);
        assert_eq!(provider.vram_info().len(), 1);
    }

    #[test]
    fn test_tool_without_devices_is_unavailable() {
        let polls = Arc::new(AtomicUsize::new(0));
        let provider =
            GpuTelemetryProvider::negotiate(&config(), None, Some(FakeTool::new(&[], polls)));
        assert_eq!(provider.backend(), GpuBackendKind::None);
        assert!(provider.utils().is_empty());
    }

    #[test]
    fn test_hanging_tool_is_abandoned() {
        let polls = Arc::new(AtomicUsize::new(0));
        let mut tool = FakeTool::new(&["GPU 0"], Arc::clone(&polls));
        tool.names_delay = Duration::from_secs(30);

        let started = Instant::now();
        let provider = GpuTelemetryProvider::negotiate(&config(), None, Some(tool));

        assert_eq!(provider.backend(), GpuBackendKind::None);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(polls.load(Ordering::SeqCst), 0);
    }
}
