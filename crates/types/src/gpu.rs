//! GPU reading types

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Bytes per MiB, the unit the vendor command-line tool reports VRAM in
const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Strategy a GPU provider negotiated at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GpuBackendKind {
    /// Low-latency native vendor binding (NVML)
    Native,
    /// Vendor command-line tool polled in the background (nvidia-smi)
    ExternalTool,
    /// No GPU telemetry available
    #[default]
    None,
}

impl GpuBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GpuBackendKind::Native => "native",
            GpuBackendKind::ExternalTool => "externalTool",
            GpuBackendKind::None => "none",
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, GpuBackendKind::None)
    }
}

/// VRAM usage of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VramInfo {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl VramInfo {
    pub fn new(used_bytes: u64, total_bytes: u64) -> Self {
        Self {
            used_bytes,
            total_bytes,
        }
    }

    /// Build from MiB values as printed by the command-line tool
    pub fn from_mib(used_mib: f64, total_mib: f64) -> Self {
        let to_bytes = |mib: f64| (mib.max(0.0) * BYTES_PER_MIB as f64).round() as u64;
        Self::new(to_bytes(used_mib), to_bytes(total_mib))
    }

    pub fn used_mib(&self) -> f64 {
        self.used_bytes as f64 / BYTES_PER_MIB as f64
    }

    pub fn total_mib(&self) -> f64 {
        self.total_bytes as f64 / BYTES_PER_MIB as f64
    }

    /// Used share in percent; `None` when the total is unknown
    pub fn percent(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            None
        } else {
            Some(self.used_bytes as f64 / self.total_bytes as f64 * 100.0)
        }
    }
}

/// Per-device GPU reading assembled from the provider accessors. A metric
/// that has never been measured for the device is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuReading {
    pub index: usize,
    pub name: String,
    pub utilization: Option<f32>,
    pub vram: Option<VramInfo>,
    /// Core (graphics) clock in MHz
    pub frequency_mhz: Option<f32>,
    pub temperature: Option<f32>,
    pub backend: GpuBackendKind,
    /// When the underlying values were obtained. For the external tool this
    /// lags by at most one polling interval.
    pub captured_at: Instant,
}
