//! Sampler configuration

use anyhow::Result;
use rg_sampler_core::{DEFAULT_GPU_INTERVAL, DEFAULT_PROCESS_INTERVAL, DEFAULT_TICK_INTERVAL};
use rg_sampler_types::{GpuConfig, ProcessConfig, RateConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// `ProjectDirs` identity of the sampler
const QUALIFIER: &str = "io";
const ORGANIZATION: &str = "rg-sampler";
const APPLICATION: &str = "rg-sampler";

fn default_version() -> u32 {
    1
}

fn default_tick_interval() -> u64 {
    DEFAULT_TICK_INTERVAL.as_millis() as u64
}

fn default_process_interval() -> u64 {
    DEFAULT_PROCESS_INTERVAL.as_millis() as u64
}

fn default_gpu_interval() -> u64 {
    DEFAULT_GPU_INTERVAL.as_millis() as u64
}

/// Engine-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Version of the config format
    #[serde(default = "default_version")]
    pub version: u32,
    /// Foreground tick
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// How often a process-table collection is requested
    #[serde(default = "default_process_interval")]
    pub process_interval_ms: u64,
    /// How often the GPU accessors are read
    #[serde(default = "default_gpu_interval")]
    pub gpu_interval_ms: u64,
    #[serde(default)]
    pub gpu: GpuConfig,
    #[serde(default)]
    pub process: ProcessConfig,
    #[serde(default)]
    pub rate: RateConfig,
}

impl SamplerConfig {
    /// Load configuration from disk, or defaults if there is none yet
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from_path(&config_path)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_path()?)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("config.json"))
    }

    /// Load configuration from a specific file path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific file path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Foreground tick, never zero
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn process_interval(&self) -> Duration {
        Duration::from_millis(self.process_interval_ms)
    }

    pub fn gpu_interval(&self) -> Duration {
        Duration::from_millis(self.gpu_interval_ms)
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            tick_interval_ms: default_tick_interval(),
            process_interval_ms: default_process_interval(),
            gpu_interval_ms: default_gpu_interval(),
            gpu: GpuConfig::default(),
            process: ProcessConfig::default(),
            rate: RateConfig::default(),
        }
    }
}
