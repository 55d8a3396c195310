//! NVIDIA native backend using NVML

use super::backend::NativeGpu;
use anyhow::{anyhow, Result};
use nvml_wrapper::enum_wrappers::device::{Clock, TemperatureSensor};
use nvml_wrapper::{Device, Nvml};
use rg_sampler_types::VramInfo;

/// NVML handle covering every device on the system
pub struct NvmlBinding {
    nvml: Nvml,
    count: u32,
}

impl NvmlBinding {
    pub fn init() -> Result<Self> {
        let nvml = Nvml::init()?;
        let count = nvml.device_count()?;
        if count == 0 {
            return Err(anyhow!("NVML reports no devices"));
        }
        log::info!("NVML: Found {} NVIDIA GPU(s)", count);
        Ok(Self { nvml, count })
    }

    fn per_device<T>(&self, query: impl Fn(&Device) -> Result<T>) -> Result<Vec<T>> {
        (0..self.count)
            .map(|index| {
                let device = self
                    .nvml
                    .device_by_index(index)
                    .map_err(|e| anyhow!("Failed to get NVIDIA GPU device {}: {}", index, e))?;
                query(&device)
            })
            .collect()
    }
}

impl NativeGpu for NvmlBinding {
    fn names(&self) -> Result<Vec<String>> {
        self.per_device(|device| Ok(device.name()?))
    }

    fn utilizations(&self) -> Result<Vec<f32>> {
        self.per_device(|device| Ok(device.utilization_rates()?.gpu as f32))
    }

    fn vram(&self) -> Result<Vec<VramInfo>> {
        self.per_device(|device| {
            let memory = device.memory_info()?;
            Ok(VramInfo::new(memory.used, memory.total))
        })
    }

    fn frequencies(&self) -> Result<Vec<f32>> {
        self.per_device(|device| Ok(device.clock_info(Clock::Graphics)? as f32))
    }

    fn temperatures(&self) -> Result<Vec<Option<f32>>> {
        self.per_device(|device| {
            Ok(device
                .temperature(TemperatureSensor::Gpu)
                .ok()
                .map(|celsius| celsius as f32))
        })
    }
}
