//! nvidia-smi command-line backend

use super::backend::{GpuTool, ToolReading};
use crate::command::run_tool;
use rg_sampler_core::TelemetryError;
use rg_sampler_types::VramInfo;
use std::path::PathBuf;
use std::time::Duration;

const NAME_ARGS: [&str; 2] = ["--query-gpu=name", "--format=csv,noheader"];

const METRIC_ARGS: [&str; 2] = [
    "--query-gpu=utilization.gpu,memory.used,memory.total,clocks.current.graphics,temperature.gpu",
    "--format=csv,noheader,nounits",
];

/// Drives `nvidia-smi`, one bounded invocation per query
pub struct NvidiaSmi {
    program: PathBuf,
    timeout: Duration,
}

impl NvidiaSmi {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl GpuTool for NvidiaSmi {
    fn program(&self) -> String {
        self.program.display().to_string()
    }

    async fn query_names(&self) -> Result<Vec<String>, TelemetryError> {
        let output = run_tool(&self.program, &NAME_ARGS, self.timeout).await?;
        Ok(parse_names(&output))
    }

    async fn poll(&self) -> Result<ToolReading, TelemetryError> {
        let output = run_tool(&self.program, &METRIC_ARGS, self.timeout).await?;
        parse_metrics(&output)
    }
}

/// One device name per non-empty line
pub fn parse_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `util, mem.used, mem.total, clock, temp` lines. A field that does
/// not parse (e.g. `[N/A]`) reads as zero, except the temperature, which is
/// left unreported.
pub fn parse_metrics(output: &str) -> Result<ToolReading, TelemetryError> {
    let mut reading = ToolReading::default();

    for line in output.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let reported = |i: usize| -> Option<f32> {
            fields.get(i).and_then(|value| value.parse::<f32>().ok())
        };
        let field = |i: usize| reported(i).unwrap_or(0.0);

        reading.utilizations.push(field(0));
        reading
            .vram
            .push(VramInfo::from_mib(field(1) as f64, field(2) as f64));
        reading.frequencies.push(field(3));
        reading.temperatures.push(reported(4));
    }

    if reading.utilizations.is_empty() {
        return Err(TelemetryError::parse("nvidia-smi metrics", output));
    }
    Ok(reading)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        let output = "NVIDIA GeForce RTX 4090\nNVIDIA RTX A2000\n\n";
        assert_eq!(
            parse_names(output),
            vec!["NVIDIA GeForce RTX 4090", "NVIDIA RTX A2000"]
        );
        assert!(parse_names("").is_empty());
    }

    #[test]
    fn test_parse_metrics_two_devices() {
        let output = "45, 1024, 24564, 2520, 61\n3, 12, 6138, 210, 38\n";
        let reading = parse_metrics(output).unwrap();

        assert_eq!(reading.utilizations, vec![45.0, 3.0]);
        assert_eq!(reading.frequencies, vec![2520.0, 210.0]);
        assert_eq!(reading.temperatures, vec![Some(61.0), Some(38.0)]);
        assert!((reading.vram[0].used_mib() - 1024.0).abs() < 1e-9);
        assert!((reading.vram[1].total_mib() - 6138.0).abs() < 1e-9);
    }

    #[test]
    fn test_unparsable_field_degrades() {
        let reading = parse_metrics("[N/A], 100, 200, 1500, [N/A]\n7, 1, 2, 300\n").unwrap();
        assert_eq!(reading.utilizations, vec![0.0, 7.0]);
        assert_eq!(reading.temperatures, vec![None, None]);
        assert_eq!(reading.frequencies, vec![1500.0, 300.0]);
    }

    #[test]
    fn test_empty_output_is_an_error() {
        assert!(matches!(
            parse_metrics("\n"),
            Err(TelemetryError::Parse { .. })
        ));
    }
}
