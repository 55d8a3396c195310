use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use rg_sampler::{SamplerConfig, TelemetryEngine, TickReport};
use rg_sampler_core::BYTES_PER_GIB;
use rg_sampler_sources::system_info;
use rg_sampler_types::{CounterStream, RateUnit};
use std::path::PathBuf;
use std::time::Instant;

/// rg-Sampler - Headless telemetry sampler for Linux
#[derive(Parser, Debug, Clone)]
#[command(name = "rg-sampler")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Foreground tick in milliseconds
    #[arg(long = "interval-ms", value_name = "MS")]
    interval_ms: Option<u64>,

    /// Process-table refresh interval in milliseconds
    #[arg(long = "process-interval-ms", value_name = "MS")]
    process_interval_ms: Option<u64>,

    /// GPU refresh interval in milliseconds
    #[arg(long = "gpu-interval-ms", value_name = "MS")]
    gpu_interval_ms: Option<u64>,

    /// Process filter (case-insensitive name substring or exact pid)
    #[arg(long = "filter", value_name = "TEXT")]
    filter: Option<String>,

    /// Stop after this many ticks
    #[arg(long = "ticks", value_name = "N")]
    ticks: Option<u64>,

    /// Configuration file to load instead of the default location
    #[arg(long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug verbosity level (0=quiet, 1=info, 2=debug, 3=trace)
    #[arg(short = 'd', long = "debug", value_name = "LEVEL", default_value = "0")]
    debug: u8,
}

impl Cli {
    /// Command-line flags override the configuration file
    fn apply(&self, config: &mut SamplerConfig) {
        if let Some(ms) = self.interval_ms {
            config.tick_interval_ms = ms;
        }
        if let Some(ms) = self.process_interval_ms {
            config.process_interval_ms = ms;
        }
        if let Some(ms) = self.gpu_interval_ms {
            config.gpu_interval_ms = ms;
        }
        if let Some(filter) = &self.filter {
            config.process.filter = filter.clone();
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Level 0 (default): warn only (quiet, shows only important === messages)
    // Level 1: info, 2: debug, 3+: trace
    let log_level = match cli.debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // Allow RUST_LOG to override CLI setting
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    warn!("Starting rg-Sampler v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => SamplerConfig::load_from_path(path)?,
        None => SamplerConfig::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            SamplerConfig::default()
        }),
    };
    cli.apply(&mut config);

    // Negotiation may wait on the GPU tool, so build before entering the runtime
    let mut engine = TelemetryEngine::new(&config)?;
    print_system_info(&engine);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(&mut engine, &config, cli.ticks));

    engine.shutdown();
    info!("rg-Sampler stopped");
    result
}

async fn run(engine: &mut TelemetryEngine, config: &SamplerConfig, max_ticks: Option<u64>) -> Result<()> {
    let mut interval = tokio::time::interval(config.tick_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let unit = config.rate.display_unit;
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                warn!("Interrupted, shutting down");
                break;
            }
            _ = interval.tick() => {}
        }

        let report = engine.tick(Instant::now())?;
        print_report(&report, unit);

        ticks += 1;
        if max_ticks.map_or(false, |max| ticks >= max) {
            info!("Reached {} ticks", ticks);
            break;
        }
    }

    Ok(())
}

fn print_system_info(engine: &TelemetryEngine) {
    let cache = engine.cache();
    println!(
        "{} | {} ({}) | {} x {} | {:.1} GiB RAM @ {} | GPU: {}",
        system_info::host_name(cache),
        system_info::os_long_name(cache),
        system_info::kernel_version(cache),
        system_info::logical_core_count(cache),
        system_info::cpu_model_name(cache),
        system_info::total_memory(cache) as f64 / BYTES_PER_GIB,
        match system_info::memory_clock_mhz(cache) {
            mhz if mhz > 0.0 => format!("{:.0} MHz", mhz),
            _ => "? MHz".to_string(),
        },
        engine.gpu().backend().as_str(),
    );
    for (index, name) in system_info::gpu_names(cache, engine.gpu()).iter().enumerate() {
        println!("  GPU{}: {}", index, name);
    }
}

fn print_report(report: &TickReport, unit: RateUnit) {
    let batch = &report.batch;
    log::debug!(
        "cpu {:?}% {:?}°C mem {:?}% net up {:.2} {} down {:.2} {} (missing: {:?})",
        batch.cpu_percent,
        batch.cpu_temperatures.as_ref().and_then(|temps| {
            temps.iter().map(|t| t.celsius).max_by(f32::total_cmp)
        }),
        batch.memory.map(|m| m.percent),
        unit.convert(report.rate(CounterStream::NetworkUp).rate),
        unit.suffix(),
        unit.convert(report.rate(CounterStream::NetworkDown).rate),
        unit.suffix(),
        batch.missing(),
    );

    if let Some(gpus) = &report.gpu {
        for gpu in gpus {
            println!(
                "GPU{} {}: {} | {} | {} | {}",
                gpu.index,
                gpu.name,
                or_dash(gpu.utilization.map(|u| format!("{:.0}%", u))),
                or_dash(
                    gpu.vram
                        .map(|v| format!("{:.0}/{:.0} MiB", v.used_mib(), v.total_mib()))
                ),
                or_dash(gpu.frequency_mhz.map(|f| format!("{:.0} MHz", f))),
                or_dash(gpu.temperature.map(|t| format!("{:.0}°C", t))),
            );
        }
    }

    if let Some(snapshot) = &report.processes {
        let busiest = snapshot
            .buckets
            .values()
            .flat_map(|bucket| bucket.processes.iter())
            .max_by(|a, b| a.cpu_percent.total_cmp(&b.cpu_percent))
            .map(|p| format!("{} ({}) {:.1}%", p.name, p.pid, p.cpu_percent))
            .unwrap_or_else(|| "-".to_string());
        let (disk_read, disk_write) = (
            report.rate(CounterStream::DiskRead),
            report.rate(CounterStream::DiskWrite),
        );
        println!(
            "Processes: {} ({} threads) | listed {} | busiest {} | disk r/w {:.2}/{:.2} {}",
            snapshot.process_count,
            snapshot.total_threads,
            snapshot.listed_entries(),
            busiest,
            disk_read.in_unit(unit).0,
            disk_write.in_unit(unit).0,
            unit.suffix(),
        );
    }
}

fn or_dash(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".to_string())
}
