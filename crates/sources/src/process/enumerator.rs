//! Process table enumeration

use anyhow::{anyhow, Result};
use rg_sampler_types::ProcessInfo;
use std::ffi::OsStr;
use sysinfo::{MemoryRefreshKind, ProcessesToUpdate, RefreshKind, System};

/// Yields the full process table.
///
/// Implementations are moved onto the collector's worker thread and must
/// tolerate processes vanishing mid-enumeration.
pub trait ProcessEnumerator: Send + 'static {
    fn enumerate(&mut self) -> Result<Vec<ProcessInfo>>;
}

/// Enumerates through sysinfo, with thread count and affinity from
/// `/proc/<pid>/status` where available.
///
/// cpu% is measured between refreshes, so the very first enumeration
/// reports zero for every process.
pub struct SysinfoEnumerator {
    system: System,
}

impl SysinfoEnumerator {
    pub fn new() -> Self {
        Self {
            system: System::new_with_specifics(
                RefreshKind::new().with_memory(MemoryRefreshKind::new().with_ram()),
            ),
        }
    }
}

impl Default for SysinfoEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessEnumerator for SysinfoEnumerator {
    fn enumerate(&mut self) -> Result<Vec<ProcessInfo>> {
        self.system.refresh_memory();
        self.system.refresh_processes(ProcessesToUpdate::All);

        let total_memory = self.system.total_memory();
        if self.system.processes().is_empty() {
            return Err(anyhow!("Process table is empty"));
        }

        let processes = self
            .system
            .processes()
            .iter()
            .map(|(pid, process)| {
                let pid = pid.as_u32();
                let status = read_proc_status(pid);
                let name: &OsStr = process.name().as_ref();
                let mem_percent = if total_memory > 0 {
                    (process.memory() as f64 / total_memory as f64 * 100.0) as f32
                } else {
                    0.0
                };

                ProcessInfo {
                    pid,
                    name: name.to_string_lossy().into_owned(),
                    cpu_percent: process.cpu_usage(),
                    mem_percent,
                    threads: status.threads.unwrap_or(1),
                    affinity: status.affinity,
                }
            })
            .collect();

        Ok(processes)
    }
}

#[derive(Debug, Default, PartialEq)]
struct ProcStatus {
    threads: Option<u32>,
    affinity: Option<Vec<usize>>,
}

/// Missing file (process exited, or no procfs) yields an empty status
fn read_proc_status(pid: u32) -> ProcStatus {
    std::fs::read_to_string(format!("/proc/{}/status", pid))
        .map(|content| parse_proc_status(&content))
        .unwrap_or_default()
}

fn parse_proc_status(content: &str) -> ProcStatus {
    let mut status = ProcStatus::default();
    for line in content.lines() {
        if let Some(value) = line.strip_prefix("Threads:") {
            status.threads = value.trim().parse().ok();
        } else if let Some(value) = line.strip_prefix("Cpus_allowed_list:") {
            status.affinity = parse_cpu_list(value.trim());
        }
    }
    status
}

/// Parse a kernel cpu list such as `0-3,8,10-11`
pub fn parse_cpu_list(list: &str) -> Option<Vec<usize>> {
    let mut cores = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: usize = start.trim().parse().ok()?;
                let end: usize = end.trim().parse().ok()?;
                if end < start {
                    return None;
                }
                cores.extend(start..=end);
            }
            None => cores.push(part.parse().ok()?),
        }
    }

    if cores.is_empty() {
        None
    } else {
        cores.sort_unstable();
        cores.dedup();
        Some(cores)
    }
}
