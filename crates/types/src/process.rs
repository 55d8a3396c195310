//! Process table types

use std::collections::BTreeMap;
use std::time::Instant;

/// Grouping key for the process table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AffinityBucket {
    /// Process pinned to a strict subset of cores that includes this core
    Core(usize),
    /// Process allowed on every core, or whose affinity could not be read
    Unknown,
}

impl AffinityBucket {
    pub fn label(&self) -> String {
        match self {
            AffinityBucket::Core(core) => format!("CPU Core {}", core),
            AffinityBucket::Unknown => "Unknown".to_string(),
        }
    }
}

/// One enumerated process, as yielded by the process-enumeration primitive
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub mem_percent: f32,
    pub threads: u32,
    /// Cores the process may run on; `None` when unreadable
    pub affinity: Option<Vec<usize>>,
}

/// Display record for one process inside a bucket
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub mem_percent: f32,
    pub threads: u32,
}

impl From<&ProcessInfo> for ProcessRecord {
    fn from(info: &ProcessInfo) -> Self {
        Self {
            pid: info.pid,
            name: info.name.clone(),
            cpu_percent: info.cpu_percent,
            mem_percent: info.mem_percent,
            threads: info.threads,
        }
    }
}

/// Top processes of one bucket, ordered by descending cpu%
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessBucket {
    pub processes: Vec<ProcessRecord>,
    /// Threads of every matching process in the bucket, including the ones
    /// truncated away
    pub total_threads: u64,
    /// Sum of cpu% over the listed processes
    pub cpu_total: f32,
}

/// One complete, internally consistent view of the process table
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSnapshot {
    pub buckets: BTreeMap<AffinityBucket, ProcessBucket>,
    /// Processes enumerated, before filtering
    pub process_count: usize,
    /// Threads over all enumerated processes, before filtering
    pub total_threads: u64,
    pub n_cores: usize,
    pub filter: String,
    pub captured_at: Instant,
}

impl ProcessSnapshot {
    pub fn bucket(&self, bucket: AffinityBucket) -> Option<&ProcessBucket> {
        self.buckets.get(&bucket)
    }

    /// Number of process entries across all buckets (a pinned process is
    /// counted once per core it is listed under)
    pub fn listed_entries(&self) -> usize {
        self.buckets.values().map(|b| b.processes.len()).sum()
    }
}
