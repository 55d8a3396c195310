//! Grouping of an enumerated process table into affinity buckets

use rg_sampler_core::MAX_TRACKED_CORES;
use rg_sampler_types::{AffinityBucket, ProcessBucket, ProcessInfo, ProcessRecord, ProcessSnapshot};
use std::collections::BTreeMap;
use std::time::Instant;

/// Case-insensitive name substring, or exact pid. An empty (or blank)
/// filter matches everything.
pub fn matches_filter(info: &ProcessInfo, filter: &str) -> bool {
    let filter = filter.trim();
    if filter.is_empty() {
        return true;
    }

    if info.name.to_lowercase().contains(&filter.to_lowercase()) {
        return true;
    }

    filter.parse::<u32>().map_or(false, |pid| pid == info.pid)
}

/// Buckets a process belongs to.
///
/// A strict subset of cores lists the process under each of those cores;
/// full or unreadable affinity lands in `Unknown`.
fn buckets_for(info: &ProcessInfo, n_cores: usize) -> Vec<AffinityBucket> {
    match &info.affinity {
        Some(cores) if !cores.is_empty() && cores.len() < n_cores => {
            let pinned: Vec<AffinityBucket> = cores
                .iter()
                .copied()
                .filter(|core| *core < n_cores)
                .map(AffinityBucket::Core)
                .collect();
            if pinned.is_empty() {
                vec![AffinityBucket::Unknown]
            } else {
                pinned
            }
        }
        _ => vec![AffinityBucket::Unknown],
    }
}

/// Build a snapshot from one enumeration pass.
///
/// `process_count` and `total_threads` cover the whole table; the buckets
/// only hold processes passing `filter`, at most `top_n` each, by
/// descending cpu%. Every core bucket and `Unknown` is present even when
/// empty.
pub fn build_snapshot(
    processes: &[ProcessInfo],
    n_cores: usize,
    filter: &str,
    top_n: usize,
    captured_at: Instant,
) -> ProcessSnapshot {
    let n_cores = n_cores.clamp(1, MAX_TRACKED_CORES);

    let mut grouped: BTreeMap<AffinityBucket, Vec<&ProcessInfo>> = (0..n_cores)
        .map(|core| (AffinityBucket::Core(core), Vec::new()))
        .collect();
    grouped.insert(AffinityBucket::Unknown, Vec::new());

    let mut total_threads = 0u64;
    for info in processes {
        total_threads += u64::from(info.threads);
        if !matches_filter(info, filter) {
            continue;
        }
        for bucket in buckets_for(info, n_cores) {
            grouped.entry(bucket).or_default().push(info);
        }
    }

    let buckets = grouped
        .into_iter()
        .map(|(key, mut members)| {
            let bucket_threads = members.iter().map(|p| u64::from(p.threads)).sum();

            members.sort_by(|a, b| {
                b.cpu_percent
                    .total_cmp(&a.cpu_percent)
                    .then_with(|| a.pid.cmp(&b.pid))
            });
            members.truncate(top_n);

            let processes: Vec<ProcessRecord> =
                members.into_iter().map(ProcessRecord::from).collect();
            let cpu_total = processes.iter().map(|p| p.cpu_percent).sum();

            (
                key,
                ProcessBucket {
                    processes,
                    total_threads: bucket_threads,
                    cpu_total,
                },
            )
        })
        .collect();

    ProcessSnapshot {
        buckets,
        process_count: processes.len(),
        total_threads,
        n_cores,
        filter: filter.to_string(),
        captured_at,
    }
}
