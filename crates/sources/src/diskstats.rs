//! /proc/diskstats parsing

use anyhow::{anyhow, Result};
use rg_sampler_types::DiskCounters;

/// diskstats always counts 512-byte sectors regardless of the device
const SECTOR_SIZE: u64 = 512;

/// Sum read/written bytes over the devices accepted by `is_whole_disk`.
///
/// Partitions are skipped by the caller's predicate so their traffic is not
/// counted twice. Loop and ram devices are always skipped.
pub fn parse_diskstats<F>(content: &str, is_whole_disk: F) -> Result<DiskCounters>
where
    F: Fn(&str) -> bool,
{
    let mut counters = DiskCounters::default();
    let mut devices = 0;

    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        // major minor name + at least 11 stat fields
        if fields.len() < 14 {
            continue;
        }

        let name = fields[2];
        if name.starts_with("loop") || name.starts_with("ram") || !is_whole_disk(name) {
            continue;
        }

        let sectors_read: u64 = fields[5]
            .parse()
            .map_err(|_| anyhow!("Bad sectors-read field for {}: {}", name, fields[5]))?;
        let sectors_written: u64 = fields[9]
            .parse()
            .map_err(|_| anyhow!("Bad sectors-written field for {}: {}", name, fields[9]))?;

        counters.read_bytes = counters
            .read_bytes
            .saturating_add(sectors_read.saturating_mul(SECTOR_SIZE));
        counters.write_bytes = counters
            .write_bytes
            .saturating_add(sectors_written.saturating_mul(SECTOR_SIZE));
        devices += 1;
    }

    if devices == 0 {
        return Err(anyhow!("No block devices found in diskstats"));
    }

    Ok(counters)
}
