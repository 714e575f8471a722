// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System-wide sampling: CPU, memory, swap, disk, load, process count.

use std::path::Path;

use nspass_wire::SystemMetrics;
use sysinfo::{Disks, System};

use crate::connection::count_established_tcp;

const ROOT_MOUNT: &str = "/";

/// Samples the host-wide metrics. `system` is refreshed in place so CPU
/// percent reflects the delta since the previous call, per `sysinfo`'s own
/// sampling model.
pub fn sample(system: &mut System, prev_download_bytes: u64, prev_upload_bytes: u64, elapsed_secs: f64) -> SystemMetrics {
    system.refresh_cpu_usage();
    system.refresh_memory();

    let cpu_percent = system.global_cpu_usage() as f64;
    let memory_total_bytes = system.total_memory();
    let memory_used_bytes = system.used_memory();
    let swap_total_bytes = system.total_swap();
    let swap_used_bytes = system.used_swap();

    let (disk_used, disk_total) = disk_usage(ROOT_MOUNT);

    let load_average_1m = System::load_average().one;
    let process_count = system.processes().len();
    let established_tcp_connections = count_established_tcp();

    // Instantaneous rates derived from the same counters the traffic
    // sampler tracks; callers pass in the already-computed deltas to avoid
    // sampling /proc/net/dev twice per tick.
    let download_bytes_per_sec = if elapsed_secs > 0.0 { (prev_download_bytes as f64 / elapsed_secs) as u64 } else { 0 };
    let upload_bytes_per_sec = if elapsed_secs > 0.0 { (prev_upload_bytes as f64 / elapsed_secs) as u64 } else { 0 };

    SystemMetrics {
        cpu_percent,
        memory_total_bytes,
        memory_used_bytes,
        swap_total_bytes,
        swap_used_bytes,
        disk_root_used_bytes: disk_used,
        disk_root_total_bytes: disk_total,
        load_average_1m,
        process_count,
        established_tcp_connections,
        download_bytes_per_sec,
        upload_bytes_per_sec,
    }
}

fn disk_usage(mount_point: &str) -> (u64, u64) {
    let disks = Disks::new_with_refreshed_list();
    disks
        .iter()
        .find(|d| d.mount_point() == Path::new(mount_point))
        .map(|d| (d.total_space().saturating_sub(d.available_space()), d.total_space()))
        .unwrap_or((0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_elapsed_time_yields_zero_rates_not_a_panic() {
        let mut system = System::new();
        let metrics = sample(&mut system, 1000, 2000, 0.0);
        assert_eq!(metrics.download_bytes_per_sec, 0);
        assert_eq!(metrics.upload_bytes_per_sec, 0);
    }
}
