// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cumulative-counter delta sampling for the `TRAFFIC` metrics kind: reads
//! `/proc/net/dev`'s running byte/packet counters and reports the delta
//! since the previous sample.

use nspass_wire::TrafficMetrics;

use crate::connection::count_established_tcp;

const DEV_PATH: &str = "/proc/net/dev";

#[derive(Debug, Clone, Copy, Default)]
struct Snapshot {
    bytes_in: u64,
    bytes_out: u64,
    packets_in: u64,
    packets_out: u64,
    at_millis: i64,
}

/// Holds the previous cumulative sample. Access is single-threaded — only
/// the metrics loop ever calls [`TrafficSampler::sample`] — so no lock
/// guards this field.
#[derive(Default)]
pub struct TrafficSampler {
    previous: Option<Snapshot>,
}

impl TrafficSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample `/proc/net/dev`'s cumulative counters (summed across every
    /// non-loopback interface) and compute the delta since the previous
    /// call. On the first call the deltas equal the absolute counters.
    pub fn sample(&mut self, now_millis: i64) -> TrafficMetrics {
        let current = read_cumulative_counters(now_millis);
        self.sample_from_snapshot(current)
    }

    fn sample_from_snapshot(&mut self, current: Snapshot) -> TrafficMetrics {
        // On the first call there is no previous sample: deltas equal the
        // absolute counters, which falls out of treating the start of the
        // period as all-zero counters at the current timestamp.
        let previous = self.previous.unwrap_or(Snapshot { at_millis: current.at_millis, ..Default::default() });

        let elapsed_secs = (current.at_millis.saturating_sub(previous.at_millis)).max(0) as f64 / 1000.0;
        let bytes_in_delta = current.bytes_in.saturating_sub(previous.bytes_in);
        let bytes_out_delta = current.bytes_out.saturating_sub(previous.bytes_out);
        let packets_in_delta = current.packets_in.saturating_sub(previous.packets_in);
        let packets_out_delta = current.packets_out.saturating_sub(previous.packets_out);

        let (bandwidth_in_bytes_per_sec, bandwidth_out_bytes_per_sec) = if elapsed_secs > 0.0 {
            (bytes_in_delta as f64 / elapsed_secs, bytes_out_delta as f64 / elapsed_secs)
        } else {
            (0.0, 0.0)
        };

        let metrics = TrafficMetrics {
            period_start_millis: previous.at_millis,
            period_end_millis: current.at_millis,
            bytes_in_delta,
            bytes_out_delta,
            packets_in_delta,
            packets_out_delta,
            bandwidth_in_bytes_per_sec,
            bandwidth_out_bytes_per_sec,
            established_tcp_connections: count_established_tcp(),
        };

        self.previous = Some(current);
        metrics
    }
}

fn read_cumulative_counters(now_millis: i64) -> Snapshot {
    let contents = std::fs::read_to_string(DEV_PATH).unwrap_or_default();
    parse_dev(&contents, now_millis)
}

fn parse_dev(contents: &str, at_millis: i64) -> Snapshot {
    let mut snap = Snapshot { at_millis, ..Default::default() };
    for line in contents.lines().skip(2) {
        let Some((iface, rest)) = line.split_once(':') else { continue };
        if iface.trim() == "lo" {
            continue;
        }
        let fields: Vec<u64> = rest.split_whitespace().filter_map(|f| f.parse().ok()).collect();
        if fields.len() < 16 {
            continue;
        }
        snap.bytes_in += fields[0];
        snap.packets_in += fields[1];
        snap.bytes_out += fields[8];
        snap.packets_out += fields[9];
    }
    snap
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Inter-|   Receive                                                |  Transmit\n face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n    lo:  1000      10    0    0    0     0          0         0     1000      10    0    0    0     0       0          0\n  eth0: 50000     100    0    0    0     0          0         0    20000      50    0    0    0     0       0          0\n";

    #[test]
    fn excludes_loopback_interface() {
        let snap = parse_dev(SAMPLE, 1_000);
        assert_eq!(snap.bytes_in, 50_000);
        assert_eq!(snap.bytes_out, 20_000);
    }

    #[test]
    fn first_sample_deltas_equal_absolute_counters() {
        let mut sampler = TrafficSampler::new();
        let snap = parse_dev(SAMPLE, 1_000);
        let metrics = sampler.sample_from_snapshot(snap);
        assert_eq!(metrics.bytes_in_delta, 50_000);
        assert_eq!(metrics.bytes_out_delta, 20_000);
    }

    #[test]
    fn second_sample_reports_delta_since_first() {
        let mut sampler = TrafficSampler::new();
        sampler.sample_from_snapshot(parse_dev(SAMPLE, 1_000));
        let mut later = parse_dev(SAMPLE, 2_000);
        later.bytes_in += 500;
        let metrics = sampler.sample_from_snapshot(later);
        assert_eq!(metrics.bytes_in_delta, 500);
        assert_eq!(metrics.period_start_millis, 1_000);
        assert_eq!(metrics.period_end_millis, 2_000);
    }
}
