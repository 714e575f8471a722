// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP/UDP connection sampling via `/proc/net/{tcp,tcp6,udp,udp6}`. The
//! teacher has no networking-introspection dependency to reuse and
//! `sysinfo` does not expose per-connection state, so this parses the
//! kernel's own text tables directly — the same approach `ss`/`netstat`
//! take.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use nspass_wire::{ConnectionMetrics, RemoteIpCount};

/// TCP state codes as they appear in `/proc/net/tcp`'s `st` column
/// (`include/net/tcp_states.h`).
fn tcp_state_name(code: u8) -> &'static str {
    match code {
        0x01 => "ESTABLISHED",
        0x02 => "SYN_SENT",
        0x03 => "SYN_RECV",
        0x04 => "FIN_WAIT1",
        0x05 => "FIN_WAIT2",
        0x06 => "TIME_WAIT",
        0x07 => "CLOSE",
        0x08 => "CLOSE_WAIT",
        0x09 => "LAST_ACK",
        0x0A => "LISTEN",
        0x0B => "CLOSING",
        _ => "UNKNOWN",
    }
}

/// One parsed row of `/proc/net/tcp[6]`.
struct TcpRow {
    remote_ip: Option<Ipv4Addr>,
    state: u8,
}

/// Parse the hex `address:port` pair in `/proc/net/tcp`'s `local_address` or
/// `rem_address` column. IPv4 addresses are stored as a little-endian hex
/// dword; IPv6 rows are skipped since the remote-IP classification only
/// makes sense for IPv4.
fn parse_ipv4_hex(field: &str) -> Option<Ipv4Addr> {
    let hex = field.split(':').next()?;
    if hex.len() != 8 {
        return None; // not an IPv4 row (IPv6 addresses are 32 hex chars)
    }
    let bytes = u32::from_str_radix(hex, 16).ok()?.to_le_bytes();
    Some(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]))
}

fn parse_tcp_table(contents: &str) -> Vec<TcpRow> {
    contents
        .lines()
        .skip(1) // header line
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _sl = fields.next()?;
            let _local = fields.next()?;
            let rem = fields.next()?;
            let st = fields.next()?;
            let state = u8::from_str_radix(st, 16).ok()?;
            let remote_ip = parse_ipv4_hex(rem);
            Some(TcpRow { remote_ip, state })
        })
        .collect()
}

fn count_udp_rows(contents: &str) -> usize {
    contents.lines().skip(1).count()
}

/// Whether an address is RFC1918 private or loopback, and so excluded
/// from the top-remote-IPs classification.
fn is_private_or_loopback(ip: &Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private()
}

/// Count established TCP connections across IPv4 and IPv6 tables — used
/// standalone by [`crate::system::sample`], which reports the same
/// counter.
pub fn count_established_tcp() -> usize {
    read_tables(&["/proc/net/tcp", "/proc/net/tcp6"])
        .iter()
        .flat_map(|c| parse_tcp_table(c))
        .filter(|r| r.state == 0x01)
        .count()
}

fn read_tables(paths: &[&str]) -> Vec<String> {
    paths.iter().filter_map(|p| std::fs::read_to_string(p).ok()).collect()
}

/// Sample per-state TCP connection counts, the top-3 most frequent
/// non-private remote destinations, and the UDP socket count.
pub fn sample() -> ConnectionMetrics {
    let tcp_rows: Vec<TcpRow> =
        read_tables(&["/proc/net/tcp", "/proc/net/tcp6"]).iter().flat_map(|c| parse_tcp_table(c)).collect();

    let mut by_state: HashMap<String, usize> = HashMap::new();
    let mut remote_counts: HashMap<Ipv4Addr, usize> = HashMap::new();

    for row in &tcp_rows {
        *by_state.entry(tcp_state_name(row.state).to_string()).or_insert(0) += 1;
        if let Some(ip) = row.remote_ip {
            if !is_private_or_loopback(&ip) && !ip.is_unspecified() {
                *remote_counts.entry(ip).or_insert(0) += 1;
            }
        }
    }

    let mut top: Vec<(Ipv4Addr, usize)> = remote_counts.into_iter().collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let top_remote_ips =
        top.into_iter().take(3).map(|(ip, count)| RemoteIpCount { ip: ip.to_string(), count }).collect();

    let udp_socket_count: usize =
        read_tables(&["/proc/net/udp", "/proc/net/udp6"]).iter().map(|c| count_udp_rows(c)).sum();

    ConnectionMetrics { by_state, top_remote_ips, udp_socket_count }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_little_endian_ipv4_hex() {
        // 127.0.0.1 encoded little-endian, port 80 (0x0050)
        assert_eq!(parse_ipv4_hex("0100007F:0050"), Some(Ipv4Addr::new(127, 0, 0, 1)));
    }

    #[test]
    fn skips_ipv6_rows_by_hex_length() {
        assert_eq!(parse_ipv4_hex("00000000000000000000000001000000:0050"), None);
    }

    #[test]
    fn private_and_loopback_addresses_are_excluded() {
        assert!(is_private_or_loopback(&Ipv4Addr::new(127, 0, 0, 1)));
        assert!(is_private_or_loopback(&Ipv4Addr::new(10, 0, 0, 5)));
        assert!(is_private_or_loopback(&Ipv4Addr::new(192, 168, 1, 1)));
        assert!(!is_private_or_loopback(&Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[test]
    fn parses_established_state_from_sample_table() {
        let table = "  sl  local_address rem_address   st tx_queue rx_rx\n   0: 0100007F:1F90 0200007F:0050 01 00000000:00000000 00:00000000 00000000     0        0 12345 1 0000000000000000 100 0 0 10 0\n";
        let rows = parse_tcp_table(table);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].state, 0x01);
        assert_eq!(rows[0].remote_ip, Some(Ipv4Addr::new(127, 0, 0, 2)));
    }
}
