//! Parsers for kernel pseudo-filesystem text.
//!
//! These are pure functions that turn the content of `/proc` and
//! `/sys` files into structured data. They are designed to be testable
//! with string inputs and to degrade instead of failing: a malformed
//! numeric field tokenizes to 0, a short record is discarded, and only
//! a structurally unusable file yields a `ParseError`.

use std::collections::HashMap;

use crate::model::system::{
    DiskInfo, FileHandleInfo, KernelStatInfo, LoadInfo, MemInfo, NetSnmpInfo, PsiRecord,
    SoftirqInfo, VmstatInfo,
};
use crate::model::CpuTimes;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Saturating counter subtraction: zero whenever the reading regressed
/// (counter reset, 32-bit wrap observed as a smaller value, PID reuse).
/// Applied to every counter delta in the rate layer.
pub fn sat_sub(curr: u64, prev: u64) -> u64 {
    curr.saturating_sub(prev)
}

// ---------------------------------------------------------------------------
// Hex socket addresses
// ---------------------------------------------------------------------------

/// TCP state numbers as they appear (hex) in the `st` column of
/// `/proc/net/tcp` and `/proc/net/tcp6`.
pub mod tcp_state {
    pub const ESTABLISHED: u8 = 0x01;
    pub const SYN_SENT: u8 = 0x02;
    pub const SYN_RECV: u8 = 0x03;
    pub const FIN_WAIT1: u8 = 0x04;
    pub const FIN_WAIT2: u8 = 0x05;
    pub const TIME_WAIT: u8 = 0x06;
    pub const CLOSE: u8 = 0x07;
    pub const CLOSE_WAIT: u8 = 0x08;
    pub const LAST_ACK: u8 = 0x09;
    pub const LISTEN: u8 = 0x0A;
    pub const CLOSING: u8 = 0x0B;
}

/// Decodes the hex address field of `/proc/net/tcp{,6}`.
///
/// IPv4 addresses are 8 hex digits holding the four bytes reversed.
/// IPv6 addresses are 32 hex digits in four 32-bit groups, each group
/// byte-reversed; after un-reversing, an IPv4-mapped prefix (ten zero
/// bytes then `FF FF`) collapses to the mapped IPv4, anything else is
/// rendered as eight colon-joined 16-bit groups.
///
/// Accepts upper and lower case, trims surrounding whitespace.
pub fn decode_hex_ip(hex: &str) -> Option<String> {
    let hex = hex.trim();
    let bytes = hex_bytes(hex)?;

    match bytes.len() {
        4 => Some(format!("{}.{}.{}.{}", bytes[3], bytes[2], bytes[1], bytes[0])),
        16 => {
            let mut b = [0u8; 16];
            for (i, chunk) in bytes.chunks(4).enumerate() {
                for (j, v) in chunk.iter().rev().enumerate() {
                    b[i * 4 + j] = *v;
                }
            }
            if b[..10].iter().all(|&x| x == 0) && b[10] == 0xFF && b[11] == 0xFF {
                return Some(format!("{}.{}.{}.{}", b[12], b[13], b[14], b[15]));
            }
            let groups: Vec<String> = b
                .chunks(2)
                .map(|p| format!("{:x}", (p[0] as u16) << 8 | p[1] as u16))
                .collect();
            Some(groups.join(":"))
        }
        _ => None,
    }
}

/// Decodes the hex port tail of an address field. Ports are big-endian
/// within the hex, so a direct radix-16 parse suffices.
pub fn decode_hex_port(hex: &str) -> Option<u16> {
    u16::from_str_radix(hex.trim(), 16).ok()
}

fn hex_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

/// One socket row from `/proc/net/tcp` or `/proc/net/tcp6`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SocketEntry {
    pub local_ip: String,
    pub local_port: u16,
    pub remote_ip: String,
    pub remote_port: u16,
    pub state: u8,
    pub uid: u32,
    pub inode: u64,
    /// The raw `local:remote` hex pair, the stable identity of a socket
    /// across ticks (used as the first-seen map key).
    pub hex_pair: String,
}

/// Parses the socket table format shared by tcp/tcp6/udp/udp6.
///
/// Layout per row:
/// `sl local_address rem_address st tx:rx tr:when retrnsmt uid timeout inode ...`
/// Rows that fall short of the inode column are discarded.
pub fn parse_socket_table(content: &str) -> Vec<SocketEntry> {
    let mut sockets = Vec::new();

    for line in content.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 10 {
            continue;
        }

        let Some((local_hex, local_port_hex)) = parts[1].split_once(':') else {
            continue;
        };
        let Some((remote_hex, remote_port_hex)) = parts[2].split_once(':') else {
            continue;
        };
        let (Some(local_ip), Some(remote_ip)) =
            (decode_hex_ip(local_hex), decode_hex_ip(remote_hex))
        else {
            continue;
        };

        sockets.push(SocketEntry {
            local_ip,
            local_port: decode_hex_port(local_port_hex).unwrap_or(0),
            remote_ip,
            remote_port: decode_hex_port(remote_port_hex).unwrap_or(0),
            state: u8::from_str_radix(parts[3], 16).unwrap_or(0),
            uid: parts[7].parse().unwrap_or(0),
            inode: parts[9].parse().unwrap_or(0),
            hex_pair: format!("{}:{}", parts[1], parts[2]),
        });
    }

    sockets
}

// ---------------------------------------------------------------------------
// Pressure stall information
// ---------------------------------------------------------------------------

/// Parses one `/proc/pressure/*` file.
///
/// Format:
/// ```text
/// some avg10=0.00 avg60=0.00 avg300=0.00 total=0
/// full avg10=0.00 avg60=0.00 avg300=0.00 total=0
/// ```
pub fn parse_psi(content: &str) -> PsiRecord {
    let mut rec = PsiRecord::default();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }
        let is_some = parts[0] == "some";
        let is_full = parts[0] == "full";
        if !is_some && !is_full {
            continue;
        }

        for part in &parts[1..] {
            if let Some((key, value)) = part.split_once('=') {
                match (key, is_some) {
                    ("avg10", true) => rec.some_avg10 = value.parse().unwrap_or(0.0),
                    ("avg60", true) => rec.some_avg60 = value.parse().unwrap_or(0.0),
                    ("avg300", true) => rec.some_avg300 = value.parse().unwrap_or(0.0),
                    ("total", true) => rec.some_total_us = value.parse().unwrap_or(0),
                    ("avg10", false) => rec.full_avg10 = value.parse().unwrap_or(0.0),
                    ("avg60", false) => rec.full_avg60 = value.parse().unwrap_or(0.0),
                    ("avg300", false) => rec.full_avg300 = value.parse().unwrap_or(0.0),
                    ("total", false) => rec.full_total_us = value.parse().unwrap_or(0),
                    _ => {}
                }
            }
        }
    }

    rec
}

// ---------------------------------------------------------------------------
// /proc/stat and /proc/loadavg
// ---------------------------------------------------------------------------

/// Parses `/proc/stat`: CPU time lines plus the global counters.
pub fn parse_stat(content: &str) -> (Vec<CpuTimes>, KernelStatInfo) {
    let mut cpus = Vec::new();
    let mut stat = KernelStatInfo::default();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        if parts[0].starts_with("cpu") {
            let cpu_id: i16 = if parts[0] == "cpu" {
                -1
            } else {
                parts[0]
                    .strip_prefix("cpu")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(-1)
            };

            let val = |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

            cpus.push(CpuTimes {
                cpu_id,
                user: val(1),
                nice: val(2),
                system: val(3),
                idle: val(4),
                iowait: val(5),
                irq: val(6),
                softirq: val(7),
                steal: val(8),
                guest: val(9),
                guest_nice: val(10),
            });
        } else {
            let val = || parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
            match parts[0] {
                "ctxt" => stat.ctxt = val(),
                "btime" => stat.btime = val(),
                "processes" => stat.processes = val(),
                "procs_running" => stat.procs_running = val() as u32,
                "procs_blocked" => stat.procs_blocked = val() as u32,
                _ => {}
            }
        }
    }

    (cpus, stat)
}

/// Parses `/proc/loadavg`, splitting the `running/total` field.
pub fn parse_loadavg(content: &str) -> Result<LoadInfo, ParseError> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 4 {
        return Err(ParseError::new("loadavg too short"));
    }

    let (running, total) = match parts[3].split_once('/') {
        Some((r, t)) => (r.parse().unwrap_or(0), t.parse().unwrap_or(0)),
        None => (0, 0),
    };

    Ok(LoadInfo {
        lavg1: parts[0].parse().unwrap_or(0.0),
        lavg5: parts[1].parse().unwrap_or(0.0),
        lavg15: parts[2].parse().unwrap_or(0.0),
        nr_running: running,
        nr_threads: total,
    })
}

// ---------------------------------------------------------------------------
// /proc/meminfo and /proc/vmstat
// ---------------------------------------------------------------------------

/// Parses one `key: value kB` line to bytes. The `kB` suffix is
/// optional; when present the value is scaled by 1024, otherwise it is
/// taken verbatim (counts like `HugePages_Total` have no suffix).
fn kb_line_bytes(fields: &HashMap<&str, &str>, key: &str) -> u64 {
    let Some(raw) = fields.get(key) else {
        return 0;
    };
    let mut it = raw.split_whitespace();
    let value: u64 = it.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    match it.next() {
        Some("kB") => value * 1024,
        _ => value,
    }
}

/// Parses `/proc/meminfo`. Every byte-valued field is scaled from kB
/// at ingestion; downstream consumers see bytes only.
pub fn parse_meminfo(content: &str) -> MemInfo {
    let mut fields: HashMap<&str, &str> = HashMap::new();
    for line in content.lines() {
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(key.trim(), value.trim());
        }
    }

    MemInfo {
        total: kb_line_bytes(&fields, "MemTotal"),
        free: kb_line_bytes(&fields, "MemFree"),
        available: kb_line_bytes(&fields, "MemAvailable"),
        buffers: kb_line_bytes(&fields, "Buffers"),
        cached: kb_line_bytes(&fields, "Cached"),
        swap_cached: kb_line_bytes(&fields, "SwapCached"),
        active: kb_line_bytes(&fields, "Active"),
        inactive: kb_line_bytes(&fields, "Inactive"),
        anon: kb_line_bytes(&fields, "AnonPages"),
        mapped: kb_line_bytes(&fields, "Mapped"),
        shmem: kb_line_bytes(&fields, "Shmem"),
        slab: kb_line_bytes(&fields, "Slab"),
        s_reclaimable: kb_line_bytes(&fields, "SReclaimable"),
        s_unreclaim: kb_line_bytes(&fields, "SUnreclaim"),
        kernel_stack: kb_line_bytes(&fields, "KernelStack"),
        page_tables: kb_line_bytes(&fields, "PageTables"),
        dirty: kb_line_bytes(&fields, "Dirty"),
        writeback: kb_line_bytes(&fields, "Writeback"),
        mlocked: kb_line_bytes(&fields, "Mlocked"),
        swap_total: kb_line_bytes(&fields, "SwapTotal"),
        swap_free: kb_line_bytes(&fields, "SwapFree"),
        vmalloc_used: kb_line_bytes(&fields, "VmallocUsed"),
        committed_as: kb_line_bytes(&fields, "Committed_AS"),
        huge_pages_total: kb_line_bytes(&fields, "HugePages_Total"),
        huge_page_size: kb_line_bytes(&fields, "Hugepagesize"),
    }
}

/// Parses `/proc/vmstat` (`key value` per line).
pub fn parse_vmstat(content: &str) -> VmstatInfo {
    let mut info = VmstatInfo::default();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }
        let value: u64 = parts[1].parse().unwrap_or(0);
        match parts[0] {
            "pgfault" => info.pgfault = value,
            "pgmajfault" => info.pgmajfault = value,
            "pswpin" => info.pswpin = value,
            "pswpout" => info.pswpout = value,
            "pgsteal_direct" => info.pgsteal_direct = value,
            "pgsteal_kswapd" => info.pgsteal_kswapd = value,
            "pgscan_direct" => info.pgscan_direct = value,
            "pgscan_kswapd" => info.pgscan_kswapd = value,
            "compact_stall" => info.compact_stall = value,
            "oom_kill" => info.oom_kill = value,
            "thp_fault_alloc" => info.thp_fault_alloc = value,
            // allocstall is split per zone on modern kernels
            k if k.starts_with("allocstall") => info.allocstall += value,
            _ => {}
        }
    }

    info
}

// ---------------------------------------------------------------------------
// /proc/diskstats
// ---------------------------------------------------------------------------

/// Whole-disk filter for diskstats lines.
///
/// Keeps `nvme0n1` but not `nvme0n1p1`, keeps `sda`/`vdb`/`xvda`/`hdc`
/// but not their numbered partitions, keeps `dm-*`, and drops loop and
/// ram devices outright.
pub fn is_whole_disk(name: &str) -> bool {
    if name.starts_with("loop") || name.starts_with("ram") {
        return false;
    }
    if name.starts_with("dm-") {
        return true;
    }
    if let Some(rest) = name.strip_prefix("nvme") {
        return !rest.is_empty() && !rest.contains('p');
    }
    for prefix in ["sd", "vd", "xvd", "hd"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            return !rest.is_empty() && rest.chars().all(|c| c.is_ascii_lowercase());
        }
    }
    false
}

/// Parses `/proc/diskstats`, keeping whole-disk lines only.
///
/// Format: `major minor name reads r_merged r_sectors r_ms writes
/// w_merged w_sectors w_ms in_flight io_ticks weighted_ms [...]`.
/// Lines shorter than 14 fields are discarded.
pub fn parse_diskstats(content: &str) -> Vec<DiskInfo> {
    let mut disks = Vec::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue;
        }
        let name = parts[2];
        if !is_whole_disk(name) {
            continue;
        }

        let val = |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        disks.push(DiskInfo {
            name: name.to_string(),
            reads: val(3),
            read_sectors: val(5),
            read_time_ms: val(6),
            writes: val(7),
            write_sectors: val(9),
            write_time_ms: val(10),
            in_flight: val(11),
            io_ticks_ms: val(12),
            weighted_io_ms: val(13),
        });
    }

    disks
}

// ---------------------------------------------------------------------------
// /proc/mounts
// ---------------------------------------------------------------------------

/// Filesystem types that never hold user data; mounts of these are
/// skipped before any statvfs call.
pub const PSEUDO_FS: &[&str] = &[
    "sysfs",
    "proc",
    "devtmpfs",
    "tmpfs",
    "cgroup",
    "cgroup2",
    "debugfs",
    "tracefs",
    "securityfs",
    "hugetlbfs",
    "mqueue",
    "fusectl",
    "configfs",
    "pstore",
    "bpf",
    "ramfs",
    "rpc_pipefs",
    "nsfs",
    "autofs",
    "efivarfs",
    "squashfs",
    "iso9660",
    "devpts",
    "overlay",
];

/// A mount table row worth measuring: `(device, mount_point, fs_type)`.
///
/// Parses `/proc/mounts`, dropping pseudo filesystems. Deduplication by
/// device happens at the collector, after statvfs.
pub fn parse_mounts(content: &str) -> Vec<(String, String, String)> {
    let mut mounts = Vec::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }
        let fs_type = parts[2];
        if PSEUDO_FS.contains(&fs_type) {
            continue;
        }
        // Octal escapes (\040 for space) appear in mount points
        mounts.push((
            parts[0].to_string(),
            unescape_mount_path(parts[1]),
            fs_type.to_string(),
        ));
    }

    mounts
}

fn unescape_mount_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let code: String = chars.by_ref().take(3).collect();
            if let Ok(v) = u8::from_str_radix(&code, 8) {
                out.push(v as char);
            } else {
                out.push(c);
                out.push_str(&code);
            }
        } else {
            out.push(c);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// /proc/net/dev
// ---------------------------------------------------------------------------

/// Raw per-interface counters from `/proc/net/dev`, loopback excluded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetDevCounters {
    pub name: String,
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errs: u64,
    pub rx_drop: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errs: u64,
    pub tx_drop: u64,
}

/// Parses `/proc/net/dev`, skipping the two header lines and `lo`.
pub fn parse_net_dev(content: &str) -> Vec<NetDevCounters> {
    let mut devices = Vec::new();

    for line in content.lines() {
        if line.contains('|') || line.trim().is_empty() {
            continue;
        }
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name == "lo" {
            continue;
        }
        let values: Vec<&str> = rest.split_whitespace().collect();
        if values.len() < 16 {
            continue;
        }

        let val = |idx: usize| -> u64 { values.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        devices.push(NetDevCounters {
            name: name.to_string(),
            rx_bytes: val(0),
            rx_packets: val(1),
            rx_errs: val(2),
            rx_drop: val(3),
            tx_bytes: val(8),
            tx_packets: val(9),
            tx_errs: val(10),
            tx_drop: val(11),
        });
    }

    devices
}

// ---------------------------------------------------------------------------
// /proc/net/snmp and /proc/net/netstat
// ---------------------------------------------------------------------------

/// Walks the two-line key/value sections shared by `/proc/net/snmp`
/// and `/proc/net/netstat`, invoking `apply(section, key, value)` for
/// every pair.
fn walk_snmp_sections(content: &str, mut apply: impl FnMut(&str, &str, u64)) {
    let lines: Vec<&str> = content.lines().collect();
    let mut i = 0;
    while i + 1 < lines.len() {
        let key_parts: Vec<&str> = lines[i].split_whitespace().collect();
        let val_parts: Vec<&str> = lines[i + 1].split_whitespace().collect();
        if key_parts.is_empty() || val_parts.is_empty() || key_parts[0] != val_parts[0] {
            i += 1;
            continue;
        }
        let section = key_parts[0].trim_end_matches(':');
        for (idx, key) in key_parts[1..].iter().enumerate() {
            // Some counters (Tcp MaxConn) are signed; clamp to zero.
            let value = val_parts
                .get(idx + 1)
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(0)
                .max(0) as u64;
            apply(section, key, value);
        }
        i += 2;
    }
}

/// Parses `/proc/net/snmp` into the aggregate TCP/UDP counters.
/// TcpExt fields stay zero; merge them in with [`parse_netstat_ext`].
pub fn parse_net_snmp(content: &str) -> NetSnmpInfo {
    let mut info = NetSnmpInfo::default();

    walk_snmp_sections(content, |section, key, value| match (section, key) {
        ("Tcp", "ActiveOpens") => info.tcp_active_opens = value,
        ("Tcp", "PassiveOpens") => info.tcp_passive_opens = value,
        ("Tcp", "CurrEstab") => info.tcp_curr_estab = value,
        ("Tcp", "InSegs") => info.tcp_in_segs = value,
        ("Tcp", "OutSegs") => info.tcp_out_segs = value,
        ("Tcp", "RetransSegs") => info.tcp_retrans_segs = value,
        ("Tcp", "InErrs") => info.tcp_in_errs = value,
        ("Tcp", "OutRsts") => info.tcp_out_rsts = value,
        ("Udp", "InDatagrams") => info.udp_in_datagrams = value,
        ("Udp", "OutDatagrams") => info.udp_out_datagrams = value,
        ("Udp", "NoPorts") => info.udp_no_ports = value,
        ("Udp", "InErrors") => info.udp_in_errors = value,
        ("Udp", "RcvbufErrors") => info.udp_rcvbuf_errors = value,
        _ => {}
    });

    info
}

/// Merges the TcpExt counters of `/proc/net/netstat` into an already
/// parsed [`NetSnmpInfo`].
pub fn parse_netstat_ext(content: &str, info: &mut NetSnmpInfo) {
    walk_snmp_sections(content, |section, key, value| {
        if section != "TcpExt" {
            return;
        }
        match key {
            "ListenOverflows" => info.listen_overflows = value,
            "ListenDrops" => info.listen_drops = value,
            "TCPTimeouts" => info.tcp_timeouts = value,
            "TCPSynRetrans" => info.tcp_syn_retrans = value,
            _ => {}
        }
    });
}

// ---------------------------------------------------------------------------
// /proc/softirqs
// ---------------------------------------------------------------------------

/// Parses `/proc/softirqs`, summing each class across all CPU columns.
pub fn parse_softirqs(content: &str) -> SoftirqInfo {
    let mut info = SoftirqInfo::default();

    for line in content.lines() {
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        let total: u64 = rest
            .split_whitespace()
            .filter_map(|v| v.parse::<u64>().ok())
            .sum();
        match name.trim() {
            "HI" => info.hi = total,
            "TIMER" => info.timer = total,
            "NET_TX" => info.net_tx = total,
            "NET_RX" => info.net_rx = total,
            "BLOCK" => info.block = total,
            "IRQ_POLL" => info.irq_poll = total,
            "TASKLET" => info.tasklet = total,
            "SCHED" => info.sched = total,
            "HRTIMER" => info.hrtimer = total,
            "RCU" => info.rcu = total,
            _ => {}
        }
    }

    info
}

// ---------------------------------------------------------------------------
// Small sysctl-style files
// ---------------------------------------------------------------------------

/// Parses the three-number `/proc/sys/fs/file-nr`.
pub fn parse_file_nr(content: &str) -> Result<FileHandleInfo, ParseError> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(ParseError::new("file-nr needs three fields"));
    }
    Ok(FileHandleInfo {
        allocated: parts[0].parse().unwrap_or(0),
        free: parts[1].parse().unwrap_or(0),
        max: parts[2].parse().unwrap_or(0),
    })
}

/// Parses `/proc/sys/net/ipv4/ip_local_port_range` (`low\thigh`).
pub fn parse_port_range(content: &str) -> Option<(u16, u16)> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }
    Some((parts[0].parse().ok()?, parts[1].parse().ok()?))
}

/// Parses `/proc/net/stat/nf_conntrack`. All columns in this file are
/// hexadecimal; the `entries` column of the first data row carries the
/// table-wide total.
pub fn parse_conntrack_stat(content: &str) -> Option<u64> {
    let mut lines = content.lines();
    let header: Vec<&str> = lines.next()?.split_whitespace().collect();
    let entries_col = header.iter().position(|h| *h == "entries")?;
    let row: Vec<&str> = lines.next()?.split_whitespace().collect();
    u64::from_str_radix(row.get(entries_col)?, 16).ok()
}

// ---------------------------------------------------------------------------
// /proc/[pid]/ files
// ---------------------------------------------------------------------------

/// Minimum post-comm field count accepted for a stat line. Covers
/// everything through `processor`; older kernels always provide it.
const MIN_PID_STAT_FIELDS: usize = 37;

/// Parsed subset of `/proc/[pid]/stat`.
#[derive(Debug, Clone, Default)]
pub struct PidStat {
    pub pid: u32,
    pub comm: String,
    pub state: char,
    pub ppid: u32,
    pub minflt: u64,
    pub majflt: u64,
    pub utime: u64,
    pub stime: u64,
    pub num_threads: u32,
    pub starttime: u64,
    pub vsize: u64,
    /// Resident set size in pages.
    pub rss_pages: i64,
}

/// Parses `/proc/[pid]/stat`.
///
/// The comm field is parenthesized and may itself contain spaces and
/// parentheses, so the numeric tail is recovered by splitting on the
/// *last* `)`. Records short of [`MIN_PID_STAT_FIELDS`] are rejected.
pub fn parse_pid_stat(content: &str) -> Result<PidStat, ParseError> {
    let content = content.trim();

    let open = content
        .find('(')
        .ok_or_else(|| ParseError::new("missing '(' in stat"))?;
    let close = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;
    if close <= open {
        return Err(ParseError::new("mismatched parentheses in stat"));
    }

    let pid: u32 = content[..open]
        .trim()
        .parse()
        .map_err(|_| ParseError::new("invalid pid"))?;
    let comm = content[open + 1..close].to_string();

    let fields: Vec<&str> = content[close + 1..].split_whitespace().collect();
    if fields.len() < MIN_PID_STAT_FIELDS {
        return Err(ParseError::new(format!(
            "stat too short: {} fields",
            fields.len()
        )));
    }

    let val = |idx: usize| -> u64 { fields.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

    Ok(PidStat {
        pid,
        comm,
        state: fields[0].chars().next().unwrap_or('?'),
        ppid: val(1) as u32,
        minflt: val(7),
        majflt: val(9),
        utime: val(11),
        stime: val(12),
        num_threads: val(17) as u32,
        starttime: val(19),
        vsize: val(20),
        rss_pages: fields.get(21).and_then(|s| s.parse().ok()).unwrap_or(0),
    })
}

/// Parsed subset of `/proc/[pid]/status`. kB fields are scaled to
/// bytes here, like everything else kilobyte-valued.
#[derive(Debug, Clone, Default)]
pub struct PidStatus {
    pub name: String,
    pub uid: u32,
    pub vm_rss_bytes: u64,
    pub vm_swap_bytes: u64,
    pub voluntary_ctxt_switches: u64,
    pub nonvoluntary_ctxt_switches: u64,
}

/// Parses `/proc/[pid]/status` (`key:\tvalue` pairs).
pub fn parse_pid_status(content: &str) -> PidStatus {
    let mut fields: HashMap<&str, &str> = HashMap::new();
    for line in content.lines() {
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(key.trim(), value.trim());
        }
    }

    let uid = fields
        .get("Uid")
        .and_then(|s| s.split_whitespace().next())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    PidStatus {
        name: fields.get("Name").unwrap_or(&"").to_string(),
        uid,
        vm_rss_bytes: kb_line_bytes(&fields, "VmRSS"),
        vm_swap_bytes: kb_line_bytes(&fields, "VmSwap"),
        voluntary_ctxt_switches: fields
            .get("voluntary_ctxt_switches")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        nonvoluntary_ctxt_switches: fields
            .get("nonvoluntary_ctxt_switches")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
    }
}

/// Parsed `/proc/[pid]/io`.
#[derive(Debug, Clone, Default)]
pub struct PidIo {
    pub rchar: u64,
    pub wchar: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Parses `/proc/[pid]/io` (`key: value` pairs).
pub fn parse_pid_io(content: &str) -> PidIo {
    let mut io = PidIo::default();

    for line in content.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let value: u64 = value.trim().parse().unwrap_or(0);
            match key.trim() {
                "rchar" => io.rchar = value,
                "wchar" => io.wchar = value,
                "read_bytes" => io.read_bytes = value,
                "write_bytes" => io.write_bytes = value,
                _ => {}
            }
        }
    }

    io
}

/// Extracts the cgroup path of a process from `/proc/[pid]/cgroup`,
/// preferring the unified (`0::`) line.
pub fn parse_pid_cgroup(content: &str) -> String {
    let mut fallback = String::new();
    for line in content.lines() {
        let parts: Vec<&str> = line.splitn(3, ':').collect();
        if parts.len() != 3 {
            continue;
        }
        let path = parts[2].trim_start_matches('/').to_string();
        if parts[0] == "0" {
            return path;
        }
        if fallback.is_empty() {
            fallback = path;
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- hex address decoding --

    /// Encodes an IPv4 address into the kernel's little-endian hex form.
    fn encode_v4(a: u8, b: u8, c: u8, d: u8) -> String {
        format!("{:02X}{:02X}{:02X}{:02X}", d, c, b, a)
    }

    /// Encodes 16 address bytes into the kernel's per-32-bit-group
    /// reversed hex form.
    fn encode_v6(bytes: [u8; 16]) -> String {
        let mut out = String::new();
        for chunk in bytes.chunks(4) {
            for b in chunk.iter().rev() {
                out.push_str(&format!("{:02X}", b));
            }
        }
        out
    }

    #[test]
    fn decode_ipv4_reversed_bytes() {
        // 127.0.0.1 is stored as 0100007F
        assert_eq!(decode_hex_ip("0100007F").as_deref(), Some("127.0.0.1"));
        assert_eq!(decode_hex_ip("0100007f").as_deref(), Some("127.0.0.1"));
        assert_eq!(decode_hex_ip(" 0100007F ").as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn ipv4_round_trip() {
        for addr in [
            (0u8, 0u8, 0u8, 0u8),
            (127, 0, 0, 1),
            (10, 1, 2, 3),
            (192, 168, 255, 254),
            (255, 255, 255, 255),
        ] {
            let hex = encode_v4(addr.0, addr.1, addr.2, addr.3);
            let expected = format!("{}.{}.{}.{}", addr.0, addr.1, addr.2, addr.3);
            assert_eq!(decode_hex_ip(&hex).as_deref(), Some(expected.as_str()));
        }
    }

    #[test]
    fn decode_ipv6_loopback() {
        let mut bytes = [0u8; 16];
        bytes[15] = 1;
        let hex = encode_v6(bytes);
        assert_eq!(hex, "00000000000000000000000001000000");
        assert_eq!(decode_hex_ip(&hex).as_deref(), Some("0:0:0:0:0:0:0:1"));
    }

    #[test]
    fn decode_ipv6_v4_mapped() {
        let mut bytes = [0u8; 16];
        bytes[10] = 0xFF;
        bytes[11] = 0xFF;
        bytes[12..16].copy_from_slice(&[10, 0, 0, 42]);
        assert_eq!(decode_hex_ip(&encode_v6(bytes)).as_deref(), Some("10.0.0.42"));
    }

    #[test]
    fn decode_ipv6_full_address() {
        // 2001:db8::8a2e:370:7334
        let bytes = [
            0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0x8a, 0x2e, 0x03, 0x70, 0x73, 0x34,
        ];
        assert_eq!(
            decode_hex_ip(&encode_v6(bytes)).as_deref(),
            Some("2001:db8:0:0:0:8a2e:370:7334")
        );
    }

    #[test]
    fn decode_rejects_odd_lengths() {
        assert_eq!(decode_hex_ip("0100007"), None);
        assert_eq!(decode_hex_ip("XYZ0007F"), None);
        assert_eq!(decode_hex_ip(""), None);
    }

    #[test]
    fn decode_port_is_big_endian() {
        assert_eq!(decode_hex_port("1F90"), Some(8080));
        assert_eq!(decode_hex_port("0050"), Some(80));
    }

    // -- saturating subtraction --

    #[test]
    fn sat_sub_clamps_regressions() {
        assert_eq!(sat_sub(10, 3), 7);
        assert_eq!(sat_sub(3, 10), 0);
        assert_eq!(sat_sub(0, u64::MAX), 0);
        assert_eq!(sat_sub(u64::MAX, 0), u64::MAX);
    }

    // -- socket table --

    #[test]
    fn parse_socket_table_rows() {
        let content = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 12345 1 0000000000000000 100 0 0 10 0
   1: 0B01A8C0:D431 0101A8C0:0050 08 00000000:00000000 00:00000000 00000000  1000        0 67890 1 0000000000000000 100 0 0 10 0
";
        let sockets = parse_socket_table(content);
        assert_eq!(sockets.len(), 2);

        assert_eq!(sockets[0].local_ip, "127.0.0.1");
        assert_eq!(sockets[0].local_port, 8080);
        assert_eq!(sockets[0].state, tcp_state::LISTEN);
        assert_eq!(sockets[0].inode, 12345);

        assert_eq!(sockets[1].local_ip, "192.168.1.11");
        assert_eq!(sockets[1].remote_ip, "192.168.1.1");
        assert_eq!(sockets[1].remote_port, 80);
        assert_eq!(sockets[1].state, tcp_state::CLOSE_WAIT);
        assert_eq!(sockets[1].hex_pair, "0B01A8C0:D431:0101A8C0:0050");
    }

    #[test]
    fn parse_socket_table_discards_short_rows() {
        let content = "header\n   0: 0100007F:1F90 00000000:0000 0A\n";
        assert!(parse_socket_table(content).is_empty());
    }

    // -- psi --

    #[test]
    fn parse_psi_both_lines() {
        let rec = parse_psi(
            "some avg10=1.50 avg60=1.00 avg300=0.80 total=5000000\n\
             full avg10=0.50 avg60=0.30 avg300=0.20 total=1000000\n",
        );
        assert!((rec.some_avg10 - 1.5).abs() < 1e-6);
        assert!((rec.full_avg10 - 0.5).abs() < 1e-6);
        assert_eq!(rec.some_total_us, 5_000_000);
        assert_eq!(rec.full_total_us, 1_000_000);
    }

    #[test]
    fn parse_psi_cpu_has_no_full_line() {
        let rec = parse_psi("some avg10=0.12 avg60=0.05 avg300=0.01 total=123\n");
        assert!((rec.some_avg10 - 0.12).abs() < 1e-6);
        assert_eq!(rec.full_avg10, 0.0);
    }

    // -- /proc/stat --

    #[test]
    fn parse_stat_aggregate_and_cores() {
        let (cpus, stat) = parse_stat(
            "cpu  100 10 50 800 20 5 5 10 0 0\n\
             cpu0 50 5 25 400 10 2 3 5 0 0\n\
             cpu1 50 5 25 400 10 3 2 5 0 0\n\
             ctxt 987654\n\
             btime 1700000000\n\
             processes 4242\n\
             procs_running 3\n\
             procs_blocked 2\n",
        );
        assert_eq!(cpus.len(), 3);
        assert_eq!(cpus[0].cpu_id, -1);
        assert_eq!(cpus[0].user, 100);
        assert_eq!(cpus[2].cpu_id, 1);
        assert_eq!(stat.ctxt, 987654);
        assert_eq!(stat.procs_blocked, 2);
    }

    #[test]
    fn parse_stat_malformed_numbers_zero() {
        let (cpus, _) = parse_stat("cpu  x y z\n");
        assert_eq!(cpus[0].user, 0);
        assert_eq!(cpus[0].idle, 0);
    }

    // -- loadavg --

    #[test]
    fn parse_loadavg_splits_running_total() {
        let load = parse_loadavg("1.25 0.75 0.50 3/250 9999\n").unwrap();
        assert!((load.lavg1 - 1.25).abs() < 1e-6);
        assert_eq!(load.nr_running, 3);
        assert_eq!(load.nr_threads, 250);
    }

    // -- meminfo --

    #[test]
    fn parse_meminfo_scales_to_bytes() {
        let mem = parse_meminfo(
            "MemTotal:       16384000 kB\n\
             MemFree:         8192000 kB\n\
             MemAvailable:   12000000 kB\n\
             Dirty:              1024 kB\n\
             HugePages_Total:       8\n\
             Hugepagesize:       2048 kB\n",
        );
        assert_eq!(mem.total, 16_384_000 * 1024);
        assert_eq!(mem.dirty, 1024 * 1024);
        // Bare count, no kB suffix, no scaling
        assert_eq!(mem.huge_pages_total, 8);
        assert_eq!(mem.huge_page_size, 2048 * 1024);
    }

    #[test]
    fn parse_meminfo_missing_fields_zero() {
        let mem = parse_meminfo("MemTotal: 100 kB\n");
        assert_eq!(mem.available, 0);
        assert_eq!(mem.swap_total, 0);
    }

    // -- vmstat --

    #[test]
    fn parse_vmstat_sums_allocstall_zones() {
        let vm = parse_vmstat(
            "pgfault 100\n\
             pgmajfault 5\n\
             allocstall_dma 1\n\
             allocstall_normal 2\n\
             allocstall_movable 3\n\
             oom_kill 1\n",
        );
        assert_eq!(vm.pgfault, 100);
        assert_eq!(vm.allocstall, 6);
        assert_eq!(vm.oom_kill, 1);
    }

    // -- diskstats / whole-disk filter --

    #[test]
    fn whole_disk_filter() {
        assert!(is_whole_disk("sda"));
        assert!(is_whole_disk("nvme0n1"));
        assert!(is_whole_disk("dm-0"));
        assert!(is_whole_disk("vdb"));
        assert!(is_whole_disk("xvda"));

        assert!(!is_whole_disk("sda1"));
        assert!(!is_whole_disk("nvme0n1p1"));
        assert!(!is_whole_disk("loop0"));
        assert!(!is_whole_disk("ram0"));
        assert!(!is_whole_disk("sd"));
    }

    #[test]
    fn parse_diskstats_keeps_whole_disks_only() {
        let disks = parse_diskstats(
            "   8       0 sda 100 0 2000 50 200 0 4000 80 2 120 200 0 0 0 0\n\
             \u{20}  8       1 sda1 90 0 1800 45 180 0 3600 70 0 100 170 0 0 0 0\n\
             \u{20}  7       0 loop0 5 0 10 1 0 0 0 0 0 1 1 0 0 0 0\n\
             \u{20}259       0 nvme0n1 500 0 9000 120 300 0 7000 90 1 250 400 0 0 0 0\n",
        );
        let names: Vec<&str> = disks.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["sda", "nvme0n1"]);
        assert_eq!(disks[0].read_sectors, 2000);
        assert_eq!(disks[0].io_ticks_ms, 120);
        assert_eq!(disks[1].weighted_io_ms, 400);
        assert_eq!(disks[1].in_flight, 1);
    }

    // -- mounts --

    #[test]
    fn parse_mounts_skips_pseudo_fs() {
        let mounts = parse_mounts(
            "sysfs /sys sysfs rw 0 0\n\
             proc /proc proc rw 0 0\n\
             /dev/nvme0n1p2 / ext4 rw 0 0\n\
             tmpfs /run tmpfs rw 0 0\n\
             /dev/sda1 /data xfs rw 0 0\n\
             overlay /var/lib/docker/overlay2/x overlay rw 0 0\n",
        );
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].1, "/");
        assert_eq!(mounts[1].2, "xfs");
    }

    #[test]
    fn parse_mounts_unescapes_octal() {
        let mounts = parse_mounts("/dev/sdb1 /mnt/my\\040disk ext4 rw 0 0\n");
        assert_eq!(mounts[0].1, "/mnt/my disk");
    }

    // -- net/dev --

    #[test]
    fn parse_net_dev_skips_header_and_lo() {
        let devices = parse_net_dev(
            "Inter-|   Receive                                                |  Transmit\n\
             \u{20}face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n\
             \u{20}   lo: 100 10 0 0 0 0 0 0 100 10 0 0 0 0 0 0\n\
             \u{20} eth0: 5000 50 1 2 0 0 0 0 3000 30 0 1 0 0 0 0\n",
        );
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "eth0");
        assert_eq!(devices[0].rx_bytes, 5000);
        assert_eq!(devices[0].rx_drop, 2);
        assert_eq!(devices[0].tx_drop, 1);
    }

    // -- snmp --

    #[test]
    fn parse_snmp_and_netstat_ext() {
        let mut info = parse_net_snmp(
            "Tcp: RtoAlgorithm MaxConn ActiveOpens PassiveOpens AttemptFails EstabResets CurrEstab InSegs OutSegs RetransSegs InErrs OutRsts\n\
             Tcp: 1 -1 5000 3000 100 50 150 500000 450000 1000 10 200\n\
             Udp: InDatagrams NoPorts InErrors OutDatagrams RcvbufErrors SndbufErrors\n\
             Udp: 100000 500 5 80000 7 0\n",
        );
        assert_eq!(info.tcp_in_segs, 500_000);
        assert_eq!(info.tcp_retrans_segs, 1000);
        assert_eq!(info.tcp_out_rsts, 200);
        assert_eq!(info.udp_no_ports, 500);
        assert_eq!(info.udp_rcvbuf_errors, 7);

        parse_netstat_ext(
            "TcpExt: ListenOverflows ListenDrops TCPTimeouts TCPSynRetrans\n\
             TcpExt: 25 30 150 50\n",
            &mut info,
        );
        assert_eq!(info.listen_overflows, 25);
        assert_eq!(info.listen_drops, 30);
        assert_eq!(info.tcp_syn_retrans, 50);
    }

    // -- softirqs --

    #[test]
    fn parse_softirqs_sums_cpus() {
        let info = parse_softirqs(
            "                    CPU0       CPU1\n\
             \u{20}         HI:          1          2\n\
             \u{20}     NET_RX:       1000       2000\n\
             \u{20}      BLOCK:         10         20\n\
             \u{20}        RCU:        500        600\n",
        );
        assert_eq!(info.hi, 3);
        assert_eq!(info.net_rx, 3000);
        assert_eq!(info.block, 30);
        assert_eq!(info.rcu, 1100);
    }

    // -- sysctl files --

    #[test]
    fn parse_file_nr_three_numbers() {
        let fh = parse_file_nr("10240\t0\t9223372036854775807\n").unwrap();
        assert_eq!(fh.allocated, 10240);
        assert_eq!(fh.free, 0);
        assert_eq!(fh.max, 9223372036854775807);
        assert!(parse_file_nr("42\n").is_err());
    }

    #[test]
    fn parse_port_range_pair() {
        assert_eq!(parse_port_range("32768\t60999\n"), Some((32768, 60999)));
        assert_eq!(parse_port_range("bad\n"), None);
    }

    #[test]
    fn parse_conntrack_stat_is_hex() {
        let content = "entries clashres found new invalid ignore delete chainlength\n\
                       0000a410 00000000 00000000 00000000 00000012 00000000 00000000 00000000\n\
                       0000a410 00000000 00000000 00000000 00000000 00000000 00000000 00000000\n";
        assert_eq!(parse_conntrack_stat(content), Some(0xa410));
    }

    // -- pid files --

    #[test]
    fn parse_pid_stat_basic() {
        let stat = parse_pid_stat(
            "1234 (bash) S 1233 1234 1234 34816 1235 4194304 5000 50000 10 20 100 50 200 100 20 0 1 0 100000 25000000 2000 18446744073709551615 0 0 0 0 0 0 65536 3670020 1266777851 0 0 0 17 2 0 0 5 0 0 0 0 0 0 0 0 0 0",
        )
        .unwrap();
        assert_eq!(stat.pid, 1234);
        assert_eq!(stat.comm, "bash");
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.ppid, 1233);
        assert_eq!(stat.minflt, 5000);
        assert_eq!(stat.majflt, 10);
        assert_eq!(stat.utime, 100);
        assert_eq!(stat.stime, 50);
        assert_eq!(stat.num_threads, 1);
        assert_eq!(stat.starttime, 100000);
        assert_eq!(stat.rss_pages, 2000);
    }

    #[test]
    fn parse_pid_stat_splits_on_last_paren() {
        let stat = parse_pid_stat(
            "42 (a) weird (name)) R 1 42 42 0 -1 4194304 1 0 0 0 7 3 0 0 20 0 1 0 99 1000 10 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0",
        )
        .unwrap();
        assert_eq!(stat.pid, 42);
        assert_eq!(stat.comm, "a) weird (name)");
        assert_eq!(stat.state, 'R');
        assert_eq!(stat.utime, 7);
    }

    #[test]
    fn parse_pid_stat_rejects_short_records() {
        assert!(parse_pid_stat("77 (x) S 1 77 77").is_err());
        assert!(parse_pid_stat("no parens here").is_err());
    }

    #[test]
    fn parse_pid_status_scales_kb() {
        let status = parse_pid_status(
            "Name:\tnginx\n\
             Uid:\t33\t33\t33\t33\n\
             VmRSS:\t    8000 kB\n\
             VmSwap:\t     512 kB\n\
             voluntary_ctxt_switches:\t500\n\
             nonvoluntary_ctxt_switches:\t50\n",
        );
        assert_eq!(status.name, "nginx");
        assert_eq!(status.uid, 33);
        assert_eq!(status.vm_rss_bytes, 8000 * 1024);
        assert_eq!(status.vm_swap_bytes, 512 * 1024);
        assert_eq!(status.voluntary_ctxt_switches, 500);
    }

    #[test]
    fn parse_pid_io_fields() {
        let io = parse_pid_io(
            "rchar: 1000000\nwchar: 500000\nsyscr: 5000\nsyscw: 2500\nread_bytes: 100000\nwrite_bytes: 50000\ncancelled_write_bytes: 0\n",
        );
        assert_eq!(io.rchar, 1_000_000);
        assert_eq!(io.read_bytes, 100_000);
        assert_eq!(io.write_bytes, 50_000);
    }

    #[test]
    fn parse_pid_cgroup_prefers_unified() {
        let path = parse_pid_cgroup(
            "12:cpu,cpuacct:/legacy.slice\n0::/system.slice/nginx.service\n",
        );
        assert_eq!(path, "system.slice/nginx.service");

        let v1_only = parse_pid_cgroup("12:cpu,cpuacct:/legacy.slice\n");
        assert_eq!(v1_only, "legacy.slice");
    }
}
