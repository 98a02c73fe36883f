//! System-wide metrics collected from kernel pseudo-filesystems.
//!
//! These structures store the global slices of a snapshot: PSI, CPU,
//! memory, disks, mounts, network, sockets and the various kernel
//! counter files. Byte-valued fields parsed from kilobyte text are
//! already scaled to bytes at ingestion; consumers never see kB.

use serde::{Deserialize, Serialize};

/// One pressure resource from /proc/pressure/{cpu,memory,io}.
///
/// Averages are percentages of wall time in [0, 100] over the trailing
/// 10/60/300 second windows; totals are cumulative stall microseconds.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct PsiRecord {
    /// Time at least one task was stalled, 10 s average.
    /// Source: `some avg10` line in `/proc/pressure/*`
    pub some_avg10: f32,

    /// Time at least one task was stalled, 60 s average.
    pub some_avg60: f32,

    /// Time at least one task was stalled, 300 s average.
    pub some_avg300: f32,

    /// Cumulative stall time with some tasks blocked (microseconds).
    pub some_total_us: u64,

    /// Time all non-idle tasks were stalled, 10 s average.
    /// Not reported by the kernel for CPU pressure; zero there.
    pub full_avg10: f32,

    /// Time all non-idle tasks were stalled, 60 s average.
    pub full_avg60: f32,

    /// Time all non-idle tasks were stalled, 300 s average.
    pub full_avg300: f32,

    /// Cumulative stall time with all tasks blocked (microseconds).
    pub full_total_us: u64,
}

/// Pressure stall information for the three tracked resources.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct PsiInfo {
    /// Source: `/proc/pressure/cpu`
    pub cpu: PsiRecord,
    /// Source: `/proc/pressure/memory`
    pub memory: PsiRecord,
    /// Source: `/proc/pressure/io`
    pub io: PsiRecord,
}

/// Cumulative CPU time counters for one line of /proc/stat.
///
/// All fields are monotonic jiffies (USER_HZ ticks). The aggregate
/// line is stored with `cpu_id == -1`, per-core lines with their index.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct CpuTimes {
    /// -1 for the aggregate `cpu` line, 0+ for `cpuN`.
    pub cpu_id: i16,

    /// Time in user mode.
    /// Source: `/proc/stat` column 1
    pub user: u64,

    /// Time in user mode at low priority.
    /// Source: `/proc/stat` column 2
    pub nice: u64,

    /// Time in kernel mode.
    /// Source: `/proc/stat` column 3
    pub system: u64,

    /// Idle time.
    /// Source: `/proc/stat` column 4
    pub idle: u64,

    /// Time waiting for I/O completion.
    /// Source: `/proc/stat` column 5
    pub iowait: u64,

    /// Time servicing hardware interrupts.
    /// Source: `/proc/stat` column 6
    pub irq: u64,

    /// Time servicing soft interrupts.
    /// Source: `/proc/stat` column 7
    pub softirq: u64,

    /// Time stolen by the hypervisor.
    /// Source: `/proc/stat` column 8
    pub steal: u64,

    /// Time running a guest.
    /// Source: `/proc/stat` column 9
    pub guest: u64,

    /// Time running a niced guest.
    /// Source: `/proc/stat` column 10
    pub guest_nice: u64,
}

impl CpuTimes {
    /// Sum of all time buckets, the denominator for percentage deltas.
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }
}

/// Load averages and scheduling entity counts from /proc/loadavg.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct LoadInfo {
    /// 1-minute load average.
    pub lavg1: f32,

    /// 5-minute load average.
    pub lavg5: f32,

    /// 15-minute load average.
    pub lavg15: f32,

    /// Runnable scheduling entities right now.
    /// Source: `/proc/loadavg` field 4, before the '/'
    pub nr_running: u32,

    /// Total scheduling entities (threads).
    /// Source: `/proc/loadavg` field 4, after the '/'
    pub nr_threads: u32,
}

/// Non-CPU lines of /proc/stat.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct KernelStatInfo {
    /// Context switches since boot.
    /// Source: `ctxt`
    pub ctxt: u64,

    /// Forks since boot.
    /// Source: `processes`
    pub processes: u64,

    /// Processes currently runnable.
    /// Source: `procs_running`
    pub procs_running: u32,

    /// Processes currently blocked on I/O (D-state).
    /// Source: `procs_blocked`
    pub procs_blocked: u32,

    /// Boot time, seconds since the epoch.
    /// Source: `btime`
    pub btime: u64,
}

/// Memory summary from /proc/meminfo. All values in bytes.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct MemInfo {
    /// Source: `MemTotal`
    pub total: u64,
    /// Source: `MemFree`
    pub free: u64,
    /// Estimate of memory available for new workloads without swapping.
    /// Source: `MemAvailable`
    pub available: u64,
    /// Source: `Buffers`
    pub buffers: u64,
    /// Page cache, excluding swap cache.
    /// Source: `Cached`
    pub cached: u64,
    /// Source: `SwapCached`
    pub swap_cached: u64,
    /// Source: `Active`
    pub active: u64,
    /// Source: `Inactive`
    pub inactive: u64,
    /// Anonymous (non-file-backed) pages.
    /// Source: `AnonPages`
    pub anon: u64,
    /// Source: `Mapped`
    pub mapped: u64,
    /// Source: `Shmem`
    pub shmem: u64,
    /// Source: `Slab`
    pub slab: u64,
    /// Source: `SReclaimable`
    pub s_reclaimable: u64,
    /// Source: `SUnreclaim`
    pub s_unreclaim: u64,
    /// Source: `KernelStack`
    pub kernel_stack: u64,
    /// Source: `PageTables`
    pub page_tables: u64,
    /// Dirty pages waiting for writeback.
    /// Source: `Dirty`
    pub dirty: u64,
    /// Pages actively under writeback.
    /// Source: `Writeback`
    pub writeback: u64,
    /// Source: `Mlocked`
    pub mlocked: u64,
    /// Source: `SwapTotal`
    pub swap_total: u64,
    /// Source: `SwapFree`
    pub swap_free: u64,
    /// Source: `VmallocUsed`
    pub vmalloc_used: u64,
    /// Source: `Committed_AS`
    pub committed_as: u64,
    /// Count of configured huge pages (not bytes).
    /// Source: `HugePages_Total`
    pub huge_pages_total: u64,
    /// Size of one huge page, in bytes.
    /// Source: `Hugepagesize`
    pub huge_page_size: u64,
}

impl MemInfo {
    /// Swap currently in use, bytes.
    pub fn swap_used(&self) -> u64 {
        self.swap_total.saturating_sub(self.swap_free)
    }

    /// Fraction of RAM in use, derived from MemAvailable, in [0, 100].
    pub fn used_pct(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (1.0 - self.available as f64 / self.total as f64) * 100.0
    }
}

/// Memory-management event counters from /proc/vmstat. All monotonic.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct VmstatInfo {
    /// Page faults, minor and major combined.
    /// Source: `pgfault`
    pub pgfault: u64,
    /// Major faults requiring disk I/O.
    /// Source: `pgmajfault`
    pub pgmajfault: u64,
    /// Pages swapped in.
    /// Source: `pswpin`
    pub pswpin: u64,
    /// Pages swapped out.
    /// Source: `pswpout`
    pub pswpout: u64,
    /// Pages reclaimed synchronously by allocating tasks.
    /// Source: `pgsteal_direct`
    pub pgsteal_direct: u64,
    /// Pages reclaimed by kswapd in the background.
    /// Source: `pgsteal_kswapd`
    pub pgsteal_kswapd: u64,
    /// Source: `pgscan_direct`
    pub pgscan_direct: u64,
    /// Source: `pgscan_kswapd`
    pub pgscan_kswapd: u64,
    /// Direct-reclaim allocation stalls, summed over zones.
    /// Source: `allocstall*`
    pub allocstall: u64,
    /// Memory compaction stalls.
    /// Source: `compact_stall`
    pub compact_stall: u64,
    /// OOM killer invocations.
    /// Source: `oom_kill`
    pub oom_kill: u64,
    /// Transparent huge page fault allocations.
    /// Source: `thp_fault_alloc`
    pub thp_fault_alloc: u64,
}

/// Whole-device block I/O counters from /proc/diskstats.
///
/// Partitions and loop devices are filtered out at collection time;
/// only whole disks (sda, nvme0n1, dm-0, ...) appear in a snapshot.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct DiskInfo {
    /// Device name as listed by the kernel.
    pub name: String,

    /// Reads completed.
    /// Source: `/proc/diskstats` field 4
    pub reads: u64,

    /// Sectors read (512 bytes each).
    /// Source: field 6
    pub read_sectors: u64,

    /// Milliseconds spent reading.
    /// Source: field 7
    pub read_time_ms: u64,

    /// Writes completed.
    /// Source: field 8
    pub writes: u64,

    /// Sectors written.
    /// Source: field 10
    pub write_sectors: u64,

    /// Milliseconds spent writing.
    /// Source: field 11
    pub write_time_ms: u64,

    /// I/Os currently in flight. Gauge, not a counter.
    /// Source: field 12
    pub in_flight: u64,

    /// Milliseconds the device had I/O in flight.
    /// Source: field 13
    pub io_ticks_ms: u64,

    /// Weighted milliseconds (time × queue depth).
    /// Source: field 14
    pub weighted_io_ms: u64,
}

/// Capacity figures for one real (non-pseudo) mount point.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct MountInfo {
    /// Backing device, e.g. `/dev/nvme0n1p2`.
    pub device: String,
    /// Where the filesystem is mounted.
    pub mount_point: String,
    /// Filesystem type from the mount table.
    pub fs_type: String,
    /// Source: statvfs `f_blocks * f_frsize`
    pub total_bytes: u64,
    /// Source: statvfs `f_bfree * f_frsize`
    pub free_bytes: u64,
    /// Free bytes available to unprivileged users.
    /// Source: statvfs `f_bavail * f_frsize`
    pub avail_bytes: u64,
    /// Source: statvfs `f_files`
    pub total_inodes: u64,
    /// Source: statvfs `f_ffree`
    pub free_inodes: u64,
}

impl MountInfo {
    /// Used fraction of the filesystem, in [0, 100].
    pub fn used_pct(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.free_bytes as f64 / self.total_bytes as f64) * 100.0
    }

    /// Used fraction of the inode table, in [0, 100].
    pub fn inode_used_pct(&self) -> f64 {
        if self.total_inodes == 0 {
            return 0.0;
        }
        (1.0 - self.free_inodes as f64 / self.total_inodes as f64) * 100.0
    }
}

/// Classified kind of a network interface, derived from its name,
/// sysfs attributes and device link.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IfaceKind {
    /// Backed by a real device (has a `device` link in sysfs).
    Physical,
    Bridge,
    Bond,
    Veth,
    Vlan,
    Wifi,
    Tunnel,
    /// Software interface with no more specific classification.
    #[default]
    Virtual,
}

/// Per-interface traffic counters plus sysfs metadata.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct NetIfaceInfo {
    /// Interface name (eth0, enp3s0, ...). Loopback is never recorded.
    pub name: String,

    /// Source: `/proc/net/dev` receive bytes
    pub rx_bytes: u64,
    /// Source: `/proc/net/dev` receive packets
    pub rx_packets: u64,
    /// Source: `/proc/net/dev` receive errs
    pub rx_errs: u64,
    /// Source: `/proc/net/dev` receive drop
    pub rx_drop: u64,
    /// Source: `/proc/net/dev` transmit bytes
    pub tx_bytes: u64,
    /// Source: `/proc/net/dev` transmit packets
    pub tx_packets: u64,
    /// Source: `/proc/net/dev` transmit errs
    pub tx_errs: u64,
    /// Source: `/proc/net/dev` transmit drop
    pub tx_drop: u64,

    /// Administrative/operational state, e.g. "up", "down", "unknown".
    /// Source: `/sys/class/net/<if>/operstate`
    pub operstate: String,

    /// Link speed in Mbit/s; -1 when the kernel does not know.
    /// Source: `/sys/class/net/<if>/speed`
    pub speed_mbit: i64,

    /// Enslaving master device (bridge or bond), when any.
    /// Source: `/sys/class/net/<if>/master` symlink
    pub master: Option<String>,

    /// Classified interface type.
    pub kind: IfaceKind,
}

/// Aggregate TCP/UDP counters from /proc/net/snmp and /proc/net/netstat.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct NetSnmpInfo {
    /// Source: `Tcp: ActiveOpens`
    pub tcp_active_opens: u64,
    /// Source: `Tcp: PassiveOpens`
    pub tcp_passive_opens: u64,
    /// Source: `Tcp: CurrEstab`
    pub tcp_curr_estab: u64,
    /// Source: `Tcp: InSegs`
    pub tcp_in_segs: u64,
    /// Source: `Tcp: OutSegs`
    pub tcp_out_segs: u64,
    /// Source: `Tcp: RetransSegs`
    pub tcp_retrans_segs: u64,
    /// Source: `Tcp: InErrs`
    pub tcp_in_errs: u64,
    /// Source: `Tcp: OutRsts`
    pub tcp_out_rsts: u64,
    /// Source: `Udp: InDatagrams`
    pub udp_in_datagrams: u64,
    /// Source: `Udp: OutDatagrams`
    pub udp_out_datagrams: u64,
    /// Source: `Udp: NoPorts`
    pub udp_no_ports: u64,
    /// Source: `Udp: InErrors`
    pub udp_in_errors: u64,
    /// Source: `Udp: RcvbufErrors`
    pub udp_rcvbuf_errors: u64,
    /// Accept-queue overflows.
    /// Source: `TcpExt: ListenOverflows` in `/proc/net/netstat`
    pub listen_overflows: u64,
    /// SYNs dropped because the accept queue was full.
    /// Source: `TcpExt: ListenDrops`
    pub listen_drops: u64,
    /// Source: `TcpExt: TCPTimeouts`
    pub tcp_timeouts: u64,
    /// Source: `TcpExt: TCPSynRetrans`
    pub tcp_syn_retrans: u64,
}

/// Census of sockets by TCP state, both address families combined.
///
/// Source: the `st` column of `/proc/net/tcp` and `/proc/net/tcp6`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct TcpStateCensus {
    pub established: u32,
    pub syn_sent: u32,
    pub syn_recv: u32,
    pub fin_wait1: u32,
    pub fin_wait2: u32,
    pub time_wait: u32,
    pub close: u32,
    pub close_wait: u32,
    pub last_ack: u32,
    pub listen: u32,
    pub closing: u32,
}

/// Connection-tracking table usage.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ConntrackInfo {
    /// Source: `/proc/sys/net/netfilter/nf_conntrack_count`, with the
    /// hex `entries` column of `/proc/net/stat/nf_conntrack` as fallback
    pub count: u64,
    /// Source: `/proc/sys/net/netfilter/nf_conntrack_max`
    pub max: u64,
}

/// System-wide file handle usage.
///
/// Source: the three-number `/proc/sys/fs/file-nr`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct FileHandleInfo {
    /// Allocated file handles.
    pub allocated: u64,
    /// Allocated but unused handles.
    pub free: u64,
    /// Kernel limit.
    pub max: u64,
}

/// Per-class softirq totals summed across CPUs.
///
/// Source: `/proc/softirqs`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct SoftirqInfo {
    pub hi: u64,
    pub timer: u64,
    pub net_tx: u64,
    pub net_rx: u64,
    pub block: u64,
    pub irq_poll: u64,
    pub tasklet: u64,
    pub sched: u64,
    pub hrtimer: u64,
    pub rcu: u64,
}

/// A process holding many sockets in the ephemeral port range.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct PortUser {
    pub pid: u32,
    pub process: String,
    /// Sockets with a local port inside the configured range.
    pub socket_count: u32,
}

/// Ephemeral port range usage and its heaviest users.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct EphemeralPortInfo {
    /// Source: `/proc/sys/net/ipv4/ip_local_port_range` field 1
    pub range_low: u16,
    /// Source: `/proc/sys/net/ipv4/ip_local_port_range` field 2
    pub range_high: u16,
    /// Local ports in use within the range, all states.
    pub in_use: u32,
    /// Of those, sockets in ESTABLISHED.
    pub established: u32,
    /// Of those, sockets in TIME_WAIT.
    pub time_wait: u32,
    /// Top owners by socket count, descending.
    pub top_users: Vec<PortUser>,
}

/// Aggregated CLOSE_WAIT sockets for one owning process.
///
/// Ages come from a first-seen map keyed by the socket's local→remote
/// hex pair, so they survive across ticks while the socket exists.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct CloseWaitLeaker {
    pub pid: u32,
    pub process: String,
    /// CLOSE_WAIT sockets attributed to this PID.
    pub count: u32,
    /// Age in seconds of the longest-lived tracked socket.
    pub oldest_age_secs: u64,
    /// Age in seconds of the youngest tracked socket.
    pub newest_age_secs: u64,
    /// Up to three sample remote addresses.
    pub remote_ips: Vec<String>,
}

/// CLOSE_WAIT totals plus the per-PID attribution list.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct CloseWaitInfo {
    /// CLOSE_WAIT sockets observed this tick, both families.
    pub total: u32,
    /// EWMA-smoothed total (alpha 0.3), damping scan-to-scan jitter.
    pub smoothed: f64,
    /// Per-PID aggregation, heaviest holders first.
    pub leakers: Vec<CloseWaitLeaker>,
}

/// A process whose main executable is a memfd or a deleted binary
/// outside the known-safe path prefixes.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct FilelessProcess {
    pub pid: u32,
    pub comm: String,
    /// The raw `exe` link target, e.g. `/memfd:x (deleted)`.
    pub exe: String,
    pub rss_bytes: u64,
    /// Established TCP connections held by the process.
    pub outbound_connections: u32,
    /// Sample of remote addresses it talks to.
    pub remote_ips: Vec<String>,
}

/// An open file whose backing path has been unlinked.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct DeletedOpenFile {
    pub pid: u32,
    pub fd: u32,
    /// Link target with the ` (deleted)` marker stripped.
    pub path: String,
    pub size_bytes: u64,
}

/// Host identity carried through to the analysis result unchanged.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct SystemIdentity {
    /// Source: `/proc/sys/kernel/hostname`
    pub hostname: String,
    /// Source: `/proc/sys/kernel/osrelease`
    pub kernel: String,
    /// Source: `/proc/uptime` field 1
    pub uptime_secs: u64,
}

/// Directly-measured kernel events injected by an external tracing
/// integration. When present, the analyzers emit high-trust evidence
/// from these instead of inferring the same facts from counters.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct SentinelSample {
    /// OOM-kill victims observed since the previous tick.
    pub oom_kills: Vec<SentinelOomKill>,
    /// Time tasks spent in direct reclaim since the previous tick.
    pub direct_reclaim_stall_us: u64,
    /// Cgroup CPU throttle events since the previous tick.
    pub cgroup_throttle_events: u64,
    /// Packet drops since the previous tick.
    pub packet_drops: u64,
    /// TCP RSTs sent since the previous tick.
    pub tcp_resets: u64,
}

/// One OOM-kill victim reported by the sentinel.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct SentinelOomKill {
    pub pid: u32,
    pub comm: String,
    /// Cgroup path of the victim at kill time.
    pub cgroup: String,
}
