//! The snapshot: one typed, immutable record of a single instant.
//!
//! Every engine tick produces exactly one snapshot. Each collector owns
//! one region (one field or field group) and never touches another
//! collector's region, so collectors are free to run in any order.
//! A snapshot may be partial: a failed collector leaves its region at
//! the zero value and appends one short string to `errors`.

use serde::{Deserialize, Serialize};

use super::cgroup::CgroupInfo;
use super::process::ProcessInfo;
use super::system::{
    CloseWaitInfo, ConntrackInfo, CpuTimes, DeletedOpenFile, DiskInfo, EphemeralPortInfo,
    FileHandleInfo, FilelessProcess, KernelStatInfo, LoadInfo, MemInfo, MountInfo, NetIfaceInfo,
    NetSnmpInfo, PsiInfo, SentinelSample, SoftirqInfo, SystemIdentity, TcpStateCensus, VmstatInfo,
};

/// A point-in-time capture of every collected metric.
///
/// Counter fields are monotonic non-decreasing across snapshots from
/// the same boot; rate computation clamps the delta to zero whenever a
/// reading regresses (counter reset, PID reuse).
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Snapshot {
    /// Wall-clock seconds since the epoch when the tick started.
    pub timestamp: i64,

    /// Pressure stall information for cpu/memory/io.
    pub psi: PsiInfo,

    /// CPU time counters; index 0 is the aggregate line (`cpu_id == -1`),
    /// the rest are per-core.
    pub cpus: Vec<CpuTimes>,

    /// Load averages and runnable/total entity counts.
    pub load: LoadInfo,

    /// Context switches, forks, boot time, D-state count.
    pub stat: KernelStatInfo,

    /// Memory summary, bytes only.
    pub memory: MemInfo,

    /// Memory-management event counters.
    pub vmstat: VmstatInfo,

    /// Whole-disk block device counters.
    pub disks: Vec<DiskInfo>,

    /// Real (non-pseudo) mounts with capacity figures, deduplicated
    /// by backing device.
    pub mounts: Vec<MountInfo>,

    /// Non-loopback network interfaces with sysfs metadata.
    pub net_ifaces: Vec<NetIfaceInfo>,

    /// Aggregate TCP/UDP protocol counters.
    pub net_snmp: NetSnmpInfo,

    /// Socket counts by TCP state.
    pub tcp_states: TcpStateCensus,

    /// Connection-tracking table usage.
    pub conntrack: ConntrackInfo,

    /// System-wide file handle usage.
    pub file_handles: FileHandleInfo,

    /// Per-class softirq totals.
    pub softirqs: SoftirqInfo,

    /// Ephemeral port range usage and top owners.
    pub ephemeral_ports: EphemeralPortInfo,

    /// CLOSE_WAIT totals and per-PID leaker attribution.
    pub close_wait: CloseWaitInfo,

    /// Fileless processes found by the gated scanner.
    pub fileless: Vec<FilelessProcess>,

    /// Deleted-but-open files found by the gated scanner.
    pub deleted_open: Vec<DeletedOpenFile>,

    /// Bounded top-N processes (top half by CPU, top half by write
    /// bytes, merged and deduplicated).
    pub processes: Vec<ProcessInfo>,

    /// Walked cgroup tree with resource usage and limits.
    pub cgroups: Vec<CgroupInfo>,

    /// Host identity passthrough.
    pub identity: SystemIdentity,

    /// Directly-measured kernel events, when a tracing integration
    /// supplied them for this tick.
    pub sentinel: Option<SentinelSample>,

    /// One short message per collector failure this tick. Never causes
    /// the tick itself to fail.
    pub errors: Vec<String>,
}

impl Snapshot {
    /// The aggregate CPU line, when the CPU collector succeeded.
    pub fn cpu_total(&self) -> Option<&CpuTimes> {
        self.cpus.iter().find(|c| c.cpu_id == -1)
    }

    /// Number of cores, from the per-core lines. At least 1 so that
    /// per-core normalizations never divide by zero.
    pub fn nr_cpus(&self) -> u32 {
        let n = self.cpus.iter().filter(|c| c.cpu_id >= 0).count() as u32;
        n.max(1)
    }

    /// Count of processes currently in uninterruptible sleep among the
    /// sampled top-N, or the kernel's own count when larger (the ranked
    /// sample can miss D-state tasks that are neither CPU- nor
    /// write-heavy).
    pub fn dstate_count(&self) -> u32 {
        let sampled = self.processes.iter().filter(|p| p.is_dstate()).count() as u32;
        sampled.max(self.stat.procs_blocked)
    }
}
