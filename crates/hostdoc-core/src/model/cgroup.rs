//! Per-cgroup resource accounting from the unified (v2) hierarchy,
//! with a legacy (v1) fallback.

use serde::{Deserialize, Serialize};

/// Per-device I/O counters for one cgroup.
///
/// Source: one line of `io.stat` (`MAJOR:MINOR rbytes=.. wbytes=.. ...`).
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct CgroupIoDevice {
    pub major: u32,
    pub minor: u32,
    pub rbytes: u64,
    pub wbytes: u64,
    pub rios: u64,
    pub wios: u64,
}

/// Resource usage and limits for one cgroup in the walked tree.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct CgroupInfo {
    /// Path relative to the cgroup root, e.g. `system.slice/nginx.service`.
    pub path: String,

    /// Hierarchy version the data came from: 2 or 1.
    pub version: u8,

    /// Cumulative CPU time, microseconds.
    /// Source: `usage_usec` in `cpu.stat`
    pub cpu_usage_usec: u64,

    /// Source: `user_usec` in `cpu.stat`
    pub cpu_user_usec: u64,

    /// Source: `system_usec` in `cpu.stat`
    pub cpu_system_usec: u64,

    /// Enforcement periods elapsed.
    /// Source: `nr_periods` in `cpu.stat`
    pub nr_periods: u64,

    /// Periods in which the group was throttled.
    /// Source: `nr_throttled` in `cpu.stat`
    pub nr_throttled: u64,

    /// Total throttled time, microseconds.
    /// Source: `throttled_usec` in `cpu.stat`
    pub throttled_usec: u64,

    /// CPU quota in microseconds per period; -1 means unlimited.
    /// Source: `cpu.max` field 1
    pub cpu_quota_usec: i64,

    /// CPU enforcement period, microseconds.
    /// Source: `cpu.max` field 2
    pub cpu_period_usec: u64,

    /// Current memory charge, bytes.
    /// Source: `memory.current`
    pub mem_current: u64,

    /// Memory limit in bytes; `u64::MAX` means unlimited.
    /// Source: `memory.max`
    pub mem_limit: u64,

    /// OOM kills charged to this group. Monotonic.
    /// Source: `oom_kill` in `memory.events`
    pub oom_kills: u64,

    /// Source: `pids.current`
    pub pids_current: u64,

    /// PID limit; `u64::MAX` means unlimited.
    /// Source: `pids.max`
    pub pids_max: u64,

    /// Per-device I/O counters.
    /// Source: `io.stat`
    pub io: Vec<CgroupIoDevice>,
}

impl CgroupInfo {
    /// Memory usage as a fraction of the limit, or `None` when unlimited.
    pub fn mem_used_ratio(&self) -> Option<f64> {
        if self.mem_limit == 0 || self.mem_limit == u64::MAX {
            return None;
        }
        Some(self.mem_current as f64 / self.mem_limit as f64)
    }

    /// Total I/O bytes read across devices.
    pub fn io_read_bytes(&self) -> u64 {
        self.io.iter().map(|d| d.rbytes).sum()
    }

    /// Total I/O bytes written across devices.
    pub fn io_write_bytes(&self) -> u64 {
        self.io.iter().map(|d| d.wbytes).sum()
    }
}
