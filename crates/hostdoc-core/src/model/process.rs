//! Per-process record built from `/proc/[pid]/` files.

use serde::{Deserialize, Serialize};

/// One sampled process.
///
/// The process collector keeps a bounded top-N of these, ranked so
/// that both CPU-heavy and write-heavy processes survive truncation.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ProcessInfo {
    /// Source: `/proc/[pid]/stat` field 1
    pub pid: u32,

    /// Parent PID.
    /// Source: `/proc/[pid]/stat` field 4
    pub ppid: u32,

    /// Command name, recovered by splitting on the last `)`.
    /// Source: `/proc/[pid]/stat` field 2
    pub comm: String,

    /// Scheduler state letter (R, S, D, Z, ...).
    /// Source: `/proc/[pid]/stat` field 3
    pub state: char,

    /// True for kernel threads (no user address space). Derived from
    /// an empty cmdline plus the kernel-thread name table.
    pub kernel_thread: bool,

    /// Real UID.
    /// Source: `Uid` in `/proc/[pid]/status`
    pub uid: u32,

    /// User-mode CPU time, jiffies. Monotonic per PID.
    /// Source: `/proc/[pid]/stat` utime
    pub utime: u64,

    /// Kernel-mode CPU time, jiffies.
    /// Source: `/proc/[pid]/stat` stime
    pub stime: u64,

    /// Minor page faults.
    /// Source: `/proc/[pid]/stat` minflt
    pub minflt: u64,

    /// Major page faults.
    /// Source: `/proc/[pid]/stat` majflt
    pub majflt: u64,

    /// Process start time, jiffies after boot.
    /// Source: `/proc/[pid]/stat` starttime
    pub starttime: u64,

    /// Source: `/proc/[pid]/stat` num_threads
    pub num_threads: u32,

    /// Resident set size in bytes (stat rss pages × page size).
    pub rss_bytes: u64,

    /// Virtual size in bytes.
    /// Source: `/proc/[pid]/stat` vsize
    pub vsize_bytes: u64,

    /// Swapped-out size in bytes.
    /// Source: `VmSwap` in `/proc/[pid]/status`
    pub swap_bytes: u64,

    /// Bytes fetched from the storage layer.
    /// Source: `read_bytes` in `/proc/[pid]/io`
    pub read_bytes: u64,

    /// Bytes sent to the storage layer.
    /// Source: `write_bytes` in `/proc/[pid]/io`
    pub write_bytes: u64,

    /// Bytes read by syscalls, page cache included.
    /// Source: `rchar` in `/proc/[pid]/io`
    pub rchar: u64,

    /// Bytes written by syscalls.
    /// Source: `wchar` in `/proc/[pid]/io`
    pub wchar: u64,

    /// Voluntary context switches (the process chose to wait).
    /// Source: `voluntary_ctxt_switches` in `/proc/[pid]/status`
    pub nvcsw: u64,

    /// Involuntary context switches (preempted).
    /// Source: `nonvoluntary_ctxt_switches` in `/proc/[pid]/status`
    pub nivcsw: u64,

    /// Cgroup path of the process (v2 line preferred).
    /// Source: `/proc/[pid]/cgroup`
    pub cgroup: String,

    /// Open file descriptors.
    /// Source: entry count of `/proc/[pid]/fd/`
    pub fd_count: u32,
}

impl ProcessInfo {
    /// Combined CPU ticks, the ranking key for the CPU half of top-N.
    pub fn cpu_ticks(&self) -> u64 {
        self.utime + self.stime
    }

    /// True when the process is in uninterruptible sleep.
    pub fn is_dstate(&self) -> bool {
        self.state == 'D'
    }
}
