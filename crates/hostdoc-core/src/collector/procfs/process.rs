//! Process collector: per-PID metrics from `/proc/[pid]/` with a
//! bounded top-N ranking.

use std::collections::HashSet;
use std::path::Path;

use crate::collector::procfs::parser::{
    parse_pid_cgroup, parse_pid_io, parse_pid_stat, parse_pid_status,
};
use crate::collector::traits::FileSystem;
use crate::model::ProcessInfo;
use crate::util::is_kernel_thread_name;

/// Page size used to convert stat rss pages to bytes.
const PAGE_SIZE: u64 = 4096;

/// Error type for collection failures.
#[derive(Debug)]
pub enum CollectError {
    /// Process disappeared between the directory listing and the read.
    ProcessGone(u32),
    /// I/O error reading a kernel file.
    Io(std::io::Error),
    /// Structurally unusable file content.
    Parse(String),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::ProcessGone(pid) => write!(f, "process {} disappeared", pid),
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

/// Collects process records and truncates them so that IO-heavy
/// processes cannot be hidden by CPU-heavy ones: the kept set is the
/// top ⌊N/2⌋ by CPU ticks plus the top ⌊N/2⌋ by write bytes, merged
/// and deduplicated, with any remaining slots refilled by CPU rank.
pub struct ProcessCollector<F: FileSystem> {
    fs: F,
    proc_path: String,
    top_n: usize,
}

impl<F: FileSystem> ProcessCollector<F> {
    pub fn new(fs: F, proc_path: impl Into<String>, top_n: usize) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            top_n: top_n.max(2),
        }
    }

    /// Collects one process. Disappearance mid-read maps to
    /// [`CollectError::ProcessGone`] so callers can skip silently.
    pub fn collect_process(&self, pid: u32) -> Result<ProcessInfo, CollectError> {
        let dir = format!("{}/{}", self.proc_path, pid);

        let stat_content = self
            .fs
            .read_to_string(Path::new(&format!("{}/stat", dir)))
            .map_err(|_| CollectError::ProcessGone(pid))?;
        let stat =
            parse_pid_stat(&stat_content).map_err(|e| CollectError::Parse(e.message))?;

        let status = self
            .fs
            .read_to_string(Path::new(&format!("{}/status", dir)))
            .map(|c| parse_pid_status(&c))
            .unwrap_or_default();

        // io is often unreadable without privileges; degrade to zeros
        let io = self
            .fs
            .read_to_string(Path::new(&format!("{}/io", dir)))
            .map(|c| parse_pid_io(&c))
            .unwrap_or_default();

        let cgroup = self
            .fs
            .read_to_string(Path::new(&format!("{}/cgroup", dir)))
            .map(|c| parse_pid_cgroup(&c))
            .unwrap_or_default();

        let fd_count = self
            .fs
            .read_dir(Path::new(&format!("{}/fd", dir)))
            .map(|entries| entries.len() as u32)
            .unwrap_or(0);

        let kernel_thread = pid == 2 || stat.ppid == 2 || is_kernel_thread_name(&stat.comm);

        Ok(ProcessInfo {
            pid: stat.pid,
            ppid: stat.ppid,
            comm: stat.comm,
            state: stat.state,
            kernel_thread,
            uid: status.uid,
            utime: stat.utime,
            stime: stat.stime,
            minflt: stat.minflt,
            majflt: stat.majflt,
            starttime: stat.starttime,
            num_threads: stat.num_threads,
            rss_bytes: stat.rss_pages.max(0) as u64 * PAGE_SIZE,
            vsize_bytes: stat.vsize,
            swap_bytes: status.vm_swap_bytes,
            read_bytes: io.read_bytes,
            write_bytes: io.write_bytes,
            rchar: io.rchar,
            wchar: io.wchar,
            nvcsw: status.voluntary_ctxt_switches,
            nivcsw: status.nonvoluntary_ctxt_switches,
            cgroup,
            fd_count,
        })
    }

    /// Collects every numeric `/proc` entry, then truncates to top-N.
    /// Processes that vanish mid-walk are skipped; parse shortfalls
    /// discard the individual record.
    pub fn collect_top(&self) -> Result<Vec<ProcessInfo>, CollectError> {
        let entries = self.fs.read_dir(Path::new(&self.proc_path))?;

        let mut processes = Vec::new();
        for entry in entries {
            let Some(pid) = entry
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            match self.collect_process(pid) {
                Ok(info) => processes.push(info),
                Err(CollectError::ProcessGone(_)) | Err(CollectError::Parse(_)) => continue,
                Err(e) => {
                    tracing::debug!("skipping pid {}: {}", pid, e);
                }
            }
        }

        Ok(rank_top_n(processes, self.top_n))
    }
}

/// Applies the top-N ranking policy. Results come back in CPU-tick
/// order, heaviest first.
pub fn rank_top_n(mut processes: Vec<ProcessInfo>, n: usize) -> Vec<ProcessInfo> {
    processes.sort_by(|a, b| b.cpu_ticks().cmp(&a.cpu_ticks()).then(a.pid.cmp(&b.pid)));
    if processes.len() <= n {
        return processes;
    }

    let half = n / 2;
    let mut keep: HashSet<u32> = processes.iter().take(half).map(|p| p.pid).collect();

    let mut by_writes: Vec<&ProcessInfo> = processes.iter().collect();
    by_writes.sort_by(|a, b| b.write_bytes.cmp(&a.write_bytes).then(a.pid.cmp(&b.pid)));
    for p in by_writes.iter().take(half) {
        keep.insert(p.pid);
    }

    // Refill remaining slots by CPU rank
    for p in &processes {
        if keep.len() >= n {
            break;
        }
        keep.insert(p.pid);
    }

    processes.retain(|p| keep.contains(&p.pid));
    processes
}
