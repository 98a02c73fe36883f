//! Gated scanners for security-relevant filesystem anomalies:
//! processes running from memfd/deleted executables, and files that
//! are open but already unlinked.
//!
//! Both scanners own an interval clock and a cached result. Between
//! scans the cache is returned unchanged; a caller (the engine, when
//! it detects disk pressure) can set a trigger flag that forces the
//! next call to rescan regardless of the timer.

use std::path::Path;
use std::time::{Duration, Instant};

use crate::collector::procfs::parser::{parse_pid_status, parse_socket_table, tcp_state};
use crate::collector::traits::FileSystem;
use crate::model::system::{DeletedOpenFile, FilelessProcess};

/// Rescan interval for the fileless-process scanner.
pub const FILELESS_INTERVAL: Duration = Duration::from_secs(10);

/// Rescan interval for the deleted-but-open scanner.
pub const DELETED_OPEN_INTERVAL: Duration = Duration::from_secs(30);

/// Executable path prefixes that are never treated as fileless even
/// when the on-disk binary was deleted (package upgrades do this).
const SAFE_PATH_PREFIXES: &[&str] = &["/usr/", "/bin/", "/lib/", "/sbin/", "/opt/"];

/// Process names known to legitimately run from memfd.
const MEMFD_ALLOWLIST: &[&str] = &[
    "chrome",
    "chromium",
    "firefox",
    "electron",
    "containerd",
    "containerd-shim",
    "dockerd",
    "runc",
    "crun",
];

/// Cap on the deleted-open result, largest files first.
const MAX_DELETED_OPEN: usize = 100;

/// Scans for processes whose main executable is a memfd or a deleted
/// binary outside the safe path prefixes.
pub struct FilelessScanner<F: FileSystem> {
    fs: F,
    proc_path: String,
    interval: Duration,
    last_scan: Option<Instant>,
    cache: Vec<FilelessProcess>,
    force: bool,
}

impl<F: FileSystem> FilelessScanner<F> {
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self::with_interval(fs, proc_path, FILELESS_INTERVAL)
    }

    pub fn with_interval(fs: F, proc_path: impl Into<String>, interval: Duration) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            interval,
            last_scan: None,
            cache: Vec::new(),
            force: false,
        }
    }

    /// Forces the next [`collect`](Self::collect) to rescan.
    pub fn trigger(&mut self) {
        self.force = true;
    }

    /// Returns the current fileless list, rescanning when due.
    pub fn collect(&mut self) -> Vec<FilelessProcess> {
        let due = self
            .last_scan
            .is_none_or(|t| t.elapsed() >= self.interval);
        if !due && !self.force {
            return self.cache.clone();
        }
        self.force = false;
        self.last_scan = Some(Instant::now());
        self.cache = self.scan();
        self.cache.clone()
    }

    fn scan(&self) -> Vec<FilelessProcess> {
        let Ok(entries) = self.fs.read_dir(Path::new(&self.proc_path)) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        for entry in entries {
            let Some(pid) = entry
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };

            let exe_path = format!("{}/{}/exe", self.proc_path, pid);
            let Ok(target) = self.fs.read_link(Path::new(&exe_path)) else {
                continue;
            };
            let exe = target.to_string_lossy().into_owned();

            if !is_fileless_exe(&exe) {
                continue;
            }

            let status = self
                .fs
                .read_to_string(Path::new(&format!("{}/{}/status", self.proc_path, pid)))
                .map(|c| parse_pid_status(&c))
                .unwrap_or_default();
            if MEMFD_ALLOWLIST.iter().any(|a| status.name.starts_with(a)) {
                continue;
            }

            let (outbound, remote_ips) = self.outbound_connections(pid);

            tracing::warn!(pid, exe = %exe, "fileless executable detected");
            found.push(FilelessProcess {
                pid,
                comm: status.name,
                exe,
                rss_bytes: status.vm_rss_bytes,
                outbound_connections: outbound,
                remote_ips,
            });
        }

        found.sort_by_key(|p| p.pid);
        found
    }

    /// Established TCP connections held by one process, with a sample
    /// of remote addresses.
    fn outbound_connections(&self, pid: u32) -> (u32, Vec<String>) {
        let fd_dir = format!("{}/{}/fd", self.proc_path, pid);
        let Ok(fds) = self.fs.read_dir(Path::new(&fd_dir)) else {
            return (0, Vec::new());
        };

        let mut inodes = Vec::new();
        for fd in fds {
            if let Ok(target) = self.fs.read_link(&fd)
                && let Some(inode) = target
                    .to_string_lossy()
                    .strip_prefix("socket:[")
                    .and_then(|s| s.strip_suffix(']'))
                    .and_then(|s| s.parse::<u64>().ok())
            {
                inodes.push(inode);
            }
        }
        if inodes.is_empty() {
            return (0, Vec::new());
        }

        let mut count = 0;
        let mut ips = Vec::new();
        for table in ["net/tcp", "net/tcp6"] {
            let path = format!("{}/{}", self.proc_path, table);
            let Ok(content) = self.fs.read_to_string(Path::new(&path)) else {
                continue;
            };
            for s in parse_socket_table(&content) {
                if s.state == tcp_state::ESTABLISHED && inodes.contains(&s.inode) {
                    count += 1;
                    if ips.len() < 3 {
                        ips.push(format!("{}:{}", s.remote_ip, s.remote_port));
                    }
                }
            }
        }
        (count, ips)
    }
}

/// True when an exe link target indicates a fileless executable.
fn is_fileless_exe(target: &str) -> bool {
    if target.starts_with("/memfd:") || target.starts_with("memfd:") {
        return true;
    }
    if let Some(path) = target.strip_suffix(" (deleted)") {
        return !SAFE_PATH_PREFIXES.iter().any(|p| path.starts_with(p));
    }
    false
}

/// Scans every process's fd directory for open files whose backing
/// path has been unlinked. Returns the largest first.
pub struct DeletedOpenScanner<F: FileSystem> {
    fs: F,
    proc_path: String,
    interval: Duration,
    last_scan: Option<Instant>,
    cache: Vec<DeletedOpenFile>,
    force: bool,
}

impl<F: FileSystem> DeletedOpenScanner<F> {
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self::with_interval(fs, proc_path, DELETED_OPEN_INTERVAL)
    }

    pub fn with_interval(fs: F, proc_path: impl Into<String>, interval: Duration) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            interval,
            last_scan: None,
            cache: Vec::new(),
            force: false,
        }
    }

    /// Forces the next [`collect`](Self::collect) to rescan. The
    /// engine pulls this when disk pressure appears, since deleted-but
    /// -open files are invisible space consumers.
    pub fn trigger(&mut self) {
        self.force = true;
    }

    /// Returns the current deleted-open list, rescanning when due.
    pub fn collect(&mut self) -> Vec<DeletedOpenFile> {
        let due = self
            .last_scan
            .is_none_or(|t| t.elapsed() >= self.interval);
        if !due && !self.force {
            return self.cache.clone();
        }
        self.force = false;
        self.last_scan = Some(Instant::now());
        self.cache = self.scan();
        self.cache.clone()
    }

    fn scan(&self) -> Vec<DeletedOpenFile> {
        let Ok(entries) = self.fs.read_dir(Path::new(&self.proc_path)) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        for entry in entries {
            let Some(pid) = entry
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };

            let fd_dir = format!("{}/{}/fd", self.proc_path, pid);
            let Ok(fds) = self.fs.read_dir(Path::new(&fd_dir)) else {
                continue;
            };

            for fd_path in fds {
                let Ok(target) = self.fs.read_link(&fd_path) else {
                    continue;
                };
                let target = target.to_string_lossy();
                let Some(path) = target.strip_suffix(" (deleted)") else {
                    continue;
                };
                // memfd and anonymous inodes are not disk consumers
                if path.starts_with("/memfd:") || path.starts_with("anon_inode:") {
                    continue;
                }
                let Some(fd) = fd_num(&fd_path) else {
                    continue;
                };
                let size_bytes = self.fs.file_size(&fd_path).unwrap_or(0);
                found.push(DeletedOpenFile {
                    pid,
                    fd,
                    path: path.to_string(),
                    size_bytes,
                });
            }
        }

        found.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then(a.pid.cmp(&b.pid)));
        found.truncate(MAX_DELETED_OPEN);
        found
    }
}

fn fd_num(path: &Path) -> Option<u32> {
    path.file_name()?.to_str()?.parse().ok()
}
