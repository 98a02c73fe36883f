//! Main collector: runs every per-surface collector and assembles the
//! typed snapshot.
//!
//! Each collector builds its own region as an independent value; the
//! assembly at the end is the only place the snapshot is touched, so
//! no collector can observe another's output within a tick. A failed
//! collector leaves its region zero-valued and contributes one short
//! string to `snapshot.errors`; the tick itself never fails here.

use std::time::{Duration, Instant};

use crate::collector::cgroup::CgroupCollector;
use crate::collector::procfs::fileless::{DeletedOpenScanner, FilelessScanner};
use crate::collector::procfs::{ProcessCollector, SocketCollector, SystemCollector};
use crate::collector::traits::FileSystem;
use crate::model::system::SentinelSample;
use crate::model::Snapshot;

/// Default bound for the process top-N.
pub const DEFAULT_TOP_PROCESSES: usize = 50;

/// Wall time spent in each collector during the last snapshot.
#[derive(Debug, Clone, Default)]
pub struct CollectorTiming {
    pub total: Duration,
    pub psi: Duration,
    pub cpu: Duration,
    pub memory: Duration,
    pub disks: Duration,
    pub mounts: Duration,
    pub network: Duration,
    pub sockets: Duration,
    pub processes: Duration,
    pub cgroups: Duration,
    pub scanners: Duration,
}

/// Owns one instance of every per-surface collector plus their caches.
pub struct Collector<F: FileSystem + Clone> {
    system: SystemCollector<F>,
    processes: ProcessCollector<F>,
    sockets: SocketCollector<F>,
    fileless: FilelessScanner<F>,
    deleted_open: DeletedOpenScanner<F>,
    cgroups: CgroupCollector<F>,
    pending_sentinel: Option<SentinelSample>,
    last_timing: Option<CollectorTiming>,
}

impl<F: FileSystem + Clone> Collector<F> {
    /// Creates a collector reading from `proc_path`/`sys_path`
    /// (usually `/proc` and `/sys`).
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self::with_paths(fs, proc_path, "/sys", DEFAULT_TOP_PROCESSES)
    }

    pub fn with_paths(
        fs: F,
        proc_path: impl Into<String>,
        sys_path: impl Into<String>,
        top_n: usize,
    ) -> Self {
        let proc_path = proc_path.into();
        let sys_path = sys_path.into();
        let cgroup_root = format!("{}/fs/cgroup", sys_path.trim_end_matches('/'));

        Self {
            system: SystemCollector::new(fs.clone(), &proc_path, &sys_path),
            processes: ProcessCollector::new(fs.clone(), &proc_path, top_n),
            sockets: SocketCollector::new(fs.clone(), &proc_path),
            fileless: FilelessScanner::new(fs.clone(), &proc_path),
            deleted_open: DeletedOpenScanner::new(fs.clone(), &proc_path),
            cgroups: CgroupCollector::new(fs, cgroup_root),
            pending_sentinel: None,
            last_timing: None,
        }
    }

    /// Queues a sentinel sample for the next snapshot.
    pub fn set_sentinel(&mut self, sample: SentinelSample) {
        self.pending_sentinel = Some(sample);
    }

    /// Forces the gated disk-related scanner to rescan on the next
    /// tick. The engine pulls this when it detects disk pressure.
    pub fn trigger_disk_scan(&mut self) {
        self.deleted_open.trigger();
    }

    /// Timing of the last [`collect_snapshot`](Self::collect_snapshot).
    pub fn last_timing(&self) -> Option<&CollectorTiming> {
        self.last_timing.as_ref()
    }

    /// Collects a complete snapshot. Infallible by contract: every
    /// collector failure degrades its region and is noted in
    /// `snapshot.errors`.
    pub fn collect_snapshot(&mut self) -> Snapshot {
        let total_start = Instant::now();
        let mut timing = CollectorTiming::default();
        let mut snap = Snapshot {
            timestamp: chrono::Utc::now().timestamp(),
            ..Default::default()
        };

        let start = Instant::now();
        match self.system.collect_psi() {
            Ok(psi) => snap.psi = psi,
            Err(e) => snap.errors.push(format!("psi: {}", e)),
        }
        timing.psi = start.elapsed();

        let start = Instant::now();
        match self.system.collect_stat() {
            Ok((cpus, stat)) => {
                snap.cpus = cpus;
                snap.stat = stat;
            }
            Err(e) => snap.errors.push(format!("stat: {}", e)),
        }
        match self.system.collect_loadavg() {
            Ok(load) => snap.load = load,
            Err(e) => snap.errors.push(format!("loadavg: {}", e)),
        }
        timing.cpu = start.elapsed();

        let start = Instant::now();
        match self.system.collect_meminfo() {
            Ok(mem) => snap.memory = mem,
            Err(e) => snap.errors.push(format!("meminfo: {}", e)),
        }
        match self.system.collect_vmstat() {
            Ok(vm) => snap.vmstat = vm,
            Err(e) => snap.errors.push(format!("vmstat: {}", e)),
        }
        timing.memory = start.elapsed();

        let start = Instant::now();
        match self.system.collect_disks() {
            Ok(disks) => snap.disks = disks,
            Err(e) => snap.errors.push(format!("diskstats: {}", e)),
        }
        timing.disks = start.elapsed();

        let start = Instant::now();
        match self.system.collect_mounts() {
            Ok(mounts) => snap.mounts = mounts,
            Err(e) => snap.errors.push(format!("mounts: {}", e)),
        }
        timing.mounts = start.elapsed();

        let start = Instant::now();
        match self.system.collect_net_ifaces() {
            Ok(ifaces) => snap.net_ifaces = ifaces,
            Err(e) => snap.errors.push(format!("net/dev: {}", e)),
        }
        match self.system.collect_net_snmp() {
            Ok(snmp) => snap.net_snmp = snmp,
            Err(e) => snap.errors.push(format!("net/snmp: {}", e)),
        }
        match self.system.collect_softirqs() {
            Ok(softirqs) => snap.softirqs = softirqs,
            Err(e) => snap.errors.push(format!("softirqs: {}", e)),
        }
        match self.system.collect_file_handles() {
            Ok(fh) => snap.file_handles = fh,
            Err(e) => snap.errors.push(format!("file-nr: {}", e)),
        }
        match self.system.collect_conntrack() {
            Ok(ct) => snap.conntrack = ct,
            Err(e) => snap.errors.push(format!("conntrack: {}", e)),
        }
        timing.network = start.elapsed();

        let start = Instant::now();
        match self.sockets.collect(snap.timestamp) {
            Ok(sample) => {
                snap.tcp_states = sample.tcp_states;
                snap.ephemeral_ports = sample.ephemeral_ports;
                snap.close_wait = sample.close_wait;
            }
            Err(e) => snap.errors.push(format!("sockets: {}", e)),
        }
        timing.sockets = start.elapsed();

        let start = Instant::now();
        match self.processes.collect_top() {
            Ok(processes) => snap.processes = processes,
            Err(e) => snap.errors.push(format!("processes: {}", e)),
        }
        timing.processes = start.elapsed();

        let start = Instant::now();
        snap.cgroups = self.cgroups.collect();
        timing.cgroups = start.elapsed();

        let start = Instant::now();
        snap.fileless = self.fileless.collect();
        snap.deleted_open = self.deleted_open.collect();
        timing.scanners = start.elapsed();

        match self.system.collect_identity() {
            Ok(identity) => snap.identity = identity,
            Err(e) => snap.errors.push(format!("identity: {}", e)),
        }

        snap.sentinel = self.pending_sentinel.take();

        timing.total = total_start.elapsed();
        if !snap.errors.is_empty() {
            tracing::debug!(errors = ?snap.errors, "partial snapshot");
        }
        self.last_timing = Some(timing);

        snap
    }
}
