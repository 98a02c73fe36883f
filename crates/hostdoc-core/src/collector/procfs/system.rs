//! System collector: global metrics from `/proc` and `/sys`.

use std::collections::HashSet;
use std::path::Path;

use crate::collector::procfs::parser::{
    parse_conntrack_stat, parse_diskstats, parse_file_nr, parse_loadavg, parse_meminfo,
    parse_mounts, parse_net_dev, parse_net_snmp, parse_netstat_ext, parse_psi, parse_softirqs,
    parse_stat, parse_vmstat,
};
use crate::collector::procfs::CollectError;
use crate::collector::traits::FileSystem;
use crate::model::system::{
    ConntrackInfo, DiskInfo, FileHandleInfo, IfaceKind, KernelStatInfo, LoadInfo, MemInfo,
    MountInfo, NetIfaceInfo, NetSnmpInfo, PsiInfo, SoftirqInfo, SystemIdentity, VmstatInfo,
};
use crate::model::CpuTimes;

/// Collects system-wide metrics. Each method reads one kernel surface
/// and either returns its typed region or a [`CollectError`]; nothing
/// here ever touches another collector's region.
pub struct SystemCollector<F: FileSystem> {
    fs: F,
    proc_path: String,
    sys_path: String,
}

impl<F: FileSystem> SystemCollector<F> {
    /// Creates a new system collector.
    ///
    /// `proc_path` and `sys_path` are usually `/proc` and `/sys`; tests
    /// point them at mock trees.
    pub fn new(fs: F, proc_path: impl Into<String>, sys_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            sys_path: sys_path.into(),
        }
    }

    fn read(&self, rel: &str) -> Result<String, CollectError> {
        let path = format!("{}/{}", self.proc_path, rel);
        Ok(self.fs.read_to_string(Path::new(&path))?)
    }

    /// Collects PSI for cpu/memory/io from `/proc/pressure/*`.
    ///
    /// Pressure files appear only on kernels 4.20+ with PSI enabled;
    /// missing resources stay zero without failing the others.
    pub fn collect_psi(&self) -> Result<PsiInfo, CollectError> {
        let mut psi = PsiInfo::default();
        let mut any = false;

        for (name, slot) in [
            ("cpu", &mut psi.cpu),
            ("memory", &mut psi.memory),
            ("io", &mut psi.io),
        ] {
            if let Ok(content) = self.read(&format!("pressure/{}", name)) {
                *slot = parse_psi(&content);
                any = true;
            }
        }

        if !any {
            return Err(CollectError::Parse("no pressure files readable".into()));
        }
        Ok(psi)
    }

    /// Collects CPU time lines and the global counters from `/proc/stat`.
    pub fn collect_stat(&self) -> Result<(Vec<CpuTimes>, KernelStatInfo), CollectError> {
        let content = self.read("stat")?;
        let (cpus, stat) = parse_stat(&content);
        if cpus.is_empty() {
            return Err(CollectError::Parse("no cpu lines in stat".into()));
        }
        Ok((cpus, stat))
    }

    /// Collects load averages from `/proc/loadavg`.
    pub fn collect_loadavg(&self) -> Result<LoadInfo, CollectError> {
        let content = self.read("loadavg")?;
        parse_loadavg(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// Collects the memory summary from `/proc/meminfo`, scaled to bytes.
    pub fn collect_meminfo(&self) -> Result<MemInfo, CollectError> {
        let content = self.read("meminfo")?;
        let mem = parse_meminfo(&content);
        if mem.total == 0 {
            return Err(CollectError::Parse("meminfo has no MemTotal".into()));
        }
        Ok(mem)
    }

    /// Collects memory-management event counters from `/proc/vmstat`.
    pub fn collect_vmstat(&self) -> Result<VmstatInfo, CollectError> {
        Ok(parse_vmstat(&self.read("vmstat")?))
    }

    /// Collects whole-disk counters from `/proc/diskstats`.
    pub fn collect_disks(&self) -> Result<Vec<DiskInfo>, CollectError> {
        Ok(parse_diskstats(&self.read("diskstats")?))
    }

    /// Collects real mounts from `/proc/mounts`, calls statvfs on each
    /// and deduplicates by backing device (bind mounts and btrfs
    /// subvolumes repeat the device).
    pub fn collect_mounts(&self) -> Result<Vec<MountInfo>, CollectError> {
        let content = self.read("mounts")?;
        let mut seen_devices: HashSet<String> = HashSet::new();
        let mut mounts = Vec::new();

        for (device, mount_point, fs_type) in parse_mounts(&content) {
            if !seen_devices.insert(device.clone()) {
                continue;
            }
            let Ok(usage) = self.fs.statvfs(Path::new(&mount_point)) else {
                continue;
            };
            if usage.total_bytes == 0 {
                continue;
            }
            mounts.push(MountInfo {
                device,
                mount_point,
                fs_type,
                total_bytes: usage.total_bytes,
                free_bytes: usage.free_bytes,
                avail_bytes: usage.avail_bytes,
                total_inodes: usage.total_inodes,
                free_inodes: usage.free_inodes,
            });
        }

        Ok(mounts)
    }

    /// Collects per-interface counters from `/proc/net/dev`, enriched
    /// with operstate, link speed, master and a classified type from
    /// `/sys/class/net/`.
    pub fn collect_net_ifaces(&self) -> Result<Vec<NetIfaceInfo>, CollectError> {
        let content = self.read("net/dev")?;
        let mut ifaces = Vec::new();

        for dev in parse_net_dev(&content) {
            let sysfs = format!("{}/class/net/{}", self.sys_path, dev.name);

            let operstate = self
                .fs
                .read_to_string(Path::new(&format!("{}/operstate", sysfs)))
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| "unknown".to_string());

            let speed_mbit = self
                .fs
                .read_to_string(Path::new(&format!("{}/speed", sysfs)))
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(-1);

            let master = self
                .fs
                .read_link(Path::new(&format!("{}/master", sysfs)))
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));

            let kind = self.classify_iface(&dev.name, &sysfs);

            ifaces.push(NetIfaceInfo {
                name: dev.name,
                rx_bytes: dev.rx_bytes,
                rx_packets: dev.rx_packets,
                rx_errs: dev.rx_errs,
                rx_drop: dev.rx_drop,
                tx_bytes: dev.tx_bytes,
                tx_packets: dev.tx_packets,
                tx_errs: dev.tx_errs,
                tx_drop: dev.tx_drop,
                operstate,
                speed_mbit,
                master,
                kind,
            });
        }

        Ok(ifaces)
    }

    fn classify_iface(&self, name: &str, sysfs: &str) -> IfaceKind {
        if name.starts_with("veth") {
            return IfaceKind::Veth;
        }
        if name.contains('.') {
            return IfaceKind::Vlan;
        }
        if name.starts_with("wl") {
            return IfaceKind::Wifi;
        }
        for prefix in ["tun", "tap", "wg", "gre", "sit", "vxlan", "ipip"] {
            if name.starts_with(prefix) {
                return IfaceKind::Tunnel;
            }
        }
        if self.fs.exists(Path::new(&format!("{}/bridge", sysfs)))
            || name.starts_with("br-")
            || name.starts_with("docker")
            || name.starts_with("virbr")
        {
            return IfaceKind::Bridge;
        }
        if self.fs.exists(Path::new(&format!("{}/bonding", sysfs))) || name.starts_with("bond") {
            return IfaceKind::Bond;
        }
        if self.fs.exists(Path::new(&format!("{}/device", sysfs))) {
            return IfaceKind::Physical;
        }
        IfaceKind::Virtual
    }

    /// Collects aggregate TCP/UDP counters from `/proc/net/snmp`,
    /// merging the TcpExt extras from `/proc/net/netstat`.
    pub fn collect_net_snmp(&self) -> Result<NetSnmpInfo, CollectError> {
        let mut info = parse_net_snmp(&self.read("net/snmp")?);
        if let Ok(netstat) = self.read("net/netstat") {
            parse_netstat_ext(&netstat, &mut info);
        }
        Ok(info)
    }

    /// Collects per-class softirq totals from `/proc/softirqs`.
    pub fn collect_softirqs(&self) -> Result<SoftirqInfo, CollectError> {
        Ok(parse_softirqs(&self.read("softirqs")?))
    }

    /// Collects system-wide file handle usage from the three-number
    /// `/proc/sys/fs/file-nr`.
    pub fn collect_file_handles(&self) -> Result<FileHandleInfo, CollectError> {
        let content = self.read("sys/fs/file-nr")?;
        parse_file_nr(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// Collects conntrack usage. The sysctl count/max files are
    /// decimal; the `/proc/net/stat/nf_conntrack` fallback is all hex.
    pub fn collect_conntrack(&self) -> Result<ConntrackInfo, CollectError> {
        let count = self
            .read("sys/net/netfilter/nf_conntrack_count")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .or_else(|| {
                self.read("net/stat/nf_conntrack")
                    .ok()
                    .and_then(|s| parse_conntrack_stat(&s))
            });

        let max = self
            .read("sys/net/netfilter/nf_conntrack_max")
            .ok()
            .and_then(|s| s.trim().parse().ok());

        match (count, max) {
            (Some(count), Some(max)) => Ok(ConntrackInfo { count, max }),
            _ => Err(CollectError::Parse("conntrack not available".into())),
        }
    }

    /// Collects the host identity passthrough.
    pub fn collect_identity(&self) -> Result<SystemIdentity, CollectError> {
        let hostname = self
            .read("sys/kernel/hostname")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let kernel = self
            .read("sys/kernel/osrelease")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let uptime_secs = self
            .read("uptime")
            .ok()
            .and_then(|s| {
                s.split_whitespace()
                    .next()
                    .and_then(|v| v.parse::<f64>().ok())
            })
            .unwrap_or(0.0) as u64;

        Ok(SystemIdentity {
            hostname,
            kernel,
            uptime_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::collector::traits::FsUsage;

    fn collector(fs: MockFs) -> SystemCollector<MockFs> {
        SystemCollector::new(fs, "/proc", "/sys")
    }

    #[test]
    fn collect_psi_partial_is_ok() {
        let mut fs = MockFs::new();
        // Only io pressure readable; cpu/memory stay zero
        fs.add_file(
            "/proc/pressure/io",
            "some avg10=28.00 avg60=10.00 avg300=4.00 total=900000\nfull avg10=12.00 avg60=4.00 avg300=1.00 total=300000\n",
        );
        let psi = collector(fs).collect_psi().unwrap();
        assert!((psi.io.some_avg10 - 28.0).abs() < 1e-6);
        assert_eq!(psi.cpu.some_avg10, 0.0);
    }

    #[test]
    fn collect_psi_absent_errors() {
        assert!(collector(MockFs::new()).collect_psi().is_err());
    }

    #[test]
    fn collect_mounts_dedupes_by_device() {
        let mut fs = MockFs::new();
        fs.add_file(
            "/proc/mounts",
            "/dev/sda1 / ext4 rw 0 0\n\
             /dev/sda1 /home ext4 rw 0 0\n\
             /dev/sdb1 /data xfs rw 0 0\n\
             proc /proc proc rw 0 0\n",
        );
        let usage = FsUsage {
            total_bytes: 1000,
            free_bytes: 400,
            avail_bytes: 350,
            total_inodes: 100,
            free_inodes: 90,
        };
        fs.add_statvfs("/", usage);
        fs.add_statvfs("/home", usage);
        fs.add_statvfs("/data", usage);

        let mounts = collector(fs).collect_mounts().unwrap();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].mount_point, "/");
        assert_eq!(mounts[1].mount_point, "/data");
    }

    #[test]
    fn collect_mounts_skips_failed_statvfs() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/mounts", "/dev/sda1 / ext4 rw 0 0\n");
        // No statvfs registered for "/"
        let mounts = collector(fs).collect_mounts().unwrap();
        assert!(mounts.is_empty());
    }

    #[test]
    fn collect_net_ifaces_enriched() {
        let mut fs = MockFs::new();
        fs.add_file(
            "/proc/net/dev",
            "Inter-| Receive |Transmit\n face |bytes\n\
             \u{20}   lo: 1 1 0 0 0 0 0 0 1 1 0 0 0 0 0 0\n\
             \u{20} eth0: 5000 50 1 2 0 0 0 0 3000 30 0 1 0 0 0 0\n\
             \u{20}veth1: 100 1 0 0 0 0 0 0 100 1 0 0 0 0 0 0\n",
        );
        fs.add_file("/sys/class/net/eth0/operstate", "up\n");
        fs.add_file("/sys/class/net/eth0/speed", "10000\n");
        fs.add_dir("/sys/class/net/eth0/device");
        fs.add_link("/sys/class/net/veth1/master", "/sys/devices/virtual/net/docker0");

        let ifaces = collector(fs).collect_net_ifaces().unwrap();
        assert_eq!(ifaces.len(), 2);

        let eth0 = &ifaces[0];
        assert_eq!(eth0.operstate, "up");
        assert_eq!(eth0.speed_mbit, 10000);
        assert_eq!(eth0.kind, IfaceKind::Physical);

        let veth = &ifaces[1];
        assert_eq!(veth.kind, IfaceKind::Veth);
        assert_eq!(veth.master.as_deref(), Some("docker0"));
        assert_eq!(veth.operstate, "unknown");
    }

    #[test]
    fn collect_conntrack_hex_fallback() {
        let mut fs = MockFs::new();
        fs.add_file(
            "/proc/net/stat/nf_conntrack",
            "entries clashres found new invalid ignore delete\n\
             000000ff 00000000 00000000 00000000 00000000 00000000 00000000\n",
        );
        fs.add_file("/proc/sys/net/netfilter/nf_conntrack_max", "262144\n");

        let ct = collector(fs).collect_conntrack().unwrap();
        assert_eq!(ct.count, 255);
        assert_eq!(ct.max, 262144);
    }

    #[test]
    fn collect_identity() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/sys/kernel/hostname", "db-17\n");
        fs.add_file("/proc/sys/kernel/osrelease", "6.8.0-45-generic\n");
        fs.add_file("/proc/uptime", "8123.45 60000.00\n");

        let id = collector(fs).collect_identity().unwrap();
        assert_eq!(id.hostname, "db-17");
        assert_eq!(id.kernel, "6.8.0-45-generic");
        assert_eq!(id.uptime_secs, 8123);
    }
}
