//! Pre-built mock filesystem scenarios.
//!
//! Each constructor returns a complete `/proc` + `/sys` state modeling
//! one host condition, so collector and engine tests can run anywhere.

use super::filesystem::MockFs;
use crate::collector::traits::FsUsage;

fn base_system(fs: &mut MockFs) {
    fs.add_file("/proc/uptime", "86400.00 331000.00\n");
    fs.add_file("/proc/sys/kernel/hostname", "node-07\n");
    fs.add_file("/proc/sys/kernel/osrelease", "6.8.0-45-generic\n");

    fs.add_file(
        "/proc/diskstats",
        "\
   8       0 sda 12345 100 987654 5000 6789 50 456789 3000 0 4000 8000 0 0 0 0
   8       1 sda1 10000 80 800000 4000 5000 40 400000 2500 0 3500 6500 0 0 0 0
 259       0 nvme0n1 50000 200 2000000 10000 30000 150 1500000 8000 0 15000 18000 0 0 0 0
   7       0 loop0 5 0 10 1 0 0 0 0 0 1 1 0 0 0 0
",
    );

    fs.add_file(
        "/proc/mounts",
        "\
sysfs /sys sysfs rw 0 0
proc /proc proc rw 0 0
/dev/nvme0n1p2 / ext4 rw 0 0
tmpfs /run tmpfs rw 0 0
/dev/sda1 /data xfs rw 0 0
",
    );
    fs.add_statvfs(
        "/",
        FsUsage {
            total_bytes: 500_000_000_000,
            free_bytes: 300_000_000_000,
            avail_bytes: 280_000_000_000,
            total_inodes: 30_000_000,
            free_inodes: 28_000_000,
        },
    );
    fs.add_statvfs(
        "/data",
        FsUsage {
            total_bytes: 2_000_000_000_000,
            free_bytes: 1_200_000_000_000,
            avail_bytes: 1_100_000_000_000,
            total_inodes: 100_000_000,
            free_inodes: 99_000_000,
        },
    );

    fs.add_file(
        "/proc/net/dev",
        "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 12345678     9876    0    0    0     0          0         0 12345678     9876    0    0    0     0       0          0
  eth0: 987654321   654321    0    0    0     0          0       100 123456789   456789    0    0    0     0       0          0
",
    );
    fs.add_file("/sys/class/net/eth0/operstate", "up\n");
    fs.add_file("/sys/class/net/eth0/speed", "10000\n");
    fs.add_dir("/sys/class/net/eth0/device");

    fs.add_file(
        "/proc/net/snmp",
        "\
Tcp: RtoAlgorithm RtoMin RtoMax MaxConn ActiveOpens PassiveOpens AttemptFails EstabResets CurrEstab InSegs OutSegs RetransSegs InErrs OutRsts InCsumErrors
Tcp: 1 200 120000 -1 5000 3000 100 50 150 500000 450000 0 0 20 0
Udp: InDatagrams NoPorts InErrors OutDatagrams RcvbufErrors SndbufErrors InCsumErrors IgnoredMulti MemErrors
Udp: 100000 0 0 80000 0 0 0 0 0
",
    );
    fs.add_file(
        "/proc/net/netstat",
        "\
TcpExt: ListenOverflows ListenDrops TCPTimeouts TCPSynRetrans
TcpExt: 0 0 15 5
",
    );

    fs.add_file(
        "/proc/softirqs",
        "\
                    CPU0       CPU1       CPU2       CPU3
          HI:          3          1          0          2
       TIMER:     332519     310498     289392     301234
      NET_TX:       2320         22         10         15
      NET_RX:     270221        225        338        890
       BLOCK:     134512      35023      18904      22087
    IRQ_POLL:          0          0          0          0
     TASKLET:       1003          5         11          9
       SCHED:     482013     455912     430348     441290
     HRTIMER:       1209       1100        987       1034
         RCU:     712031     690123     670456     681234
",
    );

    fs.add_file("/proc/sys/fs/file-nr", "2464\t0\t1048576\n");
    fs.add_file("/proc/sys/net/netfilter/nf_conntrack_count", "1832\n");
    fs.add_file("/proc/sys/net/netfilter/nf_conntrack_max", "262144\n");
    fs.add_file("/proc/sys/net/ipv4/ip_local_port_range", "32768\t60999\n");

    fs.add_file(
        "/proc/net/tcp",
        "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:0050 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 11001 1 0 100 0 0 10 0
   1: 0100007F:9C41 0A000001:01BB 01 00000000:00000000 00:00000000 00000000  1000        0 11002 1 0 100 0 0 10 0
",
    );
    fs.add_file(
        "/proc/net/tcp6",
        "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n",
    );
}

fn default_psi(fs: &mut MockFs) {
    fs.add_file(
        "/proc/pressure/cpu",
        "some avg10=0.20 avg60=0.10 avg300=0.05 total=1234567\n",
    );
    fs.add_file(
        "/proc/pressure/memory",
        "some avg10=0.00 avg60=0.00 avg300=0.00 total=500000\nfull avg10=0.00 avg60=0.00 avg300=0.00 total=100000\n",
    );
    fs.add_file(
        "/proc/pressure/io",
        "some avg10=0.30 avg60=0.20 avg300=0.10 total=5000000\nfull avg10=0.10 avg60=0.05 avg300=0.02 total=1000000\n",
    );
}

fn healthy_meminfo(fs: &mut MockFs) {
    fs.add_file(
        "/proc/meminfo",
        "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12288000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
Active:          4096000 kB
Inactive:        2048000 kB
AnonPages:       3000000 kB
Mapped:           400000 kB
Shmem:            100000 kB
Slab:             512000 kB
SReclaimable:     256000 kB
SUnreclaim:       256000 kB
KernelStack:       16000 kB
PageTables:        40000 kB
Dirty:              1024 kB
Writeback:             0 kB
Mlocked:               0 kB
SwapTotal:       4096000 kB
SwapFree:        4096000 kB
VmallocUsed:       60000 kB
Committed_AS:    9000000 kB
HugePages_Total:       0
Hugepagesize:       2048 kB
",
    );
}

fn healthy_vmstat(fs: &mut MockFs) {
    fs.add_file(
        "/proc/vmstat",
        "\
pgfault 999999
pgmajfault 1234
pswpin 0
pswpout 0
pgsteal_kswapd 5000
pgsteal_direct 0
pgscan_kswapd 10000
pgscan_direct 0
allocstall_normal 0
compact_stall 0
oom_kill 0
thp_fault_alloc 100
",
    );
}

fn stat_line(pid: u32, comm: &str, state: char, utime: u64, stime: u64) -> String {
    format!(
        "{pid} ({comm}) {state} 1 {pid} {pid} 0 -1 4194304 5000 0 10 0 {utime} {stime} 0 0 20 0 1 0 1000 25000000 3000 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0"
    )
}

fn status_block(name: &str, uid: u32, rss_kb: u64) -> String {
    format!(
        "Name:\t{name}\nUid:\t{uid}\t{uid}\t{uid}\t{uid}\nVmRSS:\t {rss_kb} kB\nVmSwap:\t 0 kB\nvoluntary_ctxt_switches:\t500\nnonvoluntary_ctxt_switches:\t50\n"
    )
}

fn io_block(read_bytes: u64, write_bytes: u64) -> String {
    format!(
        "rchar: 10000000\nwchar: 5000000\nsyscr: 5000\nsyscw: 2500\nread_bytes: {read_bytes}\nwrite_bytes: {write_bytes}\ncancelled_write_bytes: 0\n"
    )
}

impl MockFs {
    /// A quiet 4-core host: PSI near zero, CPU 98% idle, memory 75%
    /// available, clean network.
    pub fn typical_system() -> Self {
        let mut fs = Self::new();
        base_system(&mut fs);
        default_psi(&mut fs);
        healthy_meminfo(&mut fs);
        healthy_vmstat(&mut fs);

        fs.add_file("/proc/loadavg", "0.15 0.10 0.05 1/150 1234\n");
        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 800000 1000 200 100 0 0 0
cpu0 2500 125 750 200000 250 50 25 0 0 0
cpu1 2500 125 750 200000 250 50 25 0 0 0
cpu2 2500 125 750 200000 250 50 25 0 0 0
cpu3 2500 125 750 200000 250 50 25 0 0 0
intr 1000000 50 0 0
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
",
        );

        fs.add_process(
            1,
            &stat_line(1, "systemd", 'S', 1000, 500),
            &status_block("systemd", 0, 12000),
            &io_block(10_000_000, 5_000_000),
            "0::/init.scope\n",
            "/usr/lib/systemd/systemd",
        );
        fs.add_process(
            1000,
            &stat_line(1000, "bash", 'S', 100, 50),
            &status_block("bash", 1000, 8000),
            &io_block(100_000, 50_000),
            "0::/user.slice/user-1000.slice\n",
            "/bin/bash",
        );
        fs.add_process(
            1001,
            &stat_line(1001, "nginx", 'S', 5000, 2500),
            &status_block("nginx", 33, 64000),
            &io_block(500_000_000, 250_000_000),
            "0::/system.slice/nginx.service\n",
            "/usr/sbin/nginx",
        );

        fs
    }

    /// Disk saturation: IO PSI some=28/full=12 and a dozen D-state
    /// writers behind one hot device.
    pub fn disk_saturation() -> Self {
        let mut fs = Self::typical_system();
        fs.add_file(
            "/proc/pressure/io",
            "some avg10=28.00 avg60=14.00 avg300=6.00 total=90000000\nfull avg10=12.00 avg60=6.00 avg300=2.00 total=30000000\n",
        );
        fs.add_file("/proc/loadavg", "14.10 9.80 5.20 2/190 5678\n");
        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 700000 90000 200 100 0 0 0
cpu0 2500 125 750 175000 22500 50 25 0 0 0
cpu1 2500 125 750 175000 22500 50 25 0 0 0
cpu2 2500 125 750 175000 22500 50 25 0 0 0
cpu3 2500 125 750 175000 22500 50 25 0 0 0
ctxt 900000
btime 1700000000
processes 12000
procs_running 2
procs_blocked 12
",
        );
        for i in 0..12u32 {
            let pid = 3000 + i;
            fs.add_process(
                pid,
                &stat_line(pid, "pgwriter", 'D', 200, 400),
                &status_block("pgwriter", 26, 200_000),
                &io_block(10_000_000, 800_000_000 + i as u64 * 1_000_000),
                "0::/system.slice/postgresql.service\n",
                "/usr/lib/postgresql/bin/postgres",
            );
        }
        fs
    }

    /// Memory pressure after an OOM kill: 4% available, swap active,
    /// memory PSI some=18/full=6.
    pub fn memory_pressure() -> Self {
        let mut fs = Self::typical_system();
        fs.add_file(
            "/proc/pressure/memory",
            "some avg10=18.00 avg60=9.00 avg300=3.00 total=60000000\nfull avg10=6.00 avg60=3.00 avg300=1.00 total=20000000\n",
        );
        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:          200000 kB
MemAvailable:     655360 kB
Buffers:           20000 kB
Cached:           400000 kB
SwapCached:       100000 kB
Active:         10096000 kB
Inactive:        4048000 kB
AnonPages:      14000000 kB
Mapped:           400000 kB
Shmem:            100000 kB
Slab:             512000 kB
SReclaimable:     156000 kB
SUnreclaim:       356000 kB
KernelStack:       16000 kB
PageTables:       140000 kB
Dirty:             51200 kB
Writeback:         20480 kB
Mlocked:               0 kB
SwapTotal:       4096000 kB
SwapFree:         996000 kB
VmallocUsed:       60000 kB
Committed_AS:   29000000 kB
HugePages_Total:       0
Hugepagesize:       2048 kB
",
        );
        fs.add_file(
            "/proc/vmstat",
            "\
pgfault 29999999
pgmajfault 401234
pswpin 3072000
pswpout 6144000
pgsteal_kswapd 9000000
pgsteal_direct 2500000
pgscan_kswapd 20000000
pgscan_direct 9000000
allocstall_normal 15000
compact_stall 1200
oom_kill 1
thp_fault_alloc 100
",
        );
        fs.add_process(
            4100,
            &stat_line(4100, "javaworker", 'S', 90_000, 10_000),
            &status_block("javaworker", 1001, 11_500_000),
            &io_block(100_000_000, 20_000_000),
            "0::/system.slice/worker.service\n",
            "/usr/bin/java",
        );
        fs
    }

    /// Connection leak: 612 CLOSE_WAIT sockets, 480 of them held by
    /// one PID, nothing else wrong.
    pub fn connection_leak() -> Self {
        let mut fs = Self::typical_system();

        let header = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n";
        let mut tcp = String::from(header);
        // 612 CLOSE_WAIT sockets with distinct local ports and inodes
        for i in 0..612u32 {
            let port = 33000 + i;
            let inode = 50_000 + i as u64;
            tcp.push_str(&format!(
                "   {i}: 0B01A8C0:{port:04X} 1501A8C0:1F90 08 00000000:00000000 00:00000000 00000000  1000        0 {inode} 1 0 100 0 0 10 0\n",
            ));
        }
        fs.add_file("/proc/net/tcp", tcp);

        // PID 4242 owns the first 480 of them
        fs.add_process(
            4242,
            &stat_line(4242, "relayd", 'S', 4000, 1000),
            &status_block("relayd", 998, 90_000),
            &io_block(1_000_000, 1_000_000),
            "0::/system.slice/relayd.service\n",
            "/usr/local/bin/relayd",
        );
        fs.add_file("/proc/4242/comm", "relayd\n");
        for i in 0..480u32 {
            fs.add_fd(4242, 10 + i, &format!("socket:[{}]", 50_000 + i as u64));
        }
        fs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::procfs::{SocketCollector, SystemCollector};

    #[test]
    fn typical_system_is_quiet() {
        let fs = MockFs::typical_system();
        let sys = SystemCollector::new(fs, "/proc", "/sys");

        let psi = sys.collect_psi().unwrap();
        assert!(psi.io.some_avg10 < 1.0);

        let mem = sys.collect_meminfo().unwrap();
        assert!(mem.used_pct() < 30.0);

        let snmp = sys.collect_net_snmp().unwrap();
        assert_eq!(snmp.tcp_retrans_segs, 0);
    }

    #[test]
    fn disk_saturation_has_dstate_and_psi() {
        let fs = MockFs::disk_saturation();
        let sys = SystemCollector::new(fs, "/proc", "/sys");

        let psi = sys.collect_psi().unwrap();
        assert!((psi.io.some_avg10 - 28.0).abs() < 1e-6);

        let (_, stat) = sys.collect_stat().unwrap();
        assert_eq!(stat.procs_blocked, 12);
    }

    #[test]
    fn connection_leak_counts_and_attribution() {
        let fs = MockFs::connection_leak();
        let mut sockets = SocketCollector::new(fs, "/proc");

        let sample = sockets.collect(5000).unwrap();
        assert_eq!(sample.tcp_states.close_wait, 612);

        let top = &sample.close_wait.leakers[0];
        assert_eq!(top.pid, 4242);
        assert_eq!(top.process, "relayd");
        assert_eq!(top.count, 480);
    }
}
