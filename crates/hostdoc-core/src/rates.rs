//! Rate computation: differences two consecutive snapshots into a
//! bounded per-second view.
//!
//! Every counter delta is saturating, so a regressed reading (counter
//! reset, 32-bit wrap observed as smaller, PID reuse) yields a zero
//! delta and never a negative rate. Δt below half a second is treated
//! as one second to keep rates bounded when ticks bunch up.

use serde::Serialize;

use crate::collector::procfs::parser::sat_sub;
use crate::model::{CpuTimes, Snapshot};

/// Clock ticks per second (USER_HZ).
const CLK_TCK: f64 = 100.0;

/// Page size for swap page→byte conversion.
const PAGE_SIZE: f64 = 4096.0;

/// Δt readings below this are treated as one second.
pub const MIN_DT_SECS: f64 = 0.5;

/// Aggregate CPU percentages and the context-switch rate.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CpuRates {
    pub user_pct: f64,
    pub nice_pct: f64,
    pub system_pct: f64,
    pub idle_pct: f64,
    pub iowait_pct: f64,
    pub irq_pct: f64,
    pub softirq_pct: f64,
    pub steal_pct: f64,
    pub guest_pct: f64,
    pub guest_nice_pct: f64,
    /// 100 − idle% − iowait%, clamped to [0, 100].
    pub busy_pct: f64,
    pub ctx_switch_s: f64,
}

/// Per-device disk rates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiskRates {
    pub name: String,
    pub read_mb_s: f64,
    pub write_mb_s: f64,
    pub read_iops: f64,
    pub write_iops: f64,
    /// Weighted queue milliseconds per completed I/O.
    pub avg_await_ms: f64,
    pub util_pct: f64,
    /// Gauge carried over from the current snapshot.
    pub queue_depth: u64,
}

/// Per-interface network rates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetIfaceRates {
    pub name: String,
    pub rx_bytes_s: f64,
    pub tx_bytes_s: f64,
    pub rx_packets_s: f64,
    pub tx_packets_s: f64,
    pub rx_drops_s: f64,
    pub tx_drops_s: f64,
    pub rx_errs_s: f64,
    pub tx_errs_s: f64,
}

/// Aggregate TCP/UDP protocol rates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TcpUdpRates {
    pub in_segs_s: f64,
    pub out_segs_s: f64,
    pub retrans_s: f64,
    /// Retransmitted share of outgoing segments, percent.
    pub retrans_pct: f64,
    pub resets_s: f64,
    pub udp_in_s: f64,
    pub udp_out_s: f64,
    pub udp_err_s: f64,
}

/// Memory-management event rates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryRates {
    pub fault_s: f64,
    pub majfault_s: f64,
    pub direct_reclaim_pages_s: f64,
    pub kswapd_reclaim_pages_s: f64,
    pub swap_in_mb_s: f64,
    pub swap_out_mb_s: f64,
    pub allocstall_s: f64,
    /// OOM kills between the two snapshots. A delta, not a rate.
    pub oom_kill_delta: u64,
}

/// Softirq class rates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SoftirqRates {
    pub net_rx_s: f64,
    pub net_tx_s: f64,
    pub block_s: f64,
}

/// Per-cgroup rates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CgroupRates {
    pub path: String,
    /// CPU use against wall × n_cpus, percent.
    pub cpu_pct: f64,
    /// CPU use against the group's own quota, when one is set. Never
    /// feeds scoring; display overlay only.
    pub cpu_pct_of_quota: Option<f64>,
    /// Throttled share, percent, clamped to [0, 100].
    pub throttle_pct: f64,
    pub read_mb_s: f64,
    pub write_mb_s: f64,
    pub oom_kill_delta: u64,
}

/// Per-process rates. Entries exist only for PIDs present in both
/// snapshots with the same start time (PID reuse yields no entry).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessRates {
    pub pid: u32,
    pub comm: String,
    pub kernel_thread: bool,
    /// CPU use against wall × n_cpus, percent.
    pub cpu_pct: f64,
    pub read_mb_s: f64,
    pub write_mb_s: f64,
    pub minflt_s: f64,
    pub majflt_s: f64,
    /// Voluntary + involuntary switches per second.
    pub ctx_switch_s: f64,
    /// Voluntary switches per second alone, the off-CPU wait signal.
    pub vcsw_s: f64,
}

/// Per-mount capacity view plus trend extrapolation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MountRates {
    pub mount_point: String,
    pub used_pct: f64,
    pub free_pct: f64,
    pub inode_used_pct: f64,
    /// Seconds until 100% used at the current growth slope; absent
    /// when the trend is flat or shrinking. Filled by the exhaustion
    /// predictor, which owns the multi-sample window.
    pub eta_seconds: Option<f64>,
}

/// Everything derived from one pair of consecutive snapshots.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Rates {
    pub dt_secs: f64,
    pub cpu: CpuRates,
    pub disks: Vec<DiskRates>,
    pub net: Vec<NetIfaceRates>,
    pub tcp: TcpUdpRates,
    pub memory: MemoryRates,
    pub softirq: SoftirqRates,
    pub cgroups: Vec<CgroupRates>,
    pub processes: Vec<ProcessRates>,
    pub mounts: Vec<MountRates>,
}

/// Differences `prev` and `curr` into per-second rates.
pub fn compute_rates(prev: &Snapshot, curr: &Snapshot) -> Rates {
    let raw_dt = (curr.timestamp - prev.timestamp) as f64;
    let dt = if raw_dt < MIN_DT_SECS { 1.0 } else { raw_dt };
    let n_cpus = curr.nr_cpus() as f64;

    Rates {
        dt_secs: dt,
        cpu: cpu_rates(prev, curr, dt),
        disks: disk_rates(prev, curr, dt),
        net: net_rates(prev, curr, dt),
        tcp: tcp_rates(prev, curr, dt),
        memory: memory_rates(prev, curr, dt),
        softirq: softirq_rates(prev, curr, dt),
        cgroups: cgroup_rates(prev, curr, dt, n_cpus),
        processes: process_rates(prev, curr, dt, n_cpus),
        mounts: mount_rates(curr),
    }
}

fn pct(delta: u64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    (100.0 * delta as f64 / total).clamp(0.0, 100.0)
}

fn cpu_rates(prev: &Snapshot, curr: &Snapshot, dt: f64) -> CpuRates {
    let mut rates = CpuRates::default();

    if let (Some(p), Some(c)) = (prev.cpu_total(), curr.cpu_total()) {
        let deltas = CpuTimes {
            cpu_id: -1,
            user: sat_sub(c.user, p.user),
            nice: sat_sub(c.nice, p.nice),
            system: sat_sub(c.system, p.system),
            idle: sat_sub(c.idle, p.idle),
            iowait: sat_sub(c.iowait, p.iowait),
            irq: sat_sub(c.irq, p.irq),
            softirq: sat_sub(c.softirq, p.softirq),
            steal: sat_sub(c.steal, p.steal),
            guest: sat_sub(c.guest, p.guest),
            guest_nice: sat_sub(c.guest_nice, p.guest_nice),
        };
        let total = deltas.total() as f64;

        rates.user_pct = pct(deltas.user, total);
        rates.nice_pct = pct(deltas.nice, total);
        rates.system_pct = pct(deltas.system, total);
        rates.idle_pct = pct(deltas.idle, total);
        rates.iowait_pct = pct(deltas.iowait, total);
        rates.irq_pct = pct(deltas.irq, total);
        rates.softirq_pct = pct(deltas.softirq, total);
        rates.steal_pct = pct(deltas.steal, total);
        rates.guest_pct = pct(deltas.guest, total);
        rates.guest_nice_pct = pct(deltas.guest_nice, total);
        rates.busy_pct = (100.0 - rates.idle_pct - rates.iowait_pct).clamp(0.0, 100.0);
    }

    rates.ctx_switch_s = sat_sub(curr.stat.ctxt, prev.stat.ctxt) as f64 / dt;
    rates
}

fn disk_rates(prev: &Snapshot, curr: &Snapshot, dt: f64) -> Vec<DiskRates> {
    curr.disks
        .iter()
        .map(|c| {
            let Some(p) = prev.disks.iter().find(|p| p.name == c.name) else {
                return DiskRates {
                    name: c.name.clone(),
                    queue_depth: c.in_flight,
                    ..Default::default()
                };
            };

            let d_reads = sat_sub(c.reads, p.reads);
            let d_writes = sat_sub(c.writes, p.writes);
            let completions = d_reads + d_writes;
            let d_weighted = sat_sub(c.weighted_io_ms, p.weighted_io_ms);
            let d_ticks = sat_sub(c.io_ticks_ms, p.io_ticks_ms);

            DiskRates {
                name: c.name.clone(),
                read_mb_s: sat_sub(c.read_sectors, p.read_sectors) as f64 * 512.0 / dt / 1e6,
                write_mb_s: sat_sub(c.write_sectors, p.write_sectors) as f64 * 512.0 / dt / 1e6,
                read_iops: d_reads as f64 / dt,
                write_iops: d_writes as f64 / dt,
                avg_await_ms: d_weighted as f64 / completions.max(1) as f64,
                util_pct: (100.0 * d_ticks as f64 / (dt * 1000.0)).clamp(0.0, 100.0),
                queue_depth: c.in_flight,
            }
        })
        .collect()
}

fn net_rates(prev: &Snapshot, curr: &Snapshot, dt: f64) -> Vec<NetIfaceRates> {
    curr.net_ifaces
        .iter()
        .map(|c| {
            let Some(p) = prev.net_ifaces.iter().find(|p| p.name == c.name) else {
                return NetIfaceRates {
                    name: c.name.clone(),
                    ..Default::default()
                };
            };
            NetIfaceRates {
                name: c.name.clone(),
                rx_bytes_s: sat_sub(c.rx_bytes, p.rx_bytes) as f64 / dt,
                tx_bytes_s: sat_sub(c.tx_bytes, p.tx_bytes) as f64 / dt,
                rx_packets_s: sat_sub(c.rx_packets, p.rx_packets) as f64 / dt,
                tx_packets_s: sat_sub(c.tx_packets, p.tx_packets) as f64 / dt,
                rx_drops_s: sat_sub(c.rx_drop, p.rx_drop) as f64 / dt,
                tx_drops_s: sat_sub(c.tx_drop, p.tx_drop) as f64 / dt,
                rx_errs_s: sat_sub(c.rx_errs, p.rx_errs) as f64 / dt,
                tx_errs_s: sat_sub(c.tx_errs, p.tx_errs) as f64 / dt,
            }
        })
        .collect()
}

fn tcp_rates(prev: &Snapshot, curr: &Snapshot, dt: f64) -> TcpUdpRates {
    let p = &prev.net_snmp;
    let c = &curr.net_snmp;

    let d_out = sat_sub(c.tcp_out_segs, p.tcp_out_segs);
    let d_retrans = sat_sub(c.tcp_retrans_segs, p.tcp_retrans_segs);

    TcpUdpRates {
        in_segs_s: sat_sub(c.tcp_in_segs, p.tcp_in_segs) as f64 / dt,
        out_segs_s: d_out as f64 / dt,
        retrans_s: d_retrans as f64 / dt,
        retrans_pct: if d_out > 0 {
            (100.0 * d_retrans as f64 / d_out as f64).clamp(0.0, 100.0)
        } else {
            0.0
        },
        resets_s: sat_sub(c.tcp_out_rsts, p.tcp_out_rsts) as f64 / dt,
        udp_in_s: sat_sub(c.udp_in_datagrams, p.udp_in_datagrams) as f64 / dt,
        udp_out_s: sat_sub(c.udp_out_datagrams, p.udp_out_datagrams) as f64 / dt,
        udp_err_s: (sat_sub(c.udp_in_errors, p.udp_in_errors)
            + sat_sub(c.udp_rcvbuf_errors, p.udp_rcvbuf_errors)) as f64
            / dt,
    }
}

fn memory_rates(prev: &Snapshot, curr: &Snapshot, dt: f64) -> MemoryRates {
    let p = &prev.vmstat;
    let c = &curr.vmstat;

    MemoryRates {
        fault_s: sat_sub(c.pgfault, p.pgfault) as f64 / dt,
        majfault_s: sat_sub(c.pgmajfault, p.pgmajfault) as f64 / dt,
        direct_reclaim_pages_s: sat_sub(c.pgsteal_direct, p.pgsteal_direct) as f64 / dt,
        kswapd_reclaim_pages_s: sat_sub(c.pgsteal_kswapd, p.pgsteal_kswapd) as f64 / dt,
        swap_in_mb_s: sat_sub(c.pswpin, p.pswpin) as f64 * PAGE_SIZE / dt / 1e6,
        swap_out_mb_s: sat_sub(c.pswpout, p.pswpout) as f64 * PAGE_SIZE / dt / 1e6,
        allocstall_s: sat_sub(c.allocstall, p.allocstall) as f64 / dt,
        oom_kill_delta: sat_sub(c.oom_kill, p.oom_kill),
    }
}

fn softirq_rates(prev: &Snapshot, curr: &Snapshot, dt: f64) -> SoftirqRates {
    SoftirqRates {
        net_rx_s: sat_sub(curr.softirqs.net_rx, prev.softirqs.net_rx) as f64 / dt,
        net_tx_s: sat_sub(curr.softirqs.net_tx, prev.softirqs.net_tx) as f64 / dt,
        block_s: sat_sub(curr.softirqs.block, prev.softirqs.block) as f64 / dt,
    }
}

fn cgroup_rates(prev: &Snapshot, curr: &Snapshot, dt: f64, n_cpus: f64) -> Vec<CgroupRates> {
    curr.cgroups
        .iter()
        .filter_map(|c| {
            let p = prev.cgroups.iter().find(|p| p.path == c.path)?;

            let d_usage = sat_sub(c.cpu_usage_usec, p.cpu_usage_usec);
            let wall_usec = dt * 1e6;
            let cpu_pct = (100.0 * d_usage as f64 / (wall_usec * n_cpus)).clamp(0.0, 100.0);

            let cpu_pct_of_quota = if c.cpu_quota_usec > 0 && c.cpu_period_usec > 0 {
                let cores = c.cpu_quota_usec as f64 / c.cpu_period_usec as f64;
                Some((100.0 * d_usage as f64 / (wall_usec * cores)).clamp(0.0, 100.0))
            } else {
                None
            };

            let d_throttled = sat_sub(c.throttled_usec, p.throttled_usec);
            let throttle_pct = if d_usage > 0 {
                (100.0 * d_throttled as f64 / d_usage as f64).clamp(0.0, 100.0)
            } else {
                let d_periods = sat_sub(c.nr_periods, p.nr_periods);
                let d_throttled_periods = sat_sub(c.nr_throttled, p.nr_throttled);
                if d_periods > 0 {
                    (100.0 * d_throttled_periods as f64 / d_periods as f64).clamp(0.0, 100.0)
                } else {
                    0.0
                }
            };

            Some(CgroupRates {
                path: c.path.clone(),
                cpu_pct,
                cpu_pct_of_quota,
                throttle_pct,
                read_mb_s: sat_sub(c.io_read_bytes(), p.io_read_bytes()) as f64 / dt / 1e6,
                write_mb_s: sat_sub(c.io_write_bytes(), p.io_write_bytes()) as f64 / dt / 1e6,
                oom_kill_delta: sat_sub(c.oom_kills, p.oom_kills),
            })
        })
        .collect()
}

fn process_rates(prev: &Snapshot, curr: &Snapshot, dt: f64, n_cpus: f64) -> Vec<ProcessRates> {
    curr.processes
        .iter()
        .filter_map(|c| {
            let p = prev
                .processes
                .iter()
                .find(|p| p.pid == c.pid && p.starttime == c.starttime)?;

            let d_ticks = sat_sub(c.cpu_ticks(), p.cpu_ticks());
            let cpu_pct = (100.0 * d_ticks as f64 / (CLK_TCK * dt * n_cpus)).clamp(0.0, 100.0);

            Some(ProcessRates {
                pid: c.pid,
                comm: c.comm.clone(),
                kernel_thread: c.kernel_thread,
                cpu_pct,
                read_mb_s: sat_sub(c.read_bytes, p.read_bytes) as f64 / dt / 1e6,
                write_mb_s: sat_sub(c.write_bytes, p.write_bytes) as f64 / dt / 1e6,
                minflt_s: sat_sub(c.minflt, p.minflt) as f64 / dt,
                majflt_s: sat_sub(c.majflt, p.majflt) as f64 / dt,
                ctx_switch_s: (sat_sub(c.nvcsw, p.nvcsw) + sat_sub(c.nivcsw, p.nivcsw)) as f64
                    / dt,
                vcsw_s: sat_sub(c.nvcsw, p.nvcsw) as f64 / dt,
            })
        })
        .collect()
}

fn mount_rates(curr: &Snapshot) -> Vec<MountRates> {
    curr.mounts
        .iter()
        .map(|m| MountRates {
            mount_point: m.mount_point.clone(),
            used_pct: m.used_pct(),
            free_pct: (100.0 - m.used_pct()).clamp(0.0, 100.0),
            inode_used_pct: m.inode_used_pct(),
            eta_seconds: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CgroupInfo, DiskInfo, MountInfo, ProcessInfo};

    fn snap_with_cpu(ts: i64, times: CpuTimes) -> Snapshot {
        let mut per_core = times;
        Snapshot {
            timestamp: ts,
            cpus: vec![
                times,
                {
                    per_core.cpu_id = 0;
                    per_core
                },
            ],
            ..Default::default()
        }
    }

    fn cpu(user: u64, system: u64, idle: u64, iowait: u64) -> CpuTimes {
        CpuTimes {
            cpu_id: -1,
            user,
            system,
            idle,
            iowait,
            ..Default::default()
        }
    }

    #[test]
    fn cpu_percentages_sum_to_hundred() {
        let prev = snap_with_cpu(100, cpu(1000, 500, 8000, 200));
        let curr = snap_with_cpu(101, cpu(1060, 520, 8010, 210));

        let rates = compute_rates(&prev, &curr);
        let sum = rates.cpu.user_pct
            + rates.cpu.nice_pct
            + rates.cpu.system_pct
            + rates.cpu.idle_pct
            + rates.cpu.iowait_pct
            + rates.cpu.irq_pct
            + rates.cpu.softirq_pct;
        assert!((sum - 100.0).abs() <= 1.0, "cpu pct sum {}", sum);

        let expected_busy = 100.0 - rates.cpu.idle_pct - rates.cpu.iowait_pct;
        assert!((rates.cpu.busy_pct - expected_busy).abs() < 1e-9);
    }

    #[test]
    fn cpu_counter_regression_clamps_to_zero() {
        // idle went backwards (counter reset); rates stay non-negative
        let prev = snap_with_cpu(100, cpu(1000, 500, 8000, 200));
        let curr = snap_with_cpu(101, cpu(1100, 550, 700, 210));

        let rates = compute_rates(&prev, &curr);
        assert!(rates.cpu.idle_pct >= 0.0);
        assert!(rates.cpu.user_pct >= 0.0);
        assert!(rates.cpu.busy_pct >= 0.0);
    }

    #[test]
    fn dt_floor_applies() {
        let mut prev = snap_with_cpu(100, cpu(0, 0, 0, 0));
        let mut curr = snap_with_cpu(100, cpu(0, 0, 0, 0));
        prev.stat.ctxt = 1000;
        curr.stat.ctxt = 6000;

        // Same timestamp: Δt would be 0, floored to 1 s
        let rates = compute_rates(&prev, &curr);
        assert!((rates.dt_secs - 1.0).abs() < 1e-9);
        assert!((rates.cpu.ctx_switch_s - 5000.0).abs() < 1e-9);
    }

    #[test]
    fn disk_rates_await_and_util() {
        let mk = |reads, writes, rsec, wsec, ticks, weighted| DiskInfo {
            name: "nvme0n1".into(),
            reads,
            writes,
            read_sectors: rsec,
            write_sectors: wsec,
            io_ticks_ms: ticks,
            weighted_io_ms: weighted,
            in_flight: 7,
            ..Default::default()
        };
        let mut prev = Snapshot {
            timestamp: 100,
            ..Default::default()
        };
        prev.disks = vec![mk(1000, 2000, 100_000, 200_000, 10_000, 50_000)];
        let mut curr = Snapshot {
            timestamp: 101,
            ..Default::default()
        };
        // +100 completions, +960 ms busy, +14000 weighted ms
        curr.disks = vec![mk(1050, 2050, 102_000, 204_000, 10_960, 64_000)];

        let rates = compute_rates(&prev, &curr);
        let d = &rates.disks[0];
        assert!((d.read_mb_s - 2000.0 * 512.0 / 1e6).abs() < 1e-9);
        assert!((d.read_iops - 50.0).abs() < 1e-9);
        assert!((d.avg_await_ms - 140.0).abs() < 1e-9);
        assert!((d.util_pct - 96.0).abs() < 1e-9);
        assert_eq!(d.queue_depth, 7);
    }

    #[test]
    fn tcp_retrans_pct() {
        let mut prev = Snapshot {
            timestamp: 100,
            ..Default::default()
        };
        prev.net_snmp.tcp_out_segs = 10_000;
        prev.net_snmp.tcp_retrans_segs = 100;
        let mut curr = Snapshot {
            timestamp: 101,
            ..Default::default()
        };
        curr.net_snmp.tcp_out_segs = 11_000;
        curr.net_snmp.tcp_retrans_segs = 180;

        let rates = compute_rates(&prev, &curr);
        assert!((rates.tcp.retrans_s - 80.0).abs() < 1e-9);
        assert!((rates.tcp.retrans_pct - 8.0).abs() < 1e-9);
    }

    #[test]
    fn swap_rates_in_mb() {
        let mut prev = Snapshot {
            timestamp: 100,
            ..Default::default()
        };
        prev.vmstat.pswpin = 1000;
        let mut curr = Snapshot {
            timestamp: 101,
            ..Default::default()
        };
        // +3000 pages ≈ 12.3 MB at 4 KiB pages
        curr.vmstat.pswpin = 4000;
        curr.vmstat.oom_kill = 1;

        let rates = compute_rates(&prev, &curr);
        assert!((rates.memory.swap_in_mb_s - 3000.0 * 4096.0 / 1e6).abs() < 1e-9);
        assert_eq!(rates.memory.oom_kill_delta, 1);
    }

    #[test]
    fn cgroup_cpu_and_throttle() {
        let mk = |usage, throttled, periods, nr_thr| CgroupInfo {
            path: "system.slice/app.service".into(),
            cpu_usage_usec: usage,
            throttled_usec: throttled,
            nr_periods: periods,
            nr_throttled: nr_thr,
            cpu_quota_usec: 200_000,
            cpu_period_usec: 100_000,
            ..Default::default()
        };
        let mut prev = snap_with_cpu(100, cpu(0, 0, 0, 0));
        prev.cgroups = vec![mk(10_000_000, 1_000_000, 100, 10)];
        let mut curr = snap_with_cpu(101, cpu(0, 0, 0, 0));
        curr.cgroups = vec![mk(10_500_000, 1_360_000, 110, 20)];

        let rates = compute_rates(&prev, &curr);
        let cg = &rates.cgroups[0];
        // 0.5 s CPU over 1 s wall on 1 core
        assert!((cg.cpu_pct - 50.0).abs() < 1e-9);
        // Quota is 2 cores: half the wall×quota figure
        assert!((cg.cpu_pct_of_quota.unwrap() - 25.0).abs() < 1e-9);
        // 360 ms throttled per 500 ms used
        assert!((cg.throttle_pct - 72.0).abs() < 1e-9);
    }

    #[test]
    fn process_pid_reuse_yields_no_entry() {
        let mk = |pid, starttime, utime| ProcessInfo {
            pid,
            starttime,
            utime,
            comm: "worker".into(),
            ..Default::default()
        };
        let mut prev = snap_with_cpu(100, cpu(0, 0, 0, 0));
        prev.processes = vec![mk(500, 1000, 400), mk(501, 1000, 400)];
        let mut curr = snap_with_cpu(101, cpu(0, 0, 0, 0));
        // 500 lives on; 501 died and its PID was reused (new starttime)
        curr.processes = vec![mk(500, 1000, 450), mk(501, 9000, 10)];

        let rates = compute_rates(&prev, &curr);
        assert_eq!(rates.processes.len(), 1);
        assert_eq!(rates.processes[0].pid, 500);
        // 50 ticks over 1 s on 1 core
        assert!((rates.processes[0].cpu_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn mount_rates_percentages() {
        let mut curr = Snapshot {
            timestamp: 101,
            ..Default::default()
        };
        curr.mounts = vec![MountInfo {
            mount_point: "/".into(),
            total_bytes: 1000,
            free_bytes: 100,
            avail_bytes: 80,
            total_inodes: 1000,
            free_inodes: 500,
            ..Default::default()
        }];
        let prev = Snapshot {
            timestamp: 100,
            ..Default::default()
        };

        let rates = compute_rates(&prev, &curr);
        let m = &rates.mounts[0];
        assert!((m.used_pct - 90.0).abs() < 1e-9);
        assert!((m.inode_used_pct - 50.0).abs() < 1e-9);
        assert_eq!(m.eta_seconds, None);
    }
}
