//! CPU domain analyzer.

use super::{AnalyzerContext, Direction, Domain, Evidence};
use crate::util::clean_cgroup_name;

pub fn evaluate(ctx: &AnalyzerContext) -> Vec<Evidence> {
    let mut evidence = Vec::with_capacity(6);
    let snap = ctx.snapshot;
    let n_cpus = snap.nr_cpus() as f64;

    let psi = snap.psi.cpu.some_avg10 as f64;
    evidence.push(Evidence::new(
        "cpu.psi",
        Domain::Cpu,
        psi,
        5.0,
        20.0,
        Direction::HigherIsWorse,
        0.9,
        format!("CPU PSI some={:.0}%", psi),
        "avg10",
    ).tag("psi"));

    let runq = snap.load.nr_running as f64 / n_cpus;
    evidence.push(Evidence::new(
        "cpu.runqueue",
        Domain::Cpu,
        runq,
        1.0,
        2.0,
        Direction::HigherIsWorse,
        0.7,
        format!("run queue {:.1} per core", runq),
        "instant",
    ));

    let ctx_per_core = ctx.rates.cpu.ctx_switch_s / n_cpus;
    evidence.push(Evidence::new(
        "cpu.ctxswitch",
        Domain::Cpu,
        ctx_per_core,
        2000.0,
        10000.0,
        Direction::HigherIsWorse,
        0.6,
        format!("{:.0} context switches/s per core", ctx_per_core),
        "per-second",
    ));

    let steal = ctx.rates.cpu.steal_pct;
    evidence.push(Evidence::new(
        "cpu.steal",
        Domain::Cpu,
        steal,
        5.0,
        15.0,
        Direction::HigherIsWorse,
        0.9,
        format!("steal {:.1}%", steal),
        "per-second",
    ));

    let worst_throttle = ctx.rates.cgroups.iter().max_by(|a, b| {
        a.throttle_pct
            .partial_cmp(&b.throttle_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let (throttle, group) = worst_throttle
        .map(|c| (c.throttle_pct, clean_cgroup_name(&c.path)))
        .unwrap_or((0.0, "-".to_string()));
    evidence.push(Evidence::new(
        "cpu.cgroup.throttle",
        Domain::Cpu,
        throttle,
        5.0,
        25.0,
        Direction::HigherIsWorse,
        0.8,
        format!("{} throttled {:.0}%", group, throttle),
        "per-second",
    ));

    if let Some(sentinel) = &snap.sentinel {
        let events = sentinel.cgroup_throttle_events as f64;
        evidence.push(Evidence::new(
            "cpu.sentinel.throttle",
            Domain::Cpu,
            events,
            1.0,
            10.0,
            Direction::HigherIsWorse,
            0.9,
            format!("{} throttle events", events as u64),
            "delta",
        ).tag("sentinel"));
    }

    evidence
}
