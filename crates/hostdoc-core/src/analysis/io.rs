//! IO domain analyzer.

use super::{AnalyzerContext, Direction, Domain, Evidence};

pub fn evaluate(ctx: &AnalyzerContext) -> Vec<Evidence> {
    let mut evidence = Vec::with_capacity(6);
    let snap = ctx.snapshot;

    let psi = snap.psi.io.some_avg10 as f64;
    evidence.push(Evidence::new(
        "io.psi",
        Domain::Io,
        psi,
        5.0,
        20.0,
        Direction::HigherIsWorse,
        0.9,
        format!("IO PSI some={:.0}%", psi),
        "avg10",
    ).tag("psi"));

    let dstate = snap.dstate_count() as f64;
    evidence.push(Evidence::new(
        "io.dstate",
        Domain::Io,
        dstate,
        1.0,
        10.0,
        Direction::HigherIsWorse,
        0.7,
        format!("{} D-state tasks", dstate as u64),
        "instant",
    ));

    let worst_latency = ctx
        .rates
        .disks
        .iter()
        .max_by(|a, b| {
            a.avg_await_ms
                .partial_cmp(&b.avg_await_ms)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    let (await_ms, await_dev) = worst_latency
        .map(|d| (d.avg_await_ms, d.name.as_str()))
        .unwrap_or((0.0, "-"));
    evidence.push(Evidence::new(
        "io.disk.latency",
        Domain::Io,
        await_ms,
        20.0,
        80.0,
        Direction::HigherIsWorse,
        0.7,
        format!("{} await {:.0} ms", await_dev, await_ms),
        "per-second",
    ));

    let worst_util = ctx.rates.disks.iter().max_by(|a, b| {
        a.util_pct
            .partial_cmp(&b.util_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let (util, util_dev) = worst_util
        .map(|d| (d.util_pct, d.name.as_str()))
        .unwrap_or((0.0, "-"));
    evidence.push(Evidence::new(
        "io.disk.util",
        Domain::Io,
        util,
        70.0,
        95.0,
        Direction::HigherIsWorse,
        0.7,
        format!("{} util {:.0}%", util_dev, util),
        "per-second",
    ));

    let dirty_pct = if snap.memory.total > 0 {
        100.0 * snap.memory.dirty as f64 / snap.memory.total as f64
    } else {
        0.0
    };
    evidence.push(Evidence::new(
        "io.writeback",
        Domain::Io,
        dirty_pct,
        5.0,
        20.0,
        Direction::HigherIsWorse,
        0.6,
        format!("dirty pages {:.1}% of RAM", dirty_pct),
        "instant",
    ));

    let worst_mount = snap.mounts.iter().max_by(|a, b| {
        a.used_pct()
            .partial_cmp(&b.used_pct())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let (fs_used, fs_mount) = worst_mount
        .map(|m| (m.used_pct(), m.mount_point.as_str()))
        .unwrap_or((0.0, "-"));
    evidence.push(Evidence::new(
        "io.fsfull",
        Domain::Io,
        fs_used,
        85.0,
        95.0,
        Direction::HigherIsWorse,
        0.9,
        format!("{} {:.0}% full", fs_mount, fs_used),
        "instant",
    ).tag("capacity"));

    evidence
}
