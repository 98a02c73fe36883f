//! Memory domain analyzer.

use super::{AnalyzerContext, Direction, Domain, Evidence};

pub fn evaluate(ctx: &AnalyzerContext) -> Vec<Evidence> {
    let mut evidence = Vec::with_capacity(8);
    let snap = ctx.snapshot;

    let psi = snap.psi.memory.some_avg10 as f64;
    evidence.push(Evidence::new(
        "mem.psi",
        Domain::Memory,
        psi,
        5.0,
        20.0,
        Direction::HigherIsWorse,
        0.9,
        format!("memory PSI some={:.0}%", psi),
        "avg10",
    ).tag("psi"));

    let used_pct = snap.memory.used_pct();
    evidence.push(Evidence::new(
        "mem.available.low",
        Domain::Memory,
        used_pct,
        85.0,
        95.0,
        Direction::HigherIsWorse,
        0.9,
        format!("memory {:.0}% used", used_pct),
        "instant",
    ));

    let direct = ctx.rates.memory.direct_reclaim_pages_s;
    evidence.push(Evidence::new(
        "mem.reclaim.direct",
        Domain::Memory,
        direct,
        10.0,
        500.0,
        Direction::HigherIsWorse,
        0.7,
        format!("direct reclaim {:.0} pages/s", direct),
        "per-second",
    ));

    let swap_mb = ctx.rates.memory.swap_in_mb_s + ctx.rates.memory.swap_out_mb_s;
    evidence.push(Evidence::new(
        "mem.swap.activity",
        Domain::Memory,
        swap_mb,
        2.0,
        50.0,
        Direction::HigherIsWorse,
        0.8,
        format!("swapping {:.1} MB/s", swap_mb),
        "per-second",
    ));

    let majfault = ctx.rates.memory.majfault_s;
    evidence.push(Evidence::new(
        "mem.major.faults",
        Domain::Memory,
        majfault,
        10.0,
        200.0,
        Direction::HigherIsWorse,
        0.7,
        format!("major faults {:.0}/s", majfault),
        "per-second",
    ));

    let oom_delta = ctx.rates.memory.oom_kill_delta as f64;
    evidence.push(Evidence::new(
        "mem.oom.kills",
        Domain::Memory,
        oom_delta,
        1.0,
        1.0,
        Direction::HigherIsWorse,
        1.0,
        format!("OOM killed {} task(s)", oom_delta as u64),
        "delta",
    ));

    if let Some(sentinel) = &snap.sentinel {
        let victims = sentinel.oom_kills.len() as f64;
        let victim_note = sentinel
            .oom_kills
            .first()
            .map(|v| format!("OOM victim {} (pid {})", v.comm, v.pid))
            .unwrap_or_else(|| "no OOM victims".to_string());
        evidence.push(Evidence::new(
            "mem.sentinel.oom",
            Domain::Memory,
            victims,
            1.0,
            1.0,
            Direction::HigherIsWorse,
            1.0,
            victim_note,
            "delta",
        ).tag("sentinel"));

        let stall_ms = sentinel.direct_reclaim_stall_us as f64 / 1000.0;
        evidence.push(Evidence::new(
            "mem.sentinel.reclaim",
            Domain::Memory,
            stall_ms,
            10.0,
            100.0,
            Direction::HigherIsWorse,
            0.9,
            format!("direct reclaim stalled {:.0} ms", stall_ms),
            "delta",
        ).tag("sentinel"));
    }

    evidence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::system::{SentinelOomKill, SentinelSample};
    use crate::model::Snapshot;
    use crate::rates::Rates;

    #[test]
    fn oom_delta_fires_at_one() {
        let mut snap = Snapshot::default();
        snap.memory.total = 100;
        snap.memory.available = 50;
        let mut rates = Rates::default();
        rates.memory.oom_kill_delta = 1;

        let ctx = AnalyzerContext {
            snapshot: &snap,
            rates: &rates,
            predictions: &[],
        };
        let evidence = evaluate(&ctx);

        let oom = evidence.iter().find(|e| e.id == "mem.oom.kills").unwrap();
        assert!(oom.fired());
        assert!((oom.strength - 0.35).abs() < 1e-9);
        assert_eq!(oom.trust, 1.0);
    }

    #[test]
    fn sentinel_adds_high_trust_atoms() {
        let mut snap = Snapshot::default();
        snap.sentinel = Some(SentinelSample {
            oom_kills: vec![SentinelOomKill {
                pid: 4100,
                comm: "javaworker".into(),
                cgroup: "system.slice/worker.service".into(),
            }],
            direct_reclaim_stall_us: 250_000,
            ..Default::default()
        });
        let rates = Rates::default();

        let ctx = AnalyzerContext {
            snapshot: &snap,
            rates: &rates,
            predictions: &[],
        };
        let evidence = evaluate(&ctx);

        let oom = evidence.iter().find(|e| e.id == "mem.sentinel.oom").unwrap();
        assert!(oom.fired());
        assert!(oom.message.contains("javaworker"));

        let reclaim = evidence
            .iter()
            .find(|e| e.id == "mem.sentinel.reclaim")
            .unwrap();
        assert!(reclaim.fired());
    }

    #[test]
    fn pressure_fires_used_and_swap() {
        let mut snap = Snapshot::default();
        snap.memory.total = 1000;
        snap.memory.available = 40; // 96% used
        snap.psi.memory.some_avg10 = 18.0;
        let mut rates = Rates::default();
        rates.memory.swap_in_mb_s = 12.0;

        let ctx = AnalyzerContext {
            snapshot: &snap,
            rates: &rates,
            predictions: &[],
        };
        let evidence = evaluate(&ctx);

        let by_id = |id: &str| evidence.iter().find(|e| e.id == id).unwrap();
        assert!(by_id("mem.available.low").fired());
        assert!(by_id("mem.swap.activity").in_warn_band());
        assert!(!by_id("mem.swap.activity").fired());
        assert!(by_id("mem.psi").in_warn_band());
    }
}
