//! Network domain analyzer.

use super::{AnalyzerContext, Direction, Domain, Evidence};

/// Renders a close-wait leaker age like `1h 42m` / `5m 03s` / `42s`.
pub fn format_age(secs: u64) -> String {
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

pub fn evaluate(ctx: &AnalyzerContext) -> Vec<Evidence> {
    let mut evidence = Vec::with_capacity(8);
    let snap = ctx.snapshot;

    let drops: f64 = ctx
        .rates
        .net
        .iter()
        .map(|n| n.rx_drops_s + n.tx_drops_s)
        .sum();
    evidence.push(Evidence::new(
        "net.drops",
        Domain::Network,
        drops,
        1.0,
        100.0,
        Direction::HigherIsWorse,
        0.8,
        format!("{:.0} packet drops/s", drops),
        "per-second",
    ));

    let retrans_pct = ctx.rates.tcp.retrans_pct;
    evidence.push(Evidence::new(
        "net.tcp.retrans",
        Domain::Network,
        retrans_pct,
        1.0,
        5.0,
        Direction::HigherIsWorse,
        0.8,
        format!("TCP retransmits {:.1}% of out segments", retrans_pct),
        "per-second",
    ));

    let ct_pct = if snap.conntrack.max > 0 {
        100.0 * snap.conntrack.count as f64 / snap.conntrack.max as f64
    } else {
        0.0
    };
    evidence.push(Evidence::new(
        "net.conntrack",
        Domain::Network,
        ct_pct,
        70.0,
        95.0,
        Direction::HigherIsWorse,
        0.9,
        format!("conntrack table {:.0}% full", ct_pct),
        "instant",
    ).tag("capacity"));

    let softirq = ctx.rates.cpu.softirq_pct;
    evidence.push(Evidence::new(
        "net.softirq",
        Domain::Network,
        softirq,
        5.0,
        25.0,
        Direction::HigherIsWorse,
        0.6,
        format!("soft-IRQ {:.1}% CPU", softirq),
        "per-second",
    ));

    let tw = snap.tcp_states.time_wait as f64;
    let syn = snap.tcp_states.syn_sent as f64;
    let state_load = tw.max(200.0 * syn);
    evidence.push(Evidence::new(
        "net.tcp.state",
        Domain::Network,
        state_load,
        3000.0,
        15000.0,
        Direction::HigherIsWorse,
        0.6,
        format!(
            "TIME_WAIT={} SYN_SENT={}",
            snap.tcp_states.time_wait, snap.tcp_states.syn_sent
        ),
        "instant",
    ));

    let cw = snap.close_wait.total as f64;
    let cw_message = match snap.close_wait.leakers.first() {
        Some(top) => format!(
            "CLOSE_WAIT={} ({} pid {} holds {}, oldest {})",
            snap.close_wait.total,
            top.process,
            top.pid,
            top.count,
            format_age(top.oldest_age_secs)
        ),
        None => format!("CLOSE_WAIT={}", snap.close_wait.total),
    };
    evidence.push(Evidence::new(
        "net.closewait",
        Domain::Network,
        cw,
        50.0,
        500.0,
        Direction::HigherIsWorse,
        0.8,
        cw_message,
        "instant",
    ).tag("leak"));

    if let Some(sentinel) = &snap.sentinel {
        evidence.push(Evidence::new(
            "net.sentinel.drops",
            Domain::Network,
            sentinel.packet_drops as f64,
            1.0,
            100.0,
            Direction::HigherIsWorse,
            0.9,
            format!("{} traced packet drops", sentinel.packet_drops),
            "delta",
        ).tag("sentinel"));
        evidence.push(Evidence::new(
            "net.sentinel.resets",
            Domain::Network,
            sentinel.tcp_resets as f64,
            10.0,
            100.0,
            Direction::HigherIsWorse,
            0.9,
            format!("{} traced TCP resets", sentinel.tcp_resets),
            "delta",
        ).tag("sentinel"));
    }

    evidence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::system::CloseWaitLeaker;
    use crate::model::Snapshot;
    use crate::rates::Rates;

    #[test]
    fn age_formatting() {
        assert_eq!(format_age(42), "42s");
        assert_eq!(format_age(303), "5m 03s");
        assert_eq!(format_age(6120), "1h 42m");
    }

    #[test]
    fn closewait_message_names_pid_and_age() {
        let mut snap = Snapshot::default();
        snap.close_wait.total = 612;
        snap.close_wait.leakers = vec![CloseWaitLeaker {
            pid: 4242,
            process: "relayd".into(),
            count: 480,
            oldest_age_secs: 6120,
            newest_age_secs: 120,
            remote_ips: vec!["192.168.1.21:8080".into()],
        }];
        let rates = Rates::default();

        let ctx = AnalyzerContext {
            snapshot: &snap,
            rates: &rates,
            predictions: &[],
        };
        let evidence = evaluate(&ctx);

        let cw = evidence.iter().find(|e| e.id == "net.closewait").unwrap();
        assert!(cw.fired());
        assert_eq!(
            cw.message,
            "CLOSE_WAIT=612 (relayd pid 4242 holds 480, oldest 1h 42m)"
        );
    }

    #[test]
    fn syn_sent_amplifies_state_load() {
        let mut snap = Snapshot::default();
        snap.tcp_states.syn_sent = 100; // 100 × 200 = 20000 ≥ crit
        let rates = Rates::default();

        let ctx = AnalyzerContext {
            snapshot: &snap,
            rates: &rates,
            predictions: &[],
        };
        let evidence = evaluate(&ctx);
        let state = evidence.iter().find(|e| e.id == "net.tcp.state").unwrap();
        assert!(state.fired());
    }

    #[test]
    fn clean_network_is_silent() {
        let snap = Snapshot::default();
        let rates = Rates::default();
        let ctx = AnalyzerContext {
            snapshot: &snap,
            rates: &rates,
            predictions: &[],
        };
        assert!(evaluate(&ctx).iter().all(|e| !e.in_warn_band()));
    }
}
