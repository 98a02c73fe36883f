//! Anomaly timers and the temporal chain: turns instantaneous
//! readings into "this started 23 s ago" stories.
//!
//! Owned by the engine and mutated only at tick end.

use std::collections::{HashMap, VecDeque};

use super::Evidence;

/// Window for the "biggest change" tracking.
const CHANGE_WINDOW_SECS: i64 = 30;

/// Per-signal onset timestamps plus short value histories.
#[derive(Default)]
pub struct AnomalyState {
    /// atom id → first tick the atom entered its warn band.
    onsets: HashMap<&'static str, i64>,
    /// atom id → (timestamp, value) samples inside the change window.
    values: HashMap<&'static str, VecDeque<(i64, f64)>>,
    primary_label: Option<&'static str>,
    primary_since: Option<i64>,
}

impl AnomalyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records this tick's atoms: onset bookkeeping and value history.
    pub fn observe(&mut self, now: i64, atoms: &[Evidence]) {
        for atom in atoms {
            if atom.in_warn_band() {
                self.onsets.entry(atom.id).or_insert(now);
            } else {
                self.onsets.remove(atom.id);
            }

            let history = self.values.entry(atom.id).or_default();
            history.push_back((now, atom.value));
            while history
                .front()
                .is_some_and(|(ts, _)| now - ts > CHANGE_WINDOW_SECS)
            {
                history.pop_front();
            }
        }
    }

    /// Restarts the anomaly timer whenever the primary bottleneck
    /// changes identity.
    pub fn track_primary(&mut self, now: i64, label: Option<&'static str>) {
        if label != self.primary_label {
            self.primary_label = label;
            self.primary_since = label.map(|_| now);
        }
    }

    /// Seconds since the current primary bottleneck appeared.
    pub fn primary_age(&self, now: i64) -> Option<u64> {
        self.primary_since.map(|since| (now - since).max(0) as u64)
    }

    /// First warn-band timestamp for one atom.
    pub fn onset(&self, id: &str) -> Option<i64> {
        self.onsets.get(id).copied()
    }

    /// Lists the atoms that entered their warn band earliest, in
    /// order: "retrans began 23 s ago → drops at 18 s → ...".
    pub fn temporal_chain(&self, now: i64, atoms: &[Evidence]) -> String {
        let mut active: Vec<(&Evidence, i64)> = atoms
            .iter()
            .filter(|a| a.in_warn_band())
            .filter_map(|a| self.onsets.get(a.id).map(|&onset| (a, onset)))
            .collect();
        active.sort_by_key(|(_, onset)| *onset);
        active.truncate(4);

        let mut parts = Vec::new();
        for (i, (atom, onset)) in active.iter().enumerate() {
            let age = (now - onset).max(0);
            if i == 0 {
                parts.push(format!("{} began {} s ago", short_label(atom.id), age));
            } else {
                parts.push(format!("{} at {} s", short_label(atom.id), age));
            }
        }
        parts.join(" → ")
    }

    /// The atom whose value moved most over the change window.
    pub fn biggest_change_30s(&self, atoms: &[Evidence]) -> Option<String> {
        let mut best: Option<(&Evidence, f64, f64, f64)> = None;

        for atom in atoms {
            let Some(history) = self.values.get(atom.id) else {
                continue;
            };
            let (Some((_, oldest)), Some((_, newest))) = (history.front(), history.back()) else {
                continue;
            };
            let delta = (newest - oldest).abs();
            if delta > 0.0 && best.is_none_or(|(_, d, _, _)| delta > d) {
                best = Some((atom, delta, *oldest, *newest));
            }
        }

        best.map(|(atom, _, oldest, newest)| {
            format!(
                "{}: {:.1} → {:.1} in 30 s",
                short_label(atom.id),
                oldest,
                newest
            )
        })
    }
}

/// Compact label for chain rendering.
fn short_label(id: &str) -> &str {
    match id {
        "io.psi" => "IO PSI",
        "io.dstate" => "D-state",
        "io.disk.latency" => "disk latency",
        "io.disk.util" => "disk util",
        "io.writeback" => "writeback",
        "io.fsfull" => "fs full",
        "mem.psi" => "memory PSI",
        "mem.available.low" => "memory used",
        "mem.reclaim.direct" => "direct reclaim",
        "mem.swap.activity" => "swap",
        "mem.major.faults" => "major faults",
        "mem.oom.kills" => "OOM kills",
        "mem.sentinel.oom" => "OOM (traced)",
        "mem.sentinel.reclaim" => "reclaim stall (traced)",
        "cpu.psi" => "CPU PSI",
        "cpu.runqueue" => "run queue",
        "cpu.ctxswitch" => "ctx switches",
        "cpu.steal" => "steal",
        "cpu.cgroup.throttle" => "throttling",
        "cpu.sentinel.throttle" => "throttling (traced)",
        "net.drops" => "drops",
        "net.tcp.retrans" => "retrans",
        "net.conntrack" => "conntrack",
        "net.softirq" => "soft-IRQ",
        "net.tcp.state" => "socket churn",
        "net.closewait" => "CLOSE_WAIT",
        "net.sentinel.drops" => "drops (traced)",
        "net.sentinel.resets" => "resets (traced)",
        other => other,
    }
}
