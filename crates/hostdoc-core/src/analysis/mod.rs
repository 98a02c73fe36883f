//! Root-cause analysis: fuses evidence from the four domain analyzers
//! into a ranked, trust-gated set of bottleneck hypotheses.

pub mod advisor;
pub mod alert;
pub mod anomaly;
pub mod cpu;
pub mod events;
pub mod io;
pub mod memory;
pub mod network;
pub mod predict;

use serde::Serialize;

use crate::model::system::{CloseWaitLeaker, SystemIdentity};
use crate::model::Snapshot;
use crate::rates::Rates;
use crate::util::clean_cgroup_name;
use anomaly::AnomalyState;
use predict::ExhaustionPrediction;

// ============================================================
// Core types
// ============================================================

/// The four analysis domains, a closed set dispatched by match
/// rather than through trait objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Io,
    Memory,
    Cpu,
    Network,
}

impl Domain {
    pub const ALL: [Domain; 4] = [Domain::Io, Domain::Memory, Domain::Cpu, Domain::Network];

    /// Human label used in bottleneck names.
    pub fn label(self) -> &'static str {
        match self {
            Domain::Io => "IO Starvation",
            Domain::Memory => "Memory Pressure",
            Domain::Cpu => "CPU Contention",
            Domain::Network => "Network Degradation",
        }
    }
}

/// Published health level, ordered for exit-code mapping:
/// OK(0) < INCONCLUSIVE(1) < DEGRADED(2) < CRITICAL(3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthLevel {
    #[default]
    Ok,
    Inconclusive,
    Degraded,
    Critical,
}

/// Comparison sense of an evidence value against its thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsWorse,
    LowerIsWorse,
}

/// One thresholded observation contributing to a domain's score.
#[derive(Clone, Debug, Serialize)]
pub struct Evidence {
    /// Stable identifier, e.g. `io.psi`.
    pub id: &'static str,
    pub domain: Domain,
    pub value: f64,
    pub warn: f64,
    pub crit: f64,
    pub direction: Direction,
    /// How much this signal is believed when it fires, in [0, 1].
    pub trust: f64,
    /// Ramped strength in [0, 1]; at least 0.35 once past crit.
    pub strength: f64,
    pub message: String,
    /// What window the value describes: "avg10", "instant",
    /// "per-second" or "delta".
    pub timebase: &'static str,
    /// Free-form markers ("psi", "sentinel", "leak", ...).
    pub tags: Vec<&'static str>,
}

impl Evidence {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: &'static str,
        domain: Domain,
        value: f64,
        warn: f64,
        crit: f64,
        direction: Direction,
        trust: f64,
        message: String,
        timebase: &'static str,
    ) -> Self {
        let strength = ramp(value, warn, crit, direction);
        Self {
            id,
            domain,
            value,
            warn,
            crit,
            direction,
            trust,
            strength,
            message,
            timebase,
            tags: Vec::new(),
        }
    }

    /// Attaches a marker tag.
    pub fn tag(mut self, tag: &'static str) -> Self {
        self.tags.push(tag);
        self
    }

    /// An atom counts as fired once it reaches the crit-edge strength.
    pub fn fired(&self) -> bool {
        self.strength >= 0.35
    }

    /// Entered the warn band (the anomaly-onset condition).
    pub fn in_warn_band(&self) -> bool {
        self.strength > 0.0
    }
}

/// Piecewise-linear strength ramp.
///
/// value ≤ warn → 0; warn..crit → linear up to 0.35; past crit →
/// linear toward 1.0, saturating after one more warn→crit-sized band.
/// Atoms with `warn == crit` fire at 0.35 exactly at the threshold.
pub fn ramp(value: f64, warn: f64, crit: f64, direction: Direction) -> f64 {
    let (v, w, c) = match direction {
        Direction::HigherIsWorse => (value, warn, crit),
        Direction::LowerIsWorse => (-value, -warn, -crit),
    };

    if v >= c {
        let band = if c > w { c - w } else { c.abs().max(1.0) };
        (0.35 + 0.65 * ((v - c) / band)).min(1.0)
    } else if v > w {
        0.35 * (v - w) / (c - w)
    } else {
        0.0
    }
}

// ============================================================
// Per-domain report and the published result
// ============================================================

/// Culprit attribution for a domain.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct Culprit {
    pub pid: Option<u32>,
    pub process: Option<String>,
    pub cgroup: Option<String>,
}

/// One domain's scored verdict.
#[derive(Clone, Debug, Serialize)]
pub struct DomainReport {
    pub domain: Domain,
    /// Final score in [0, 100] after overrides and noise suppression.
    pub score: f64,
    /// Score before overrides, kept for display.
    pub raw_score: f64,
    pub health: HealthLevel,
    pub gate_passed: bool,
    /// Strength-weighted average trust of the domain's atoms, 0–100.
    pub confidence: f64,
    pub evidence: Vec<Evidence>,
    pub culprit: Culprit,
}

/// An edge in the causal DAG; indices point into
/// [`AnalysisResult::atoms`].
#[derive(Clone, Copy, Debug, Serialize)]
pub struct CausalLink {
    pub from: usize,
    pub to: usize,
}

/// One row of the capacity table.
#[derive(Clone, Debug, Serialize)]
pub struct CapacityRow {
    pub resource: String,
    pub used_pct: f64,
    pub eta_minutes: Option<f64>,
}

/// Worst per-mount guard level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiskGuardLevel {
    #[default]
    Ok,
    Warn,
    Critical,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DiskGuardState {
    pub level: DiskGuardLevel,
    pub mount_point: String,
    pub used_pct: f64,
    pub eta_seconds: Option<f64>,
}

/// The primary bottleneck hypothesis.
#[derive(Clone, Debug, Serialize)]
pub struct PrimaryBottleneck {
    pub domain: Domain,
    pub label: &'static str,
    pub score: f64,
}

/// The published analysis bundle, consumed by the UI and the JSON and
/// Markdown renderers. Scoring never depends on any consumer.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AnalysisResult {
    pub timestamp: i64,
    /// Debounced, publishable level (the alert state machine's output).
    pub health: HealthLevel,
    /// Instantaneous level before debouncing.
    pub instant_health: HealthLevel,
    /// 0–100.
    pub confidence: u8,
    pub primary: Option<PrimaryBottleneck>,
    pub culprit: Culprit,
    /// Per-domain reports, ranked by score descending.
    pub domains: Vec<DomainReport>,
    /// Flat atom arena; the causal DAG references entries by index.
    pub atoms: Vec<Evidence>,
    pub causal_chain: String,
    pub causal_dag: Vec<CausalLink>,
    pub temporal_chain: String,
    /// How long ago the current primary bottleneck first crossed its
    /// threshold band.
    pub anomaly_started_secs: Option<u64>,
    /// Atom with the largest value swing over the last 30 seconds.
    pub biggest_change_30s: Option<String>,
    pub capacity: Vec<CapacityRow>,
    pub warnings: Vec<String>,
    pub suggested_actions: Vec<String>,
    pub predictions: Vec<ExhaustionPrediction>,
    pub close_wait_leakers: Vec<CloseWaitLeaker>,
    pub disk_guard: DiskGuardState,
    pub hidden_latency: Option<String>,
    pub identity: SystemIdentity,
}

impl Default for PrimaryBottleneck {
    fn default() -> Self {
        Self {
            domain: Domain::Io,
            label: Domain::Io.label(),
            score: 0.0,
        }
    }
}

// ============================================================
// Analyzer context and dispatch
// ============================================================

/// Read-only inputs shared by every domain analyzer.
pub struct AnalyzerContext<'a> {
    pub snapshot: &'a Snapshot,
    pub rates: &'a Rates,
    pub predictions: &'a [ExhaustionPrediction],
}

/// Fixed dispatch over the closed domain set.
pub fn evaluate_domain(domain: Domain, ctx: &AnalyzerContext) -> Vec<Evidence> {
    match domain {
        Domain::Io => io::evaluate(ctx),
        Domain::Memory => memory::evaluate(ctx),
        Domain::Cpu => cpu::evaluate(ctx),
        Domain::Network => network::evaluate(ctx),
    }
}

// ============================================================
// Trust gate, scoring, fusion
// ============================================================

/// A domain may drive CRITICAL/DEGRADED only when at least two atoms
/// fired and at least one of those carries trust ≥ 0.8.
pub fn trust_gate(evidence: &[Evidence]) -> bool {
    let fired: Vec<&Evidence> = evidence.iter().filter(|e| e.fired()).collect();
    fired.len() >= 2 && fired.iter().any(|e| e.trust >= 0.8)
}

/// Raw domain score: trust-weighted strength renormalized to [0, 100]
/// by the sum of trust weights.
pub fn raw_score(evidence: &[Evidence]) -> f64 {
    let trust_sum: f64 = evidence.iter().map(|e| e.trust).sum();
    if trust_sum <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = evidence.iter().map(|e| e.strength * e.trust).sum();
    (weighted / trust_sum * 100.0).clamp(0.0, 100.0)
}

/// Strength-weighted average trust of the atoms, as a percentage.
fn domain_confidence(evidence: &[Evidence]) -> f64 {
    let strength_sum: f64 = evidence.iter().map(|e| e.strength).sum();
    if strength_sum <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = evidence.iter().map(|e| e.strength * e.trust).sum();
    (weighted / strength_sum * 100.0).clamp(0.0, 100.0)
}

/// Noise floor: scores below this are zeroed.
const SCORE_FLOOR: f64 = 20.0;

fn fired(evidence: &[Evidence], id: &str) -> bool {
    evidence.iter().any(|e| e.id == id && e.fired())
}

/// Applies the domain-specific score overrides.
fn apply_overrides(domain: Domain, mut score: f64, evidence: &[Evidence], ctx: &AnalyzerContext) -> f64 {
    let gate = trust_gate(evidence);
    match domain {
        Domain::Memory => {
            let oom_confirmed = fired(evidence, "mem.oom.kills") || fired(evidence, "mem.sentinel.oom");
            if oom_confirmed && gate {
                score = score.max(70.0);
            }
            let mem = &ctx.snapshot.memory;
            let available_pct = if mem.total > 0 {
                100.0 * mem.available as f64 / mem.total as f64
            } else {
                100.0
            };
            if available_pct > 25.0 && ctx.snapshot.psi.memory.some_avg10 < 1.0 {
                score = score.min(20.0);
            }
        }
        Domain::Cpu => {
            if ctx.rates.cpu.busy_pct < 50.0 && ctx.snapshot.psi.cpu.some_avg10 < 1.0 {
                score = score.min(30.0);
            }
            if fired(evidence, "cpu.steal") && gate {
                score = (score + 10.0).min(100.0);
            }
        }
        Domain::Network => {
            let drops: f64 = ctx.rates.net.iter().map(|n| n.rx_drops_s + n.tx_drops_s).sum();
            if drops < 1.0 && ctx.rates.tcp.retrans_pct < 5.0 {
                score = score.min(25.0);
            }
            if fired(evidence, "net.drops") && fired(evidence, "net.softirq") {
                score = (score + 10.0).min(100.0);
            }
        }
        Domain::Io => {
            if ctx.snapshot.dstate_count() >= 10 && gate {
                score = score.max(60.0);
            }
        }
    }

    if score < SCORE_FLOOR {
        0.0
    } else {
        score
    }
}

/// Health mapping for one domain score.
fn health_for(score: f64, gate_passed: bool) -> HealthLevel {
    if score >= 60.0 {
        if gate_passed {
            HealthLevel::Critical
        } else {
            HealthLevel::Inconclusive
        }
    } else if score >= 25.0 {
        if gate_passed {
            HealthLevel::Degraded
        } else {
            HealthLevel::Inconclusive
        }
    } else {
        HealthLevel::Ok
    }
}

// ============================================================
// Culprit attribution
// ============================================================

fn attribute_culprit(domain: Domain, ctx: &AnalyzerContext) -> Culprit {
    match domain {
        Domain::Io => io_culprit(ctx),
        Domain::Memory => memory_culprit(ctx),
        Domain::Cpu => cpu_culprit(ctx),
        Domain::Network => network_culprit(ctx),
    }
}

fn io_culprit(ctx: &AnalyzerContext) -> Culprit {
    // Heaviest user-space IO mover first
    let top_io = ctx
        .rates
        .processes
        .iter()
        .filter(|p| !p.kernel_thread)
        .max_by(|a, b| {
            (a.read_mb_s + a.write_mb_s)
                .partial_cmp(&(b.read_mb_s + b.write_mb_s))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .filter(|p| p.read_mb_s + p.write_mb_s > 0.0);
    if let Some(p) = top_io {
        return Culprit {
            pid: Some(p.pid),
            process: Some(p.comm.clone()),
            cgroup: None,
        };
    }

    // Any user-space task stuck in D-state
    if let Some(p) = ctx
        .snapshot
        .processes
        .iter()
        .find(|p| p.is_dstate() && !p.kernel_thread)
    {
        return Culprit {
            pid: Some(p.pid),
            process: Some(p.comm.clone()),
            cgroup: Some(clean_cgroup_name(&p.cgroup)),
        };
    }

    // Highest cumulative IO bytes
    ctx.snapshot
        .processes
        .iter()
        .filter(|p| !p.kernel_thread)
        .max_by_key(|p| p.read_bytes + p.write_bytes)
        .map(|p| Culprit {
            pid: Some(p.pid),
            process: Some(p.comm.clone()),
            cgroup: None,
        })
        .unwrap_or_default()
}

fn memory_culprit(ctx: &AnalyzerContext) -> Culprit {
    if let Some(sentinel) = &ctx.snapshot.sentinel
        && let Some(victim) = sentinel.oom_kills.first()
    {
        return Culprit {
            pid: Some(victim.pid),
            process: Some(victim.comm.clone()),
            cgroup: Some(clean_cgroup_name(&victim.cgroup)),
        };
    }

    if let Some(cg) = ctx.rates.cgroups.iter().find(|c| c.oom_kill_delta > 0) {
        return Culprit {
            pid: None,
            process: None,
            cgroup: Some(clean_cgroup_name(&cg.path)),
        };
    }

    if let Some(cg) = ctx
        .snapshot
        .cgroups
        .iter()
        .filter_map(|c| c.mem_used_ratio().map(|r| (c, r)))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .filter(|(_, r)| *r > 0.5)
        .map(|(c, _)| c)
    {
        return Culprit {
            pid: None,
            process: None,
            cgroup: Some(clean_cgroup_name(&cg.path)),
        };
    }

    ctx.snapshot
        .processes
        .iter()
        .filter(|p| !p.kernel_thread)
        .max_by_key(|p| p.rss_bytes)
        .map(|p| Culprit {
            pid: Some(p.pid),
            process: Some(p.comm.clone()),
            cgroup: Some(clean_cgroup_name(&p.cgroup)),
        })
        .unwrap_or_default()
}

fn cpu_culprit(ctx: &AnalyzerContext) -> Culprit {
    let top = ctx
        .rates
        .processes
        .iter()
        .filter(|p| !p.kernel_thread)
        .max_by(|a, b| a.cpu_pct.partial_cmp(&b.cpu_pct).unwrap_or(std::cmp::Ordering::Equal));

    let throttled = ctx
        .rates
        .cgroups
        .iter()
        .max_by(|a, b| {
            a.throttle_pct
                .partial_cmp(&b.throttle_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .filter(|c| c.throttle_pct > 0.0);

    Culprit {
        pid: top.map(|p| p.pid),
        process: top.map(|p| p.comm.clone()),
        cgroup: throttled.map(|c| clean_cgroup_name(&c.path)),
    }
}

fn network_culprit(ctx: &AnalyzerContext) -> Culprit {
    ctx.snapshot
        .close_wait
        .leakers
        .first()
        .map(|l| Culprit {
            pid: Some(l.pid),
            process: Some(l.process.clone()),
            cgroup: None,
        })
        .unwrap_or_default()
}

// ============================================================
// Hidden latency
// ============================================================

/// Voluntary-switch to CPU% ratio above which a process counts as an
/// off-CPU waiter.
const WAITER_RATIO: f64 = 2000.0;

/// Estimated off-CPU share above which health is downgraded.
const HIDDEN_LATENCY_PCT: f64 = 30.0;

/// Detects workloads that look idle on CPU but are mostly waiting off
/// CPU: low busy%, quiet PSI, yet many tasks with enormous voluntary
/// switch rates relative to their CPU use.
fn hidden_latency(ctx: &AnalyzerContext) -> Option<String> {
    let psi = &ctx.snapshot.psi;
    if ctx.rates.cpu.busy_pct >= 50.0
        || psi.cpu.some_avg10 >= 1.0
        || psi.io.some_avg10 >= 1.0
        || psi.memory.some_avg10 >= 1.0
    {
        return None;
    }

    let candidates: Vec<&crate::rates::ProcessRates> = ctx
        .rates
        .processes
        .iter()
        .filter(|p| !p.kernel_thread && p.vcsw_s >= 100.0)
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let waiters: Vec<&&crate::rates::ProcessRates> = candidates
        .iter()
        .filter(|p| p.vcsw_s / p.cpu_pct.max(0.05) > WAITER_RATIO)
        .collect();

    let considered = ctx
        .rates
        .processes
        .iter()
        .filter(|p| !p.kernel_thread)
        .count()
        .max(1);
    let est_off_cpu_pct = 100.0 * waiters.len() as f64 / considered as f64;
    if est_off_cpu_pct <= HIDDEN_LATENCY_PCT {
        return None;
    }

    let top = waiters
        .iter()
        .max_by(|a, b| a.vcsw_s.partial_cmp(&b.vcsw_s).unwrap_or(std::cmp::Ordering::Equal))?;
    Some(format!(
        "estimated off-CPU wait ~{:.0}% of tasks: top waiter {} (pid {}) blocks {:.0}×/s at {:.1}% CPU",
        est_off_cpu_pct, top.comm, top.pid, top.vcsw_s, top.cpu_pct
    ))
}

// ============================================================
// Analysis entry point
// ============================================================

/// Runs the four analyzers, fuses their evidence, attributes culprits
/// and assembles the published result. The alert state machine is
/// applied afterwards by the engine; `health` starts equal to
/// `instant_health` here.
pub fn analyze(ctx: &AnalyzerContext, anomaly: &mut AnomalyState, now: i64) -> AnalysisResult {
    let mut reports: Vec<DomainReport> = Domain::ALL
        .iter()
        .map(|&domain| {
            let evidence = evaluate_domain(domain, ctx);
            let raw = raw_score(&evidence);
            let score = apply_overrides(domain, raw, &evidence, ctx);
            let gate_passed = trust_gate(&evidence);
            DomainReport {
                domain,
                score,
                raw_score: raw,
                health: health_for(score, gate_passed),
                gate_passed,
                confidence: domain_confidence(&evidence),
                evidence,
                culprit: Culprit::default(),
            }
        })
        .collect();

    // Rank by score; the gate decides eligibility for primary. Ties
    // keep the fixed IO, Memory, CPU, Network order.
    reports.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let atoms: Vec<Evidence> = reports.iter().flat_map(|r| r.evidence.clone()).collect();
    anomaly.observe(now, &atoms);

    let primary_report = reports
        .iter()
        .find(|r| r.score >= 25.0 && r.gate_passed)
        .or_else(|| reports.iter().find(|r| r.score >= 25.0));

    let (primary, instant_health, confidence) = match primary_report {
        Some(r) => (
            Some(PrimaryBottleneck {
                domain: r.domain,
                label: r.domain.label(),
                score: r.score,
            }),
            r.health,
            r.confidence.round() as u8,
        ),
        None => (None, HealthLevel::Ok, 95),
    };

    let primary_domain = primary.as_ref().map(|p| p.domain);
    anomaly.track_primary(now, primary_domain.map(|d| d.label()));

    let culprit = primary_domain
        .map(|d| attribute_culprit(d, ctx))
        .unwrap_or_default();

    for report in &mut reports {
        report.culprit = attribute_culprit(report.domain, ctx);
    }

    let (causal_chain, causal_dag) =
        causal_chain(primary_domain, &atoms, anomaly, ctx);
    let temporal_chain = anomaly.temporal_chain(now, &atoms);
    let biggest_change_30s = anomaly.biggest_change_30s(&atoms);

    let mut result = AnalysisResult {
        timestamp: now,
        health: instant_health,
        instant_health,
        confidence,
        primary,
        culprit,
        domains: reports,
        atoms,
        causal_chain,
        causal_dag,
        temporal_chain,
        anomaly_started_secs: anomaly.primary_age(now),
        biggest_change_30s,
        capacity: capacity_table(ctx),
        warnings: Vec::new(),
        suggested_actions: Vec::new(),
        predictions: ctx.predictions.to_vec(),
        close_wait_leakers: ctx.snapshot.close_wait.leakers.clone(),
        disk_guard: disk_guard(ctx),
        hidden_latency: hidden_latency(ctx),
        identity: ctx.snapshot.identity.clone(),
    };

    // A quiet host that is secretly waiting off-CPU is not a clean OK.
    if result.instant_health == HealthLevel::Ok && result.hidden_latency.is_some() {
        result.instant_health = HealthLevel::Inconclusive;
        result.health = HealthLevel::Inconclusive;
    }

    let (warnings, actions) = advisor::advise(ctx, &result);
    result.warnings = warnings;
    result.suggested_actions = actions;

    result
}

/// Builds the causal chain for the primary domain: its in-band atoms
/// ordered by onset (earliest first), rendered as a string and as
/// index edges into the flat atom arena.
fn causal_chain(
    primary: Option<Domain>,
    atoms: &[Evidence],
    anomaly: &AnomalyState,
    ctx: &AnalyzerContext,
) -> (String, Vec<CausalLink>) {
    let Some(domain) = primary else {
        return (String::new(), Vec::new());
    };

    let mut indexed: Vec<(usize, &Evidence)> = atoms
        .iter()
        .enumerate()
        .filter(|(_, e)| e.domain == domain && e.in_warn_band())
        .collect();
    // Earliest onset leads the chain; same-tick onsets order by trust
    // so the most believable signal reads as the origin.
    indexed.sort_by(|a, b| {
        let onset_a = anomaly.onset(a.1.id).unwrap_or(i64::MAX);
        let onset_b = anomaly.onset(b.1.id).unwrap_or(i64::MAX);
        onset_a
            .cmp(&onset_b)
            .then(
                b.1.trust
                    .partial_cmp(&a.1.trust)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(
                b.1.strength
                    .partial_cmp(&a.1.strength)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    if indexed.is_empty() {
        return (String::new(), Vec::new());
    }

    let mut parts: Vec<String> = indexed.iter().map(|(_, e)| e.message.clone()).collect();

    // Reclaim pressure culminating in an OOM means allocations are on
    // the brink; say so as the chain's terminal state.
    if domain == Domain::Memory
        && (ctx.rates.memory.oom_kill_delta > 0 || ctx.rates.memory.allocstall_s > 0.0)
    {
        parts.push("Allocation stall risk".to_string());
    }

    let links = indexed
        .windows(2)
        .map(|w| CausalLink {
            from: w[0].0,
            to: w[1].0,
        })
        .collect();

    (parts.join(" → "), links)
}

fn capacity_table(ctx: &AnalyzerContext) -> Vec<CapacityRow> {
    let eta_for = |resource: &str| -> Option<f64> {
        ctx.predictions
            .iter()
            .find(|p| p.resource == resource)
            .map(|p| p.minutes_to_full)
    };

    let mut rows = Vec::new();
    let mem = &ctx.snapshot.memory;
    rows.push(CapacityRow {
        resource: "memory".to_string(),
        used_pct: mem.used_pct(),
        eta_minutes: eta_for("memory"),
    });
    if mem.swap_total > 0 {
        rows.push(CapacityRow {
            resource: "swap".to_string(),
            used_pct: 100.0 * mem.swap_used() as f64 / mem.swap_total as f64,
            eta_minutes: eta_for("swap"),
        });
    }
    let fh = &ctx.snapshot.file_handles;
    if fh.max > 0 {
        rows.push(CapacityRow {
            resource: "file descriptors".to_string(),
            used_pct: 100.0 * fh.allocated as f64 / fh.max as f64,
            eta_minutes: eta_for("file descriptors"),
        });
    }
    let ct = &ctx.snapshot.conntrack;
    if ct.max > 0 {
        rows.push(CapacityRow {
            resource: "conntrack".to_string(),
            used_pct: 100.0 * ct.count as f64 / ct.max as f64,
            eta_minutes: eta_for("conntrack"),
        });
    }
    for m in &ctx.snapshot.mounts {
        rows.push(CapacityRow {
            resource: m.mount_point.clone(),
            used_pct: m.used_pct(),
            eta_minutes: eta_for(&m.mount_point),
        });
    }
    rows
}

fn disk_guard(ctx: &AnalyzerContext) -> DiskGuardState {
    let mut worst = DiskGuardState::default();

    for m in &ctx.snapshot.mounts {
        let used = m.used_pct();
        let eta = ctx
            .predictions
            .iter()
            .find(|p| p.resource == m.mount_point)
            .map(|p| p.minutes_to_full * 60.0);

        let level = if used >= 95.0 || eta.is_some_and(|e| e < 1800.0) {
            DiskGuardLevel::Critical
        } else if used >= 85.0 || eta.is_some_and(|e| e < 7200.0) {
            DiskGuardLevel::Warn
        } else {
            DiskGuardLevel::Ok
        };

        if level > worst.level || (level == worst.level && used > worst.used_pct) {
            worst = DiskGuardState {
                level,
                mount_point: m.mount_point.clone(),
                used_pct: used,
                eta_seconds: eta,
            };
        }
    }

    worst
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(id: &'static str, strength_target: f64, trust: f64) -> Evidence {
        // Build an atom whose ramp lands on the requested strength by
        // picking a matching value on a 10/20 threshold pair.
        let value = if strength_target <= 0.0 {
            0.0
        } else if strength_target < 0.35 {
            10.0 + strength_target / 0.35 * 10.0
        } else {
            20.0 + (strength_target - 0.35) / 0.65 * 10.0
        };
        Evidence::new(
            id,
            Domain::Io,
            value,
            10.0,
            20.0,
            Direction::HigherIsWorse,
            trust,
            format!("{} = {:.1}", id, value),
            "instant",
        )
    }

    #[test]
    fn ramp_shape() {
        let d = Direction::HigherIsWorse;
        assert_eq!(ramp(5.0, 10.0, 20.0, d), 0.0);
        assert_eq!(ramp(10.0, 10.0, 20.0, d), 0.0);
        assert!((ramp(15.0, 10.0, 20.0, d) - 0.175).abs() < 1e-9);
        assert!((ramp(20.0, 10.0, 20.0, d) - 0.35).abs() < 1e-9);
        assert!((ramp(25.0, 10.0, 20.0, d) - 0.675).abs() < 1e-9);
        assert_eq!(ramp(30.0, 10.0, 20.0, d), 1.0);
        assert_eq!(ramp(300.0, 10.0, 20.0, d), 1.0);
    }

    #[test]
    fn ramp_degenerate_thresholds_fire_at_crit() {
        // warn == crit == 1, the OOM-delta shape
        let d = Direction::HigherIsWorse;
        assert_eq!(ramp(0.0, 1.0, 1.0, d), 0.0);
        assert!((ramp(1.0, 1.0, 1.0, d) - 0.35).abs() < 1e-9);
        assert!(ramp(2.0, 1.0, 1.0, d) > 0.9);
    }

    #[test]
    fn ramp_lower_is_worse() {
        let d = Direction::LowerIsWorse;
        assert_eq!(ramp(50.0, 15.0, 5.0, d), 0.0);
        assert!((ramp(5.0, 15.0, 5.0, d) - 0.35).abs() < 1e-9);
        assert!(ramp(1.0, 15.0, 5.0, d) > 0.35);
    }

    #[test]
    fn trust_gate_needs_two_fired_and_one_trusted() {
        // One fired atom only: gate fails
        assert!(!trust_gate(&[atom("a", 0.5, 0.9), atom("b", 0.1, 0.9)]));
        // Two fired but none high-trust: gate fails
        assert!(!trust_gate(&[atom("a", 0.5, 0.7), atom("b", 0.5, 0.6)]));
        // Two fired, one trusted: gate passes
        assert!(trust_gate(&[atom("a", 0.5, 0.9), atom("b", 0.5, 0.6)]));
    }

    #[test]
    fn raw_score_renormalizes_by_trust() {
        // One atom at full strength, trust 0.9, alone: 100
        let s = raw_score(&[atom("a", 1.0, 0.9)]);
        assert!((s - 100.0).abs() < 1e-6);

        // Adding a silent atom with trust 0.9 halves the score
        let s = raw_score(&[atom("a", 1.0, 0.9), atom("b", 0.0, 0.9)]);
        assert!((s - 50.0).abs() < 1e-6);
    }

    #[test]
    fn health_mapping() {
        assert_eq!(health_for(80.0, true), HealthLevel::Critical);
        assert_eq!(health_for(80.0, false), HealthLevel::Inconclusive);
        assert_eq!(health_for(40.0, true), HealthLevel::Degraded);
        assert_eq!(health_for(40.0, false), HealthLevel::Inconclusive);
        assert_eq!(health_for(10.0, true), HealthLevel::Ok);
        assert_eq!(health_for(10.0, false), HealthLevel::Ok);
    }

    #[test]
    fn health_level_ordering_matches_exit_codes() {
        assert!(HealthLevel::Ok < HealthLevel::Inconclusive);
        assert!(HealthLevel::Inconclusive < HealthLevel::Degraded);
        assert!(HealthLevel::Degraded < HealthLevel::Critical);
    }
}
