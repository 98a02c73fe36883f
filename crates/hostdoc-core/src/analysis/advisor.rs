//! Turns fired evidence into operator-facing warnings and suggested
//! actions. Purely presentational: nothing here feeds back into
//! scoring.

use super::network::format_age;
use super::{AnalysisResult, AnalyzerContext};

/// Share of the ephemeral port range considered worrying.
const PORT_RANGE_WARN_PCT: f64 = 80.0;

/// Deleted-but-open bytes worth calling out.
const DELETED_OPEN_WARN_BYTES: u64 = 1 << 30;

/// Builds `(warnings, suggested_actions)` for a finished analysis.
pub fn advise(ctx: &AnalyzerContext, result: &AnalysisResult) -> (Vec<String>, Vec<String>) {
    (warnings(ctx, result), actions(ctx, result))
}

fn warnings(ctx: &AnalyzerContext, result: &AnalysisResult) -> Vec<String> {
    let mut out = Vec::new();
    let snap = ctx.snapshot;

    if !snap.errors.is_empty() {
        out.push(format!(
            "{} collector(s) degraded: {}",
            snap.errors.len(),
            snap.errors.join("; ")
        ));
    }

    for f in &snap.fileless {
        out.push(format!(
            "fileless executable: {} (pid {}) runs from {} with {} outbound connection(s)",
            f.comm, f.pid, f.exe, f.outbound_connections
        ));
    }

    let deleted_bytes: u64 = snap.deleted_open.iter().map(|d| d.size_bytes).sum();
    if deleted_bytes >= DELETED_OPEN_WARN_BYTES {
        let top = &snap.deleted_open[0];
        out.push(format!(
            "{:.1} GB held by deleted-but-open files (largest: {} via pid {})",
            deleted_bytes as f64 / 1e9,
            top.path,
            top.pid
        ));
    }

    let ports = &snap.ephemeral_ports;
    let span = (ports.range_high as f64 - ports.range_low as f64 + 1.0).max(1.0);
    let port_pct = 100.0 * ports.in_use as f64 / span;
    if port_pct >= PORT_RANGE_WARN_PCT {
        out.push(format!(
            "ephemeral port range {:.0}% consumed ({} of {}-{})",
            port_pct, ports.in_use, ports.range_low, ports.range_high
        ));
    }

    if snap.file_handles.max > 0 {
        let fd_pct = 100.0 * snap.file_handles.allocated as f64 / snap.file_handles.max as f64;
        if fd_pct >= 80.0 {
            out.push(format!("system file handles {:.0}% of limit", fd_pct));
        }
    }

    for p in &result.predictions {
        if p.minutes_to_full < 60.0 {
            out.push(format!(
                "{} projected full in {:.0} min (now {:.0}%)",
                p.resource, p.minutes_to_full, p.current_pct
            ));
        }
    }

    out
}

fn actions(ctx: &AnalyzerContext, result: &AnalysisResult) -> Vec<String> {
    let mut out = Vec::new();
    let snap = ctx.snapshot;

    // Close-wait leaks get an action as soon as the atom is in band,
    // whichever domain ended up primary.
    if let Some(top) = snap.close_wait.leakers.first()
        && snap.close_wait.total >= 50
    {
        out.push(format!(
            "restart or fix {} (pid {}): holds {} CLOSE_WAIT sockets, oldest {}; peers closed but the sockets were never closed locally",
            top.process,
            top.pid,
            top.count,
            format_age(top.oldest_age_secs)
        ));
    }

    // Domain-ranked actions, strongest hypotheses first
    for report in &result.domains {
        for atom in report.evidence.iter().filter(|a| a.fired()) {
            match atom.id {
                "mem.oom.kills" | "mem.sentinel.oom" => {
                    let target = result
                        .culprit
                        .cgroup
                        .clone()
                        .or_else(|| report.culprit.cgroup.clone())
                        .unwrap_or_else(|| "the affected cgroup".to_string());
                    out.push(format!(
                        "investigate the OOM kill in {}; raise its memory limit or shrink the working set",
                        target
                    ));
                }
                "mem.swap.activity" => {
                    out.push(format!(
                        "host is swapping ({}); identify the RSS grower before latency collapses",
                        atom.message
                    ));
                }
                "cpu.cgroup.throttle" => {
                    out.push(format!(
                        "raise the CPU quota or spread the load: {}",
                        atom.message
                    ));
                }
                "cpu.steal" => {
                    out.push(format!(
                        "{}: a noisy neighbor or an overcommitted hypervisor; consider migrating",
                        atom.message
                    ));
                }
                "io.fsfull" => {
                    out.push(format!("free space: {}", atom.message));
                }
                "io.disk.latency" => {
                    out.push(format!(
                        "storage latency is the bottleneck ({}); check device health and queue depth",
                        atom.message
                    ));
                }
                "net.tcp.retrans" => {
                    out.push(format!(
                        "check the network path ({}); loss upstream of this host",
                        atom.message
                    ));
                }
                "net.conntrack" => {
                    out.push(format!(
                        "{}; raise nf_conntrack_max or shorten timeouts",
                        atom.message
                    ));
                }
                _ => {}
            }
        }
    }

    if let Some(guard) = (result.disk_guard.level > super::DiskGuardLevel::Ok)
        .then_some(&result.disk_guard)
        && !out.iter().any(|a| a.contains(&guard.mount_point))
    {
        out.push(match guard.eta_seconds {
            Some(eta) => format!(
                "free space on {} ({:.0}% used, full in ~{:.0} min)",
                guard.mount_point,
                guard.used_pct,
                eta / 60.0
            ),
            None => format!(
                "free space on {} ({:.0}% used)",
                guard.mount_point, guard.used_pct
            ),
        });
    }

    out.dedup();
    out
}
