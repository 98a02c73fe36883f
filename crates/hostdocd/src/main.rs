//! hostdocd - host diagnostics daemon.
//!
//! Samples kernel counters on an interval, runs the root-cause
//! analyzer each tick, logs health transitions and appends one JSON
//! line per closed incident to the event log.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use hostdoc_core::analysis::events::EventRecord;
use hostdoc_core::analysis::HealthLevel;
use hostdoc_core::collector::{Collector, RealFs, DEFAULT_TOP_PROCESSES};
use hostdoc_core::engine::Engine;
use hostdoc_core::history::DEFAULT_HISTORY_CAPACITY;

/// Host diagnostics daemon.
#[derive(Parser)]
#[command(name = "hostdocd", about = "Host diagnostics daemon", version)]
struct Args {
    /// Sampling interval in seconds.
    #[arg(short, long, default_value = "1")]
    interval: u64,

    /// Path to the proc filesystem (for testing/containers).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Path to the sys filesystem.
    #[arg(long, default_value = "/sys")]
    sys_path: String,

    /// Event log file; one JSON object is appended per closed incident.
    #[arg(short, long, default_value = "./hostdoc-events.jsonl")]
    event_log: String,

    /// How many processes the snapshot retains (half ranked by CPU,
    /// half by write bytes).
    #[arg(long, default_value_t = DEFAULT_TOP_PROCESSES)]
    top_processes: usize,

    /// Snapshots retained in memory.
    #[arg(long, default_value_t = DEFAULT_HISTORY_CAPACITY)]
    history: usize,

    /// Doctor mode: sample for the given number of ticks, print the
    /// final analysis as JSON and exit 0/1/2 by worst observed health.
    #[arg(long, value_name = "TICKS")]
    doctor: Option<u32>,

    /// Increase logging verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode: errors only.
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("hostdocd={}", level).parse().unwrap())
        .add_directive(format!("hostdoc_core={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Appends one event record to the JSONL log.
fn append_event(path: &Path, record: &EventRecord) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", record.to_json_line())
}

/// Exit code for doctor-mode callers: OK → 0, INCONCLUSIVE and
/// DEGRADED → 1, CRITICAL → 2.
fn exit_code(worst: HealthLevel) -> i32 {
    match worst {
        HealthLevel::Ok => 0,
        HealthLevel::Inconclusive | HealthLevel::Degraded => 1,
        HealthLevel::Critical => 2,
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!("hostdocd {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}s, proc={}, history={}, top={}, events={}",
        args.interval, args.proc_path, args.history, args.top_processes, args.event_log
    );

    let collector = Collector::with_paths(
        RealFs::new(),
        &args.proc_path,
        &args.sys_path,
        args.top_processes,
    );
    let mut engine = Engine::with_history(collector, args.history);

    let interval = Duration::from_secs(args.interval.max(1));
    let event_log = Path::new(&args.event_log);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let mut last_health = HealthLevel::Ok;
    let mut worst_health = HealthLevel::Ok;
    let mut final_analysis: Option<String> = None;
    let mut ticks: u32 = 0;

    while running.load(Ordering::SeqCst) {
        match engine.tick() {
            Ok(result) => {
                if !result.snapshot.errors.is_empty() {
                    debug!(
                        "partial snapshot: {}",
                        result.snapshot.errors.join("; ")
                    );
                }

                if let Some(analysis) = &result.analysis {
                    worst_health = worst_health.max(analysis.health);

                    if analysis.health != last_health {
                        match analysis.health {
                            HealthLevel::Ok => info!("health: OK"),
                            level => {
                                let bottleneck = analysis
                                    .primary
                                    .as_ref()
                                    .map(|p| p.label)
                                    .unwrap_or("unknown");
                                warn!(
                                    "health: {:?}: {} (score {:.0}, confidence {}%)",
                                    level,
                                    bottleneck,
                                    analysis.primary.as_ref().map(|p| p.score).unwrap_or(0.0),
                                    analysis.confidence
                                );
                                if !analysis.causal_chain.is_empty() {
                                    warn!("cause: {}", analysis.causal_chain);
                                }
                                for action in &analysis.suggested_actions {
                                    info!("suggest: {}", action);
                                }
                            }
                        }
                        last_health = analysis.health;
                    }

                    if args.doctor.is_some() {
                        final_analysis = serde_json::to_string_pretty(analysis).ok();
                    }
                }

                if let Some(record) = &result.closed_event {
                    info!(
                        "incident #{} closed: {} for {} s (peak {:.0})",
                        record.id, record.bottleneck, record.duration_sec, record.peak_score
                    );
                    if let Err(e) = append_event(event_log, record) {
                        error!("failed to append event log: {}", e);
                    }
                }
            }
            Err(e) => {
                // Catastrophic tick: skip this interval; the next tick
                // starts clean and no alert state advanced.
                error!("tick failed: {}", e);
            }
        }

        ticks += 1;
        if let Some(limit) = args.doctor
            && ticks >= limit.max(2)
        {
            break;
        }

        // Sleep in small slices so shutdown stays responsive
        let slice = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let nap = remaining.min(slice);
            std::thread::sleep(nap);
            remaining = remaining.saturating_sub(nap);
        }
    }

    if let Some(active) = engine.active_event() {
        info!(
            "shutting down with incident #{} still open (started {})",
            active.id, active.start_time
        );
    }
    info!("Shutdown complete");

    if args.doctor.is_some() {
        if let Some(json) = final_analysis {
            println!("{}", json);
        }
        std::process::exit(exit_code(worst_health));
    }
}
