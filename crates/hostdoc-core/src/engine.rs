//! The engine: one tick = collect → history → rates → analysis →
//! alert/event state. The tick is the only source of "now"; it is
//! driven by a wall-clock ticker in live mode or synchronously by a
//! replay loop feeding [`Engine::process_snapshot`].

use crate::analysis::alert::AlertStateMachine;
use crate::analysis::anomaly::AnomalyState;
use crate::analysis::events::{ActiveEvent, EventDetector, EventRecord};
use crate::analysis::predict::ExhaustionPredictor;
use crate::analysis::{analyze, AnalysisResult, AnalyzerContext, Domain};
use crate::collector::traits::FileSystem;
use crate::collector::{Collector, CollectorTiming};
use crate::history::{HistoryRing, DEFAULT_HISTORY_CAPACITY};
use crate::model::system::SentinelSample;
use crate::model::Snapshot;
use crate::rates::{compute_rates, Rates};

/// Seconds-to-full below which a mount prediction escalates the alert
/// immediately.
const MOUNT_ETA_ESCALATION_SECS: f64 = 300.0;

/// Tick-level failure. Collector problems never surface here (they
/// degrade the snapshot); this covers broken invariants only.
#[derive(Debug)]
pub enum EngineError {
    /// The snapshot's timestamp went backwards relative to history.
    /// The tick is dropped and no state machine advances.
    TimeRegression { last: i64, got: i64 },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::TimeRegression { last, got } => {
                write!(f, "snapshot time regressed: {} after {}", got, last)
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// What one tick produces. The first tick of a run has no previous
/// snapshot, so `rates` and `analysis` are `None`; callers that need
/// rates must discard it.
#[derive(Debug)]
pub struct TickResult {
    pub snapshot: Snapshot,
    pub rates: Option<Rates>,
    pub analysis: Option<AnalysisResult>,
    /// Present when an incident window closed this tick.
    pub closed_event: Option<EventRecord>,
}

/// Instance-owned measurement and analysis state. Nothing here is
/// process-wide; construct one per observed host.
pub struct Engine<F: FileSystem + Clone> {
    collector: Collector<F>,
    history: HistoryRing,
    anomaly: AnomalyState,
    alert: AlertStateMachine,
    events: EventDetector,
    predictor: ExhaustionPredictor,
}

impl<F: FileSystem + Clone> Engine<F> {
    pub fn new(collector: Collector<F>) -> Self {
        Self::with_history(collector, DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_history(collector: Collector<F>, history_capacity: usize) -> Self {
        Self {
            collector,
            history: HistoryRing::new(history_capacity),
            anomaly: AnomalyState::new(),
            alert: AlertStateMachine::default(),
            events: EventDetector::new(),
            predictor: ExhaustionPredictor::new(),
        }
    }

    /// Live-mode tick: collect from the kernel, then process.
    pub fn tick(&mut self) -> Result<TickResult, EngineError> {
        let snapshot = self.collector.collect_snapshot();
        self.process_snapshot(snapshot)
    }

    /// Processes one snapshot, wherever it came from (live collection
    /// or replay). This is the single mutation point for history and
    /// the anomaly/alert/event state machines.
    pub fn process_snapshot(&mut self, snapshot: Snapshot) -> Result<TickResult, EngineError> {
        if let Some(last) = self.history.latest()
            && snapshot.timestamp < last.timestamp
        {
            return Err(EngineError::TimeRegression {
                last: last.timestamp,
                got: snapshot.timestamp,
            });
        }

        self.history.push(snapshot);
        let Some(prev) = self.history.previous() else {
            let snapshot = self.history.latest().expect("just pushed").clone();
            return Ok(TickResult {
                snapshot,
                rates: None,
                analysis: None,
                closed_event: None,
            });
        };
        let curr = self.history.latest().expect("just pushed");
        let now = curr.timestamp;

        let mut rates = compute_rates(prev, curr);
        let predictions = self.predictor.update(curr);
        for mount in &mut rates.mounts {
            mount.eta_seconds = predictions
                .iter()
                .find(|p| p.resource == mount.mount_point)
                .map(|p| p.minutes_to_full * 60.0);
        }

        let ctx = AnalyzerContext {
            snapshot: curr,
            rates: &rates,
            predictions: &predictions,
        };
        let mut analysis = analyze(&ctx, &mut self.anomaly, now);

        let oom_confirmed = rates.memory.oom_kill_delta > 0
            || rates.cgroups.iter().any(|c| c.oom_kill_delta > 0)
            || curr
                .sentinel
                .as_ref()
                .is_some_and(|s| !s.oom_kills.is_empty());
        let mount_exhausting = predictions
            .iter()
            .any(|p| p.resource.starts_with('/') && p.minutes_to_full * 60.0 < MOUNT_ETA_ESCALATION_SECS);
        let escalate = oom_confirmed || mount_exhausting;

        analysis.health = self.alert.update(analysis.instant_health, escalate);

        let closed_event = self.events.update(&analysis, curr, &rates);

        if analysis
            .domains
            .iter()
            .any(|d| d.domain == Domain::Io && d.score >= 60.0)
        {
            // Disk pressure: force the deleted-open scanner to look
            // for invisible space consumers on the next tick.
            self.collector.trigger_disk_scan();
        }

        let snapshot = curr.clone();
        Ok(TickResult {
            snapshot,
            rates: Some(rates),
            analysis: Some(analysis),
            closed_event,
        })
    }

    /// Queues a sentinel sample for the next collected snapshot.
    pub fn set_sentinel(&mut self, sample: SentinelSample) {
        self.collector.set_sentinel(sample);
    }

    /// Retained snapshot window.
    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    /// The open incident, if any.
    pub fn active_event(&self) -> Option<&ActiveEvent> {
        self.events.active_event()
    }

    /// Per-collector timing of the last live tick.
    pub fn collector_timing(&self) -> Option<&CollectorTiming> {
        self.collector.last_timing()
    }
}
