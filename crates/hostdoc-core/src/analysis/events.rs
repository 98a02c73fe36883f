//! Event detector: opens an incident window on the alert debounce,
//! tracks peaks while it lasts, and emits one record when it closes.

use serde::Serialize;

use super::{AnalysisResult, Culprit, HealthLevel};
use crate::model::Snapshot;
use crate::rates::Rates;

/// One closed incident. Serialized as a single JSON object per line;
/// key names are part of the external contract.
#[derive(Clone, Debug, Serialize)]
pub struct EventRecord {
    pub id: u64,
    pub start_time: i64,
    pub end_time: i64,
    pub duration_sec: i64,
    pub peak_health: HealthLevel,
    /// Bottleneck label at the peak-score tick.
    pub bottleneck: String,
    pub peak_score: f64,
    /// Ids of the atoms fired at the peak tick.
    pub evidence: Vec<String>,
    pub causal_chain: String,
    pub culprit_cgroup: Option<String>,
    pub culprit_process: Option<String>,
    pub culprit_pid: Option<u32>,
    pub peak_cpu_busy: f64,
    pub peak_mem_used_pct: f64,
    pub peak_io_psi: f64,
}

impl EventRecord {
    /// One line of the structured event log.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// The currently open incident, queryable while it lasts.
#[derive(Clone, Debug)]
pub struct ActiveEvent {
    pub id: u64,
    pub start_time: i64,
    pub peak_health: HealthLevel,
    pub bottleneck: String,
    pub peak_score: f64,
    pub evidence: Vec<String>,
    pub causal_chain: String,
    pub culprit: Culprit,
    pub peak_cpu_busy: f64,
    pub peak_mem_used_pct: f64,
    pub peak_io_psi: f64,
}

/// Opens and closes incident windows. Opening follows the alert
/// debounce (the published level leaving OK); closing happens on the
/// first OK instant.
#[derive(Default)]
pub struct EventDetector {
    active: Option<ActiveEvent>,
    next_id: u64,
}

impl EventDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The open incident, if any.
    pub fn active_event(&self) -> Option<&ActiveEvent> {
        self.active.as_ref()
    }

    /// Feeds one tick. Returns the closed record when the incident
    /// ends this tick.
    pub fn update(
        &mut self,
        result: &AnalysisResult,
        snapshot: &Snapshot,
        rates: &Rates,
    ) -> Option<EventRecord> {
        let published = result.health;
        let instant = result.instant_health;

        match &mut self.active {
            None => {
                if published > HealthLevel::Ok {
                    self.next_id += 1;
                    let mut event = ActiveEvent {
                        id: self.next_id,
                        start_time: result.timestamp,
                        peak_health: published,
                        bottleneck: String::new(),
                        peak_score: -1.0,
                        evidence: Vec::new(),
                        causal_chain: String::new(),
                        culprit: Culprit::default(),
                        peak_cpu_busy: 0.0,
                        peak_mem_used_pct: 0.0,
                        peak_io_psi: 0.0,
                    };
                    track_peaks(&mut event, result, snapshot, rates);
                    self.active = Some(event);
                }
                None
            }
            Some(event) => {
                track_peaks(event, result, snapshot, rates);

                if instant == HealthLevel::Ok {
                    let event = self.active.take().expect("checked above");
                    return Some(EventRecord {
                        id: event.id,
                        start_time: event.start_time,
                        end_time: result.timestamp,
                        duration_sec: (result.timestamp - event.start_time).max(0),
                        peak_health: event.peak_health,
                        bottleneck: event.bottleneck,
                        peak_score: event.peak_score.max(0.0),
                        evidence: event.evidence,
                        causal_chain: event.causal_chain,
                        culprit_cgroup: event.culprit.cgroup,
                        culprit_process: event.culprit.process,
                        culprit_pid: event.culprit.pid,
                        peak_cpu_busy: event.peak_cpu_busy,
                        peak_mem_used_pct: event.peak_mem_used_pct,
                        peak_io_psi: event.peak_io_psi,
                    });
                }
                None
            }
        }
    }
}

fn track_peaks(
    event: &mut ActiveEvent,
    result: &AnalysisResult,
    snapshot: &Snapshot,
    rates: &Rates,
) {
    event.peak_health = event.peak_health.max(result.health);
    event.peak_cpu_busy = event.peak_cpu_busy.max(rates.cpu.busy_pct);
    event.peak_mem_used_pct = event.peak_mem_used_pct.max(snapshot.memory.used_pct());
    event.peak_io_psi = event.peak_io_psi.max(snapshot.psi.io.some_avg10 as f64);

    let score = result.primary.as_ref().map(|p| p.score).unwrap_or(0.0);
    if score > event.peak_score {
        event.peak_score = score;
        event.bottleneck = result
            .primary
            .as_ref()
            .map(|p| p.label.to_string())
            .unwrap_or_default();
        event.evidence = result
            .atoms
            .iter()
            .filter(|a| a.fired())
            .map(|a| a.id.to_string())
            .collect();
        event.causal_chain = result.causal_chain.clone();
        event.culprit = result.culprit.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::PrimaryBottleneck;

    fn result(ts: i64, published: HealthLevel, instant: HealthLevel, score: f64) -> AnalysisResult {
        AnalysisResult {
            timestamp: ts,
            health: published,
            instant_health: instant,
            primary: (score > 0.0).then(|| PrimaryBottleneck {
                domain: crate::analysis::Domain::Io,
                label: crate::analysis::Domain::Io.label(),
                score,
            }),
            causal_chain: "IO PSI some=28%".to_string(),
            culprit: Culprit {
                pid: Some(3001),
                process: Some("pgwriter".to_string()),
                cgroup: Some("postgresql".to_string()),
            },
            ..Default::default()
        }
    }

    fn quiet() -> (Snapshot, Rates) {
        (Snapshot::default(), Rates::default())
    }

    #[test]
    fn event_lifecycle_and_record() {
        let mut detector = EventDetector::new();
        let (snap, rates) = quiet();

        // Published still OK during the debounce: nothing opens
        let r = result(100, HealthLevel::Ok, HealthLevel::Critical, 70.0);
        assert!(detector.update(&r, &snap, &rates).is_none());
        assert!(detector.active_event().is_none());

        // Debounce satisfied: published leaves OK, event opens
        let r = result(102, HealthLevel::Critical, HealthLevel::Critical, 70.0);
        assert!(detector.update(&r, &snap, &rates).is_none());
        assert_eq!(detector.active_event().unwrap().start_time, 102);

        // Peak grows
        let r = result(110, HealthLevel::Critical, HealthLevel::Critical, 85.0);
        assert!(detector.update(&r, &snap, &rates).is_none());
        assert!((detector.active_event().unwrap().peak_score - 85.0).abs() < 1e-9);

        // First OK instant closes it
        let r = result(130, HealthLevel::Critical, HealthLevel::Ok, 0.0);
        let record = detector.update(&r, &snap, &rates).expect("closed record");
        assert_eq!(record.id, 1);
        assert_eq!(record.start_time, 102);
        assert_eq!(record.end_time, 130);
        assert_eq!(record.duration_sec, 28);
        assert_eq!(record.peak_health, HealthLevel::Critical);
        assert_eq!(record.bottleneck, "IO Starvation");
        assert!((record.peak_score - 85.0).abs() < 1e-9);
        assert_eq!(record.culprit_pid, Some(3001));
        assert!(detector.active_event().is_none());
    }

    #[test]
    fn json_line_has_stable_keys() {
        let record = EventRecord {
            id: 7,
            start_time: 100,
            end_time: 130,
            duration_sec: 30,
            peak_health: HealthLevel::Critical,
            bottleneck: "IO Starvation".to_string(),
            peak_score: 82.5,
            evidence: vec!["io.psi".to_string()],
            causal_chain: "IO PSI some=28%".to_string(),
            culprit_cgroup: Some("postgresql".to_string()),
            culprit_process: Some("pgwriter".to_string()),
            culprit_pid: Some(3001),
            peak_cpu_busy: 41.0,
            peak_mem_used_pct: 55.0,
            peak_io_psi: 28.0,
        };

        let line = record.to_json_line();
        for key in [
            "\"id\"",
            "\"start_time\"",
            "\"end_time\"",
            "\"duration_sec\"",
            "\"peak_health\"",
            "\"bottleneck\"",
            "\"peak_score\"",
            "\"evidence\"",
            "\"causal_chain\"",
            "\"culprit_cgroup\"",
            "\"culprit_process\"",
            "\"culprit_pid\"",
            "\"peak_cpu_busy\"",
            "\"peak_mem_used_pct\"",
            "\"peak_io_psi\"",
        ] {
            assert!(line.contains(key), "missing {key} in {line}");
        }
        assert!(!line.contains('\n'));
    }

    #[test]
    fn second_event_gets_next_id() {
        let mut detector = EventDetector::new();
        let (snap, rates) = quiet();

        let open = result(100, HealthLevel::Degraded, HealthLevel::Degraded, 40.0);
        let close = result(110, HealthLevel::Degraded, HealthLevel::Ok, 0.0);
        detector.update(&open, &snap, &rates);
        let first = detector.update(&close, &snap, &rates).unwrap();

        let open = result(200, HealthLevel::Degraded, HealthLevel::Degraded, 40.0);
        let close = result(210, HealthLevel::Degraded, HealthLevel::Ok, 0.0);
        detector.update(&open, &snap, &rates);
        let second = detector.update(&close, &snap, &rates).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }
}
