//! Exhaustion predictor: linear extrapolation of growing resources to
//! an estimated time-to-full.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::model::Snapshot;

/// Samples retained per tracked resource.
const WINDOW_SAMPLES: usize = 120;

/// Fewest samples a fit is attempted on.
const MIN_SAMPLES: usize = 5;

/// Fits below this R² are considered noise and dropped.
const MIN_R2: f64 = 0.6;

/// One published prediction.
#[derive(Clone, Debug, Serialize)]
pub struct ExhaustionPrediction {
    /// "memory", "swap", "file descriptors", "conntrack" or a mount
    /// point.
    pub resource: String,
    pub current_pct: f64,
    pub minutes_to_full: f64,
    /// Fit quality in [0, 1].
    pub r2: f64,
}

/// Least-squares line through `(x, y)` points.
/// Returns `(slope, intercept, r2)`, or `None` for degenerate input.
pub fn linear_fit(points: &[(f64, f64)]) -> Option<(f64, f64, f64)> {
    let n = points.len() as f64;
    if points.len() < 2 {
        return None;
    }

    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let mean_x = sum_x / n;
    let mean_y = sum_y / n;

    let sxx: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    let sxy: f64 = points
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    if sxx <= 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let syy: f64 = points.iter().map(|(_, y)| (y - mean_y).powi(2)).sum();
    let r2 = if syy <= 0.0 {
        // A perfectly flat series is a perfect fit of a flat line
        1.0
    } else {
        (sxy * sxy / (sxx * syy)).clamp(0.0, 1.0)
    };

    Some((slope, intercept, r2))
}

/// Maintains short used-percent histories and fits them each tick.
#[derive(Default)]
pub struct ExhaustionPredictor {
    windows: HashMap<String, VecDeque<(f64, f64)>>,
}

impl ExhaustionPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records this tick's readings and returns the plausible
    /// predictions: positive slope, acceptable fit, not already full.
    pub fn update(&mut self, snapshot: &Snapshot) -> Vec<ExhaustionPrediction> {
        let now = snapshot.timestamp as f64;
        let mut tracked: Vec<(String, f64)> = Vec::new();

        let mem = &snapshot.memory;
        if mem.total > 0 {
            tracked.push(("memory".to_string(), mem.used_pct()));
        }
        if mem.swap_total > 0 {
            tracked.push((
                "swap".to_string(),
                100.0 * mem.swap_used() as f64 / mem.swap_total as f64,
            ));
        }
        let fh = &snapshot.file_handles;
        if fh.max > 0 {
            tracked.push((
                "file descriptors".to_string(),
                100.0 * fh.allocated as f64 / fh.max as f64,
            ));
        }
        let ct = &snapshot.conntrack;
        if ct.max > 0 {
            tracked.push((
                "conntrack".to_string(),
                100.0 * ct.count as f64 / ct.max as f64,
            ));
        }
        for m in &snapshot.mounts {
            tracked.push((m.mount_point.clone(), m.used_pct()));
        }

        // Drop windows for resources that disappeared (unmounts)
        let names: Vec<&String> = tracked.iter().map(|(n, _)| n).collect();
        self.windows.retain(|k, _| names.iter().any(|n| *n == k));

        let mut predictions = Vec::new();
        for (resource, pct) in tracked {
            let window = self.windows.entry(resource.clone()).or_default();
            window.push_back((now, pct));
            while window.len() > WINDOW_SAMPLES {
                window.pop_front();
            }
            if window.len() < MIN_SAMPLES {
                continue;
            }

            let points: Vec<(f64, f64)> = window.iter().copied().collect();
            let Some((slope, _, r2)) = linear_fit(&points) else {
                continue;
            };
            if slope <= 0.0 || r2 < MIN_R2 || pct >= 100.0 {
                continue;
            }

            let seconds_to_full = (100.0 - pct) / slope;
            predictions.push(ExhaustionPrediction {
                resource,
                current_pct: pct,
                minutes_to_full: seconds_to_full / 60.0,
                r2,
            });
        }

        predictions.sort_by(|a, b| {
            a.minutes_to_full
                .partial_cmp(&b.minutes_to_full)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        predictions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MountInfo;

    fn snap_with_mount(ts: i64, used_bytes: u64) -> Snapshot {
        let mut snap = Snapshot {
            timestamp: ts,
            ..Default::default()
        };
        snap.mounts = vec![MountInfo {
            mount_point: "/data".into(),
            total_bytes: 1000,
            free_bytes: 1000 - used_bytes,
            ..Default::default()
        }];
        snap
    }

    #[test]
    fn linear_fit_exact_line() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 2.0 * i as f64 + 5.0)).collect();
        let (slope, intercept, r2) = linear_fit(&points).unwrap();
        assert!((slope - 2.0).abs() < 1e-9);
        assert!((intercept - 5.0).abs() < 1e-9);
        assert!((r2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn growing_mount_predicts_time_to_full() {
        let mut predictor = ExhaustionPredictor::new();
        // 1% per 10 s, starting at 50%
        let mut predictions = Vec::new();
        for i in 0..10u64 {
            let snap = snap_with_mount(100 + i as i64 * 10, 500 + i * 10);
            predictions = predictor.update(&snap);
        }

        let p = predictions
            .iter()
            .find(|p| p.resource == "/data")
            .expect("mount prediction");
        // At 59% growing 0.1%/s: 410 s ≈ 6.8 min to full
        assert!((p.current_pct - 59.0).abs() < 1e-6);
        assert!((p.minutes_to_full - 410.0 / 60.0).abs() < 0.1);
        assert!(p.r2 > 0.99);
    }

    #[test]
    fn flat_or_shrinking_yields_nothing() {
        let mut predictor = ExhaustionPredictor::new();
        let mut predictions = Vec::new();
        for i in 0..10u64 {
            // Shrinking usage
            let snap = snap_with_mount(100 + i as i64 * 10, 500u64.saturating_sub(i * 10));
            predictions = predictor.update(&snap);
        }
        assert!(predictions.iter().all(|p| p.resource != "/data"));

        let mut predictor = ExhaustionPredictor::new();
        for i in 0..10u64 {
            let snap = snap_with_mount(100 + i as i64 * 10, 500);
            predictions = predictor.update(&snap);
        }
        assert!(predictions.is_empty());
    }

    #[test]
    fn noisy_series_fails_r2_floor() {
        let mut predictor = ExhaustionPredictor::new();
        let noise = [500u64, 90, 800, 120, 700, 200, 900, 150, 600, 300];
        let mut predictions = Vec::new();
        for (i, used) in noise.iter().enumerate() {
            let snap = snap_with_mount(100 + i as i64 * 10, *used);
            predictions = predictor.update(&snap);
        }
        assert!(predictions.iter().all(|p| p.resource != "/data"));
    }
}
