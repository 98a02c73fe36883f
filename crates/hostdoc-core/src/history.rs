//! Bounded in-memory snapshot history.
//!
//! Single writer (the engine tick) appends in strict tick order; rates
//! read only the two most recent entries, the predictor and external
//! readers may iterate the whole window. The ring never resizes after
//! construction and evicts the oldest snapshot on overflow.

use std::collections::VecDeque;

use crate::model::Snapshot;

/// Default capacity: about five minutes of history at 1 Hz.
pub const DEFAULT_HISTORY_CAPACITY: usize = 300;

/// Fixed-capacity snapshot ring.
pub struct HistoryRing {
    buf: VecDeque<Snapshot>,
    capacity: usize,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a snapshot, evicting the oldest when full.
    pub fn push(&mut self, snapshot: Snapshot) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(snapshot);
    }

    /// Most recent snapshot.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.buf.back()
    }

    /// Second most recent snapshot, the `prev` of rate computation.
    pub fn previous(&self) -> Option<&Snapshot> {
        if self.buf.len() < 2 {
            return None;
        }
        self.buf.get(self.buf.len() - 2)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest-to-newest iteration over the retained window.
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.buf.iter()
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(ts: i64) -> Snapshot {
        Snapshot {
            timestamp: ts,
            ..Default::default()
        }
    }

    #[test]
    fn push_and_accessors() {
        let mut ring = HistoryRing::new(10);
        assert!(ring.latest().is_none());
        assert!(ring.previous().is_none());

        ring.push(snap(1));
        assert_eq!(ring.latest().unwrap().timestamp, 1);
        assert!(ring.previous().is_none());

        ring.push(snap(2));
        assert_eq!(ring.latest().unwrap().timestamp, 2);
        assert_eq!(ring.previous().unwrap().timestamp, 1);
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut ring = HistoryRing::new(3);
        for ts in 1..=5 {
            ring.push(snap(ts));
        }
        assert_eq!(ring.len(), 3);
        let timestamps: Vec<i64> = ring.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![3, 4, 5]);
    }

    #[test]
    fn capacity_floor_of_two() {
        let ring = HistoryRing::new(0);
        assert_eq!(ring.capacity(), 2);
    }
}
