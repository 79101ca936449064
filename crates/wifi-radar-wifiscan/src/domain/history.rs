//! Per-network RSSI ring buffers, aligned across networks by scan cycle.
//!
//! Every sample carries the index of the scan cycle it was captured in. The
//! correlation stage pairs samples by that index, so two networks that were
//! not observed in exactly the same cycles are still compared sample for
//! sample.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use crate::domain::bssid::BssidId;

/// One RSSI reading for one network in one scan cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Monotonic scan cycle index the reading belongs to.
    pub cycle: u64,
    /// Wall-clock instant of the observation.
    pub timestamp: Instant,
    /// Received signal strength in dBm.
    pub rssi_dbm: i32,
}

/// Bounded, time-ordered sample history for a single network.
#[derive(Debug, Clone)]
pub struct SignalHistory {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SignalHistory {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, sample: Sample) {
        if let Some(last) = self.samples.back_mut() {
            if last.cycle == sample.cycle {
                *last = sample;
                return;
            }
            if last.cycle > sample.cycle {
                // Out-of-order samples would break cycle alignment.
                tracing::debug!(
                    last = last.cycle,
                    got = sample.cycle,
                    "dropping out-of-order RSSI sample"
                );
                return;
            }
        }
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Samples oldest first.
    pub fn samples(&self) -> &VecDeque<Sample> {
        &self.samples
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples are retained.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The most recent RSSI reading in dBm.
    pub fn latest(&self) -> Option<i32> {
        self.samples.back().map(|s| s.rssi_dbm)
    }

    /// The RSSI values oldest first, as `f64`.
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| f64::from(s.rssi_dbm)).collect()
    }
}

/// The History Store: one [`SignalHistory`] per network.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    histories: HashMap<BssidId, SignalHistory>,
    window: usize,
}

impl HistoryStore {
    /// Default number of samples kept per network.
    pub const DEFAULT_WINDOW: usize = 30;

    /// Create a store keeping at most `window` samples per network.
    ///
    /// A window of zero is treated as one.
    pub fn new(window: usize) -> Self {
        Self {
            histories: HashMap::new(),
            window: window.max(1),
        }
    }

    /// Append a sample, evicting the oldest once the window is full.
    ///
    /// Unknown networks are created lazily. A second sample for the same
    /// cycle replaces the first.
    pub fn record(&mut self, id: BssidId, rssi_dbm: i32, cycle: u64, timestamp: Instant) {
        let window = self.window;
        self.histories
            .entry(id)
            .or_insert_with(|| SignalHistory::new(window))
            .push(Sample {
                cycle,
                timestamp,
                rssi_dbm,
            });
    }

    /// The ordered samples for `id`; empty when the network is unknown.
    pub fn series_for(&self, id: &BssidId) -> Vec<Sample> {
        self.histories
            .get(id)
            .map(|h| h.samples.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Borrow the history for `id`, if any.
    pub fn get(&self, id: &BssidId) -> Option<&SignalHistory> {
        self.histories.get(id)
    }

    /// Drop every history whose id is not in `active`, freeing its buffer.
    ///
    /// Returns the ids that were removed.
    pub fn prune<'a, I>(&mut self, active: I) -> Vec<BssidId>
    where
        I: IntoIterator<Item = &'a BssidId>,
    {
        let keep: std::collections::HashSet<BssidId> = active.into_iter().copied().collect();
        let removed: Vec<BssidId> = self
            .histories
            .keys()
            .filter(|id| !keep.contains(id))
            .copied()
            .collect();
        for id in &removed {
            self.histories.remove(id);
        }
        removed
    }

    /// Iterate over `(id, history)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&BssidId, &SignalHistory)> {
        self.histories.iter()
    }

    /// Ids of all tracked networks, sorted.
    pub fn ids(&self) -> Vec<BssidId> {
        let mut ids: Vec<BssidId> = self.histories.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of tracked networks.
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    /// Whether no network is tracked.
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// Maximum samples kept per network.
    pub fn window(&self) -> usize {
        self.window
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}
