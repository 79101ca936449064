//! Network Registry aggregate root.
//!
//! The `NetworkRegistry` tracks every visible access point across scan
//! cycles. It owns the [`HistoryStore`], keeps per-network metadata current,
//! and applies the staleness policy: a network is removed after
//! `stale_after_cycles` consecutive scan cycles in which it was not observed.
//! Cycles whose scan produced no observations at all do not count as misses,
//! so a failing scanner never expires the whole scene.

use std::collections::HashMap;
use std::time::Instant;

use crate::domain::bssid::{BandType, BssidId, BssidObservation};
use crate::domain::history::HistoryStore;

// ---------------------------------------------------------------------------
// Network -- Entity
// ---------------------------------------------------------------------------

/// A tracked network with its latest metadata.
#[derive(Debug, Clone)]
pub struct Network {
    /// Stable identity.
    pub id: BssidId,
    /// Display name (SSID, or `Ch<channel>` for hidden networks).
    pub name: String,
    /// The 802.11 channel number.
    pub channel: u8,
    /// The frequency band.
    pub band: BandType,
    /// Most recent RSSI in dBm.
    pub signal_dbm: i32,
    /// When this network was last observed.
    pub last_seen: Instant,
    /// Scan cycle of the last observation.
    pub last_cycle: u64,
    /// Consecutive non-empty cycles without an observation.
    pub missed_cycles: u32,
}

impl Network {
    fn new(obs: &BssidObservation, cycle: u64) -> Self {
        Self {
            id: obs.bssid,
            name: obs.display_name(),
            channel: obs.channel,
            band: obs.band,
            signal_dbm: obs.rssi_dbm,
            last_seen: obs.timestamp,
            last_cycle: cycle,
            missed_cycles: 0,
        }
    }

    fn observe(&mut self, obs: &BssidObservation, cycle: u64) {
        self.signal_dbm = obs.rssi_dbm;
        self.last_seen = obs.timestamp;
        self.last_cycle = cycle;
        self.missed_cycles = 0;

        // The AP may have moved channel; hidden SSIDs keep the last known name.
        self.channel = obs.channel;
        self.band = obs.band;
        if !obs.ssid.is_empty() {
            self.name = obs.ssid.clone();
        }
    }
}

/// What changed in the registry during one scan cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleChanges {
    /// Networks observed for the first time.
    pub added: Vec<BssidId>,
    /// Networks removed by the staleness policy.
    pub expired: Vec<BssidId>,
    /// Observations ignored because the registry is at capacity.
    pub rejected: usize,
}

// ---------------------------------------------------------------------------
// NetworkRegistry -- Aggregate Root
// ---------------------------------------------------------------------------

/// Aggregate root that tracks all visible networks across scan cycles.
#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    networks: HashMap<BssidId, Network>,
    history: HistoryStore,
    stale_after_cycles: u32,
    max_networks: usize,
    cycle: u64,
}

impl NetworkRegistry {
    /// Default number of consecutive missed cycles before removal.
    pub const DEFAULT_STALE_AFTER_CYCLES: u32 = 5;

    /// Default maximum number of tracked networks.
    pub const DEFAULT_MAX_NETWORKS: usize = 128;

    /// Create a registry.
    ///
    /// - `window`: samples kept per network.
    /// - `stale_after_cycles`: missed non-empty cycles before removal (min 1).
    /// - `max_networks`: new networks beyond this count are ignored.
    pub fn new(window: usize, stale_after_cycles: u32, max_networks: usize) -> Self {
        Self {
            networks: HashMap::new(),
            history: HistoryStore::new(window),
            stale_after_cycles: stale_after_cycles.max(1),
            max_networks,
            cycle: 0,
        }
    }

    /// Ingest one scan cycle.
    ///
    /// Returns `None` without touching any state when `observations` is
    /// empty: a failed or empty scan means "no new samples this cycle".
    pub fn observe_cycle(&mut self, observations: &[BssidObservation]) -> Option<CycleChanges> {
        if observations.is_empty() {
            return None;
        }

        self.cycle += 1;
        let cycle = self.cycle;
        let mut changes = CycleChanges::default();

        for obs in observations {
            if let Some(network) = self.networks.get_mut(&obs.bssid) {
                network.observe(obs, cycle);
            } else if self.networks.len() < self.max_networks {
                self.networks.insert(obs.bssid, Network::new(obs, cycle));
                changes.added.push(obs.bssid);
            } else {
                changes.rejected += 1;
                continue;
            }
            self.history
                .record(obs.bssid, obs.rssi_dbm, cycle, obs.timestamp);
        }

        for network in self.networks.values_mut() {
            if network.last_cycle != cycle {
                network.missed_cycles += 1;
            }
        }

        let threshold = self.stale_after_cycles;
        changes.expired = self
            .networks
            .values()
            .filter(|n| n.missed_cycles >= threshold)
            .map(|n| n.id)
            .collect();
        changes.expired.sort_unstable();

        if !changes.expired.is_empty() {
            for id in &changes.expired {
                self.networks.remove(id);
            }
            self.history.prune(self.networks.keys());
            tracing::debug!(
                cycle,
                expired = changes.expired.len(),
                "expired stale networks"
            );
        }
        if changes.rejected > 0 {
            tracing::warn!(
                cycle,
                rejected = changes.rejected,
                max = self.max_networks,
                "network registry at capacity; ignoring new networks"
            );
        }

        Some(changes)
    }

    /// The History Store backing this registry.
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Get a network by id.
    pub fn get(&self, id: &BssidId) -> Option<&Network> {
        self.networks.get(id)
    }

    /// Iterate over all tracked networks in arbitrary order.
    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }

    /// Ids of all tracked networks, sorted.
    pub fn ids(&self) -> Vec<BssidId> {
        let mut ids: Vec<BssidId> = self.networks.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Index of the most recent non-empty scan cycle (0 before the first).
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// The number of currently tracked networks.
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::new(
            HistoryStore::DEFAULT_WINDOW,
            Self::DEFAULT_STALE_AFTER_CYCLES,
            Self::DEFAULT_MAX_NETWORKS,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
