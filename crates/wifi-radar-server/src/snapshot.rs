//! Per-cycle snapshot sent to viewers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wifi_radar_wifiscan::{BandType, BssidId, CorrelationMatrix, LayoutSimulator, NetworkRegistry};

/// Value of the `type` field on every snapshot message.
pub const SNAPSHOT_TYPE: &str = "radar_snapshot";

/// One network as seen by the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkView {
    pub id: BssidId,
    pub name: String,
    pub band: BandType,
    pub channel: u8,
    /// dBm.
    pub signal_strength: i32,
    pub position: [f64; 3],
    pub cluster: usize,
}

/// A correlation edge with `|r|` at or above the edge threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeView {
    pub network_id_a: BssidId,
    pub network_id_b: BssidId,
    /// Pearson r, rounded to three decimals.
    pub correlation: f64,
}

/// Immutable view of one scan cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "type")]
    pub kind: String,
    pub cycle: u64,
    /// Unix seconds with millisecond precision.
    pub timestamp: f64,
    pub networks: Vec<NetworkView>,
    pub edges: Vec<EdgeView>,
}

impl Snapshot {
    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Look up a network by id.
    pub fn network(&self, id: &BssidId) -> Option<&NetworkView> {
        self.networks.iter().find(|n| &n.id == id)
    }

    /// Look up the edge between two networks, in either order.
    pub fn edge(&self, a: &BssidId, b: &BssidId) -> Option<&EdgeView> {
        self.edges.iter().find(|e| {
            (&e.network_id_a == a && &e.network_id_b == b)
                || (&e.network_id_a == b && &e.network_id_b == a)
        })
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

/// Assemble a snapshot from the current engine state, stamped with the
/// current wall-clock time.
pub fn build_snapshot(
    cycle: u64,
    registry: &NetworkRegistry,
    layout: &LayoutSimulator,
    matrix: &CorrelationMatrix,
    edge_threshold: f64,
) -> Snapshot {
    build_snapshot_at(cycle, registry, layout, matrix, edge_threshold, Utc::now())
}

/// Like [`build_snapshot`] with an explicit timestamp.
///
/// Networks are sorted by id. Cluster ids come from the correlation graph at
/// `edge_threshold`; networks without enough history to correlate get their
/// own cluster after the correlated ones. Edges are sorted by `(a, b)` and
/// only reference networks present in the registry.
pub fn build_snapshot_at(
    cycle: u64,
    registry: &NetworkRegistry,
    layout: &LayoutSimulator,
    matrix: &CorrelationMatrix,
    edge_threshold: f64,
    at: DateTime<Utc>,
) -> Snapshot {
    let clusters = matrix.clusters(edge_threshold);
    let mut next_cluster = clusters.values().max().map_or(0, |c| c + 1);

    let networks = registry
        .ids()
        .into_iter()
        .filter_map(|id| registry.get(&id))
        .map(|network| {
            let cluster = clusters.get(&network.id).copied().unwrap_or_else(|| {
                next_cluster += 1;
                next_cluster - 1
            });
            NetworkView {
                id: network.id,
                name: network.name.clone(),
                band: network.band,
                channel: network.channel,
                signal_strength: network.signal_dbm,
                position: layout.position(&network.id).unwrap_or([0.0; 3]),
                cluster,
            }
        })
        .collect();

    let edges = matrix
        .edges(edge_threshold)
        .into_iter()
        .filter(|(a, b, _)| registry.get(a).is_some() && registry.get(b).is_some())
        .map(|(a, b, r)| EdgeView {
            network_id_a: a,
            network_id_b: b,
            correlation: round3(r),
        })
        .collect();

    Snapshot {
        kind: SNAPSHOT_TYPE.to_owned(),
        cycle,
        timestamp: unix_seconds(at),
        networks,
        edges,
    }
}
