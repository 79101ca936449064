//! `RadarEngine`: owns the analytical pipeline state and runs one cycle at a
//! time (ingest → correlate → layout).

use tracing::{debug, info};
use wifi_radar_wifiscan::{
    BssidObservation, CorrelationEngine, CorrelationMatrix, CycleChanges, LayoutSimulator,
    LayoutStats, NetworkRegistry,
};

use crate::config::RadarConfig;
use crate::snapshot::{build_snapshot, Snapshot};

/// What one call to [`RadarEngine::run_cycle`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleOutcome {
    /// Registry changes, or `None` if the scan was empty and nothing moved.
    pub changes: Option<CycleChanges>,
    /// Layout ticks for this cycle.
    pub layout: LayoutStats,
    /// Defined correlation pairs.
    pub pairs: usize,
}

impl CycleOutcome {
    /// Whether the cycle ingested new samples.
    pub fn applied(&self) -> bool {
        self.changes.is_some()
    }
}

/// Registry, correlation engine and layout simulator for one radar.
pub struct RadarEngine {
    registry: NetworkRegistry,
    correlator: CorrelationEngine,
    layout: LayoutSimulator,
    matrix: CorrelationMatrix,
    edge_threshold: f64,
}

impl RadarEngine {
    /// Build an engine from a validated configuration.
    pub fn new(config: &RadarConfig) -> Self {
        Self {
            registry: NetworkRegistry::new(
                config.history.window,
                config.history.stale_after_cycles,
                config.history.max_networks,
            ),
            correlator: CorrelationEngine::new(config.correlation.min_overlap),
            layout: LayoutSimulator::new(config.layout.clone(), config.scan.seed),
            matrix: CorrelationMatrix::default(),
            edge_threshold: config.correlation.edge_threshold,
        }
    }

    /// Run one pipeline cycle over a scan result.
    ///
    /// An empty scan leaves registry, history, matrix and layout untouched.
    pub fn run_cycle(&mut self, observations: &[BssidObservation]) -> CycleOutcome {
        let Some(changes) = self.registry.observe_cycle(observations) else {
            debug!("empty scan, state unchanged");
            return CycleOutcome {
                changes: None,
                layout: LayoutStats {
                    kinetic_energy: self.layout.kinetic_energy(),
                    ..LayoutStats::default()
                },
                pairs: self.matrix.len(),
            };
        };

        self.matrix = self.correlator.compute(self.registry.history());
        let (spawned, removed) = self.layout.sync(&self.registry.ids());
        let layout = self.layout.step_cycle(&self.matrix);

        if !changes.added.is_empty() || !changes.expired.is_empty() {
            info!(
                cycle = self.registry.cycle(),
                added = changes.added.len(),
                expired = changes.expired.len(),
                networks = self.registry.len(),
                "network set changed"
            );
        }
        debug!(
            cycle = self.registry.cycle(),
            pairs = self.matrix.len(),
            spawned,
            removed,
            kinetic_energy = layout.kinetic_energy,
            "cycle complete"
        );

        CycleOutcome {
            changes: Some(changes),
            layout,
            pairs: self.matrix.len(),
        }
    }

    /// Snapshot of the current state.
    pub fn snapshot(&self) -> Snapshot {
        build_snapshot(
            self.registry.cycle(),
            &self.registry,
            &self.layout,
            &self.matrix,
            self.edge_threshold,
        )
    }

    /// Current cycle number (count of non-empty scans).
    pub fn cycle(&self) -> u64 {
        self.registry.cycle()
    }

    /// The network registry.
    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    /// The most recent correlation matrix.
    pub fn matrix(&self) -> &CorrelationMatrix {
        &self.matrix
    }

    /// The layout simulator.
    pub fn layout(&self) -> &LayoutSimulator {
        &self.layout
    }

    /// Edge threshold used for snapshots.
    pub fn edge_threshold(&self) -> f64 {
        self.edge_threshold
    }
}
