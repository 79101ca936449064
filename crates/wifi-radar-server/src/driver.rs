//! Periodic scan driver.
//!
//! One task owns the [`RadarEngine`] and runs scan → ingest → correlate →
//! layout → publish on a fixed interval, so no two cycles ever overlap.
//! Scans run on the blocking pool. A `watch` flag stops the loop between
//! cycles, after which the publisher is closed so every viewer connection
//! winds down.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use wifi_radar_wifiscan::{BssidObservation, WlanScanPort};

use crate::engine::RadarEngine;
use crate::publisher::SnapshotPublisher;
use crate::viewers::PublishReport;

/// Shortest scan period the driver will run at.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Live counters exposed on `/health`.
#[derive(Debug, Clone)]
pub struct RadarStatus {
    /// Name of the scan backend.
    pub source: &'static str,
    /// Last completed cycle.
    pub cycle: u64,
    /// Networks currently tracked.
    pub networks: usize,
    /// Edges in the last snapshot.
    pub edges: usize,
    /// Scans that failed or returned nothing.
    pub empty_scans: u64,
    /// Driver start time.
    pub started: Instant,
}

/// Shared handle to [`RadarStatus`].
pub type SharedStatus = Arc<RwLock<RadarStatus>>;

impl RadarStatus {
    /// Fresh status for `source`, wrapped for sharing.
    pub fn shared(source: &'static str) -> SharedStatus {
        Arc::new(RwLock::new(Self {
            source,
            cycle: 0,
            networks: 0,
            edges: 0,
            empty_scans: 0,
            started: Instant::now(),
        }))
    }
}

/// Drives the engine from a scan backend.
pub struct ScanDriver {
    scanner: Arc<dyn WlanScanPort>,
    engine: RadarEngine,
    publisher: SnapshotPublisher,
    status: SharedStatus,
    period: Duration,
}

impl ScanDriver {
    pub fn new(
        scanner: Arc<dyn WlanScanPort>,
        engine: RadarEngine,
        publisher: SnapshotPublisher,
        status: SharedStatus,
        period: Duration,
    ) -> Self {
        Self {
            scanner,
            engine,
            publisher,
            status,
            period: period.max(MIN_PERIOD),
        }
    }

    /// The engine, for inspection.
    pub fn engine(&self) -> &RadarEngine {
        &self.engine
    }

    /// Run until `shutdown` turns `true` or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            source = self.scanner.name(),
            period_ms = self.period.as_millis() as u64,
            "scan driver started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if *shutdown.borrow() {
                break;
            }

            let observations = self.scan().await;
            self.step(&observations);
        }

        self.publisher.close();
        info!(cycle = self.engine.cycle(), "scan driver stopped");
    }

    /// Run the scanner off the async runtime. Failures yield an empty scan.
    async fn scan(&self) -> Vec<BssidObservation> {
        let scanner = Arc::clone(&self.scanner);
        match tokio::task::spawn_blocking(move || scanner.scan()).await {
            Ok(Ok(observations)) => observations,
            Ok(Err(e)) => {
                warn!(source = self.scanner.name(), error = %e, "scan failed");
                Vec::new()
            }
            Err(join_err) => {
                error!("scan task panicked: {join_err}");
                Vec::new()
            }
        }
    }

    /// Apply one scan result and publish the resulting snapshot.
    ///
    /// An empty `observations` leaves the engine untouched but still
    /// republishes the current state.
    pub fn step(&mut self, observations: &[BssidObservation]) -> PublishReport {
        let outcome = self.engine.run_cycle(observations);
        let snapshot = self.engine.snapshot();

        {
            let mut status = self.status.write();
            status.cycle = snapshot.cycle;
            status.networks = snapshot.networks.len();
            status.edges = snapshot.edges.len();
            if !outcome.applied() {
                status.empty_scans += 1;
            }
        }

        match self.publisher.publish(&snapshot) {
            Ok(report) => {
                if report.evicted > 0 {
                    debug!(evicted = report.evicted, "viewers evicted during publish");
                }
                report
            }
            Err(e) => {
                error!(cycle = snapshot.cycle, error = %e, "snapshot serialization failed");
                PublishReport::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RadarConfig;
    use wifi_radar_wifiscan::{ScanResult, SyntheticScanner, WifiScanError};

    struct FailingScanner;

    impl WlanScanPort for FailingScanner {
        fn scan(&self) -> ScanResult<Vec<BssidObservation>> {
            Err(WifiScanError::ScanFailed {
                reason: "radio off".into(),
            })
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn driver(scanner: Arc<dyn WlanScanPort>, period_ms: u64) -> (ScanDriver, SnapshotPublisher, SharedStatus) {
        let config = RadarConfig::default();
        let publisher = SnapshotPublisher::new(&config.publish);
        let status = RadarStatus::shared(scanner.name());
        let driver = ScanDriver::new(
            scanner,
            RadarEngine::new(&config),
            publisher.clone(),
            status.clone(),
            Duration::from_millis(period_ms),
        );
        (driver, publisher, status)
    }

    #[tokio::test]
    async fn failed_scan_republishes_unchanged_state() {
        let (mut driver, publisher, status) = driver(Arc::new(FailingScanner), 10);
        let (_, mut rx) = publisher.subscribe().unwrap();

        let observations = driver.scan().await;
        assert!(observations.is_empty());
        let report = driver.step(&observations);
        assert_eq!(report.delivered, 1);

        let payload = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["cycle"], 0);
        assert_eq!(value["networks"].as_array().unwrap().len(), 0);
        assert_eq!(status.read().empty_scans, 1);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_and_closes_viewers() {
        let (driver, publisher, status) = driver(Arc::new(SyntheticScanner::default()), 5);
        let (_, mut rx) = publisher.subscribe().unwrap();
        let (tx, shutdown) = watch::channel(false);
        let handle = tokio::spawn(driver.run(shutdown));

        // Wait for at least two cycles.
        let mut seen = 0;
        while seen < 2 {
            rx.recv().await.unwrap();
            seen += 1;
        }
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(publisher.is_closed());
        assert!(status.read().cycle >= 2);
        // Remaining buffered payloads drain, then the queue reports closed.
        while rx.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn zero_period_runs_at_the_minimum() {
        let (driver, publisher, _) = driver(Arc::new(SyntheticScanner::default()), 0);
        assert_eq!(driver.period, MIN_PERIOD);

        let (_, mut rx) = publisher.subscribe().unwrap();
        let (tx, shutdown) = watch::channel(false);
        let handle = tokio::spawn(driver.run(shutdown));

        let payload = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["cycle"], 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(publisher.is_closed());
    }
}
