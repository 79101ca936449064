//! Snapshot Publisher: serializes each snapshot once and fans it out.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::PublishConfig;
use crate::snapshot::Snapshot;
use crate::viewers::{Payload, PublishReport, ViewerId, ViewerSet};

/// Cloneable handle to the shared viewer set.
///
/// The lock is only ever held for non-async bookkeeping, so broadcasts and
/// registrations never interleave and never wait on network I/O.
#[derive(Clone)]
pub struct SnapshotPublisher {
    viewers: Arc<Mutex<ViewerSet>>,
}

impl SnapshotPublisher {
    /// Create a publisher with an empty viewer set.
    pub fn new(config: &PublishConfig) -> Self {
        Self {
            viewers: Arc::new(Mutex::new(ViewerSet::new(
                config.viewer_buffer,
                config.max_skipped,
            ))),
        }
    }

    /// Serialize `snapshot` and offer it to every viewer.
    pub fn publish(&self, snapshot: &Snapshot) -> Result<PublishReport, serde_json::Error> {
        let payload: Payload = Arc::from(snapshot.to_json()?);
        let report = self.viewers.lock().broadcast(payload);
        debug!(
            cycle = snapshot.cycle,
            delivered = report.delivered,
            skipped = report.skipped,
            evicted = report.evicted,
            "snapshot published"
        );
        Ok(report)
    }

    /// Register a new viewer. `None` after [`close`](Self::close).
    pub fn subscribe(&self) -> Option<(ViewerId, mpsc::Receiver<Payload>)> {
        self.viewers.lock().register()
    }

    /// Forget a viewer whose connection ended.
    pub fn unsubscribe(&self, id: ViewerId) {
        self.viewers.lock().remove(id);
    }

    /// The most recent serialized snapshot.
    pub fn latest_payload(&self) -> Option<Payload> {
        self.viewers.lock().latest()
    }

    /// Number of connected viewers.
    pub fn viewer_count(&self) -> usize {
        self.viewers.lock().len()
    }

    /// Close every viewer queue and refuse new viewers.
    pub fn close(&self) {
        self.viewers.lock().close();
    }

    /// Whether the publisher has been closed.
    pub fn is_closed(&self) -> bool {
        self.viewers.lock().is_closed()
    }
}
