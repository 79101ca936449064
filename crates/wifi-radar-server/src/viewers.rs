//! Connected viewers and best-effort fan-out.
//!
//! Each viewer owns a bounded queue drained by its connection task. A
//! broadcast never waits: a full queue means that viewer skips the snapshot,
//! and a viewer that keeps skipping or whose queue has closed is evicted.
//! A payload is enqueued whole or not at all.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Serialized snapshot shared by every viewer.
pub type Payload = Arc<str>;

/// Identifies one connected viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(u64);

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Viewers whose queue accepted the payload.
    pub delivered: usize,
    /// Viewers whose queue was full.
    pub skipped: usize,
    /// Viewers removed during this broadcast.
    pub evicted: usize,
}

struct Viewer {
    tx: mpsc::Sender<Payload>,
    consecutive_skips: u32,
}

/// The set of connected viewers.
pub struct ViewerSet {
    viewers: HashMap<ViewerId, Viewer>,
    next_id: u64,
    buffer: usize,
    max_skipped: u32,
    latest: Option<Payload>,
    closed: bool,
}

impl ViewerSet {
    /// Create an empty set.
    ///
    /// - `buffer`: queue depth per viewer (min 1).
    /// - `max_skipped`: consecutive skips before eviction (min 1).
    pub fn new(buffer: usize, max_skipped: u32) -> Self {
        Self {
            viewers: HashMap::new(),
            next_id: 0,
            buffer: buffer.max(1),
            max_skipped: max_skipped.max(1),
            latest: None,
            closed: false,
        }
    }

    /// Add a viewer. The latest payload, if any, is queued immediately.
    ///
    /// Returns `None` once the set has been closed.
    pub fn register(&mut self) -> Option<(ViewerId, mpsc::Receiver<Payload>)> {
        if self.closed {
            return None;
        }
        let id = ViewerId(self.next_id);
        self.next_id += 1;

        let (tx, rx) = mpsc::channel(self.buffer);
        if let Some(latest) = &self.latest {
            // Fresh queue with capacity >= 1 cannot be full.
            let _ = tx.try_send(Arc::clone(latest));
        }
        self.viewers.insert(
            id,
            Viewer {
                tx,
                consecutive_skips: 0,
            },
        );
        debug!(%id, viewers = self.viewers.len(), "viewer registered");
        Some((id, rx))
    }

    /// Remove a viewer. Returns whether it was present.
    pub fn remove(&mut self, id: ViewerId) -> bool {
        let removed = self.viewers.remove(&id).is_some();
        if removed {
            debug!(%id, viewers = self.viewers.len(), "viewer removed");
        }
        removed
    }

    /// Offer `payload` to every viewer and retain it as the latest.
    pub fn broadcast(&mut self, payload: Payload) -> PublishReport {
        let mut report = PublishReport::default();
        let mut evict = Vec::new();

        for (&id, viewer) in self.viewers.iter_mut() {
            match viewer.tx.try_send(Arc::clone(&payload)) {
                Ok(()) => {
                    viewer.consecutive_skips = 0;
                    report.delivered += 1;
                }
                Err(TrySendError::Full(_)) => {
                    viewer.consecutive_skips += 1;
                    report.skipped += 1;
                    if viewer.consecutive_skips >= self.max_skipped {
                        warn!(%id, skips = viewer.consecutive_skips, "evicting slow viewer");
                        evict.push(id);
                    }
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%id, "viewer queue closed");
                    evict.push(id);
                }
            }
        }

        for id in evict {
            self.viewers.remove(&id);
            report.evicted += 1;
        }
        self.latest = Some(payload);
        report
    }

    /// Drop every viewer queue and refuse new registrations.
    ///
    /// Connection tasks observe their queue closing and shut the socket.
    pub fn close(&mut self) {
        self.closed = true;
        self.viewers.clear();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The most recently broadcast payload.
    pub fn latest(&self) -> Option<Payload> {
        self.latest.clone()
    }

    /// Number of connected viewers.
    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    /// Whether no viewer is connected.
    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(s: &str) -> Payload {
        Arc::from(s)
    }

    #[test]
    fn broadcast_reaches_every_viewer() {
        let mut set = ViewerSet::new(2, 3);
        let (_, mut a) = set.register().unwrap();
        let (_, mut b) = set.register().unwrap();

        let report = set.broadcast(payload("one"));
        assert_eq!(report, PublishReport { delivered: 2, skipped: 0, evicted: 0 });
        assert_eq!(&*a.try_recv().unwrap(), "one");
        assert_eq!(&*b.try_recv().unwrap(), "one");
    }

    #[test]
    fn new_viewer_receives_latest() {
        let mut set = ViewerSet::new(1, 3);
        set.broadcast(payload("first"));
        set.broadcast(payload("second"));
        let (_, mut rx) = set.register().unwrap();
        assert_eq!(&*rx.try_recv().unwrap(), "second");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn slow_viewer_skips_then_is_evicted() {
        let mut set = ViewerSet::new(1, 2);
        let (_, _slow) = set.register().unwrap();
        let (_, mut fast) = set.register().unwrap();

        let r1 = set.broadcast(payload("1"));
        assert_eq!(r1.delivered, 2);
        fast.try_recv().unwrap();

        let r2 = set.broadcast(payload("2"));
        assert_eq!((r2.delivered, r2.skipped, r2.evicted), (1, 1, 0));
        fast.try_recv().unwrap();

        let r3 = set.broadcast(payload("3"));
        assert_eq!((r3.delivered, r3.skipped, r3.evicted), (1, 1, 1));
        assert_eq!(set.len(), 1);
        assert_eq!(&*fast.try_recv().unwrap(), "3");
    }

    #[test]
    fn draining_resets_skip_count() {
        let mut set = ViewerSet::new(1, 2);
        let (_, mut rx) = set.register().unwrap();
        set.broadcast(payload("1"));
        set.broadcast(payload("2")); // skipped
        rx.try_recv().unwrap();
        set.broadcast(payload("3")); // delivered, resets
        rx.try_recv().unwrap();
        set.broadcast(payload("4"));
        set.broadcast(payload("5")); // one skip only
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn dropped_receiver_is_evicted_immediately() {
        let mut set = ViewerSet::new(4, 10);
        let (_, gone) = set.register().unwrap();
        let (_, mut stays) = set.register().unwrap();
        drop(gone);

        let report = set.broadcast(payload("x"));
        assert_eq!(report, PublishReport { delivered: 1, skipped: 0, evicted: 1 });
        assert_eq!(&*stays.try_recv().unwrap(), "x");
    }

    #[test]
    fn close_drops_queues_and_refuses_registration() {
        let mut set = ViewerSet::new(4, 10);
        let (_, mut rx) = set.register().unwrap();
        set.close();
        assert!(set.is_closed());
        assert!(set.is_empty());
        assert!(set.register().is_none());
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
