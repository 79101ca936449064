//! WiFi Radar server library.
//!
//! Wires the `wifi-radar-wifiscan` pipeline into a periodic driver and a
//! WebSocket fan-out. The binary in `main.rs` adds CLI parsing, logging and
//! scan backend selection on top of these modules.

pub mod config;
pub mod driver;
pub mod engine;
pub mod publisher;
pub mod server;
pub mod snapshot;
pub mod viewers;

pub use config::{ConfigError, RadarConfig};
pub use driver::{RadarStatus, ScanDriver, SharedStatus, MIN_PERIOD};
pub use engine::{CycleOutcome, RadarEngine};
pub use publisher::SnapshotPublisher;
pub use server::{connection_tracker, router, serve, AppState, ConnectionDrain, ConnectionTracker};
pub use snapshot::{build_snapshot, EdgeView, NetworkView, Snapshot};
pub use viewers::{Payload, PublishReport, ViewerId, ViewerSet};
