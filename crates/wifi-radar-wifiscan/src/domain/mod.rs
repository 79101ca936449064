//! Domain types: access-point identity, observations, histories and the
//! network registry.

pub mod bssid;
pub mod history;
pub mod registry;

pub use bssid::{BandType, BssidId, BssidObservation};
pub use history::{HistoryStore, Sample, SignalHistory};
pub use registry::{CycleChanges, Network, NetworkRegistry};
