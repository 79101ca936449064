//! # wifi-radar-wifiscan
//!
//! Domain layer for WiFi Radar: access-point acquisition, per-network RSSI
//! history, cross-network correlation and the force-directed 3D layout.
//!
//! This crate provides:
//!
//! - **Domain types**: [`BssidId`], [`BssidObservation`], [`BandType`],
//!   [`HistoryStore`], [`NetworkRegistry`]
//! - **Port**: [`WlanScanPort`] -- trait abstracting the platform scan backend
//! - **Adapters**: [`LinuxIwScanner`], [`MacosCoreWlanScanner`] and the seeded
//!   [`SyntheticScanner`]
//! - **Pipeline**: [`CorrelationEngine`] and [`LayoutSimulator`]

pub mod adapter;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod port;

// Re-export key types at the crate root for convenience.
pub use adapter::{
    parse_iw_scan_output, parse_macos_scan_output, platform_scanner, scanner_for_os,
    LinuxIwScanner, LiveScanOptions, MacosCoreWlanScanner, SyntheticScanner,
};
pub use domain::bssid::{BandType, BssidId, BssidObservation};
pub use domain::history::{HistoryStore, Sample, SignalHistory};
pub use domain::registry::{CycleChanges, Network, NetworkRegistry};
pub use error::{ScanResult, WifiScanError};
pub use pipeline::{
    pearson_r, CorrelationEngine, CorrelationMatrix, LayoutConfig, LayoutSimulator, LayoutStats,
    NodeState,
};
pub use port::WlanScanPort;
