//! Adapter implementations for the [`WlanScanPort`](crate::port::WlanScanPort) port.
//!
//! - [`LinuxIwScanner`]: parses `iw dev <iface> scan` output (Linux).
//! - [`MacosCoreWlanScanner`]: CoreWLAN via a Swift helper binary (macOS).
//! - [`SyntheticScanner`]: seeded demo data, works everywhere.

use std::sync::Arc;

use crate::error::{ScanResult, WifiScanError};
use crate::port::WlanScanPort;

pub mod linux_scanner;
pub mod macos_scanner;
pub mod synthetic;

pub use linux_scanner::{parse_iw_scan_output, LinuxIwScanner};
pub use macos_scanner::{parse_macos_scan_output, MacosCoreWlanScanner};
pub use synthetic::SyntheticScanner;

/// Settings for the live scan backends.
#[derive(Debug, Clone)]
pub struct LiveScanOptions {
    /// Wireless interface for `iw`.
    pub interface: String,
    /// Read cached results with `iw ... scan dump`.
    pub cached: bool,
    /// Path to the macOS CoreWLAN helper binary.
    pub helper: String,
}

impl Default for LiveScanOptions {
    fn default() -> Self {
        Self {
            interface: "wlan0".into(),
            cached: false,
            helper: "mac_wifi".into(),
        }
    }
}

/// The live scanner for the platform this binary runs on.
///
/// Returns [`WifiScanError::Unsupported`] when the platform has no live
/// backend.
pub fn platform_scanner(options: &LiveScanOptions) -> ScanResult<Arc<dyn WlanScanPort>> {
    scanner_for_os(std::env::consts::OS, options)
}

/// The live scanner for `os` (a `std::env::consts::OS` value).
pub fn scanner_for_os(os: &str, options: &LiveScanOptions) -> ScanResult<Arc<dyn WlanScanPort>> {
    match os {
        "linux" => {
            let scanner = LinuxIwScanner::with_interface(options.interface.clone());
            Ok(Arc::new(if options.cached {
                scanner.use_cached()
            } else {
                scanner
            }))
        }
        "macos" => Ok(Arc::new(MacosCoreWlanScanner::with_path(
            options.helper.clone(),
        ))),
        other => Err(WifiScanError::Unsupported(format!(
            "no live WiFi scanner for {other}"
        ))),
    }
}
