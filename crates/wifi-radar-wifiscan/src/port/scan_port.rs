//! The primary port (driving side) for WiFi scanning.

use crate::domain::bssid::BssidObservation;
use crate::error::ScanResult;

/// Port that abstracts the platform WiFi scanning backend.
///
/// Implementations include:
/// - [`crate::adapter::LinuxIwScanner`] -- `iw dev <iface> scan`.
/// - [`crate::adapter::MacosCoreWlanScanner`] -- CoreWLAN helper binary.
/// - [`crate::adapter::SyntheticScanner`] -- seeded demo generator.
///
/// `scan` may block (live adapters spawn a subprocess); async callers run it
/// on a blocking thread.
pub trait WlanScanPort: Send + Sync {
    /// Perform a scan and return all currently visible BSSIDs.
    fn scan(&self) -> ScanResult<Vec<BssidObservation>>;

    /// Short backend name used in logs and the health endpoint.
    fn name(&self) -> &'static str;
}
