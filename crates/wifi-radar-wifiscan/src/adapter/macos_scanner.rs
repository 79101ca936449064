//! Adapter that scans access points on macOS through a CoreWLAN helper.
//!
//! CoreWLAN has no stable C ABI, so the scan runs in a small Swift helper
//! (`mac_wifi --scan-once`) that prints one JSON object per network:
//!
//! ```json
//! {"ssid":"MyNetwork","bssid":"aa:bb:cc:dd:ee:ff","rssi":-52,"channel":36}
//! ```
//!
//! Without Location Services permission macOS redacts the BSSID (missing or
//! all zeros). Those networks get a synthetic identifier derived from SSID
//! and channel, see [`BssidId::synthetic`].

use std::process::Command;
use std::time::Instant;

use serde_json::Value;

use crate::domain::bssid::{BandType, BssidId, BssidObservation};
use crate::error::{ScanResult, WifiScanError};
use crate::port::WlanScanPort;

/// Synchronous WiFi scanner that shells out to the `mac_wifi` helper.
pub struct MacosCoreWlanScanner {
    helper_path: String,
}

impl MacosCoreWlanScanner {
    /// Create a scanner that looks for `mac_wifi` on `$PATH`.
    pub fn new() -> Self {
        Self::with_path("mac_wifi")
    }

    /// Create a scanner with an explicit path to the helper binary.
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            helper_path: path.into(),
        }
    }

    /// Run the helper and parse its output.
    pub fn scan_sync(&self) -> ScanResult<Vec<BssidObservation>> {
        let output = Command::new(&self.helper_path)
            .arg("--scan-once")
            .output()
            .map_err(|e| {
                WifiScanError::ProcessError(format!(
                    "failed to run mac_wifi helper ({}): {e}",
                    self.helper_path
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WifiScanError::ScanFailed {
                reason: format!("mac_wifi exited with {}: {}", output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_macos_scan_output(&stdout)
    }
}

impl Default for MacosCoreWlanScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl WlanScanPort for MacosCoreWlanScanner {
    fn scan(&self) -> ScanResult<Vec<BssidObservation>> {
        self.scan_sync()
    }

    fn name(&self) -> &'static str {
        "macos-corewlan"
    }
}

/// Parse the JSON-lines output of the helper.
///
/// Non-JSON lines (status messages) are skipped. Returns a
/// [`WifiScanError::ParseError`] only when the output contained JSON lines
/// and none of them described a usable network.
pub fn parse_macos_scan_output(output: &str) -> ScanResult<Vec<BssidObservation>> {
    let now = Instant::now();
    let mut results = Vec::new();
    let mut json_lines = 0usize;

    for line in output.lines().map(str::trim) {
        if !line.starts_with('{') {
            continue;
        }
        json_lines += 1;
        match serde_json::from_str::<Value>(line) {
            Ok(value) => {
                if let Some(obs) = observation_from_json(&value, now) {
                    results.push(obs);
                }
            }
            Err(e) => tracing::debug!(error = %e, "skipping malformed helper line"),
        }
    }

    if json_lines > 0 && results.is_empty() {
        return Err(WifiScanError::ParseError(format!(
            "{json_lines} helper lines contained no usable network"
        )));
    }
    Ok(results)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn observation_from_json(value: &Value, timestamp: Instant) -> Option<BssidObservation> {
    let rssi = value.get("rssi")?.as_f64()?;
    let channel = value.get("channel")?.as_f64()?.clamp(0.0, 255.0) as u8;
    let ssid = value
        .get("ssid")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    let bssid = value
        .get("bssid")
        .and_then(Value::as_str)
        .and_then(|s| BssidId::parse(s).ok())
        .filter(|id| !id.is_redacted())
        .unwrap_or_else(|| BssidId::synthetic(&ssid, channel));

    let band = match value.get("band").and_then(Value::as_str) {
        Some("6GHz") => BandType::Band6GHz,
        Some("5GHz") => BandType::Band5GHz,
        Some("2.4GHz") => BandType::Band2_4GHz,
        _ => BandType::from_channel(channel),
    };

    Some(BssidObservation {
        bssid,
        ssid,
        rssi_dbm: BssidObservation::dbm_from_f64(rssi),
        channel,
        band,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_output() {
        let output = r#"scanning...
{"ssid":"HomeNet","bssid":"aa:bb:cc:dd:ee:01","rssi":-45,"noise":-90,"channel":6,"band":"2.4GHz"}
{"ssid":"HomeNet_5G","bssid":"aa:bb:cc:dd:ee:02","rssi":-52.6,"channel":36}
"#;
        let obs = parse_macos_scan_output(output).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].bssid.to_string(), "aa:bb:cc:dd:ee:01");
        assert_eq!(obs[0].band, BandType::Band2_4GHz);
        assert_eq!(obs[1].rssi_dbm, -53);
        assert_eq!(obs[1].band, BandType::Band5GHz);
    }

    #[test]
    fn redacted_bssid_gets_synthetic_identity() {
        let output = r#"{"ssid":"Cafe","bssid":"00:00:00:00:00:00","rssi":-70,"channel":11}
{"ssid":"Cafe","rssi":-71,"channel":11}"#;
        let obs = parse_macos_scan_output(output).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].bssid, BssidId::synthetic("Cafe", 11));
        assert_eq!(obs[0].bssid, obs[1].bssid);
    }

    #[test]
    fn junk_lines_are_skipped() {
        assert!(parse_macos_scan_output("").unwrap().is_empty());
        assert!(parse_macos_scan_output("status: ok\n").unwrap().is_empty());
    }

    #[test]
    fn json_without_usable_network_is_error() {
        let err = parse_macos_scan_output("{\"ssid\":\"x\"}\n{broken").unwrap_err();
        assert!(matches!(err, WifiScanError::ParseError(_)));
    }
}
