//! Adapter that scans access points on Linux by invoking `iw dev <iface> scan`.
//!
//! `iw dev <iface> scan` triggers a fresh scan and needs `CAP_NET_ADMIN`;
//! `scan dump` only reads the kernel's cached results and usually works
//! without root, at the price of staler data.

use std::process::Command;
use std::time::Instant;

use crate::domain::bssid::{BandType, BssidId, BssidObservation};
use crate::error::{ScanResult, WifiScanError};
use crate::port::WlanScanPort;

/// Synchronous WiFi scanner that shells out to `iw`.
pub struct LinuxIwScanner {
    /// Wireless interface name (e.g. `"wlan0"`, `"wlp2s0"`).
    interface: String,
    /// Read cached results with `scan dump` instead of triggering a scan.
    use_dump: bool,
}

impl LinuxIwScanner {
    /// Create a scanner for the default interface `wlan0`.
    pub fn new() -> Self {
        Self::with_interface("wlan0")
    }

    /// Create a scanner for a specific wireless interface.
    pub fn with_interface(iface: impl Into<String>) -> Self {
        Self {
            interface: iface.into(),
            use_dump: false,
        }
    }

    /// Use `scan dump` instead of `scan` to read cached results without root.
    pub fn use_cached(mut self) -> Self {
        self.use_dump = true;
        self
    }

    /// Run `iw` and parse its output.
    pub fn scan_sync(&self) -> ScanResult<Vec<BssidObservation>> {
        let mut args = vec!["dev", self.interface.as_str(), "scan"];
        if self.use_dump {
            args.push("dump");
        }

        let output = Command::new("iw").args(&args).output().map_err(|e| {
            WifiScanError::ProcessError(format!("failed to run `iw {}`: {e}", args.join(" ")))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WifiScanError::ScanFailed {
                reason: format!("iw exited with {}: {}", output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_iw_scan_output(&stdout)
    }
}

impl Default for LinuxIwScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl WlanScanPort for LinuxIwScanner {
    fn scan(&self) -> ScanResult<Vec<BssidObservation>> {
        self.scan_sync()
    }

    fn name(&self) -> &'static str {
        "linux-iw"
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Fields accumulated while reading one `BSS` stanza.
#[derive(Default)]
struct BssStanza {
    bssid: Option<String>,
    ssid: Option<String>,
    signal_dbm: Option<f64>,
    freq_mhz: Option<u32>,
    channel: Option<u8>,
}

impl BssStanza {
    fn flush(self, timestamp: Instant) -> Option<BssidObservation> {
        let bssid = BssidId::parse(self.bssid.as_deref()?).ok()?;
        // A stanza without a signal line carries nothing to correlate.
        let rssi_dbm = BssidObservation::dbm_from_f64(self.signal_dbm?);

        let channel = self
            .channel
            .or_else(|| self.freq_mhz.map(freq_to_channel))
            .unwrap_or(0);
        let band = self
            .freq_mhz
            .map(BandType::from_frequency_mhz)
            .unwrap_or_else(|| BandType::from_channel(channel));

        Some(BssidObservation {
            bssid,
            ssid: self.ssid.unwrap_or_default(),
            rssi_dbm,
            channel,
            band,
            timestamp,
        })
    }
}

/// Parse the text output of `iw dev <iface> scan [dump]`.
///
/// The output consists of BSS stanzas, each starting at column 0 with
/// `BSS aa:bb:cc:dd:ee:ff(on wlan0)` followed by indented key-value lines.
pub fn parse_iw_scan_output(output: &str) -> ScanResult<Vec<BssidObservation>> {
    let now = Instant::now();
    let mut results = Vec::new();
    let mut current: Option<BssStanza> = None;

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("BSS ") {
            if let Some(obs) = current.take().and_then(|s| s.flush(now)) {
                results.push(obs);
            }

            let mac_end = rest
                .find(|c: char| !c.is_ascii_hexdigit() && c != ':')
                .unwrap_or(rest.len());
            let mac = &rest[..mac_end];
            if mac.len() == 17 {
                current = Some(BssStanza {
                    bssid: Some(mac.to_ascii_lowercase()),
                    ..BssStanza::default()
                });
            }
            continue;
        }

        let Some(stanza) = current.as_mut() else {
            continue;
        };
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("SSID:") {
            stanza.ssid = Some(rest.trim().to_owned());
        } else if let Some(rest) = trimmed.strip_prefix("signal:") {
            stanza.signal_dbm = parse_signal_dbm(rest);
        } else if let Some(rest) = trimmed.strip_prefix("freq:") {
            // Newer iw prints fractional MHz ("freq: 2437.0").
            stanza.freq_mhz = rest
                .trim()
                .split('.')
                .next()
                .and_then(|f| f.parse().ok());
        } else if let Some(rest) = trimmed.strip_prefix("DS Parameter set: channel") {
            stanza.channel = rest.trim().parse().ok();
        } else if let Some(rest) = trimmed.strip_prefix("* primary channel:") {
            stanza.channel = stanza.channel.or_else(|| rest.trim().parse().ok());
        }
    }

    if let Some(obs) = current.take().and_then(|s| s.flush(now)) {
        results.push(obs);
    }

    Ok(results)
}

/// Convert a frequency in MHz to an 802.11 channel number.
fn freq_to_channel(freq_mhz: u32) -> u8 {
    let channel = match freq_mhz {
        2412..=2472 => (freq_mhz - 2407) / 5,
        2484 => 14,
        5170..=5885 => (freq_mhz - 5000) / 5,
        5955..=7115 => (freq_mhz - 5950) / 5,
        _ => 0,
    };
    u8::try_from(channel).unwrap_or(0)
}

/// Parse a signal strength string like "-52.00 dBm" into dBm.
fn parse_signal_dbm(s: &str) -> Option<f64> {
    s.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_IW_OUTPUT: &str = "\
BSS aa:bb:cc:dd:ee:ff(on wlan0)
\tTSF: 123456789 usec
\tfreq: 5180
\tbeacon interval: 100 TUs
\tcapability: ESS Privacy (0x0011)
\tsignal: -52.00 dBm
\tSSID: HomeNetwork
\tDS Parameter set: channel 36
BSS 11:22:33:44:55:66(on wlan0)
\tfreq: 2437.0
\tsignal: -71.00 dBm
\tSSID: GuestWifi
\tDS Parameter set: channel 6
BSS DE:AD:BE:EF:CA:FE(on wlan0) -- associated
\tfreq: 5955
\tsignal: -45.40 dBm
\tSSID: OfficeNet
";

    #[test]
    fn parse_three_bss_stanzas() {
        let obs = parse_iw_scan_output(SAMPLE_IW_OUTPUT).unwrap();
        assert_eq!(obs.len(), 3);

        assert_eq!(obs[0].ssid, "HomeNetwork");
        assert_eq!(obs[0].bssid.to_string(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(obs[0].rssi_dbm, -52);
        assert_eq!(obs[0].channel, 36);
        assert_eq!(obs[0].band, BandType::Band5GHz);

        assert_eq!(obs[1].ssid, "GuestWifi");
        assert_eq!(obs[1].channel, 6);
        assert_eq!(obs[1].band, BandType::Band2_4GHz);

        assert_eq!(obs[2].bssid.to_string(), "de:ad:be:ef:ca:fe");
        assert_eq!(obs[2].rssi_dbm, -45);
        assert_eq!(obs[2].channel, 1);
        assert_eq!(obs[2].band, BandType::Band6GHz);
    }

    #[test]
    fn freq_to_channel_conversion() {
        assert_eq!(freq_to_channel(2412), 1);
        assert_eq!(freq_to_channel(2437), 6);
        assert_eq!(freq_to_channel(2484), 14);
        assert_eq!(freq_to_channel(5180), 36);
        assert_eq!(freq_to_channel(5745), 149);
        assert_eq!(freq_to_channel(5955), 1);
        assert_eq!(freq_to_channel(9999), 0);
    }

    #[test]
    fn parse_signal_dbm_values() {
        assert_eq!(parse_signal_dbm(" -52.00 dBm"), Some(-52.0));
        assert_eq!(parse_signal_dbm("-45.00"), Some(-45.0));
        assert_eq!(parse_signal_dbm(""), None);
    }

    #[test]
    fn empty_output() {
        assert!(parse_iw_scan_output("").unwrap().is_empty());
    }

    #[test]
    fn stanza_without_signal_is_skipped() {
        let output = "\
BSS 11:22:33:44:55:66(on wlan0)
\tfreq: 2437
\tSSID: NoSignal
BSS 11:22:33:44:55:67(on wlan0)
\tfreq: 2437
\tsignal: -60.00 dBm
";
        let obs = parse_iw_scan_output(output).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].ssid, "");
        assert_eq!(obs[0].display_name(), "Ch6");
    }
}
