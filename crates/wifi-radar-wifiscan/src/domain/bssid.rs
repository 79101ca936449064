//! Core value objects for access-point identification and observation.

use std::fmt;
use std::time::Instant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WifiScanError;

// ---------------------------------------------------------------------------
// BssidId -- Value Object
// ---------------------------------------------------------------------------

/// A unique BSSID identifier wrapping a 6-byte IEEE 802.11 MAC address.
///
/// This is the stable identity of a network across scan cycles. Two
/// `BssidId` values are equal when their MAC bytes match. Ordering follows
/// the byte order, which gives the correlation matrix and snapshots a
/// deterministic node order.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BssidId(pub [u8; 6]);

impl BssidId {
    /// Parse a `BssidId` from a colon-separated hex string such as
    /// `"aa:bb:cc:dd:ee:ff"`. Dashes are accepted as separators too.
    pub fn parse(s: &str) -> Result<Self, WifiScanError> {
        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(WifiScanError::MacParseFailed {
                input: s.to_owned(),
            });
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(WifiScanError::MacParseFailed {
                    input: s.to_owned(),
                });
            }
            bytes[i] = u8::from_str_radix(part, 16).map_err(|_| WifiScanError::MacParseFailed {
                input: s.to_owned(),
            })?;
        }
        Ok(Self(bytes))
    }

    /// Derive a deterministic, locally-administered identifier from an SSID
    /// and channel.
    ///
    /// Used when the platform redacts the real BSSID (macOS without location
    /// permission reports `00:00:00:00:00:00`). FNV-1a 64-bit over the SSID
    /// bytes followed by the channel; the locally-administered bit is set and
    /// the multicast bit cleared so the result never collides with a vendor
    /// OUI.
    pub fn synthetic(ssid: &str, channel: u8) -> Self {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for &byte in ssid.as_bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        hash ^= u64::from(channel);
        hash = hash.wrapping_mul(0x0100_0000_01b3);

        let bytes = hash.to_le_bytes();
        let mut mac = [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]];
        mac[0] = (mac[0] | 0x02) & 0xFE;
        Self(mac)
    }

    /// Whether this is the all-zero placeholder some platforms report.
    pub fn is_redacted(&self) -> bool {
        self.0 == [0; 6]
    }

    /// Return the raw 6-byte MAC address.
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Debug for BssidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BssidId({self})")
    }
}

impl fmt::Display for BssidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

#[cfg(feature = "serde")]
impl Serialize for BssidId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for BssidId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// BandType -- Value Object
// ---------------------------------------------------------------------------

/// The WiFi frequency band on which a BSSID operates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BandType {
    /// 2.4 GHz (channels 1-14)
    #[cfg_attr(feature = "serde", serde(rename = "2.4GHz"))]
    Band2_4GHz,
    /// 5 GHz (channels 32-177)
    #[cfg_attr(feature = "serde", serde(rename = "5GHz"))]
    Band5GHz,
    /// 6 GHz (Wi-Fi 6E / 7)
    #[cfg_attr(feature = "serde", serde(rename = "6GHz"))]
    Band6GHz,
}

impl BandType {
    /// Infer the band from an 802.11 channel number.
    ///
    /// Channel numbers alone cannot distinguish 6 GHz channels from the low
    /// 2.4 GHz ones; prefer [`BandType::from_frequency_mhz`] when the scan
    /// reports a frequency.
    pub fn from_channel(channel: u8) -> Self {
        match channel {
            0..=14 => Self::Band2_4GHz,
            _ => Self::Band5GHz,
        }
    }

    /// Infer the band from a centre frequency in MHz.
    pub fn from_frequency_mhz(freq_mhz: u32) -> Self {
        match freq_mhz {
            0..=2500 => Self::Band2_4GHz,
            5925.. => Self::Band6GHz,
            _ => Self::Band5GHz,
        }
    }
}

impl fmt::Display for BandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Band2_4GHz => write!(f, "2.4GHz"),
            Self::Band5GHz => write!(f, "5GHz"),
            Self::Band6GHz => write!(f, "6GHz"),
        }
    }
}

// ---------------------------------------------------------------------------
// BssidObservation -- Value Object
// ---------------------------------------------------------------------------

/// A single observation of a BSSID from a WiFi scan.
///
/// This is the fundamental measurement unit: one access point observed once
/// during one scan cycle.
#[derive(Clone, Debug)]
pub struct BssidObservation {
    /// The MAC address of the observed access point.
    pub bssid: BssidId,
    /// The SSID (network name). May be empty for hidden networks.
    pub ssid: String,
    /// Received signal strength in dBm (typically -30 to -90).
    pub rssi_dbm: i32,
    /// The 802.11 channel number.
    pub channel: u8,
    /// The frequency band.
    pub band: BandType,
    /// When this observation was captured.
    pub timestamp: Instant,
}

impl BssidObservation {
    /// Build an observation, deriving the band from the channel number.
    pub fn new(bssid: BssidId, ssid: impl Into<String>, channel: u8, rssi_dbm: i32) -> Self {
        Self {
            bssid,
            ssid: ssid.into(),
            rssi_dbm,
            channel,
            band: BandType::from_channel(channel),
            timestamp: Instant::now(),
        }
    }

    /// The name shown to viewers: the SSID, or `Ch<channel>` when hidden.
    pub fn display_name(&self) -> String {
        if self.ssid.is_empty() {
            format!("Ch{}", self.channel)
        } else {
            self.ssid.clone()
        }
    }

    /// Round a fractional dBm reading to the integer scale used throughout.
    #[allow(clippy::cast_possible_truncation)]
    pub fn dbm_from_f64(value: f64) -> i32 {
        value.round() as i32
    }
}
