//! Error types for the wifi-radar-wifiscan crate.

use thiserror::Error;

/// Errors that can occur while acquiring or decoding access-point scans.
#[derive(Debug, Clone, Error)]
pub enum WifiScanError {
    /// Failed to parse a MAC address string (expected `aa:bb:cc:dd:ee:ff`).
    #[error("failed to parse MAC address from '{input}': expected aa:bb:cc:dd:ee:ff")]
    MacParseFailed {
        /// The input string that could not be parsed.
        input: String,
    },

    /// The scan backend returned an error.
    #[error("WiFi scan failed: {reason}")]
    ScanFailed {
        /// Human-readable description of what went wrong.
        reason: String,
    },

    /// The requested scan backend is not available on this platform.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Failed to execute the scan subprocess.
    #[error("scan process error: {0}")]
    ProcessError(String),

    /// Failed to parse scan output.
    #[error("scan output parse error: {0}")]
    ParseError(String),
}

/// Convenience alias used by the scan port and adapters.
pub type ScanResult<T> = Result<T, WifiScanError>;
