//! Runtime configuration for the radar engine and server.
//!
//! [`RadarConfig`] is loaded from an optional JSON file (every field has a
//! default, so partial files are fine), then overridden by CLI flags, then
//! checked with [`RadarConfig::validate`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wifi_radar_wifiscan::{CorrelationEngine, HistoryStore, LayoutConfig, NetworkRegistry};

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced when loading or validating a [`RadarConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A configuration file could not be read from disk.
    #[error("Cannot read config file `{path}`: {source}")]
    FileRead {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file contains malformed JSON.
    #[error("Cannot parse config file `{path}`: {source}")]
    ParseError {
        /// Path that was being parsed.
        path: PathBuf,
        /// Underlying JSON parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Construct a [`ConfigError::InvalidValue`].
    pub fn invalid_value<S: Into<String>>(field: &'static str, reason: S) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Scan driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Milliseconds between scan cycles.
    pub period_ms: u64,
    /// Seed for the synthetic scanner and layout spawn positions.
    pub seed: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            period_ms: 4_000,
            seed: 0x5eed,
        }
    }
}

impl ScanConfig {
    /// The scan period as a [`Duration`].
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// History and registry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Samples retained per network.
    pub window: usize,
    /// Consecutive non-empty cycles without a sighting before a network is
    /// dropped.
    pub stale_after_cycles: u32,
    /// Upper bound on tracked networks.
    pub max_networks: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window: HistoryStore::DEFAULT_WINDOW,
            stale_after_cycles: NetworkRegistry::DEFAULT_STALE_AFTER_CYCLES,
            max_networks: NetworkRegistry::DEFAULT_MAX_NETWORKS,
        }
    }
}

/// Correlation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Shared cycles required before a pair's correlation is defined.
    pub min_overlap: usize,
    /// Pairs with `|r|` at or above this become snapshot edges.
    pub edge_threshold: f64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            min_overlap: CorrelationEngine::DEFAULT_MIN_OVERLAP,
            edge_threshold: 0.5,
        }
    }
}

/// Viewer fan-out settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Outbound queue depth per viewer, in snapshots.
    pub viewer_buffer: usize,
    /// Consecutive skipped snapshots before a viewer is evicted.
    pub max_skipped: u32,
    /// Upper bound on a single WebSocket send.
    pub send_timeout_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            viewer_buffer: 4,
            max_skipped: 8,
            send_timeout_ms: 2_000,
        }
    }
}

impl PublishConfig {
    /// The send timeout as a [`Duration`].
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// RadarConfig
// ---------------------------------------------------------------------------

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    /// Scan driver.
    pub scan: ScanConfig,
    /// History and registry.
    pub history: HistoryConfig,
    /// Correlation.
    pub correlation: CorrelationConfig,
    /// Layout simulation.
    pub layout: LayoutConfig,
    /// Viewer fan-out.
    pub publish: PublishConfig,
}

impl RadarConfig {
    /// Load a [`RadarConfig`] from a JSON file at `path`.
    ///
    /// The result is not validated; call [`validate`](Self::validate) after
    /// applying any overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the file cannot be read and
    /// [`ConfigError::ParseError`] if the JSON is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate all fields and return the first problem found.
    ///
    /// # Validated invariants
    ///
    /// - `period_ms`, `window`, `max_networks`, `viewer_buffer`,
    ///   `max_skipped` and `send_timeout_ms` must be non-zero.
    /// - `min_overlap` must be at least 2 and at most `window`.
    /// - `edge_threshold` and `attraction_threshold` must lie in `[0, 1]`.
    /// - `damping` must lie in `(0, 1]`; `dt` must be positive.
    /// - Force constants and lengths must be finite and non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.period_ms == 0 {
            return Err(ConfigError::invalid_value("scan.period_ms", "must be > 0"));
        }

        let history = &self.history;
        if history.window == 0 {
            return Err(ConfigError::invalid_value("history.window", "must be > 0"));
        }
        if history.stale_after_cycles == 0 {
            return Err(ConfigError::invalid_value(
                "history.stale_after_cycles",
                "must be > 0",
            ));
        }
        if history.max_networks == 0 {
            return Err(ConfigError::invalid_value("history.max_networks", "must be > 0"));
        }

        let corr = &self.correlation;
        if corr.min_overlap < 2 {
            return Err(ConfigError::invalid_value(
                "correlation.min_overlap",
                "must be >= 2",
            ));
        }
        if corr.min_overlap > history.window {
            return Err(ConfigError::invalid_value(
                "correlation.min_overlap",
                format!("must not exceed history.window ({})", history.window),
            ));
        }
        check_unit("correlation.edge_threshold", corr.edge_threshold)?;

        let layout = &self.layout;
        check_unit("layout.attraction_threshold", layout.attraction_threshold)?;
        if !(layout.damping > 0.0 && layout.damping <= 1.0) {
            return Err(ConfigError::invalid_value("layout.damping", "must be in (0, 1]"));
        }
        if !(layout.dt > 0.0 && layout.dt.is_finite()) {
            return Err(ConfigError::invalid_value("layout.dt", "must be > 0"));
        }
        for (field, value) in [
            ("layout.repulsion", layout.repulsion),
            ("layout.softening", layout.softening),
            ("layout.min_distance", layout.min_distance),
            ("layout.attraction", layout.attraction),
            ("layout.near_length", layout.near_length),
            ("layout.near_span", layout.near_span),
            ("layout.separation", layout.separation),
            ("layout.far_length", layout.far_length),
            ("layout.far_span", layout.far_span),
            ("layout.centering", layout.centering),
            ("layout.max_force", layout.max_force),
            ("layout.max_speed", layout.max_speed),
            ("layout.bound_radius", layout.bound_radius),
            ("layout.spawn_radius", layout.spawn_radius),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid_value(field, "must be finite and >= 0"));
            }
        }
        if layout.spawn_radius > layout.bound_radius {
            return Err(ConfigError::invalid_value(
                "layout.spawn_radius",
                "must not exceed layout.bound_radius",
            ));
        }

        let publish = &self.publish;
        if publish.viewer_buffer == 0 {
            return Err(ConfigError::invalid_value("publish.viewer_buffer", "must be > 0"));
        }
        if publish.max_skipped == 0 {
            return Err(ConfigError::invalid_value("publish.max_skipped", "must be > 0"));
        }
        if publish.send_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "publish.send_timeout_ms",
                "must be > 0",
            ));
        }
        Ok(())
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid_value(field, "must be in [0, 1]"))
    }
}
