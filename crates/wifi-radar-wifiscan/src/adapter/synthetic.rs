//! Seeded synthetic access-point generator for demo mode and tests.
//!
//! Ten access points in three correlated clusters plus three independent
//! ones. Members of a cluster share a slow sinusoidal drift, so their RSSI
//! histories correlate strongly; independent APs carry only Gaussian noise.
//! Time advances by a fixed virtual step per scan so runs are reproducible
//! for a given seed.

use std::time::Instant;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::domain::bssid::{BssidId, BssidObservation};
use crate::error::ScanResult;
use crate::port::WlanScanPort;

/// Shared drift driving one cluster of access points.
#[derive(Debug, Clone, Copy)]
enum Drift {
    /// `sin(t * 0.5) * 5`
    Home,
    /// `sin(t * 0.3) * 8`
    Neighbor,
    /// `cos(t * 0.7) * 4`
    Office,
    /// No shared component.
    None,
}

impl Drift {
    fn at(self, t: f64) -> f64 {
        match self {
            Self::Home => (t * 0.5).sin() * 5.0,
            Self::Neighbor => (t * 0.3).sin() * 8.0,
            Self::Office => (t * 0.7).cos() * 4.0,
            Self::None => 0.0,
        }
    }
}

/// One simulated access point.
#[derive(Debug, Clone)]
struct SimulatedAp {
    bssid: BssidId,
    ssid: &'static str,
    channel: u8,
    base_dbm: f64,
    drift: Drift,
    noise_sigma: f64,
}

fn ap(
    mac: [u8; 6],
    ssid: &'static str,
    channel: u8,
    base_dbm: f64,
    drift: Drift,
    noise_sigma: f64,
) -> SimulatedAp {
    SimulatedAp {
        bssid: BssidId(mac),
        ssid,
        channel,
        base_dbm,
        drift,
        noise_sigma,
    }
}

fn default_access_points() -> Vec<SimulatedAp> {
    vec![
        ap([0xaa, 0xbb, 0xcc, 0, 0, 1], "HomeNet", 6, -45.0, Drift::Home, 1.5),
        ap([0xaa, 0xbb, 0xcc, 0, 0, 2], "HomeNet_5G", 36, -50.0, Drift::Home, 1.5),
        ap([0xaa, 0xbb, 0xcc, 0, 0, 3], "HomeNet_6E", 149, -55.0, Drift::Home, 1.5),
        ap([0xdd, 0xee, 0xff, 0, 0, 1], "Neighbor", 1, -65.0, Drift::Neighbor, 1.0),
        ap([0xdd, 0xee, 0xff, 0, 0, 2], "Neighbor_5G", 44, -70.0, Drift::Neighbor, 1.0),
        ap([0x77, 0x88, 0x99, 0, 0, 1], "Office", 6, -60.0, Drift::Office, 2.0),
        ap([0x77, 0x88, 0x99, 0, 0, 2], "Office_5G", 48, -58.0, Drift::Office, 2.0),
        ap([0x11, 0x22, 0x33, 0, 0, 1], "CoffeeShop", 11, -75.0, Drift::None, 4.0),
        ap([0x44, 0x55, 0x66, 0, 0, 1], "FreeWiFi", 6, -80.0, Drift::None, 3.0),
        ap([0x55, 0x66, 0x77, 0, 0, 1], "Guest", 3, -72.0, Drift::None, 5.0),
    ]
}

struct GeneratorState {
    rng: StdRng,
    scans: u64,
}

/// Synthetic scan backend.
pub struct SyntheticScanner {
    access_points: Vec<SimulatedAp>,
    step_secs: f64,
    state: Mutex<GeneratorState>,
}

impl SyntheticScanner {
    /// Weakest RSSI the generator emits.
    pub const MIN_DBM: i32 = -95;
    /// Strongest RSSI the generator emits.
    pub const MAX_DBM: i32 = -20;

    /// Create a generator with the given RNG seed and virtual time step
    /// (seconds of simulated time per scan).
    pub fn new(seed: u64, step_secs: f64) -> Self {
        Self {
            access_points: default_access_points(),
            step_secs,
            state: Mutex::new(GeneratorState {
                rng: StdRng::seed_from_u64(seed),
                scans: 0,
            }),
        }
    }

    /// Number of simulated access points.
    pub fn access_point_count(&self) -> usize {
        self.access_points.len()
    }

    /// Produce the next synthetic scan.
    pub fn next_scan(&self) -> Vec<BssidObservation> {
        let mut state = self.state.lock();
        state.scans += 1;
        let t = state.scans as f64 * self.step_secs;
        let now = Instant::now();

        self.access_points
            .iter()
            .map(|ap| {
                let noise = Normal::new(0.0, ap.noise_sigma)
                    .map(|n| n.sample(&mut state.rng))
                    .unwrap_or(0.0);
                let rssi = BssidObservation::dbm_from_f64(ap.base_dbm + ap.drift.at(t) + noise)
                    .clamp(Self::MIN_DBM, Self::MAX_DBM);
                let mut obs = BssidObservation::new(ap.bssid, ap.ssid, ap.channel, rssi);
                obs.timestamp = now;
                obs
            })
            .collect()
    }
}

impl Default for SyntheticScanner {
    fn default() -> Self {
        Self::new(0x5eed, 4.0)
    }
}

impl WlanScanPort for SyntheticScanner {
    fn scan(&self) -> ScanResult<Vec<BssidObservation>> {
        Ok(self.next_scan())
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}
