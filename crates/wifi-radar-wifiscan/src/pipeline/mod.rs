//! Signal pipeline: cross-network correlation and the 3D layout it drives.
//!
//! ## Stages
//!
//! 1. [`correlator`] -- pairwise Pearson correlation over aligned RSSI histories
//! 2. [`layout`] -- force-directed placement from the correlation matrix

pub mod correlator;
pub mod layout;

pub use correlator::{pearson_r, CorrelationEngine, CorrelationMatrix};
pub use layout::{LayoutConfig, LayoutSimulator, LayoutStats, NodeState};
