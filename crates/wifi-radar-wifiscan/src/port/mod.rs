//! Port definitions for access-point acquisition.
//!
//! Hexagonal-architecture port that abstracts the scan backend so the live
//! adapters, the synthetic generator and test doubles can be swapped
//! transparently.

mod scan_port;

pub use scan_port::WlanScanPort;
