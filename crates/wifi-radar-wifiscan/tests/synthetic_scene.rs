//! Synthetic scans through registry, correlation and layout.

use wifi_radar_wifiscan::{
    BssidId, CorrelationEngine, LayoutConfig, LayoutSimulator, NetworkRegistry, SyntheticScanner,
    WlanScanPort,
};

const HOME: BssidId = BssidId([0xaa, 0xbb, 0xcc, 0, 0, 1]);
const HOME_5G: BssidId = BssidId([0xaa, 0xbb, 0xcc, 0, 0, 2]);
const NEIGHBOR: BssidId = BssidId([0xdd, 0xee, 0xff, 0, 0, 1]);
const NEIGHBOR_5G: BssidId = BssidId([0xdd, 0xee, 0xff, 0, 0, 2]);

fn distance(layout: &LayoutSimulator, a: &BssidId, b: &BssidId) -> f64 {
    let (pa, pb) = (layout.position(a).unwrap(), layout.position(b).unwrap());
    pa.iter()
        .zip(pb)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[test]
fn drift_clusters_are_recovered() {
    let scanner = SyntheticScanner::new(42, 4.0);
    let mut registry = NetworkRegistry::default();
    let engine = CorrelationEngine::default();
    let mut layout = LayoutSimulator::new(LayoutConfig::default(), 42);

    for _ in 0..30 {
        let observations = scanner.scan().unwrap();
        registry.observe_cycle(&observations).unwrap();
        let matrix = engine.compute(registry.history());
        layout.sync(&registry.ids());
        layout.step_cycle(&matrix);
    }
    let matrix = engine.compute(registry.history());

    assert_eq!(registry.len(), scanner.access_point_count());
    assert_eq!(matrix.ids().len(), registry.len());

    let clusters = matrix.clusters(0.5);
    assert_eq!(clusters[&HOME], clusters[&HOME_5G]);
    assert_eq!(clusters[&NEIGHBOR], clusters[&NEIGHBOR_5G]);
    assert_ne!(clusters[&HOME], clusters[&NEIGHBOR]);

    // Correlated access points sit closer together than unrelated ones.
    assert!(distance(&layout, &HOME, &HOME_5G) < distance(&layout, &HOME, &NEIGHBOR));
    for id in registry.ids() {
        let p = layout.position(&id).unwrap();
        assert!(p.iter().all(|c| c.is_finite()));
    }
}

#[test]
fn history_is_bounded_by_window() {
    let scanner = SyntheticScanner::default();
    let mut registry = NetworkRegistry::new(8, 3, 64);
    for _ in 0..20 {
        registry.observe_cycle(&scanner.next_scan());
    }
    for (_, history) in registry.history().iter() {
        assert_eq!(history.len(), 8);
    }
    assert_eq!(registry.cycle(), 20);
}
