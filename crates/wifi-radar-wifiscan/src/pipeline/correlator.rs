//! Correlation Engine: pairwise Pearson correlation between RSSI histories.
//!
//! Builds a symmetric correlation graph where nodes are networks and edge
//! weights are the Pearson coefficient of their RSSI series, aligned by
//! scan cycle. The engine is stateless: every call recomputes the full
//! matrix from the current [`HistoryStore`] in O(n² · w).

use std::collections::{HashMap, VecDeque};

use crate::domain::bssid::BssidId;
use crate::domain::history::{HistoryStore, Sample};

/// Symmetric map from unordered network pairs to `r ∈ [-1, 1]`.
///
/// Pairs without enough shared samples are absent. The diagonal is never
/// stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationMatrix {
    ids: Vec<BssidId>,
    values: HashMap<(BssidId, BssidId), f64>,
}

fn pair_key(a: BssidId, b: BssidId) -> (BssidId, BssidId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl CorrelationMatrix {
    /// Correlation between `a` and `b`, or `None` when undefined.
    pub fn get(&self, a: &BssidId, b: &BssidId) -> Option<f64> {
        if a == b {
            return None;
        }
        self.values.get(&pair_key(*a, *b)).copied()
    }

    /// Networks that had enough samples to take part, sorted.
    pub fn ids(&self) -> &[BssidId] {
        &self.ids
    }

    /// All defined pairs as `(a, b, r)` with `a < b`, sorted by `(a, b)`.
    pub fn pairs(&self) -> Vec<(BssidId, BssidId, f64)> {
        let mut pairs: Vec<_> = self.values.iter().map(|(&(a, b), &r)| (a, b, r)).collect();
        pairs.sort_unstable_by(|x, y| (x.0, x.1).cmp(&(y.0, y.1)));
        pairs
    }

    /// Pairs with `|r| >= threshold`, sorted by `(a, b)`.
    pub fn edges(&self, threshold: f64) -> Vec<(BssidId, BssidId, f64)> {
        self.pairs()
            .into_iter()
            .filter(|&(_, _, r)| r.abs() >= threshold)
            .collect()
    }

    /// Group networks connected by edges with `|r| >= threshold`.
    ///
    /// Cluster indices are assigned in ascending id order, so the network
    /// with the lowest id is always in cluster 0. Networks without any edge
    /// form singleton clusters.
    pub fn clusters(&self, threshold: f64) -> HashMap<BssidId, usize> {
        let mut adjacency: HashMap<BssidId, Vec<BssidId>> = HashMap::new();
        for (a, b, _) in self.edges(threshold) {
            adjacency.entry(a).or_default().push(b);
            adjacency.entry(b).or_default().push(a);
        }

        let mut cluster_of = HashMap::with_capacity(self.ids.len());
        let mut next_cluster = 0usize;
        for &start in &self.ids {
            if cluster_of.contains_key(&start) {
                continue;
            }
            cluster_of.insert(start, next_cluster);
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                for &neighbour in adjacency.get(&current).map(Vec::as_slice).unwrap_or_default() {
                    if !cluster_of.contains_key(&neighbour) {
                        cluster_of.insert(neighbour, next_cluster);
                        queue.push_back(neighbour);
                    }
                }
            }
            next_cluster += 1;
        }
        cluster_of
    }

    /// Number of defined pairs.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no pair is defined.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Insert a value directly. Used by the layout tests to drive forces
    /// without building histories.
    #[cfg(test)]
    pub(crate) fn insert(&mut self, a: BssidId, b: BssidId, r: f64) {
        for id in [a, b] {
            if let Err(pos) = self.ids.binary_search(&id) {
                self.ids.insert(pos, id);
            }
        }
        self.values.insert(pair_key(a, b), r);
    }
}

/// Computes a [`CorrelationMatrix`] from a [`HistoryStore`].
#[derive(Debug, Clone)]
pub struct CorrelationEngine {
    min_overlap: usize,
}

impl CorrelationEngine {
    /// Default minimum number of shared cycles for a defined correlation.
    pub const DEFAULT_MIN_OVERLAP: usize = 5;

    /// Create an engine. `min_overlap` below 2 is raised to 2, the smallest
    /// sample count with a meaningful variance.
    #[must_use]
    pub fn new(min_overlap: usize) -> Self {
        Self {
            min_overlap: min_overlap.max(2),
        }
    }

    /// Minimum shared samples required per pair.
    pub fn min_overlap(&self) -> usize {
        self.min_overlap
    }

    /// Recompute the full matrix. Never mutates `store`.
    pub fn compute(&self, store: &HistoryStore) -> CorrelationMatrix {
        let ids: Vec<BssidId> = store
            .ids()
            .into_iter()
            .filter(|id| store.get(id).is_some_and(|h| h.len() >= self.min_overlap))
            .collect();

        let mut values = HashMap::new();
        for (i, a) in ids.iter().enumerate() {
            let Some(ha) = store.get(a) else { continue };
            for b in &ids[i + 1..] {
                let Some(hb) = store.get(b) else { continue };
                let (x, y) = align_by_cycle(ha.samples(), hb.samples());
                if x.len() >= self.min_overlap {
                    values.insert(pair_key(*a, *b), pearson_r(&x, &y));
                }
            }
        }

        CorrelationMatrix { ids, values }
    }
}

impl Default for CorrelationEngine {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_OVERLAP)
    }
}

/// Pair up samples that share a cycle index. Both inputs are cycle-ordered.
fn align_by_cycle(a: &VecDeque<Sample>, b: &VecDeque<Sample>) -> (Vec<f64>, Vec<f64>) {
    let mut x = Vec::with_capacity(a.len().min(b.len()));
    let mut y = Vec::with_capacity(x.capacity());
    let (mut ia, mut ib) = (a.iter().peekable(), b.iter().peekable());

    while let (Some(sa), Some(sb)) = (ia.peek(), ib.peek()) {
        match sa.cycle.cmp(&sb.cycle) {
            std::cmp::Ordering::Less => {
                ia.next();
            }
            std::cmp::Ordering::Greater => {
                ib.next();
            }
            std::cmp::Ordering::Equal => {
                x.push(f64::from(sa.rssi_dbm));
                y.push(f64::from(sb.rssi_dbm));
                ia.next();
                ib.next();
            }
        }
    }
    (x, y)
}

/// Pearson correlation coefficient between two equal-length slices.
///
/// Returns 0.0 when fewer than two samples are given or when either series
/// has zero variance. The result is clamped to `[-1, 1]`.
pub fn pearson_r(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;

    let mean_x = x[..n].iter().sum::<f64>() / n_f;
    let mean_y = y[..n].iter().sum::<f64>() / n_f;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x[..n].iter().zip(&y[..n]) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom < 1e-12 || !denom.is_finite() {
        0.0
    } else {
        (cov / denom).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use std::time::Instant;

    fn id(n: u8) -> BssidId {
        BssidId([n; 6])
    }

    fn store_with(series: &[(u8, &[i32])]) -> HistoryStore {
        let mut store = HistoryStore::new(64);
        let now = Instant::now();
        for &(n, values) in series {
            for (cycle, &rssi) in values.iter().enumerate() {
                store.record(id(n), rssi, cycle as u64 + 1, now);
            }
        }
        store
    }

    #[test]
    fn pearson_perfect_correlation() {
        let r = pearson_r(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_abs_diff_eq!(r, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn pearson_negative_correlation() {
        let r = pearson_r(&[1.0, 2.0, 3.0, 4.0, 5.0], &[10.0, 8.0, 6.0, 4.0, 2.0]);
        assert_abs_diff_eq!(r, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn pearson_constant_series_is_zero() {
        let r = pearson_r(&[-50.0; 10], &[-40.0, -42.0, -41.0, -43.0, -40.0, -41.0, -42.0, -43.0, -41.0, -40.0]);
        assert_eq!(r, 0.0);
        assert_eq!(pearson_r(&[-50.0; 4], &[-50.0; 4]), 0.0);
        assert_eq!(pearson_r(&[1.0], &[1.0]), 0.0);
    }

    #[test]
    fn identical_series_correlate_to_one() {
        let s: &[i32] = &[-40, -42, -41, -43, -40, -41];
        let m = CorrelationEngine::new(3).compute(&store_with(&[(1, s), (2, s)]));
        assert_abs_diff_eq!(m.get(&id(1), &id(2)).unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn mirrored_series_correlate_to_minus_one() {
        let a: &[i32] = &[-40, -42, -41, -43, -40, -41];
        let b: Vec<i32> = a.iter().map(|v| -100 - v).collect();
        let m = CorrelationEngine::new(3).compute(&store_with(&[(1, a), (2, &b)]));
        assert_abs_diff_eq!(m.get(&id(1), &id(2)).unwrap(), -1.0, epsilon = 1e-9);
    }

    #[test]
    fn insufficient_overlap_is_absent() {
        let m = CorrelationEngine::new(5).compute(&store_with(&[
            (1, &[-40, -41, -42, -43, -44, -45]),
            (2, &[-60, -61, -62]),
        ]));
        assert!(m.get(&id(1), &id(2)).is_none());
        assert!(m.is_empty());
        assert_eq!(m.ids(), &[id(1)]);
    }

    #[test]
    fn alignment_uses_shared_cycles_only() {
        let mut store = HistoryStore::new(64);
        let now = Instant::now();
        // Network 1 seen every cycle; network 2 misses cycles 3 and 6.
        for cycle in 1..=8u64 {
            store.record(id(1), -40 - cycle as i32, cycle, now);
            if cycle != 3 && cycle != 6 {
                store.record(id(2), -70 - cycle as i32, cycle, now);
            }
        }
        let m = CorrelationEngine::new(5).compute(&store);
        assert_abs_diff_eq!(m.get(&id(1), &id(2)).unwrap(), 1.0, epsilon = 1e-9);

        let (x, y) = align_by_cycle(
            store.get(&id(1)).unwrap().samples(),
            store.get(&id(2)).unwrap().samples(),
        );
        assert_eq!(x.len(), 6);
        assert_eq!(y.len(), 6);
    }

    #[test]
    fn diagonal_is_excluded() {
        let s: &[i32] = &[-40, -42, -41, -43, -40];
        let m = CorrelationEngine::new(3).compute(&store_with(&[(1, s), (2, s)]));
        assert!(m.get(&id(1), &id(1)).is_none());
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn new_network_leaves_existing_pairs_untouched() {
        let a: &[i32] = &[-40, -42, -41, -43, -40, -41, -42];
        let b: &[i32] = &[-60, -61, -61, -64, -60, -62, -61];
        let mut store = store_with(&[(1, a), (2, b)]);
        let engine = CorrelationEngine::new(3);
        let before = engine.compute(&store).get(&id(1), &id(2)).unwrap();
        let series_before = store.series_for(&id(1));

        let now = Instant::now();
        for cycle in 4..=7u64 {
            store.record(id(3), -80 + cycle as i32, cycle, now);
        }
        let after = engine.compute(&store);
        assert_eq!(store.series_for(&id(1)), series_before);
        assert_abs_diff_eq!(after.get(&id(1), &id(2)).unwrap(), before, epsilon = 1e-12);
        assert!(after.get(&id(1), &id(3)).is_some());
    }

    #[test]
    fn edges_and_clusters_follow_threshold() {
        let mut m = CorrelationMatrix::default();
        m.insert(id(1), id(2), 0.9);
        m.insert(id(2), id(3), 0.6);
        m.insert(id(1), id(4), -0.8);
        m.insert(id(5), id(6), 0.1);

        assert_eq!(m.edges(0.7).len(), 2);
        let clusters = m.clusters(0.7);
        assert_eq!(clusters[&id(1)], 0);
        assert_eq!(clusters[&id(2)], 0);
        assert_eq!(clusters[&id(4)], 0);
        assert_ne!(clusters[&id(3)], 0);
        assert_ne!(clusters[&id(5)], clusters[&id(6)]);
    }

    proptest! {
        #[test]
        fn matrix_is_symmetric_and_bounded(
            series in prop::collection::vec(prop::collection::vec(-95i32..-20, 5..20), 2..6)
        ) {
            let mut store = HistoryStore::new(32);
            let now = Instant::now();
            for (n, values) in series.iter().enumerate() {
                for (cycle, &rssi) in values.iter().enumerate() {
                    store.record(id(n as u8), rssi, cycle as u64 + 1, now);
                }
            }
            let m = CorrelationEngine::new(3).compute(&store);
            for a in m.ids() {
                for b in m.ids() {
                    prop_assert_eq!(m.get(a, b), m.get(b, a));
                    if let Some(r) = m.get(a, b) {
                        prop_assert!(r.is_finite());
                        prop_assert!((-1.0..=1.0).contains(&r));
                    }
                }
            }
        }
    }
}
