//! Layout Simulator: force-directed 3D placement driven by correlation.
//!
//! Every network is a particle. All pairs repel (inverse-square with a
//! softening term) so the scene never collapses to a point. Pairs with a
//! defined correlation additionally get a spring: strongly correlated pairs
//! are pulled toward a short rest length that shrinks as `r` grows, weakly
//! or negatively correlated pairs are pushed out to a long rest length. A
//! weak centering force keeps the cloud from drifting.
//!
//! Integration is semi-implicit Euler with velocity damping. Forces,
//! speeds and radii are clamped, and a tick is committed only when every
//! resulting value is finite, so the layout is either fully advanced or left
//! untouched.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::domain::bssid::BssidId;
use crate::pipeline::correlator::CorrelationMatrix;

type Vec3 = [f64; 3];

fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn scale(a: Vec3, s: f64) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(a: Vec3) -> f64 {
    dot(a, a).sqrt()
}

fn is_finite(a: Vec3) -> bool {
    a.iter().all(|c| c.is_finite())
}

/// Clamp the magnitude of `v` to `max`; non-finite vectors become zero.
fn clamp_magnitude(v: Vec3, max: f64) -> Vec3 {
    if !is_finite(v) {
        return [0.0; 3];
    }
    let len = norm(v);
    if len > max && len > 0.0 {
        scale(v, max / len)
    } else {
        v
    }
}

/// Tunable constants of the simulation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct LayoutConfig {
    /// Integration time step per tick.
    pub dt: f64,
    /// Velocity multiplier applied every tick, in `(0, 1]`.
    pub damping: f64,
    /// Ticks run per scan cycle.
    pub steps_per_cycle: usize,
    /// Baseline pairwise repulsion strength.
    pub repulsion: f64,
    /// Softening term added to `d²` in the repulsion denominator.
    pub softening: f64,
    /// Distances below this are treated as this value.
    pub min_distance: f64,
    /// Correlation at or above which a pair attracts.
    pub attraction_threshold: f64,
    /// Spring stiffness for attracting pairs, multiplied by `r`.
    pub attraction: f64,
    /// Rest length of a perfectly correlated pair.
    pub near_length: f64,
    /// Extra rest length per unit of `1 - r` for attracting pairs.
    pub near_span: f64,
    /// Spring stiffness for non-attracting pairs.
    pub separation: f64,
    /// Rest length of an uncorrelated pair with `r = 1` (lower bound).
    pub far_length: f64,
    /// Extra rest length per unit of `1 - max(r, 0)` for non-attracting pairs.
    pub far_span: f64,
    /// Pull toward the origin per unit of distance.
    pub centering: f64,
    /// Upper bound on the net force magnitude per node.
    pub max_force: f64,
    /// Upper bound on node speed.
    pub max_speed: f64,
    /// Nodes are kept within this distance of the origin.
    pub bound_radius: f64,
    /// New nodes spawn within this distance of the origin.
    pub spawn_radius: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            dt: 0.3,
            damping: 0.85,
            steps_per_cycle: 50,
            repulsion: 3.0,
            softening: 0.1,
            min_distance: 0.1,
            attraction_threshold: 0.5,
            attraction: 0.05,
            near_length: 2.0,
            near_span: 4.0,
            separation: 0.02,
            far_length: 6.0,
            far_span: 6.0,
            centering: 0.005,
            max_force: 2.0,
            max_speed: 5.0,
            bound_radius: 30.0,
            spawn_radius: 1.0,
        }
    }
}

/// Position and velocity of one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeState {
    /// Scene coordinates.
    pub position: Vec3,
    /// Velocity in scene units per unit time.
    pub velocity: Vec3,
}

/// Summary of one scan cycle's worth of ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayoutStats {
    /// Ticks committed.
    pub ticks: usize,
    /// Ticks discarded because they produced non-finite values.
    pub rejected: usize,
    /// Kinetic energy after the last committed tick.
    pub kinetic_energy: f64,
}

/// Owns the layout state of every known network.
pub struct LayoutSimulator {
    config: LayoutConfig,
    nodes: HashMap<BssidId, NodeState>,
    rng: StdRng,
}

impl LayoutSimulator {
    /// Create a simulator. `seed` drives spawn positions.
    pub fn new(config: LayoutConfig, seed: u64) -> Self {
        Self {
            config,
            nodes: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Make the node set match `ids`: spawn new nodes, drop missing ones.
    ///
    /// Returns `(spawned, removed)` counts.
    pub fn sync(&mut self, ids: &[BssidId]) -> (usize, usize) {
        let before = self.nodes.len();
        let keep: std::collections::HashSet<&BssidId> = ids.iter().collect();
        self.nodes.retain(|id, _| keep.contains(id));
        let removed = before - self.nodes.len();

        let mut spawned = 0;
        for id in ids {
            if !self.nodes.contains_key(id) {
                let position = self.spawn_position();
                self.nodes.insert(
                    *id,
                    NodeState {
                        position,
                        velocity: [0.0; 3],
                    },
                );
                spawned += 1;
            }
        }
        (spawned, removed)
    }

    /// A random point in the spawn ball, away from the exact origin and,
    /// when possible, from existing nodes.
    fn spawn_position(&mut self) -> Vec3 {
        let radius = self.config.spawn_radius.max(1e-3);
        let clearance = self.config.min_distance;
        let mut candidate = [radius * 0.5, 0.0, 0.0];
        for _ in 0..16 {
            let dir = [
                self.rng.gen_range(-1.0..=1.0),
                self.rng.gen_range(-1.0..=1.0),
                self.rng.gen_range(-1.0..=1.0),
            ];
            let len = norm(dir);
            if len < 1e-6 || len > 1.0 {
                continue;
            }
            let r = radius * self.rng.gen_range(0.2..=1.0);
            candidate = scale(dir, r / len);
            let clear = self
                .nodes
                .values()
                .all(|n| norm(sub(n.position, candidate)) >= clearance);
            if clear {
                break;
            }
        }
        candidate
    }

    /// Run `steps_per_cycle` ticks against `matrix`.
    pub fn step_cycle(&mut self, matrix: &CorrelationMatrix) -> LayoutStats {
        let mut stats = LayoutStats::default();
        for _ in 0..self.config.steps_per_cycle {
            if self.tick(matrix) {
                stats.ticks += 1;
            } else {
                stats.rejected += 1;
            }
        }
        if stats.rejected > 0 {
            tracing::warn!(
                rejected = stats.rejected,
                "layout ticks discarded after non-finite values"
            );
        }
        stats.kinetic_energy = self.kinetic_energy();
        stats
    }

    /// Advance the simulation by one tick.
    ///
    /// Returns `false` (and leaves the state untouched) if the tick would
    /// have produced a non-finite position or velocity.
    pub fn tick(&mut self, matrix: &CorrelationMatrix) -> bool {
        let cfg = &self.config;
        let mut ids: Vec<BssidId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        let states: Vec<NodeState> = ids.iter().map(|id| self.nodes[id]).collect();
        let n = states.len();

        let mut forces = vec![[0.0; 3]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let diff = sub(states[j].position, states[i].position);
                let raw = norm(diff);
                let direction = if raw > 1e-9 && raw.is_finite() {
                    scale(diff, 1.0 / raw)
                } else {
                    // Coincident nodes: separate along a fixed axis.
                    let mut axis = [0.0; 3];
                    axis[(i + j) % 3] = 1.0;
                    axis
                };
                let dist = raw.max(cfg.min_distance);

                // Positive magnitude pulls i toward j.
                let mut magnitude = -cfg.repulsion / (dist * dist + cfg.softening);
                if let Some(r) = matrix.get(&ids[i], &ids[j]) {
                    if r >= cfg.attraction_threshold {
                        let rest = cfg.near_length + (1.0 - r) * cfg.near_span;
                        magnitude += cfg.attraction * r * (dist - rest);
                    } else {
                        let rest = cfg.far_length + (1.0 - r.max(0.0)) * cfg.far_span;
                        magnitude += cfg.separation * (dist - rest);
                    }
                }

                let f = scale(direction, magnitude);
                forces[i] = add(forces[i], f);
                forces[j] = sub(forces[j], f);
            }
        }

        let mut next = Vec::with_capacity(n);
        for (state, force) in states.iter().zip(forces) {
            let force = add(force, scale(state.position, -cfg.centering));
            let force = clamp_magnitude(force, cfg.max_force);

            let velocity = scale(add(state.velocity, scale(force, cfg.dt)), cfg.damping);
            let mut velocity = clamp_magnitude(velocity, cfg.max_speed);
            let mut position = add(state.position, scale(velocity, cfg.dt));

            let radius = norm(position);
            if radius > cfg.bound_radius && radius.is_finite() {
                let outward = scale(position, 1.0 / radius);
                position = scale(outward, cfg.bound_radius);
                let radial = dot(velocity, outward);
                if radial > 0.0 {
                    velocity = sub(velocity, scale(outward, radial));
                }
            }

            if !is_finite(position) || !is_finite(velocity) {
                return false;
            }
            next.push(NodeState { position, velocity });
        }

        for (id, state) in ids.iter().zip(next) {
            self.nodes.insert(*id, state);
        }
        true
    }

    /// Total kinetic energy `Σ ½|v|²` (unit mass).
    pub fn kinetic_energy(&self) -> f64 {
        self.nodes
            .values()
            .map(|n| 0.5 * dot(n.velocity, n.velocity))
            .sum()
    }

    /// State of one node.
    pub fn get(&self, id: &BssidId) -> Option<&NodeState> {
        self.nodes.get(id)
    }

    /// Position of one node.
    pub fn position(&self, id: &BssidId) -> Option<Vec3> {
        self.nodes.get(id).map(|n| n.position)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
