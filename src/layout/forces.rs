use eframe::egui::{Vec2, vec2};

use crate::extract::NeighborEdge;
use crate::util::golden_direction;

use super::RepulsionLaw;
use super::quadtree::Quadtree;

const MIN_DISTANCE: f32 = 0.0001;

#[derive(Clone, Copy)]
pub(super) struct RepulsionParams {
    pub(super) strength: f32,
    pub(super) law: RepulsionLaw,
    pub(super) softening: f32,
}

impl RepulsionParams {
    fn magnitude(self, distance_sq: f32) -> f32 {
        let softened = distance_sq + self.softening;
        match self.law {
            RepulsionLaw::InverseSquare => self.strength / softened,
            RepulsionLaw::InverseLinear => self.strength / softened.sqrt(),
        }
    }
}

#[derive(Clone, Copy)]
pub(super) struct SpringParams {
    pub(super) stiffness: f32,
    pub(super) rest_length: f32,
    pub(super) damping: f32,
}

/// Unit vector pointing from `other` to `index`. Coincident points get a
/// deterministic direction that is antisymmetric in the pair.
fn separation(positions: &[Vec2], index: usize, other: usize) -> (Vec2, f32) {
    let delta = positions[index] - positions[other];
    let distance_sq = delta.length_sq();
    let distance = distance_sq.sqrt();
    if distance > MIN_DISTANCE {
        return (delta / distance, distance_sq);
    }

    let (x, y) = golden_direction(index.min(other), index.max(other));
    let sign = if index < other { 1.0 } else { -1.0 };
    (vec2(x, y) * sign, distance_sq)
}

/// Exact repulsion over every pair. The push a node receives is scaled by
/// the mass of the node pushing it.
pub(super) fn accumulate_pairwise_repulsion(
    positions: &[Vec2],
    masses: &[f32],
    params: RepulsionParams,
    forces: &mut [Vec2],
) {
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            let (direction, distance_sq) = separation(positions, i, j);
            let push = direction * params.magnitude(distance_sq);
            forces[i] += push * masses[j];
            forces[j] -= push * masses[i];
        }
    }
}

/// Barnes–Hut repulsion on one body: cells narrower than `theta` times their
/// distance act as a single body at their mass center.
pub(super) fn tree_repulsion(
    tree: &Quadtree,
    body: usize,
    positions: &[Vec2],
    masses: &[f32],
    params: RepulsionParams,
    theta: f32,
) -> Vec2 {
    let point = positions[body];
    let mut force = Vec2::ZERO;
    let mut pending = vec![tree.root()];

    while let Some(index) = pending.pop() {
        let cell = tree.cell(index);
        if cell.mass <= 0.0 {
            continue;
        }

        if cell.is_leaf() {
            for &other in tree.bodies(index) {
                if other != body {
                    let (direction, distance_sq) = separation(positions, body, other);
                    force += direction * (params.magnitude(distance_sq) * masses[other]);
                }
            }
            continue;
        }

        let delta = point - cell.mass_center;
        let distance_sq = delta.length_sq().max(MIN_DISTANCE);
        let distance = distance_sq.sqrt();
        let far_enough = cell.body_count() > 1
            && !cell.encloses(point)
            && cell.width() < theta * distance;
        if far_enough {
            force += (delta / distance) * (params.magnitude(distance_sq) * cell.mass);
        } else {
            pending.extend(tree.children(index));
        }
    }
    force
}

/// Hooke springs along every edge. Stiffness is divided by the larger endpoint
/// degree so hubs do not drag their whole neighborhood into a knot.
pub(super) fn accumulate_springs(
    edges: &[NeighborEdge],
    positions: &[Vec2],
    velocities: &[Vec2],
    degrees: &[usize],
    params: SpringParams,
    forces: &mut [Vec2],
) {
    for edge in edges {
        let (from, to) = (edge.a, edge.b);
        if from >= positions.len() || to >= positions.len() || from == to {
            continue;
        }

        let delta = positions[from] - positions[to];
        let distance_sq = delta.length_sq();
        if distance_sq <= MIN_DISTANCE * MIN_DISTANCE {
            continue;
        }
        let distance = distance_sq.sqrt();
        let direction = delta / distance;

        let hub_degree = degrees[from].max(degrees[to]).max(1) as f32;
        let spring = (distance - params.rest_length) * (params.stiffness / hub_degree);
        let relative_velocity = velocities[from] - velocities[to];
        let damping_force = relative_velocity.dot(direction) * params.damping;
        let correction = direction * (spring + damping_force);

        forces[from] -= correction;
        forces[to] += correction;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: RepulsionParams = RepulsionParams {
        strength: 1_000.0,
        law: RepulsionLaw::InverseSquare,
        softening: 25.0,
    };

    #[test]
    fn pairwise_repulsion_is_symmetric() {
        let positions = [vec2(0.0, 0.0), vec2(10.0, 0.0), vec2(0.0, 30.0)];
        let mut forces = [Vec2::ZERO; 3];
        accumulate_pairwise_repulsion(&positions, &[1.0; 3], PARAMS, &mut forces);

        let net = forces.iter().fold(Vec2::ZERO, |sum, force| sum + *force);
        assert!(net.length() < 1e-4);
        assert!(forces[0].x < 0.0 && forces[1].x > 0.0);
    }

    #[test]
    fn coincident_points_are_pushed_apart() {
        let positions = [vec2(5.0, 5.0), vec2(5.0, 5.0)];
        let mut forces = [Vec2::ZERO; 2];
        accumulate_pairwise_repulsion(&positions, &[1.0; 2], PARAMS, &mut forces);

        assert!(forces[0].is_finite() && forces[1].is_finite());
        assert!(forces[0].length() > 0.0);
        assert!((forces[0] + forces[1]).length() < 1e-4);
    }

    #[test]
    fn inverse_linear_decays_slower() {
        let linear = RepulsionParams {
            law: RepulsionLaw::InverseLinear,
            ..PARAMS
        };
        let near_ratio = PARAMS.magnitude(100.0) / PARAMS.magnitude(10_000.0);
        let linear_ratio = linear.magnitude(100.0) / linear.magnitude(10_000.0);
        assert!(linear_ratio < near_ratio);
    }

    #[test]
    fn heavier_nodes_push_harder() {
        let positions = [vec2(0.0, 0.0), vec2(40.0, 0.0), vec2(-40.0, 0.0)];
        let mut forces = [Vec2::ZERO; 3];
        accumulate_pairwise_repulsion(&positions, &[1.0, 2.5, 1.0], PARAMS, &mut forces);

        assert!(forces[0].x < 0.0, "the heavy right neighbor should win");
        assert!(forces[2].x < 0.0 && forces[1].x > 0.0);
    }

    #[test]
    fn barnes_hut_tracks_exact_repulsion() {
        let positions = (0..90)
            .map(|index| {
                let ring = (index / 30) as f32 + 1.0;
                let angle = index as f32 * 0.21;
                vec2(angle.cos(), angle.sin()) * ring * 120.0
            })
            .collect::<Vec<_>>();
        let masses = (0..positions.len())
            .map(|index| 0.7 + (index % 4) as f32 * 0.5)
            .collect::<Vec<_>>();
        let mut exact = vec![Vec2::ZERO; positions.len()];
        accumulate_pairwise_repulsion(&positions, &masses, PARAMS, &mut exact);

        let tree = Quadtree::build(&positions, &masses).expect("tree builds");
        for (index, expected) in exact.iter().enumerate() {
            let approximate = tree_repulsion(&tree, index, &positions, &masses, PARAMS, 0.72);
            let scale = (0..positions.len())
                .filter(|&other| other != index)
                .map(|other| {
                    let (_, distance_sq) = separation(&positions, index, other);
                    PARAMS.magnitude(distance_sq) * masses[other]
                })
                .sum::<f32>();
            let error = (approximate - *expected).length();
            assert!(error <= scale * 0.3, "node {index}: error {error} vs scale {scale}");
        }
    }

    #[test]
    fn springs_pull_stretched_edges_and_scale_by_hub_degree() {
        let positions = [vec2(0.0, 0.0), vec2(200.0, 0.0)];
        let velocities = [Vec2::ZERO; 2];
        let edges = [NeighborEdge { a: 0, b: 1 }];
        let params = SpringParams {
            stiffness: 0.1,
            rest_length: 100.0,
            damping: 0.0,
        };

        let mut lone = [Vec2::ZERO; 2];
        accumulate_springs(&edges, &positions, &velocities, &[1, 1], params, &mut lone);
        assert!(lone[0].x > 0.0 && lone[1].x < 0.0);

        let mut hub = [Vec2::ZERO; 2];
        accumulate_springs(&edges, &positions, &velocities, &[4, 1], params, &mut hub);
        assert!((hub[0].x * 4.0 - lone[0].x).abs() < 1e-4);
    }
}
