mod forces;
mod quadtree;

use std::collections::HashMap;

use eframe::egui::{Vec2, vec2};
use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::extract::{NeighborEdge, Neighborhood};
use forces::{
    RepulsionParams, SpringParams, accumulate_pairwise_repulsion, accumulate_springs,
    tree_repulsion,
};
pub use quadtree::QuadtreeCell;
use quadtree::Quadtree;

const BARNES_HUT_THETA: f32 = 0.72;
const REPULSION_SOFTENING: f32 = 25.0;
const SPRING_DAMPING: f32 = 0.22;
const MIN_ALPHA: f32 = 0.001;
const SLEEP_SPEED_SQ: f32 = 0.01 * 0.01;
const SLEEP_FORCE_SQ: f32 = 0.02 * 0.02;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RepulsionLaw {
    #[default]
    InverseSquare,
    InverseLinear,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutConfig {
    pub repulsion_strength: f32,
    pub repulsion_law: RepulsionLaw,
    pub spring_stiffness: f32,
    pub spring_length: f32,
    pub centering_strength: f32,
    pub focal_strength: f32,
    pub convergence_threshold: f32,
    pub settle_ticks: u32,
    pub damping: f32,
    pub max_displacement: f32,
    pub partition_threshold: usize,
    pub reheat_alpha: f32,
    pub alpha_decay: f32,
    pub jitter: f32,
    pub seed: u64,
}

#[derive(Clone, Debug)]
pub struct LayoutNode {
    pub id: String,
    pub title: String,
    pub hop: usize,
    pub missing: bool,
    pub degree: usize,
    pub radius: f32,
    /// Repulsion weight, proportional to the drawn radius.
    pub mass: f32,
    pub position: Vec2,
    pub velocity: Vec2,
    pin: Option<Vec2>,
    heat: f32,
}

impl LayoutNode {
    pub fn is_pinned(&self) -> bool {
        self.pin.is_some()
    }

    /// Scale applied to this node's forces; decays every tick.
    pub fn heat(&self) -> f32 {
        self.heat
    }

    fn warm(&mut self, heat: f32) {
        self.heat = self.heat.max(heat);
    }
}

#[derive(Default)]
struct PhysicsScratch {
    forces: Vec<Vec2>,
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    degrees: Vec<usize>,
    masses: Vec<f32>,
}

pub struct LayoutEngine {
    config: LayoutConfig,
    nodes: Vec<LayoutNode>,
    edges: Vec<NeighborEdge>,
    index_by_id: HashMap<String, usize>,
    focal_index: Option<usize>,
    center: Vec2,
    ticks: u64,
    calm_ticks: u32,
    converged: bool,
    energy: f32,
    rng: StdRng,
    scratch: PhysicsScratch,
}

pub fn node_radius(degree: usize) -> f32 {
    (5.0 + (degree as f32).sqrt() * 2.6).min(22.0)
}

/// A node with a single link weighs 1.
pub fn node_mass(degree: usize) -> f32 {
    node_radius(degree) / node_radius(1)
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            nodes: Vec::new(),
            edges: Vec::new(),
            index_by_id: HashMap::new(),
            focal_index: None,
            center: Vec2::ZERO,
            ticks: 0,
            calm_ticks: 0,
            converged: true,
            energy: 0.0,
            scratch: PhysicsScratch::default(),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Swaps physics parameters without touching positions; the random
    /// stream keeps going so a seed change only applies to new engines.
    pub fn set_config(&mut self, config: LayoutConfig) {
        self.config = config;
        self.reheat(self.config.reheat_alpha * 0.5);
    }

    pub fn nodes(&self) -> &[LayoutNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[NeighborEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&LayoutNode> {
        self.index_by_id.get(id).map(|&index| &self.nodes[index])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_by_id.contains_key(id)
    }

    pub fn position(&self, id: &str) -> Option<Vec2> {
        self.node(id).map(|node| node.position)
    }

    pub fn is_pinned(&self, id: &str) -> bool {
        self.node(id).is_some_and(LayoutNode::is_pinned)
    }

    /// Hottest node's heat; zero once the whole layout has cooled.
    pub fn alpha(&self) -> f32 {
        self.nodes.iter().map(LayoutNode::heat).fold(0.0, f32::max)
    }

    pub fn energy(&self) -> f32 {
        self.energy
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_converged(&self) -> bool {
        self.converged
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    /// Raises every node's heat to at least `alpha`.
    pub fn reheat(&mut self, alpha: f32) {
        for node in &mut self.nodes {
            node.warm(alpha);
        }
        self.wake();
    }

    fn wake(&mut self) {
        self.calm_ticks = 0;
        self.converged = false;
    }

    /// Holds a node at `position`. Returns false for ids not in the layout
    /// or non-finite coordinates.
    pub fn pin_at(&mut self, id: &str, position: Vec2) -> bool {
        if !position.is_finite() {
            return false;
        }
        let Some(&index) = self.index_by_id.get(id) else {
            return false;
        };

        let node = &mut self.nodes[index];
        if node.pin == Some(position) {
            return true;
        }
        node.pin = Some(position);
        node.position = position;
        node.velocity = Vec2::ZERO;
        true
    }

    pub fn release(&mut self, id: &str) -> bool {
        let Some(&index) = self.index_by_id.get(id) else {
            return false;
        };
        self.nodes[index].pin.take().is_some()
    }

    fn jitter(&mut self) -> Vec2 {
        let spread = self.config.jitter;
        if spread <= 0.0 {
            return Vec2::ZERO;
        }
        vec2(
            self.rng.gen_range(-spread..=spread),
            self.rng.gen_range(-spread..=spread),
        )
    }

    /// Merges a fresh extraction into the simulation. Persisting ids keep
    /// their state; new ids are seeded next to already placed neighbors.
    /// Only seeded nodes, nodes whose links changed, and their direct
    /// neighbors are reheated. A new focal reheats everything.
    pub fn reconcile(&mut self, neighborhood: &Neighborhood) {
        let unchanged = self.nodes.len() == neighborhood.nodes.len()
            && self
                .nodes
                .iter()
                .zip(&neighborhood.nodes)
                .all(|(current, next)| current.id == next.id)
            && self.edges == neighborhood.edges;
        let focal_moved = self
            .focal_index
            .is_none_or(|index| self.nodes[index].id != neighborhood.focal);
        let prior_neighbors = self.neighbor_ids();

        let degrees = neighborhood.degrees();
        let mut adjacency = vec![Vec::new(); neighborhood.nodes.len()];
        for edge in &neighborhood.edges {
            adjacency[edge.a].push(edge.b);
            adjacency[edge.b].push(edge.a);
        }
        let relinked = adjacency
            .iter()
            .zip(&neighborhood.nodes)
            .map(|(neighbors, node)| {
                let mut next = neighbors
                    .iter()
                    .map(|&neighbor| neighborhood.nodes[neighbor].id.as_str())
                    .collect::<Vec<_>>();
                next.sort_unstable();
                let prior = prior_neighbors
                    .get(node.id.as_str())
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                !next.iter().copied().eq(prior.iter().map(String::as_str))
            })
            .collect::<Vec<_>>();

        let mut prior_nodes = std::mem::take(&mut self.nodes)
            .into_iter()
            .map(|node| (node.id.clone(), node))
            .collect::<HashMap<_, _>>();

        let mut next_nodes = Vec::with_capacity(neighborhood.nodes.len());
        let mut placed = vec![false; neighborhood.nodes.len()];
        let mut seeded = Vec::new();
        for (index, source) in neighborhood.nodes.iter().enumerate() {
            let degree = degrees[index];
            if let Some(mut node) = prior_nodes.remove(&source.id) {
                node.title = source.title.clone();
                node.hop = source.hop;
                node.missing = source.missing;
                node.degree = degree;
                node.radius = node_radius(degree);
                node.mass = node_mass(degree);
                placed[index] = true;
                next_nodes.push(node);
            } else {
                seeded.push(index);
                next_nodes.push(LayoutNode {
                    id: source.id.clone(),
                    title: source.title.clone(),
                    hop: source.hop,
                    missing: source.missing,
                    degree,
                    radius: node_radius(degree),
                    mass: node_mass(degree),
                    position: self.center,
                    velocity: Vec2::ZERO,
                    pin: None,
                    heat: 0.0,
                });
            }
        }

        for &index in &seeded {
            let mut centroid = Vec2::ZERO;
            let mut count = 0usize;
            for &neighbor in &adjacency[index] {
                if placed[neighbor] {
                    centroid += next_nodes[neighbor].position;
                    count += 1;
                }
            }
            let anchor = if count > 0 {
                centroid / count as f32
            } else {
                self.center
            };
            next_nodes[index].position = anchor + self.jitter();
            placed[index] = true;
        }

        let dropped = prior_nodes.len();
        self.index_by_id = next_nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect();
        self.nodes = next_nodes;
        self.edges = neighborhood.edges.clone();
        self.focal_index = neighborhood.index_of(&neighborhood.focal);

        if unchanged {
            trace!("reconcile: topology unchanged, keeping simulation state");
            return;
        }

        debug!(
            "reconcile: {} nodes ({} seeded, {dropped} dropped), {} edges",
            self.nodes.len(),
            seeded.len(),
            self.edges.len()
        );
        let reheat_alpha = self.config.reheat_alpha;
        if focal_moved {
            self.reheat(reheat_alpha);
            return;
        }
        for &index in &seeded {
            self.nodes[index].warm(reheat_alpha);
        }
        for (index, changed) in relinked.into_iter().enumerate() {
            if changed {
                self.nodes[index].warm(reheat_alpha);
                for &neighbor in &adjacency[index] {
                    self.nodes[neighbor].warm(reheat_alpha);
                }
            }
        }
        self.wake();
    }

    /// Sorted neighbor ids per node, keyed by id, for the current edge set.
    fn neighbor_ids(&self) -> HashMap<String, Vec<String>> {
        let mut neighbors = HashMap::<String, Vec<String>>::new();
        for edge in &self.edges {
            let (a, b) = (&self.nodes[edge.a].id, &self.nodes[edge.b].id);
            neighbors.entry(a.clone()).or_default().push(b.clone());
            neighbors.entry(b.clone()).or_default().push(a.clone());
        }
        for ids in neighbors.values_mut() {
            ids.sort_unstable();
        }
        neighbors
    }

    /// Advances one tick and reports whether the layout has settled.
    pub fn step(&mut self, dt: f32) -> bool {
        let node_count = self.nodes.len();
        self.ticks += 1;
        if node_count == 0 {
            self.energy = 0.0;
            self.converged = true;
            return true;
        }

        let mut resets = self.reseed_non_finite();
        let config = self.config;
        let cooling = 1.0 - config.alpha_decay.min(1.0);
        let time_step_scale = if dt.is_finite() {
            (dt * 60.0).clamp(0.25, 3.0)
        } else {
            1.0
        };
        let damping_factor = config.damping.powf(time_step_scale);

        let scratch = &mut self.scratch;
        scratch.forces.clear();
        scratch.forces.resize(node_count, Vec2::ZERO);
        scratch.positions.clear();
        scratch.velocities.clear();
        scratch.degrees.clear();
        scratch.masses.clear();
        for node in &self.nodes {
            scratch.positions.push(node.position);
            scratch.velocities.push(node.velocity);
            scratch.degrees.push(node.degree);
            scratch.masses.push(node.mass);
        }

        let forces = &mut scratch.forces;
        let positions = &scratch.positions;
        let masses = &scratch.masses;
        let repulsion = RepulsionParams {
            strength: config.repulsion_strength,
            law: config.repulsion_law,
            softening: REPULSION_SOFTENING,
        };

        let partitioned = if node_count > config.partition_threshold {
            Quadtree::build(positions, masses)
        } else {
            None
        };
        match partitioned {
            Some(tree) => {
                for (index, force) in forces.iter_mut().enumerate() {
                    *force +=
                        tree_repulsion(&tree, index, positions, masses, repulsion, BARNES_HUT_THETA);
                }
            }
            None => accumulate_pairwise_repulsion(positions, masses, repulsion, forces),
        }

        accumulate_springs(
            &self.edges,
            positions,
            &scratch.velocities,
            &scratch.degrees,
            SpringParams {
                stiffness: config.spring_stiffness,
                rest_length: config.spring_length,
                damping: SPRING_DAMPING,
            },
            forces,
        );

        for (index, force) in forces.iter_mut().enumerate() {
            let offset = positions[index] - self.center;
            *force -= offset * config.centering_strength;
            if Some(index) == self.focal_index {
                *force -= offset * config.focal_strength;
            }
        }

        let max_step_sq = config.max_displacement * config.max_displacement;
        for (index, node) in self.nodes.iter_mut().enumerate() {
            let heat = node.heat;
            node.heat = if heat * cooling < MIN_ALPHA {
                0.0
            } else {
                heat * cooling
            };
            if let Some(pin) = node.pin {
                node.position = pin;
                node.velocity = Vec2::ZERO;
                continue;
            }

            let force = forces[index] * heat;
            let mut velocity = (node.velocity + force * time_step_scale) * damping_factor;
            if velocity.length_sq() < SLEEP_SPEED_SQ && force.length_sq() < SLEEP_FORCE_SQ {
                velocity = Vec2::ZERO;
            }

            let mut displacement = velocity * time_step_scale;
            let displacement_sq = displacement.length_sq();
            if displacement_sq > max_step_sq {
                displacement *= config.max_displacement / displacement_sq.sqrt();
                velocity = displacement / time_step_scale;
            }

            node.velocity = velocity;
            node.position += displacement;
        }
        resets += self.reseed_non_finite();

        let energy = self
            .nodes
            .iter()
            .filter(|node| !node.is_pinned())
            .map(|node| 0.5 * node.velocity.length_sq())
            .sum::<f32>();

        self.energy = energy;
        if energy < config.convergence_threshold && resets == 0 {
            self.calm_ticks = self.calm_ticks.saturating_add(1);
        } else {
            self.calm_ticks = 0;
        }
        self.converged = self.calm_ticks >= config.settle_ticks.max(1);
        trace!(
            "tick {}: energy {energy:.4}, alpha {:.4}, converged {}",
            self.ticks,
            self.alpha(),
            self.converged
        );
        self.converged
    }

    /// Replaces non-finite positions or velocities with fresh jitter around
    /// the layout center (or the pin, for pinned nodes).
    fn reseed_non_finite(&mut self) -> usize {
        let mut resets = 0usize;
        for index in 0..self.nodes.len() {
            let node = &self.nodes[index];
            if node.position.is_finite() && node.velocity.is_finite() {
                continue;
            }
            let pin = node.pin;
            let position = match pin {
                Some(pin) => pin,
                None => self.center + self.jitter(),
            };
            let node = &mut self.nodes[index];
            node.position = position;
            node.velocity = Vec2::ZERO;
            node.warm(self.config.reheat_alpha);
            resets += 1;
        }
        if resets > 0 {
            warn!("reseeded {resets} node(s) with non-finite layout state");
        }
        resets
    }

    /// Partition of the current node positions and weights, for overlays.
    pub fn quadtree_cells(&self, cells: &mut Vec<QuadtreeCell>) {
        cells.clear();
        let (positions, masses): (Vec<_>, Vec<_>) = self
            .nodes
            .iter()
            .map(|node| (node.position, node.mass))
            .unzip();
        if let Some(tree) = Quadtree::build(&positions, &masses) {
            tree.overlay(cells);
        }
    }
}
