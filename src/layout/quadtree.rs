use std::ops::Range;

use eframe::egui::{Vec2, vec2};

const LEAF_BODIES: usize = 8;
const DEPTH_LIMIT: usize = 12;

/// Flat Barnes–Hut tree over weighted bodies. Cells are stored breadth-first
/// so the children of a cell occupy one contiguous run of `cells`, and the
/// bodies under any cell occupy one contiguous run of `order`.
pub(super) struct Quadtree {
    cells: Vec<Cell>,
    order: Vec<usize>,
}

pub(super) struct Cell {
    center: Vec2,
    half: f32,
    depth: usize,
    bodies: Range<usize>,
    children: Range<usize>,
    pub(super) mass: f32,
    pub(super) mass_center: Vec2,
}

impl Cell {
    pub(super) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub(super) fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub(super) fn width(&self) -> f32 {
        self.half * 2.0
    }

    pub(super) fn encloses(&self, point: Vec2) -> bool {
        (point.x - self.center.x).abs() <= self.half && (point.y - self.center.y).abs() <= self.half
    }
}

/// One cell of the repulsion tree, exposed for the debug overlay.
#[derive(Clone, Copy, Debug)]
pub struct QuadtreeCell {
    pub center: Vec2,
    pub half_extent: f32,
    pub depth: usize,
    pub is_leaf: bool,
    /// Summed node weight under the cell.
    pub mass: f32,
    pub mass_center: Vec2,
}

/// Smallest square (padded by one unit) holding every point.
fn bounding_square(positions: &[Vec2]) -> Option<(Vec2, f32)> {
    let first = *positions.first()?;
    let (mut low, mut high) = (first, first);
    for point in positions {
        if !point.is_finite() {
            return None;
        }
        low = low.min(*point);
        high = high.max(*point);
    }
    let span = (high - low).max(vec2(1.0, 1.0));
    Some(((low + high) * 0.5, span.max_elem() * 0.5 + 1.0))
}

fn quadrant(center: Vec2, point: Vec2) -> usize {
    usize::from(point.x >= center.x) | (usize::from(point.y >= center.y) << 1)
}

fn quadrant_center(center: Vec2, half: f32, quadrant: usize) -> Vec2 {
    let quarter = half * 0.5;
    let dx = if quadrant & 1 == 1 { quarter } else { -quarter };
    let dy = if quadrant & 2 == 2 { quarter } else { -quarter };
    center + vec2(dx, dy)
}

impl Quadtree {
    /// Builds the tree; `masses` must be parallel to `positions`. Returns
    /// `None` when there are no bodies or any position is not finite.
    pub(super) fn build(positions: &[Vec2], masses: &[f32]) -> Option<Self> {
        debug_assert_eq!(positions.len(), masses.len());
        let (center, half) = bounding_square(positions)?;

        let mut tree = Self {
            cells: Vec::with_capacity(positions.len() / 2 + 1),
            order: (0..positions.len()).collect(),
        };
        tree.cells.push(Cell {
            center,
            half,
            depth: 0,
            bodies: 0..positions.len(),
            children: 0..0,
            mass: 0.0,
            mass_center: center,
        });

        let mut cursor = 0;
        while cursor < tree.cells.len() {
            tree.weigh(cursor, positions, masses);
            tree.subdivide(cursor, positions);
            cursor += 1;
        }
        Some(tree)
    }

    fn weigh(&mut self, cell: usize, positions: &[Vec2], masses: &[f32]) {
        let bodies = self.cells[cell].bodies.clone();
        let mut mass = 0.0;
        let mut moment = Vec2::ZERO;
        for &body in &self.order[bodies] {
            mass += masses[body];
            moment += positions[body] * masses[body];
        }

        let cell = &mut self.cells[cell];
        cell.mass = mass;
        if mass > 0.0 {
            cell.mass_center = moment / mass;
        }
    }

    fn subdivide(&mut self, cell: usize, positions: &[Vec2]) {
        let (center, half, depth, bodies) = {
            let cell = &self.cells[cell];
            (cell.center, cell.half, cell.depth, cell.bodies.clone())
        };
        if bodies.len() <= LEAF_BODIES || depth >= DEPTH_LIMIT {
            return;
        }

        let run = &mut self.order[bodies.clone()];
        run.sort_by_key(|&body| quadrant(center, positions[body]));
        let mut counts = [0usize; 4];
        for &body in run.iter() {
            counts[quadrant(center, positions[body])] += 1;
        }
        // All bodies in one quadrant: splitting again would not separate them.
        if counts.iter().filter(|&&count| count > 0).count() < 2 {
            return;
        }

        let first_child = self.cells.len();
        let mut start = bodies.start;
        for (slot, count) in counts.into_iter().enumerate() {
            if count == 0 {
                continue;
            }
            self.cells.push(Cell {
                center: quadrant_center(center, half, slot),
                half: half * 0.5,
                depth: depth + 1,
                bodies: start..start + count,
                children: 0..0,
                mass: 0.0,
                mass_center: Vec2::ZERO,
            });
            start += count;
        }
        self.cells[cell].children = first_child..self.cells.len();
    }

    pub(super) fn root(&self) -> usize {
        0
    }

    pub(super) fn cell(&self, cell: usize) -> &Cell {
        &self.cells[cell]
    }

    pub(super) fn children(&self, cell: usize) -> Range<usize> {
        self.cells[cell].children.clone()
    }

    pub(super) fn bodies(&self, cell: usize) -> &[usize] {
        &self.order[self.cells[cell].bodies.clone()]
    }

    pub(super) fn overlay(&self, cells: &mut Vec<QuadtreeCell>) {
        cells.extend(self.cells.iter().map(|cell| QuadtreeCell {
            center: cell.center,
            half_extent: cell.half,
            depth: cell.depth,
            is_leaf: cell.is_leaf(),
            mass: cell.mass,
            mass_center: cell.mass_center,
        }));
    }
}
