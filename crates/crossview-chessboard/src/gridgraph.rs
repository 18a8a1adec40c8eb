use crate::geom::{angle_diff_abs, axis_vec_diff, dominant_axis, is_orthogonal};
use crate::params::GridGraphParams;
use crate::response::Corner;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;
use std::collections::{HashMap, VecDeque};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Up,
    Down,
}

impl NeighborDirection {
    fn step(self) -> (i32, i32) {
        match self {
            Self::Right => (1, 0),
            Self::Left => (-1, 0),
            Self::Up => (0, -1),
            Self::Down => (0, 1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeNeighbor {
    pub direction: NeighborDirection,
    pub index: usize,
    pub distance: f32,
    pub score: f32,
}

/// Undirected edge candidate before direction classification.
struct Candidate {
    index: usize,
    vector: Vector2<f32>,
    distance: f32,
    score: f32,
}

fn build_tree(corners: &[Corner]) -> KdTree<f32, 2> {
    let coords = corners
        .iter()
        .map(|c| [c.position.x, c.position.y])
        .collect::<Vec<_>>();
    (&coords).into()
}

/// Median distance from each corner to its nearest other corner.
pub fn estimate_base_spacing(corners: &[Corner]) -> Option<f32> {
    if corners.len() < 2 {
        return None;
    }
    let tree = build_tree(corners);
    let mut nearest: Vec<f32> = corners
        .iter()
        .enumerate()
        .filter_map(|(i, c)| {
            tree.nearest_n::<SquaredEuclidean>(&[c.position.x, c.position.y], 2)
                .into_iter()
                .find(|nn| nn.item as usize != i)
                .map(|nn| nn.distance.sqrt())
        })
        .filter(|d| *d > 0.0)
        .collect();
    if nearest.is_empty() {
        return None;
    }
    nearest.sort_by(f32::total_cmp);
    Some(nearest[nearest.len() / 2])
}

fn is_good_neighbor(
    corner: &Corner,
    neighbor: &Corner,
    neighbor_index: usize,
    params: &GridGraphParams,
    spacing: f32,
) -> Option<Candidate> {
    let tol = params.orientation_tolerance_deg.to_radians();

    // 1. Adjacent corners have their bright diagonals swapped.
    if !is_orthogonal(corner.orientation, neighbor.orientation, tol) {
        return None;
    }

    // 2. Distance must be near the base spacing.
    let vector = neighbor.position - corner.position;
    let distance = vector.norm();
    if distance < params.min_spacing_rel * spacing || distance > params.max_spacing_rel * spacing {
        return None;
    }

    // 3. Grid edges run at ~45° to each corner's diagonal.
    let edge_angle = vector.y.atan2(vector.x);
    let score_corner = (axis_vec_diff(corner.orientation, edge_angle) - FRAC_PI_4).abs();
    let score_neighbor = (axis_vec_diff(neighbor.orientation, edge_angle) - FRAC_PI_4).abs();
    if score_corner > tol || score_neighbor > tol {
        return None;
    }

    let score_orientation =
        (FRAC_PI_2 - angle_diff_abs(corner.orientation, neighbor.orientation)).abs();

    Some(Candidate {
        index: neighbor_index,
        vector,
        distance,
        score: score_corner + score_neighbor + score_orientation,
    })
}

/// Classify an edge against the global grid axis `u` (and `v = u + π/2`).
fn direction_along_axes(vector: &Vector2<f32>, axis: f32) -> NeighborDirection {
    let u = Vector2::new(axis.cos(), axis.sin());
    let v = Vector2::new(-axis.sin(), axis.cos());
    let du = vector.dot(&u);
    let dv = vector.dot(&v);
    if du.abs() >= dv.abs() {
        if du >= 0.0 {
            NeighborDirection::Right
        } else {
            NeighborDirection::Left
        }
    } else if dv >= 0.0 {
        NeighborDirection::Down
    } else {
        NeighborDirection::Up
    }
}

/// At most one neighbor per direction: lowest score first, then shortest edge.
fn select_neighbors(candidates: Vec<NodeNeighbor>) -> Vec<NodeNeighbor> {
    let mut best: [Option<NodeNeighbor>; 4] = Default::default();
    for cand in candidates {
        let slot = &mut best[cand.direction as usize];
        let better = slot
            .as_ref()
            .is_none_or(|cur| (cand.score, cand.distance) < (cur.score, cur.distance));
        if better {
            *slot = Some(cand);
        }
    }
    best.into_iter().flatten().collect()
}

pub struct GridGraph {
    /// Selected neighbors per corner, at most one per direction.
    pub neighbors: Vec<Vec<NodeNeighbor>>,
    /// Direction of the `Right` axis in image space, radians.
    pub axis: f32,
}

impl GridGraph {
    /// Build the 4-connected grid graph; `None` when no edge candidates exist.
    pub fn new(corners: &[Corner], params: &GridGraphParams, spacing: f32) -> Option<Self> {
        let tree = build_tree(corners);
        let candidates: Vec<Vec<Candidate>> = corners
            .iter()
            .enumerate()
            .map(|(i, corner)| {
                let at = [corner.position.x, corner.position.y];
                tree.nearest_n::<SquaredEuclidean>(&at, params.k_neighbors + 1)
                    .into_iter()
                    .map(|nn| nn.item as usize)
                    .filter(|&j| j != i)
                    .filter_map(|j| is_good_neighbor(corner, &corners[j], j, params, spacing))
                    .collect()
            })
            .collect();

        let axis = dominant_axis(
            candidates
                .iter()
                .flatten()
                .map(|c| c.vector.y.atan2(c.vector.x)),
        )?;

        let neighbors = candidates
            .into_iter()
            .map(|node| {
                select_neighbors(
                    node.into_iter()
                        .map(|c| NodeNeighbor {
                            direction: direction_along_axes(&c.vector, axis),
                            index: c.index,
                            distance: c.distance,
                            score: c.score,
                        })
                        .collect(),
                )
            })
            .collect();

        Some(Self { neighbors, axis })
    }
}

/// Node lists of the graph's connected components, in discovery order.
pub fn connected_components(graph: &GridGraph) -> Vec<Vec<usize>> {
    let n = graph.neighbors.len();
    let mut seen = vec![false; n];
    let mut components = Vec::new();
    for seed in 0..n {
        if seen[seed] {
            continue;
        }
        seen[seed] = true;
        let mut members = vec![seed];
        let mut cursor = 0;
        while let Some(&node) = members.get(cursor) {
            cursor += 1;
            for nb in &graph.neighbors[node] {
                if !seen[nb.index] {
                    seen[nb.index] = true;
                    members.push(nb.index);
                }
            }
        }
        components.push(members);
    }
    components
}

/// Integer lattice coordinates of one component, shifted so the minimum is `(0, 0)`.
#[derive(Debug, Clone)]
pub struct GridAssignment {
    /// `(node index, i, j)` per node.
    pub coords: Vec<(usize, i32, i32)>,
    pub width: i32,
    pub height: i32,
}

/// BFS the component and assign `(i, j)` from the edge directions.
///
/// Returns `None` if two nodes land on the same lattice cell or an edge
/// contradicts the coordinates already assigned.
pub fn assign_grid_coordinates(graph: &GridGraph, component: &[usize]) -> Option<GridAssignment> {
    let start = *component.first()?;
    let mut assigned: HashMap<usize, (i32, i32)> = HashMap::with_capacity(component.len());
    let mut occupied: HashMap<(i32, i32), usize> = HashMap::with_capacity(component.len());
    let mut queue = VecDeque::new();

    assigned.insert(start, (0, 0));
    occupied.insert((0, 0), start);
    queue.push_back(start);

    while let Some(node_idx) = queue.pop_front() {
        let (i, j) = assigned[&node_idx];
        for neighbor in &graph.neighbors[node_idx] {
            let (di, dj) = neighbor.direction.step();
            let cell = (i + di, j + dj);
            match assigned.get(&neighbor.index) {
                Some(&existing) if existing != cell => return None,
                Some(_) => {}
                None => {
                    if occupied.insert(cell, neighbor.index).is_some() {
                        return None;
                    }
                    assigned.insert(neighbor.index, cell);
                    queue.push_back(neighbor.index);
                }
            }
        }
    }

    let min_i = assigned.values().map(|c| c.0).min()?;
    let min_j = assigned.values().map(|c| c.1).min()?;
    let max_i = assigned.values().map(|c| c.0).max()?;
    let max_j = assigned.values().map(|c| c.1).max()?;

    let mut coords: Vec<(usize, i32, i32)> = assigned
        .into_iter()
        .map(|(node, (i, j))| (node, i - min_i, j - min_j))
        .collect();
    coords.sort_unstable_by_key(|&(_, i, j)| (j, i));

    Some(GridAssignment {
        coords,
        width: max_i - min_i + 1,
        height: max_j - min_j + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;
    use std::collections::HashMap;

    fn make_corner(x: f32, y: f32, orientation: f32) -> Corner {
        Corner {
            position: Point2::new(x, y),
            orientation,
            strength: 1.0,
        }
    }

    fn by_direction(neighbors: &[NodeNeighbor]) -> HashMap<NeighborDirection, &NodeNeighbor> {
        neighbors.iter().map(|n| (n.direction, n)).collect()
    }

    /// Regular lattice rotated by `rot` with alternating diagonal orientation.
    fn lattice(cols: usize, rows: usize, spacing: f32, rot: f32) -> Vec<Corner> {
        let (s, c) = rot.sin_cos();
        let mut corners = Vec::new();
        for j in 0..rows {
            for i in 0..cols {
                let (x, y) = (i as f32 * spacing, j as f32 * spacing);
                let orientation = if (i + j) % 2 == 0 {
                    FRAC_PI_4
                } else {
                    3.0 * FRAC_PI_4
                };
                corners.push(make_corner(
                    100.0 + c * x - s * y,
                    100.0 + s * x + c * y,
                    (orientation + rot).rem_euclid(std::f32::consts::PI),
                ));
            }
        }
        corners
    }

    #[test]
    fn finds_axis_neighbors_in_regular_grid() {
        let spacing = 10.0;
        let cols = 3;
        let corners = lattice(cols, 3, spacing, 0.0);
        let graph = GridGraph::new(&corners, &GridGraphParams::default(), spacing).unwrap();

        let idx = |i: usize, j: usize| j * cols + i;

        let center = by_direction(&graph.neighbors[idx(1, 1)]);
        assert_eq!(4, center.len());
        assert_eq!(idx(0, 1), center[&NeighborDirection::Left].index);
        assert_eq!(idx(2, 1), center[&NeighborDirection::Right].index);
        assert_eq!(idx(1, 0), center[&NeighborDirection::Up].index);
        assert_eq!(idx(1, 2), center[&NeighborDirection::Down].index);
        for n in center.values() {
            assert!((n.distance - spacing).abs() < 1e-4);
        }

        let top_left = by_direction(&graph.neighbors[idx(0, 0)]);
        assert_eq!(2, top_left.len());
        assert!(top_left.contains_key(&NeighborDirection::Right));
        assert!(top_left.contains_key(&NeighborDirection::Down));
    }

    #[test]
    fn rotated_lattice_gets_consistent_coordinates() {
        let corners = lattice(5, 4, 12.0, 0.35);
        let spacing = estimate_base_spacing(&corners).unwrap();
        assert!((spacing - 12.0).abs() < 1e-3);

        let graph = GridGraph::new(&corners, &GridGraphParams::default(), spacing).unwrap();
        let components = connected_components(&graph);
        assert_eq!(components.len(), 1);

        let grid = assign_grid_coordinates(&graph, &components[0]).unwrap();
        assert_eq!((grid.width, grid.height), (5, 4));
        assert_eq!(grid.coords.len(), 20);
        let (first, i0, j0) = grid.coords[0];
        assert_eq!((i0, j0), (0, 0));
        assert_eq!(first, 0);
    }

    #[test]
    fn rejects_neighbors_when_orientation_relation_invalid() {
        let corners = vec![make_corner(0.0, 0.0, FRAC_PI_4), make_corner(10.0, 0.0, FRAC_PI_4)];
        assert!(GridGraph::new(&corners, &GridGraphParams::default(), 10.0).is_none());
    }

    #[test]
    fn rejects_neighbors_outside_distance_window() {
        let corners = vec![
            make_corner(0.0, 0.0, FRAC_PI_4),
            make_corner(30.0, 0.0, 3.0 * FRAC_PI_4),
        ];
        assert!(GridGraph::new(&corners, &GridGraphParams::default(), 10.0).is_none());
    }

    #[test]
    fn keeps_best_candidate_per_direction() {
        let spacing = 10.0;
        let corners = vec![
            make_corner(0.0, 0.0, FRAC_PI_4),                   // center (idx 0)
            make_corner(spacing, 0.0, 3.0 * FRAC_PI_4),         // better right (idx 1)
            make_corner(12.0, 0.0, 3.0 * FRAC_PI_4 + 0.1),      // worse right (idx 2)
            make_corner(-spacing, 0.0, 3.0 * FRAC_PI_4),        // left (idx 3)
        ];
        let graph = GridGraph::new(&corners, &GridGraphParams::default(), spacing).unwrap();

        let map = by_direction(&graph.neighbors[0]);
        assert_eq!(2, map.len());
        assert_eq!(1, map[&NeighborDirection::Right].index);
        assert_eq!(3, map[&NeighborDirection::Left].index);
    }
}
