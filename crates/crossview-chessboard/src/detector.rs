use crate::gridgraph::{
    assign_grid_coordinates, connected_components, estimate_base_spacing, GridAssignment,
    GridGraph,
};
use crate::params::ChessboardParams;
use crate::response::{chess_response, find_corners, Corner};
use crate::subpix::refine_corner;
use crate::threshold::{normalize_contrast, passes_fast_check};
use crossview_core::{rgba_to_gray, GrayImage, GrayImageView, GridSpec, RgbaImageView};
use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A fully detected board: every inner corner, row-major.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChessboardDetection {
    pub grid: GridSpec,
    /// `grid.cols * grid.rows` sub-pixel corners; index `j * cols + i`.
    pub corners: Vec<Point2<f32>>,
}

/// Inner-corner chessboard detector for a fixed `cols x rows` pattern.
pub struct ChessboardDetector {
    pub grid: GridSpec,
    pub params: ChessboardParams,
}

impl ChessboardDetector {
    pub fn new(grid: GridSpec, params: ChessboardParams) -> Self {
        Self { grid, params }
    }

    /// Detect the board in an RGBA frame.
    pub fn detect(&self, img: &RgbaImageView<'_>) -> Option<ChessboardDetection> {
        let gray = rgba_to_gray(img);
        self.detect_gray(&gray.view())
    }

    /// Detect the board in a gray frame.
    ///
    /// Returns `None` unless all `cols * rows` corners are found and form a
    /// consistent lattice.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, img), fields(width = img.width, height = img.height))
    )]
    pub fn detect_gray(&self, img: &GrayImageView<'_>) -> Option<ChessboardDetection> {
        let expected = self.grid.corner_count();
        if expected == 0 {
            return None;
        }

        let normalized: GrayImage;
        let work = if self.params.fast_check.normalize {
            let Some(n) = normalize_contrast(img, self.params.fast_check.min_contrast) else {
                debug!("image contrast below {}", self.params.fast_check.min_contrast);
                return None;
            };
            normalized = n;
            normalized.view()
        } else {
            *img
        };

        if self.params.fast_check.enabled
            && !passes_fast_check(&work, &self.params.fast_check, &self.grid)
        {
            debug!("fast check found no chessboard-like pattern");
            return None;
        }

        let response = chess_response(&work);
        let corners = find_corners(&work, &response, &self.params.response);
        debug!("{} corner candidates, {} expected", corners.len(), expected);
        if corners.len() < expected {
            return None;
        }

        let spacing = estimate_base_spacing(&corners)?;
        let Some(graph) = GridGraph::new(&corners, &self.params.graph, spacing) else {
            debug!("no grid edges between corner candidates");
            return None;
        };

        let lattice = connected_components(&graph)
            .into_iter()
            .filter(|c| c.len() == expected)
            .filter_map(|c| assign_grid_coordinates(&graph, &c))
            .find_map(|a| self.order_lattice(&a, &corners));
        let Some(mut ordered) = lattice else {
            debug!("no component matches a {}x{} lattice", self.grid.cols, self.grid.rows);
            return None;
        };

        for p in ordered.iter_mut() {
            *p = refine_corner(&work, *p, &self.params.subpix);
        }

        debug!("chessboard detected, spacing {:.1} px", spacing);
        Some(ChessboardDetection {
            grid: self.grid,
            corners: ordered,
        })
    }

    /// Row-major positions with a canonical labeling, or `None` if the
    /// assignment does not cover exactly the expected lattice.
    fn order_lattice(
        &self,
        assignment: &GridAssignment,
        corners: &[Corner],
    ) -> Option<Vec<Point2<f32>>> {
        let cols = self.grid.cols as i32;
        let rows = self.grid.rows as i32;
        let transpose = match (assignment.width, assignment.height) {
            (w, h) if w == cols && h == rows => false,
            (w, h) if w == rows && h == cols => true,
            _ => return None,
        };

        let mut slots: Vec<Option<Point2<f32>>> = vec![None; (cols * rows) as usize];
        for &(node, i, j) in &assignment.coords {
            let (i, j) = if transpose { (j, i) } else { (i, j) };
            let slot = slots.get_mut((j * cols + i) as usize)?;
            if slot.replace(corners[node].position).is_some() {
                return None;
            }
        }
        let mut pts: Vec<Point2<f32>> = slots.into_iter().collect::<Option<_>>()?;

        // Right-handed in image coordinates: +i then +j turns clockwise on screen.
        let at = |pts: &[Point2<f32>], i: i32, j: i32| pts[(j * cols + i) as usize];
        let a = at(&pts, 1.min(cols - 1), 0) - at(&pts, 0, 0);
        let b = at(&pts, 0, 1.min(rows - 1)) - at(&pts, 0, 0);
        if a.x * b.y - a.y * b.x < 0.0 {
            for j in 0..rows / 2 {
                for i in 0..cols {
                    pts.swap((j * cols + i) as usize, ((rows - 1 - j) * cols + i) as usize);
                }
            }
        }

        let first = pts[0];
        let last = pts[pts.len() - 1];
        if first.x + first.y > last.x + last.y {
            pts.reverse();
        }
        Some(pts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gridgraph::GridAssignment;

    fn corner(x: f32, y: f32) -> Corner {
        Corner {
            position: Point2::new(x, y),
            orientation: 0.0,
            strength: 1.0,
        }
    }

    fn detector(cols: u32, rows: u32) -> ChessboardDetector {
        ChessboardDetector::new(
            GridSpec::new(cols, rows, 1.0).unwrap(),
            ChessboardParams::default(),
        )
    }

    /// Corners of a 3x2 lattice at 10 px spacing, labelled by `label(i, j)`.
    fn labelled(label: impl Fn(i32, i32) -> (i32, i32), w: i32, h: i32) -> (GridAssignment, Vec<Corner>) {
        let mut corners = Vec::new();
        let mut coords = Vec::new();
        for j in 0..2 {
            for i in 0..3 {
                corners.push(corner(10.0 * i as f32, 10.0 * j as f32));
                let (li, lj) = label(i, j);
                coords.push((corners.len() - 1, li, lj));
            }
        }
        (
            GridAssignment {
                coords,
                width: w,
                height: h,
            },
            corners,
        )
    }

    fn expected() -> Vec<Point2<f32>> {
        (0..6)
            .map(|k| Point2::new(10.0 * (k % 3) as f32, 10.0 * (k / 3) as f32))
            .collect()
    }

    #[test]
    fn canonical_labeling_is_kept() {
        let (a, c) = labelled(|i, j| (i, j), 3, 2);
        assert_eq!(detector(3, 2).order_lattice(&a, &c).unwrap(), expected());
    }

    #[test]
    fn rotated_labeling_is_undone() {
        let (a, c) = labelled(|i, j| (2 - i, 1 - j), 3, 2);
        assert_eq!(detector(3, 2).order_lattice(&a, &c).unwrap(), expected());
    }

    #[test]
    fn mirrored_labeling_is_undone() {
        let (a, c) = labelled(|i, j| (2 - i, j), 3, 2);
        assert_eq!(detector(3, 2).order_lattice(&a, &c).unwrap(), expected());
    }

    #[test]
    fn transposed_labeling_is_undone() {
        let (a, c) = labelled(|i, j| (j, i), 2, 3);
        assert_eq!(detector(3, 2).order_lattice(&a, &c).unwrap(), expected());
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let (a, c) = labelled(|i, j| (i, j), 3, 2);
        assert!(detector(4, 2).order_lattice(&a, &c).is_none());
    }
}
