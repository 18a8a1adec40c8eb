//! Synthetic planar targets for tests and benchmarks.
//!
//! Everything here is deterministic: the same arguments always produce the
//! same poses, projections and pixels.

use crate::{Camera, GridSpec, Homography, ImageSize, Pose, RgbaImage};
use nalgebra::{Point2, Vector3};

/// Project the grid's object points through `camera` at `pose`.
///
/// Returns `None` if any point falls behind the camera.
pub fn project_grid(camera: &Camera, pose: &Pose, grid: &GridSpec) -> Option<Vec<Point2<f64>>> {
    grid.object_points()
        .iter()
        .map(|p| {
            let pc = pose.transform_point(p);
            (pc.z > 1e-9).then(|| camera.project(&pc))
        })
        .collect()
}

/// `n` poses looking at the grid centre from varied tilts at roughly `distance`.
pub fn orbit_poses(grid: &GridSpec, n: usize, distance: f64) -> Vec<Pose> {
    let centre = Vector3::new(
        (grid.cols - 1) as f64 * grid.spacing * 0.5,
        (grid.rows - 1) as f64 * grid.spacing * 0.5,
        0.0,
    );
    (0..n)
        .map(|i| {
            let phase = i as f64 * 2.399_963; // golden angle
            let tilt = 0.15 + 0.25 * ((i % 3) as f64 / 2.0);
            let rvec = Vector3::new(tilt * phase.cos(), tilt * phase.sin(), 0.1 * phase.sin());
            let rotation = nalgebra::Rotation3::new(rvec);
            let offset = Vector3::new(0.05 * phase.cos(), -0.04 * phase.sin(), 1.0) * distance;
            // Place the rotated board centre at `offset` in the camera frame.
            let tvec = offset - rotation * centre;
            Pose::from_rotation(&rotation, tvec)
        })
        .collect()
}

/// Parameters for [`render_chessboard`].
#[derive(Clone, Copy, Debug)]
pub struct BoardRender {
    pub size: ImageSize,
    pub grid: GridSpec,
    /// Square edge length in board pixels.
    pub square_px: f64,
    /// Maps board-plane pixels (origin at the outer board corner) into the image.
    pub board_to_image: Homography,
    /// Supersampling factor per axis.
    pub supersample: usize,
}

/// Render a white-margined chessboard with `grid.cols + 1` by `grid.rows + 1` squares.
///
/// Inner corner `(i, j)` lands at `board_to_image((i + 1) * square, (j + 1) * square)`.
pub fn render_chessboard(spec: &BoardRender) -> Option<RgbaImage> {
    let image_to_board = spec.board_to_image.inverse()?;
    let squares_x = spec.grid.cols as i64 + 1;
    let squares_y = spec.grid.rows as i64 + 1;
    let ss = spec.supersample.max(1);
    let (w, h) = (spec.size.width, spec.size.height);

    let mut data = Vec::with_capacity(w * h * 4);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for sy in 0..ss {
                for sx in 0..ss {
                    let px = x as f64 + (sx as f64 + 0.5) / ss as f64 - 0.5;
                    let py = y as f64 + (sy as f64 + 0.5) / ss as f64 - 0.5;
                    let b = image_to_board.apply(&Point2::new(px, py));
                    let i = (b.x / spec.square_px).floor() as i64;
                    let j = (b.y / spec.square_px).floor() as i64;
                    let inside = (0..squares_x).contains(&i) && (0..squares_y).contains(&j);
                    let dark = inside && (i + j) % 2 == 0;
                    acc += if dark { 20.0 } else { 235.0 };
                }
            }
            let v = (acc / (ss * ss) as f64).round() as u8;
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    RgbaImage::new(w, h, data).ok()
}

/// Ground-truth inner corners of a [`render_chessboard`] image, row-major.
pub fn rendered_corners(spec: &BoardRender) -> Vec<Point2<f64>> {
    let cols = spec.grid.cols as usize;
    (0..spec.grid.corner_count())
        .map(|k| {
            let i = (k % cols) as f64 + 1.0;
            let j = (k / cols) as f64 + 1.0;
            spec.board_to_image
                .apply(&Point2::new(i * spec.square_px, j * spec.square_px))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Distortion, Intrinsics};

    #[test]
    fn orbit_poses_keep_board_in_view() {
        let grid = GridSpec::default();
        let camera = Camera::new(
            Intrinsics::new(800.0, 800.0, 320.0, 240.0),
            Distortion::default(),
        );
        for pose in orbit_poses(&grid, 8, 20.0) {
            let pts = project_grid(&camera, &pose, &grid).expect("in front");
            for p in pts {
                assert!(p.x > 0.0 && p.x < 640.0 && p.y > 0.0 && p.y < 480.0, "{p}");
            }
        }
    }

    #[test]
    fn rendered_board_has_dark_first_square() {
        let spec = BoardRender {
            size: ImageSize::new(200, 150),
            grid: GridSpec::new(4, 3, 1.0).unwrap(),
            square_px: 20.0,
            board_to_image: Homography::from_array([
                [1.0, 0.0, 30.0],
                [0.0, 1.0, 25.0],
                [0.0, 0.0, 1.0],
            ]),
            supersample: 2,
        };
        let img = render_chessboard(&spec).unwrap();
        let at = |x: usize, y: usize| img.data[(y * img.width + x) * 4];
        assert_eq!(at(40, 35), 20);
        assert_eq!(at(60, 35), 235);
        assert_eq!(at(5, 5), 235);
        let corners = rendered_corners(&spec);
        assert_eq!(corners.len(), 12);
        assert_eq!(corners[0], Point2::new(50.0, 45.0));
    }
}
