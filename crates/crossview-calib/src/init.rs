//! Closed-form starting point for the bundle refinement.

use crate::CalibError;
use crossview_core::{estimate_homography, Camera, GridSpec, Homography, ImageSize, Pose};
use nalgebra::{DMatrix, DVector, Matrix3, Point2, Point3, Rotation3, Vector3};

/// Check the inputs and return the shared board points.
pub(crate) fn validate_views(
    views: &[Vec<Point2<f64>>],
    grid: &GridSpec,
    size: ImageSize,
) -> Result<Vec<Point3<f64>>, CalibError> {
    if views.is_empty() {
        return Err(CalibError::NoViews);
    }
    grid.validate()?;
    if size.validate().is_err() {
        return Err(CalibError::InvalidImageSize {
            width: size.width,
            height: size.height,
        });
    }
    let expected = grid.corner_count();
    for (view, corners) in views.iter().enumerate() {
        if corners.len() != expected {
            return Err(CalibError::ViewLength {
                view,
                got: corners.len(),
                expected,
            });
        }
    }
    Ok(grid.object_points())
}

fn board_xy(object: &[Point3<f64>]) -> Vec<Point2<f64>> {
    object.iter().map(|p| Point2::new(p.x, p.y)).collect()
}

/// Board-plane to pixel homography of every view.
pub(crate) fn board_homographies(
    object: &[Point3<f64>],
    views: &[Vec<Point2<f64>>],
) -> Result<Vec<Homography>, CalibError> {
    let board = board_xy(object);
    views
        .iter()
        .enumerate()
        .map(|(i, image)| estimate_homography(&board, image).ok_or(CalibError::HomographyFailed(i)))
        .collect()
}

/// Focal lengths from the orthogonality of the board axes, with the
/// principal point held at `principal`.
///
/// Each view gives two linear equations in `(1/fx², 1/fy²)`: the board's x
/// and y axes are orthogonal, and so are its two diagonals (equal axis
/// lengths). Returns `None` when the system is degenerate, e.g. for
/// fronto-parallel views only.
pub(crate) fn focal_from_homographies(
    homographies: &[Homography],
    principal: (f64, f64),
) -> Option<(f64, f64)> {
    let (cx, cy) = principal;
    let shift = Matrix3::new(1.0, 0.0, -cx, 0.0, 1.0, -cy, 0.0, 0.0, 1.0);
    let n = homographies.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 2);
    let mut b = DVector::<f64>::zeros(2 * n);

    for (k, hom) in homographies.iter().enumerate() {
        let h = shift * hom.h;
        let c0: Vector3<f64> = h.column(0).into_owned();
        let c1: Vector3<f64> = h.column(1).into_owned();
        let d0 = (c0 + c1) * 0.5;
        let d1 = (c0 - c1) * 0.5;
        let (c0, c1) = (c0.try_normalize(1e-15)?, c1.try_normalize(1e-15)?);
        let (d0, d1) = (d0.try_normalize(1e-15)?, d1.try_normalize(1e-15)?);

        a[(2 * k, 0)] = c0.x * c1.x;
        a[(2 * k, 1)] = c0.y * c1.y;
        b[2 * k] = -c0.z * c1.z;
        a[(2 * k + 1, 0)] = d0.x * d1.x;
        a[(2 * k + 1, 1)] = d0.y * d1.y;
        b[2 * k + 1] = -d0.z * d1.z;
    }

    let inv_f2 = a.svd(true, true).solve(&b, 1e-15).ok()?;
    let fx = (1.0 / inv_f2[0].abs()).sqrt();
    let fy = (1.0 / inv_f2[1].abs()).sqrt();
    (fx.is_finite() && fy.is_finite() && fx > 0.0 && fy > 0.0).then_some((fx, fy))
}

/// Pose of the board from its undistorted normalized image points.
///
/// Decomposes `H ~ [r1 r2 t]`, projects the rotation onto SO(3) and keeps the
/// board in front of the camera.
pub(crate) fn pose_from_view(
    camera: &Camera,
    object: &[Point3<f64>],
    image: &[Point2<f64>],
) -> Option<Pose> {
    let normalized: Vec<Point2<f64>> = image
        .iter()
        .map(|p| Point2::from(camera.undistort_normalized(p)))
        .collect();
    let hom = estimate_homography(&board_xy(object), &normalized)?;
    let h = hom.h;

    let h1: Vector3<f64> = h.column(0).into_owned();
    let h2: Vector3<f64> = h.column(1).into_owned();
    let h3: Vector3<f64> = h.column(2).into_owned();
    let denom = 0.5 * (h1.norm() + h2.norm());
    if denom <= 1e-12 {
        return None;
    }
    let mut lambda = 1.0 / denom;
    if h3.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let t = h3 * lambda;
    let r3 = r1.cross(&r2);
    if r3.norm() <= 1e-12 {
        return None;
    }

    let r = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = r.svd(true, true);
    let (u, v_t) = (svd.u?, svd.v_t?);
    let mut rot = u * v_t;
    if rot.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        rot = u_flipped * v_t;
    }

    Some(Pose::from_rotation(&Rotation3::from_matrix_unchecked(rot), t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crossview_core::synthetic::{orbit_poses, project_grid};
    use crossview_core::{Distortion, Intrinsics};

    fn setup() -> (Camera, GridSpec, Vec<Pose>, Vec<Vec<Point2<f64>>>) {
        let camera = Camera::new(
            Intrinsics::new(820.0, 790.0, 320.0, 240.0),
            Distortion::default(),
        );
        let grid = GridSpec::default();
        let poses = orbit_poses(&grid, 4, 20.0);
        let views = poses
            .iter()
            .map(|p| project_grid(&camera, p, &grid).unwrap())
            .collect();
        (camera, grid, poses, views)
    }

    #[test]
    fn focal_lengths_from_exact_views() {
        let (_, grid, _, views) = setup();
        let homs = board_homographies(&grid.object_points(), &views).unwrap();
        let (fx, fy) = focal_from_homographies(&homs, (320.0, 240.0)).unwrap();
        assert_relative_eq!(fx, 820.0, max_relative = 1e-6);
        assert_relative_eq!(fy, 790.0, max_relative = 1e-6);
    }

    #[test]
    fn fronto_parallel_views_leave_focal_unobservable() {
        let h = Homography::from_array([
            [800.0, 0.0, 3200.0],
            [0.0, 800.0, 2400.0],
            [0.0, 0.0, 10.0],
        ]);
        assert!(focal_from_homographies(&[h, h], (320.0, 240.0)).is_none());
    }

    #[test]
    fn pose_from_exact_view() {
        let (camera, grid, poses, views) = setup();
        let object = grid.object_points();
        for (truth, view) in poses.iter().zip(&views) {
            let pose = pose_from_view(&camera, &object, view).unwrap();
            for k in 0..3 {
                assert_relative_eq!(pose.rvec[k], truth.rvec[k], epsilon = 1e-6);
                assert_relative_eq!(pose.tvec[k], truth.tvec[k], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn rejects_empty_and_short_views() {
        let grid = GridSpec::default();
        let size = ImageSize::new(640, 480);
        assert_eq!(validate_views(&[], &grid, size), Err(CalibError::NoViews));

        let short = vec![vec![Point2::new(0.0, 0.0); 3]];
        assert_eq!(
            validate_views(&short, &grid, size),
            Err(CalibError::ViewLength {
                view: 0,
                got: 3,
                expected: 70
            })
        );
    }
}
