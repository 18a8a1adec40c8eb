//! Composition of undistortion and an inter-view homography.

use crate::{RemapError, RemapTable};
use crossview_core::{Camera, Homography, ImageSize};
use nalgebra::{Point2, Vector3};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Undistort `p` with `camera` (keeping its own intrinsics) and return
/// `H * [x, y, 1]^T` without the perspective divide.
pub fn apply_transform(camera: &Camera, h: &Homography, p: &Point2<f64>) -> Vector3<f64> {
    let undistorted = camera.undistort_pixel(p, &camera.intrinsics);
    h.apply_homogeneous(&undistorted)
}

/// For every raw pixel of view A, its position in view B's undistorted pixel
/// grid: undistort with A, then apply `h_ab` with the guarded divide.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(camera_a, h_ab), fields(w = size_a.width, h = size_a.height))
)]
pub fn build_cross_view_map(
    camera_a: &Camera,
    size_a: ImageSize,
    h_ab: &Homography,
) -> Result<RemapTable, RemapError> {
    size_a.validate()?;
    if !camera_a.intrinsics.is_valid() {
        return Err(RemapError::InvalidIntrinsics);
    }
    let table = RemapTable::from_fn(size_a, |x, y| {
        let ua = camera_a.undistort_pixel(&Point2::new(x as f64, y as f64), &camera_a.intrinsics);
        let ub = h_ab.apply(&ua);
        (ub.x as f32, ub.y as f32)
    });
    let non_finite = table
        .map_x
        .iter()
        .chain(&table.map_y)
        .filter(|v| !v.is_finite())
        .count();
    if non_finite > 0 {
        log::warn!("cross-view map has {non_finite} non-finite entries");
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crossview_core::{Distortion, Intrinsics};

    #[test]
    fn apply_transform_is_undivided() {
        let camera = Camera::new(
            Intrinsics::new(300.0, 300.0, 100.0, 80.0),
            Distortion::default(),
        );
        let h = Homography::from_array([[2.0, 0.0, 1.0], [0.0, 2.0, -1.0], [0.0, 0.0, 2.0]]);
        let v = apply_transform(&camera, &h, &Point2::new(10.0, 20.0));
        assert_relative_eq!(v, Vector3::new(21.0, 39.0, 2.0), epsilon = 1e-9);
    }

    #[test]
    fn zero_denominator_is_guarded() {
        let camera = Camera::new(
            Intrinsics::new(1.0, 1.0, 0.0, 0.0),
            Distortion::default(),
        );
        // Third row vanishes at pixel (1, 1).
        let h = Homography::from_array([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, -1.0]]);
        let table = build_cross_view_map(&camera, ImageSize::new(3, 3), &h).unwrap();
        let (x, y) = table.get(1, 1);
        assert!(x.is_finite() && y.is_finite());
        assert_relative_eq!(x, 1.0e6, max_relative = 1e-4);
    }
}
