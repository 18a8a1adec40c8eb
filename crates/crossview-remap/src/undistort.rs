//! Dense undistortion maps.

use crate::{RemapError, RemapTable};
use crossview_core::{Camera, ImageSize, Intrinsics};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

const BORDER_SAMPLES: usize = 9;

/// Axis-aligned rectangle in normalized image coordinates.
#[derive(Clone, Copy, Debug)]
struct Rect {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl Rect {
    fn is_valid(&self) -> bool {
        self.x1 > self.x0 && self.y1 > self.y0
    }

    /// Intrinsics that stretch this rectangle across `size`.
    fn fit(&self, size: ImageSize) -> (f64, f64, f64, f64) {
        let fx = (size.width as f64 - 1.0) / (self.x1 - self.x0);
        let fy = (size.height as f64 - 1.0) / (self.y1 - self.y0);
        (fx, fy, -fx * self.x0, -fy * self.y0)
    }
}

/// Largest rectangle inside the undistorted image border and the smallest one
/// containing all of it, sampled on a 9x9 grid over the raw image.
fn border_rectangles(camera: &Camera, size: ImageSize) -> (Rect, Rect) {
    let n = BORDER_SAMPLES;
    let sx = (size.width as f64 - 1.0) / (n - 1) as f64;
    let sy = (size.height as f64 - 1.0) / (n - 1) as f64;

    let mut inner = Rect {
        x0: f64::MIN,
        y0: f64::MIN,
        x1: f64::MAX,
        y1: f64::MAX,
    };
    let mut outer = Rect {
        x0: f64::MAX,
        y0: f64::MAX,
        x1: f64::MIN,
        y1: f64::MIN,
    };
    for y in 0..n {
        for x in 0..n {
            let raw = Point2::new(x as f64 * sx, y as f64 * sy);
            let p = camera.undistort_normalized(&raw);
            outer.x0 = outer.x0.min(p.x);
            outer.x1 = outer.x1.max(p.x);
            outer.y0 = outer.y0.min(p.y);
            outer.y1 = outer.y1.max(p.y);
            if x == 0 {
                inner.x0 = inner.x0.max(p.x);
            }
            if x == n - 1 {
                inner.x1 = inner.x1.min(p.x);
            }
            if y == 0 {
                inner.y0 = inner.y0.max(p.y);
            }
            if y == n - 1 {
                inner.y1 = inner.y1.min(p.y);
            }
        }
    }
    (inner, outer)
}

/// Intrinsics for the undistorted image.
///
/// `alpha = 0` crops to the region where every destination pixel has a
/// valid source, `alpha = 1` keeps every source pixel visible; values in
/// between interpolate. Zero distortion returns the camera's own intrinsics.
pub fn optimal_new_intrinsics(
    camera: &Camera,
    size: ImageSize,
    alpha: f64,
) -> Result<Intrinsics, RemapError> {
    size.validate()?;
    if !camera.intrinsics.is_valid() {
        return Err(RemapError::InvalidIntrinsics);
    }
    if camera.distortion.is_zero() {
        return Ok(camera.intrinsics);
    }

    let (inner, outer) = border_rectangles(camera, size);
    if !inner.is_valid() || !outer.is_valid() {
        return Err(RemapError::EmptyFieldOfView);
    }
    let alpha = alpha.clamp(0.0, 1.0);
    let (fx0, fy0, cx0, cy0) = inner.fit(size);
    let (fx1, fy1, cx1, cy1) = outer.fit(size);
    let mix = |a: f64, b: f64| a * (1.0 - alpha) + b * alpha;

    let k = Intrinsics::new(mix(fx0, fx1), mix(fy0, fy1), mix(cx0, cx1), mix(cy0, cy1));
    if !k.is_valid() {
        return Err(RemapError::EmptyFieldOfView);
    }
    log::debug!(
        "new intrinsics (alpha={alpha}): fx={:.3} fy={:.3} cx={:.3} cy={:.3}",
        k.fx,
        k.fy,
        k.cx,
        k.cy
    );
    Ok(k)
}

/// Undistortion map with the crop-to-valid intrinsics (`alpha = 0`).
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(camera), fields(w = size.width, h = size.height))
)]
pub fn build_undistortion_map(
    camera: &Camera,
    size: ImageSize,
) -> Result<(RemapTable, Intrinsics), RemapError> {
    let new_intrinsics = optimal_new_intrinsics(camera, size, 0.0)?;
    let table = build_undistortion_map_with(camera, size, &new_intrinsics)?;
    Ok((table, new_intrinsics))
}

/// Map every pixel of the undistorted image (expressed in `new_intrinsics`)
/// to its distorted position in the raw image.
pub fn build_undistortion_map_with(
    camera: &Camera,
    size: ImageSize,
    new_intrinsics: &Intrinsics,
) -> Result<RemapTable, RemapError> {
    size.validate()?;
    if !camera.intrinsics.is_valid() || !new_intrinsics.is_valid() {
        return Err(RemapError::InvalidIntrinsics);
    }
    Ok(RemapTable::from_fn(size, |x, y| {
        let src = camera.distort_pixel(&Point2::new(x as f64, y as f64), new_intrinsics);
        (src.x as f32, src.y as f32)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crossview_core::Distortion;

    fn barrel() -> Camera {
        Camera::new(
            Intrinsics::new(400.0, 400.0, 160.0, 120.0),
            Distortion::radial_tangential(&[-0.3, 0.08, 0.0, 0.0]).unwrap(),
        )
    }

    #[test]
    fn zero_distortion_keeps_intrinsics() {
        let camera = Camera::new(
            Intrinsics::new(500.0, 510.0, 320.0, 240.0),
            Distortion::default(),
        );
        let k = optimal_new_intrinsics(&camera, ImageSize::new(640, 480), 0.0).unwrap();
        assert_eq!(k, camera.intrinsics);
    }

    #[test]
    fn alpha_zero_zooms_in_on_barrel_distortion() {
        let size = ImageSize::new(320, 240);
        let cropped = optimal_new_intrinsics(&barrel(), size, 0.0).unwrap();
        let full = optimal_new_intrinsics(&barrel(), size, 1.0).unwrap();
        assert!(cropped.fx > full.fx);
        assert!(cropped.fy > full.fy);
    }

    #[test]
    fn alpha_zero_map_stays_inside_source() {
        let size = ImageSize::new(320, 240);
        let (table, _) = build_undistortion_map(&barrel(), size).unwrap();
        for (&x, &y) in table.map_x.iter().zip(&table.map_y) {
            assert!(x > -0.5 && x < size.width as f32 - 0.5, "x={x}");
            assert!(y > -0.5 && y < size.height as f32 - 0.5, "y={y}");
        }
    }

    #[test]
    fn map_inverts_point_undistortion() {
        let camera = barrel();
        let size = ImageSize::new(320, 240);
        let (table, k) = build_undistortion_map(&camera, size).unwrap();
        let (sx, sy) = table.get(200, 70);
        let back = camera.undistort_pixel(&Point2::new(sx as f64, sy as f64), &k);
        assert_relative_eq!(back.x, 200.0, epsilon = 1e-2);
        assert_relative_eq!(back.y, 70.0, epsilon = 1e-2);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let camera = barrel();
        assert!(matches!(
            build_undistortion_map(&camera, ImageSize::new(0, 10)),
            Err(RemapError::Image(_))
        ));
        let bad = Camera::new(Intrinsics::new(0.0, 1.0, 0.0, 0.0), camera.distortion);
        assert_eq!(
            build_undistortion_map(&bad, ImageSize::new(10, 10)).unwrap_err(),
            RemapError::InvalidIntrinsics
        );
    }
}
