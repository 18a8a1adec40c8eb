//! Pinhole intrinsics plus the two supported lens distortion models.

use nalgebra::{Matrix3, Point2, Point3, Vector2};
use serde::{Deserialize, Serialize};

/// Maximum fixed-point iterations when inverting the radial-tangential model.
pub const UNDISTORT_MAX_ITERS: usize = 20;
const UNDISTORT_EPS: f64 = 1e-14;
const FISHEYE_NEWTON_ITERS: usize = 10;

/// Focal lengths and principal point of a zero-skew pinhole camera.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Read `[[fx, _, cx], [_, fy, cy], [_, _, _]]`; skew and the last row are ignored.
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self::new(k[(0, 0)], k[(1, 1)], k[(0, 2)], k[(1, 2)])
    }

    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    pub fn is_valid(&self) -> bool {
        self.fx > 0.0
            && self.fy > 0.0
            && self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
    }

    #[inline]
    pub fn normalize(&self, p: &Point2<f64>) -> Vector2<f64> {
        Vector2::new((p.x - self.cx) / self.fx, (p.y - self.cy) / self.fy)
    }

    #[inline]
    pub fn denormalize(&self, n: &Vector2<f64>) -> Point2<f64> {
        Point2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }
}

/// Discriminant of [`Distortion`], used where only the model choice is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistortionKind {
    RadialTangential,
    Fisheye,
}

/// Lens distortion acting on normalized image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", content = "coeffs", rename_all = "snake_case")]
pub enum Distortion {
    /// Rational radial + tangential model, OpenCV order `k1 k2 p1 p2 k3 k4 k5 k6`.
    RadialTangential([f64; 8]),
    /// Equidistant fisheye model, `k1 k2 k3 k4`.
    Fisheye([f64; 4]),
}

impl Default for Distortion {
    fn default() -> Self {
        Self::RadialTangential([0.0; 8])
    }
}

impl Distortion {
    pub fn zero(kind: DistortionKind) -> Self {
        match kind {
            DistortionKind::RadialTangential => Self::RadialTangential([0.0; 8]),
            DistortionKind::Fisheye => Self::Fisheye([0.0; 4]),
        }
    }

    /// Build a radial-tangential model from 4, 5 or 8 coefficients.
    pub fn radial_tangential(coeffs: &[f64]) -> Option<Self> {
        if !matches!(coeffs.len(), 4 | 5 | 8) {
            return None;
        }
        let mut k = [0.0; 8];
        k[..coeffs.len()].copy_from_slice(coeffs);
        Some(Self::RadialTangential(k))
    }

    pub fn fisheye(coeffs: &[f64]) -> Option<Self> {
        let k: [f64; 4] = coeffs.try_into().ok()?;
        Some(Self::Fisheye(k))
    }

    pub fn from_coeffs(kind: DistortionKind, coeffs: &[f64]) -> Option<Self> {
        match kind {
            DistortionKind::RadialTangential => Self::radial_tangential(coeffs),
            DistortionKind::Fisheye => Self::fisheye(coeffs),
        }
    }

    pub fn kind(&self) -> DistortionKind {
        match self {
            Self::RadialTangential(_) => DistortionKind::RadialTangential,
            Self::Fisheye(_) => DistortionKind::Fisheye,
        }
    }

    pub fn coeffs(&self) -> &[f64] {
        match self {
            Self::RadialTangential(k) => k.as_slice(),
            Self::Fisheye(k) => k.as_slice(),
        }
    }

    pub fn coeffs_mut(&mut self) -> &mut [f64] {
        match self {
            Self::RadialTangential(k) => k.as_mut_slice(),
            Self::Fisheye(k) => k.as_mut_slice(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs().iter().all(|&k| k == 0.0)
    }

    /// Map ideal normalized coordinates to distorted normalized coordinates.
    pub fn distort(&self, n: &Vector2<f64>) -> Vector2<f64> {
        match self {
            Self::RadialTangential(k) => {
                let [k1, k2, p1, p2, k3, k4, k5, k6] = *k;
                let (x, y) = (n.x, n.y);
                let r2 = x * x + y * y;
                let r4 = r2 * r2;
                let r6 = r4 * r2;
                let radial = (1.0 + k1 * r2 + k2 * r4 + k3 * r6) / (1.0 + k4 * r2 + k5 * r4 + k6 * r6);
                let xy2 = 2.0 * x * y;
                Vector2::new(
                    x * radial + p1 * xy2 + p2 * (r2 + 2.0 * x * x),
                    y * radial + p1 * (r2 + 2.0 * y * y) + p2 * xy2,
                )
            }
            Self::Fisheye(k) => {
                let r = n.norm();
                if r < 1e-12 {
                    return *n;
                }
                let theta = r.atan();
                n * (fisheye_theta_d(k, theta) / r)
            }
        }
    }

    /// Invert [`Distortion::distort`] numerically.
    pub fn undistort(&self, nd: &Vector2<f64>) -> Vector2<f64> {
        match self {
            Self::RadialTangential(k) => {
                let [k1, k2, p1, p2, k3, k4, k5, k6] = *k;
                let (x0, y0) = (nd.x, nd.y);
                let (mut x, mut y) = (x0, y0);
                for _ in 0..UNDISTORT_MAX_ITERS {
                    let r2 = x * x + y * y;
                    let icdist = (1.0 + ((k6 * r2 + k5) * r2 + k4) * r2)
                        / (1.0 + ((k3 * r2 + k2) * r2 + k1) * r2);
                    if icdist < 0.0 {
                        return *nd;
                    }
                    let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
                    let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
                    let nx = (x0 - dx) * icdist;
                    let ny = (y0 - dy) * icdist;
                    let step = (nx - x).abs() + (ny - y).abs();
                    x = nx;
                    y = ny;
                    if step < UNDISTORT_EPS {
                        break;
                    }
                }
                Vector2::new(x, y)
            }
            Self::Fisheye(k) => {
                let theta_d = nd.norm().min(std::f64::consts::FRAC_PI_2);
                if theta_d < 1e-12 {
                    return *nd;
                }
                let mut theta = theta_d;
                for _ in 0..FISHEYE_NEWTON_ITERS {
                    let t2 = theta * theta;
                    let t4 = t2 * t2;
                    let t6 = t4 * t2;
                    let t8 = t4 * t4;
                    let f = fisheye_theta_d(k, theta) - theta_d;
                    let df = 1.0 + 3.0 * k[0] * t2 + 5.0 * k[1] * t4 + 7.0 * k[2] * t6 + 9.0 * k[3] * t8;
                    if df.abs() < 1e-12 {
                        break;
                    }
                    let step = f / df;
                    theta -= step;
                    if step.abs() < 1e-12 {
                        break;
                    }
                }
                let scale = theta.tan() / nd.norm();
                nd * scale
            }
        }
    }
}

#[inline]
fn fisheye_theta_d(k: &[f64; 4], theta: f64) -> f64 {
    let t2 = theta * theta;
    theta * (1.0 + t2 * (k[0] + t2 * (k[1] + t2 * (k[2] + t2 * k[3]))))
}

/// Intrinsics together with a distortion model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub intrinsics: Intrinsics,
    pub distortion: Distortion,
}

impl Camera {
    pub fn new(intrinsics: Intrinsics, distortion: Distortion) -> Self {
        Self {
            intrinsics,
            distortion,
        }
    }

    /// Project a camera-frame point to distorted pixel coordinates.
    ///
    /// Points at `z == 0` produce non-finite output; callers filter those.
    pub fn project(&self, p: &Point3<f64>) -> Point2<f64> {
        let n = Vector2::new(p.x / p.z, p.y / p.z);
        self.intrinsics.denormalize(&self.distortion.distort(&n))
    }

    /// Undistorted normalized coordinates of a raw pixel.
    pub fn undistort_normalized(&self, p: &Point2<f64>) -> Vector2<f64> {
        self.distortion.undistort(&self.intrinsics.normalize(p))
    }

    /// Undistort a raw pixel and re-project it through `new_intrinsics`.
    pub fn undistort_pixel(&self, p: &Point2<f64>, new_intrinsics: &Intrinsics) -> Point2<f64> {
        new_intrinsics.denormalize(&self.undistort_normalized(p))
    }

    /// Distorted pixel position of an ideal pixel expressed in `new_intrinsics`.
    pub fn distort_pixel(&self, p: &Point2<f64>, new_intrinsics: &Intrinsics) -> Point2<f64> {
        let n = new_intrinsics.normalize(p);
        self.intrinsics.denormalize(&self.distortion.distort(&n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_points() -> Vec<Vector2<f64>> {
        vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(0.1, -0.05),
            Vector2::new(-0.3, 0.2),
            Vector2::new(0.35, 0.3),
        ]
    }

    #[test]
    fn radial_tangential_undistort_inverts_distort() {
        let d = Distortion::radial_tangential(&[-0.12, 0.03, 0.001, -0.0015, -0.004]).unwrap();
        for n in sample_points() {
            let back = d.undistort(&d.distort(&n));
            assert_relative_eq!(back, n, epsilon = 1e-9);
        }
    }

    #[test]
    fn rational_model_round_trips() {
        let d = Distortion::RadialTangential([0.2, -0.05, 0.0, 0.0, 0.01, 0.1, 0.02, 0.003]);
        for n in sample_points() {
            let back = d.undistort(&d.distort(&n));
            assert_relative_eq!(back, n, epsilon = 1e-8);
        }
    }

    #[test]
    fn fisheye_undistort_inverts_distort() {
        let d = Distortion::fisheye(&[0.05, -0.01, 0.002, -0.0005]).unwrap();
        for n in sample_points().into_iter().chain([Vector2::new(1.5, -0.8)]) {
            let back = d.undistort(&d.distort(&n));
            assert_relative_eq!(back, n, epsilon = 1e-9);
        }
    }

    #[test]
    fn zero_distortion_pixel_undistort_is_identity() {
        let cam = Camera::new(Intrinsics::new(800.0, 790.0, 320.0, 240.0), Distortion::default());
        for (x, y) in [(0.0, 0.0), (10.0, 470.0), (639.0, 3.0), (321.5, 240.25)] {
            let p = Point2::new(x, y);
            let q = cam.undistort_pixel(&p, &cam.intrinsics);
            assert_relative_eq!(q, p, epsilon = 1e-9);
        }
    }

    #[test]
    fn coefficient_lengths_are_checked() {
        assert!(Distortion::radial_tangential(&[0.0; 6]).is_none());
        assert!(Distortion::fisheye(&[0.0; 5]).is_none());
        let d = Distortion::radial_tangential(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(d.coeffs(), &[0.1, 0.2, 0.3, 0.4, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(d.kind(), DistortionKind::RadialTangential);
    }

    #[test]
    fn distortion_serializes_with_model_tag() {
        let d = Distortion::Fisheye([0.1, 0.0, 0.0, 0.0]);
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"{"model":"fisheye","coeffs":[0.1,0.0,0.0,0.0]}"#);
        let back: Distortion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
