//! Joint reprojection refinement of intrinsics, distortion and view poses.

use crossview_core::optim::{numeric_step, LeastSquaresProblem};
use crossview_core::{Camera, Distortion, Intrinsics, Pose};
use nalgebra::{DMatrix, DVector, Point2, Point3};

const INTRINSIC_PARAMS: usize = 4;
const POSE_PARAMS: usize = 6;

/// Residuals `project(pose_v * X_k) - x_vk` over all views.
///
/// Parameter layout: `[fx, fy, cx, cy, free distortion..., (rvec, tvec) per view]`.
/// Distortion entries not listed in `free` stay at their value in `fixed`.
pub(crate) struct BundleProblem<'a> {
    pub object: &'a [Point3<f64>],
    pub views: &'a [Vec<Point2<f64>>],
    pub fixed: Distortion,
    pub free: Vec<usize>,
}

impl<'a> BundleProblem<'a> {
    fn pose_offset(&self) -> usize {
        INTRINSIC_PARAMS + self.free.len()
    }

    /// Pack a camera and poses into a parameter vector.
    pub fn pack(&self, camera: &Camera, poses: &[Pose]) -> DVector<f64> {
        let mut p = DVector::zeros(self.num_params());
        let k = &camera.intrinsics;
        p[0] = k.fx;
        p[1] = k.fy;
        p[2] = k.cx;
        p[3] = k.cy;
        let coeffs = camera.distortion.coeffs();
        for (slot, &idx) in self.free.iter().enumerate() {
            p[INTRINSIC_PARAMS + slot] = coeffs[idx];
        }
        let offset = self.pose_offset();
        for (v, pose) in poses.iter().enumerate() {
            let start = offset + v * POSE_PARAMS;
            p.as_mut_slice()[start..start + POSE_PARAMS].copy_from_slice(&pose.to_params());
        }
        p
    }

    pub fn camera(&self, p: &DVector<f64>) -> Camera {
        let mut distortion = self.fixed;
        let coeffs = distortion.coeffs_mut();
        for (slot, &idx) in self.free.iter().enumerate() {
            coeffs[idx] = p[INTRINSIC_PARAMS + slot];
        }
        Camera::new(Intrinsics::new(p[0], p[1], p[2], p[3]), distortion)
    }

    pub fn pose(&self, p: &DVector<f64>, view: usize) -> Pose {
        let start = self.pose_offset() + view * POSE_PARAMS;
        Pose::from_params(&p.as_slice()[start..start + POSE_PARAMS])
    }

    fn view_residuals(&self, camera: &Camera, pose: &Pose, view: usize, out: &mut [f64]) {
        let rotation = pose.rotation();
        let t = nalgebra::Vector3::from(pose.tvec);
        for (k, (obj, obs)) in self.object.iter().zip(&self.views[view]).enumerate() {
            let pc = rotation * obj + t;
            let proj = if pc.z > 1e-12 {
                camera.project(&pc)
            } else {
                Point2::new(f64::NAN, f64::NAN)
            };
            out[2 * k] = proj.x - obs.x;
            out[2 * k + 1] = proj.y - obs.y;
        }
    }

    fn block_len(&self) -> usize {
        2 * self.object.len()
    }
}

impl LeastSquaresProblem for BundleProblem<'_> {
    fn num_params(&self) -> usize {
        self.pose_offset() + POSE_PARAMS * self.views.len()
    }

    fn num_residuals(&self) -> usize {
        self.block_len() * self.views.len()
    }

    fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>) {
        let camera = self.camera(params);
        let len = self.block_len();
        for view in 0..self.views.len() {
            let pose = self.pose(params, view);
            let block = &mut out.as_mut_slice()[view * len..(view + 1) * len];
            self.view_residuals(&camera, &pose, view, block);
        }
    }

    /// Central differences; pose columns only touch their own view's rows.
    fn jacobian(&self, params: &DVector<f64>, jac: &mut DMatrix<f64>) {
        jac.fill(0.0);
        let len = self.block_len();
        let shared = self.pose_offset();
        let mut p = params.clone();

        let m = self.num_residuals();
        let mut plus = DVector::zeros(m);
        let mut minus = DVector::zeros(m);
        for j in 0..shared {
            let orig = p[j];
            let h = numeric_step(orig);
            p[j] = orig + h;
            self.residuals(&p, &mut plus);
            p[j] = orig - h;
            self.residuals(&p, &mut minus);
            p[j] = orig;
            let inv = 0.5 / h;
            for i in 0..m {
                jac[(i, j)] = (plus[i] - minus[i]) * inv;
            }
        }

        let camera = self.camera(params);
        let mut plus = vec![0.0; len];
        let mut minus = vec![0.0; len];
        for view in 0..self.views.len() {
            let start = shared + view * POSE_PARAMS;
            let mut block = self.pose(params, view).to_params();
            for c in 0..POSE_PARAMS {
                let orig = block[c];
                let h = numeric_step(orig);
                block[c] = orig + h;
                self.view_residuals(&camera, &Pose::from_params(&block), view, &mut plus);
                block[c] = orig - h;
                self.view_residuals(&camera, &Pose::from_params(&block), view, &mut minus);
                block[c] = orig;
                let inv = 0.5 / h;
                for i in 0..len {
                    jac[(view * len + i, start + c)] = (plus[i] - minus[i]) * inv;
                }
            }
        }
    }
}
