//! Levenberg-Marquardt polish of a homography on its inliers.

use crossview_core::optim::LeastSquaresProblem;
use crossview_core::{Homography, LevenbergMarquardt, TermCriteria};
use nalgebra::{DVector, Matrix3, Point2};

const POLISH_ITERS: usize = 10;

/// Forward transfer residuals with `h33` fixed to 1.
struct TransferProblem<'a> {
    src: &'a [Point2<f64>],
    dst: &'a [Point2<f64>],
}

fn from_params(p: &DVector<f64>) -> Homography {
    Homography::new(Matrix3::new(p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7], 1.0))
}

impl LeastSquaresProblem for TransferProblem<'_> {
    fn num_params(&self) -> usize {
        8
    }

    fn num_residuals(&self) -> usize {
        2 * self.src.len()
    }

    fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>) {
        let h = from_params(params);
        for (k, (s, d)) in self.src.iter().zip(self.dst).enumerate() {
            let v = h.apply_homogeneous(s);
            out[2 * k] = v.x / v.z - d.x;
            out[2 * k + 1] = v.y / v.z - d.y;
        }
    }
}

/// Minimize the transfer error of `h` over the given pairs.
///
/// Returns `h` unchanged when it cannot be scaled to `h33 = 1` or the
/// refinement does not lower the cost.
pub(crate) fn polish(h: &Homography, src: &[Point2<f64>], dst: &[Point2<f64>]) -> Homography {
    if h.h[(2, 2)].abs() <= 1e-12 || src.len() < 4 {
        return *h;
    }
    let h = h.normalized();
    let mut params = DVector::from_iterator(8, h.h.transpose().iter().copied().take(8));
    let problem = TransferProblem { src, dst };
    let lm = LevenbergMarquardt::new(TermCriteria::new(POLISH_ITERS, f64::EPSILON));
    match lm.minimize(&problem, &mut params) {
        Ok(report) if report.final_cost < report.initial_cost => {
            let refined = from_params(&params);
            if refined.is_finite() {
                refined
            } else {
                h
            }
        }
        _ => h,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn polish_removes_perturbation() {
        let truth = Homography::from_array([
            [1.1, 0.05, 12.0],
            [-0.03, 0.95, -4.0],
            [1e-4, -2e-4, 1.0],
        ]);
        let src: Vec<_> = (0..25)
            .map(|k| Point2::new((k % 5) as f64 * 40.0, (k / 5) as f64 * 30.0))
            .collect();
        let dst: Vec<_> = src.iter().map(|p| truth.apply(p)).collect();

        let mut rough = truth;
        rough.h[(0, 2)] += 1.5;
        rough.h[(1, 0)] += 0.01;
        let refined = polish(&rough, &src, &dst);
        for (s, d) in src.iter().zip(&dst) {
            assert_relative_eq!(refined.transfer_error(s, d), 0.0, epsilon = 1e-6);
        }
    }
}
