//! Dense Levenberg-Marquardt for small nonlinear least-squares problems.
//!
//! Solves the damped normal equations `(J^T J + λ D) δ = -J^T r` with
//! `D = diag(J^T J)` (Marquardt scaling), accepting a step only when it
//! lowers the cost.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

const NUMERIC_STEP: f64 = 1e-6;
const MIN_DIAG: f64 = 1e-12;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OptimError {
    #[error("problem has no parameters or no residuals")]
    EmptyProblem,

    #[error("initial residuals are not finite")]
    NonFiniteResidual,
}

/// Stop after `max_iters` outer iterations or when the relative parameter
/// update falls below `eps`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TermCriteria {
    pub max_iters: usize,
    pub eps: f64,
}

impl TermCriteria {
    pub fn new(max_iters: usize, eps: f64) -> Self {
        Self { max_iters, eps }
    }
}

impl Default for TermCriteria {
    fn default() -> Self {
        Self::new(30, f64::EPSILON)
    }
}

/// A residual function over a flat parameter vector.
pub trait LeastSquaresProblem {
    fn num_params(&self) -> usize;

    fn num_residuals(&self) -> usize;

    fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>);

    /// Jacobian of the residuals; central differences unless overridden.
    fn jacobian(&self, params: &DVector<f64>, jac: &mut DMatrix<f64>) {
        numeric_jacobian(self, params, jac);
    }
}

/// Step used for the central difference of parameter `value`.
#[inline]
pub fn numeric_step(value: f64) -> f64 {
    NUMERIC_STEP * value.abs().max(1.0)
}

/// Dense central-difference Jacobian.
pub fn numeric_jacobian<P: LeastSquaresProblem + ?Sized>(
    problem: &P,
    params: &DVector<f64>,
    jac: &mut DMatrix<f64>,
) {
    let m = problem.num_residuals();
    let mut plus = DVector::zeros(m);
    let mut minus = DVector::zeros(m);
    let mut p = params.clone();
    for j in 0..problem.num_params() {
        let orig = p[j];
        let h = numeric_step(orig);
        p[j] = orig + h;
        problem.residuals(&p, &mut plus);
        p[j] = orig - h;
        problem.residuals(&p, &mut minus);
        p[j] = orig;
        let inv = 0.5 / h;
        for i in 0..m {
            jac[(i, j)] = (plus[i] - minus[i]) * inv;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Relative parameter update fell below `eps`.
    ParamsConverged,
    /// Cost reached zero.
    CostConverged,
    MaxIterations,
    /// Damping grew past `lambda_max` without finding a descent step.
    LambdaExceeded,
}

#[derive(Debug, Clone, Copy)]
pub struct LmReport {
    pub initial_cost: f64,
    pub final_cost: f64,
    pub iterations: usize,
    pub termination: Termination,
}

#[derive(Debug, Clone, Copy)]
pub struct LevenbergMarquardt {
    pub criteria: TermCriteria,
    pub lambda_init: f64,
    pub lambda_max: f64,
    pub lambda_factor: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self::new(TermCriteria::default())
    }
}

impl LevenbergMarquardt {
    pub fn new(criteria: TermCriteria) -> Self {
        Self {
            criteria,
            lambda_init: 1e-3,
            lambda_max: 1e16,
            lambda_factor: 10.0,
        }
    }

    /// Minimize `problem` in place starting from `params`.
    pub fn minimize<P: LeastSquaresProblem + ?Sized>(
        &self,
        problem: &P,
        params: &mut DVector<f64>,
    ) -> Result<LmReport, OptimError> {
        let n = problem.num_params();
        let m = problem.num_residuals();
        if n == 0 || m == 0 {
            return Err(OptimError::EmptyProblem);
        }

        let mut r = DVector::zeros(m);
        problem.residuals(params, &mut r);
        if !r.iter().all(|v| v.is_finite()) {
            return Err(OptimError::NonFiniteResidual);
        }
        let mut cost = r.norm_squared();
        let initial_cost = cost;

        let mut jac = DMatrix::zeros(m, n);
        let mut trial_r = DVector::zeros(m);
        let mut lambda = self.lambda_init;
        let mut iterations = 0;

        let termination = 'outer: loop {
            if cost == 0.0 {
                break Termination::CostConverged;
            }
            if iterations >= self.criteria.max_iters {
                break Termination::MaxIterations;
            }
            iterations += 1;

            problem.jacobian(params, &mut jac);
            let jtj = jac.transpose() * &jac;
            let neg_jtr = -(jac.transpose() * &r);

            loop {
                let mut a = jtj.clone();
                for i in 0..n {
                    a[(i, i)] += lambda * jtj[(i, i)].max(MIN_DIAG);
                }

                if let Some(chol) = a.cholesky() {
                    let delta = chol.solve(&neg_jtr);
                    let trial = &*params + &delta;
                    problem.residuals(&trial, &mut trial_r);
                    let trial_cost = trial_r.norm_squared();

                    if trial_cost.is_finite() && trial_cost < cost {
                        let converged =
                            delta.norm() <= self.criteria.eps * (params.norm() + self.criteria.eps);
                        *params = trial;
                        std::mem::swap(&mut r, &mut trial_r);
                        cost = trial_cost;
                        lambda = (lambda / self.lambda_factor).max(1e-15);
                        if converged {
                            break 'outer Termination::ParamsConverged;
                        }
                        break;
                    }
                }

                lambda *= self.lambda_factor;
                if lambda > self.lambda_max {
                    break 'outer Termination::LambdaExceeded;
                }
            }
        };

        log::debug!(
            "lm: cost {:.6e} -> {:.6e} in {} iterations ({:?})",
            initial_cost,
            cost,
            iterations,
            termination
        );

        Ok(LmReport {
            initial_cost,
            final_cost: cost,
            iterations,
            termination,
        })
    }
}
