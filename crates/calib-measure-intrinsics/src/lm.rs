//! Levenberg-Marquardt solver for dense non-linear least squares.
//!
//! Minimizes `||r(x)||^2` by solving the Marquardt-damped normal equations
//! `(J^T J + λ diag(J^T J)) δ = -J^T r` with a Cholesky factorization.

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A residual function with its Jacobian.
///
/// Parameters whose Jacobian column is identically zero are held fixed.
pub trait LeastSquaresProblem {
    /// Residual vector at `params`; `None` if the model cannot be evaluated.
    fn residuals(&self, params: &DVector<f64>) -> Option<DVector<f64>>;

    /// Jacobian of [`Self::residuals`] at `params`, one column per parameter.
    fn jacobian(&self, params: &DVector<f64>) -> Option<DMatrix<f64>>;
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("problem has no parameters")]
    NoParameters,
    #[error("residuals cannot be evaluated at the initial guess")]
    InvalidStart,
    #[error("jacobian evaluation failed at iteration {0}")]
    Jacobian(usize),
}

/// Reason why the optimizer terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Relative cost decrease below tolerance.
    CostConverged,
    /// Relative step norm below tolerance.
    StepConverged,
    /// Gradient infinity norm below tolerance.
    GradientConverged,
    MaxIterations,
    /// Damping grew past `lambda_max` without finding a better point.
    LambdaMaxExceeded,
}

/// Summary of one optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverReport {
    /// Sum of squared residuals at the initial guess.
    pub initial_cost: f64,
    /// Sum of squared residuals at the solution.
    pub final_cost: f64,
    pub iterations: usize,
    pub termination: TerminationReason,
}

/// Levenberg-Marquardt optimizer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LevenbergMarquardt {
    pub lambda_init: f64,
    pub lambda_max: f64,
    pub lambda_factor: f64,
    pub max_iterations: usize,
    pub cost_tolerance: f64,
    pub step_tolerance: f64,
    pub gradient_tolerance: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            lambda_init: 1e-3,
            lambda_max: 1e12,
            lambda_factor: 10.0,
            max_iterations: 100,
            cost_tolerance: 1e-12,
            step_tolerance: 1e-10,
            gradient_tolerance: 1e-12,
        }
    }
}

fn is_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

impl LevenbergMarquardt {
    pub fn minimize<P: LeastSquaresProblem + ?Sized>(
        &self,
        problem: &P,
        x0: DVector<f64>,
    ) -> Result<(DVector<f64>, SolverReport), SolverError> {
        if x0.is_empty() {
            return Err(SolverError::NoParameters);
        }

        let mut x = x0;
        let mut r = problem
            .residuals(&x)
            .filter(is_finite)
            .ok_or(SolverError::InvalidStart)?;
        let mut cost = r.norm_squared();
        let initial_cost = cost;

        let mut lambda = self.lambda_init;
        let mut iterations = 0;
        let mut normal: Option<(DMatrix<f64>, DVector<f64>)> = None;

        let termination = loop {
            if iterations >= self.max_iterations {
                break TerminationReason::MaxIterations;
            }

            let (jtj, jtr) = match normal.take() {
                Some(system) => system,
                None => {
                    let j = problem
                        .jacobian(&x)
                        .ok_or(SolverError::Jacobian(iterations))?;
                    (j.tr_mul(&j), j.tr_mul(&r))
                }
            };

            if jtr.amax() < self.gradient_tolerance {
                break TerminationReason::GradientConverged;
            }
            iterations += 1;

            let Some(delta) = solve_damped(&jtj, &jtr, lambda) else {
                lambda *= self.lambda_factor;
                if lambda > self.lambda_max {
                    break TerminationReason::LambdaMaxExceeded;
                }
                normal = Some((jtj, jtr));
                continue;
            };

            if delta.norm() < self.step_tolerance * (x.norm() + self.step_tolerance) {
                break TerminationReason::StepConverged;
            }

            let candidate = &x + &delta;
            match problem.residuals(&candidate).filter(is_finite) {
                Some(r_new) if r_new.norm_squared() < cost => {
                    let new_cost = r_new.norm_squared();
                    let relative = (cost - new_cost) / cost.max(f64::MIN_POSITIVE);
                    x = candidate;
                    r = r_new;
                    cost = new_cost;
                    lambda = (lambda / self.lambda_factor).max(1e-15);
                    trace!("lm iter {iterations}: cost {cost:.6e}, lambda {lambda:.1e}");
                    if relative < self.cost_tolerance {
                        break TerminationReason::CostConverged;
                    }
                }
                _ => {
                    lambda *= self.lambda_factor;
                    if lambda > self.lambda_max {
                        break TerminationReason::LambdaMaxExceeded;
                    }
                    normal = Some((jtj, jtr));
                }
            }
        };

        debug!(
            "lm finished after {iterations} iterations ({termination:?}): cost {initial_cost:.6e} -> {cost:.6e}"
        );
        Ok((
            x,
            SolverReport {
                initial_cost,
                final_cost: cost,
                iterations,
                termination,
            },
        ))
    }
}

/// Solve `(J^T J + λ diag(J^T J)) δ = -J^T r`.
fn solve_damped(jtj: &DMatrix<f64>, jtr: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let mut h = jtj.clone();
    for i in 0..h.nrows() {
        let d = jtj[(i, i)];
        if d > 0.0 {
            h[(i, i)] += lambda * d;
        } else {
            // Fixed parameter: zero column, zero gradient, zero step.
            h[(i, i)] = 1.0;
        }
    }
    let delta = h.cholesky()?.solve(&(-jtr));
    is_finite(&delta).then_some(delta)
}
