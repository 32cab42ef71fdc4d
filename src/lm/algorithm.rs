//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! This module contains the core loop of the solver: it evaluates the Jacobian,
//! tries damped steps until one lowers the sum of squares, and adapts the
//! damping parameter between iterations.

use log::debug;
use ndarray::Array1;
use std::fmt;

use crate::error::{EqFitError, Result};
use crate::problem::Problem;

use super::config::LmConfig;
use super::convergence::{ConvergenceCriteria, ConvergenceStatus};
use super::step::LmStep;

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of iterations performed
    pub iterations: usize,

    /// Number of function evaluations
    pub func_evals: usize,

    /// Whether the optimization converged
    pub success: bool,

    /// Why the optimization stopped
    pub status: ConvergenceStatus,

    /// A message describing the result
    pub message: String,
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: LmConfig,
}

fn half_sum_of_squares(residuals: &Array1<f64>) -> f64 {
    0.5 * residuals.dot(residuals)
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Minimize the sum of squared residuals of `problem` starting from `initial_params`.
    ///
    /// An error at the starting point is returned as is. Running out of
    /// iterations or damping is not an error: the result then has
    /// `success == false` and the caller decides what to do with it.
    ///
    /// While no trial step is accepted the damping keeps rising, which shrinks
    /// the predicted reduction. Once it drops to `ftol * cost` the point counts
    /// as converged with [`ConvergenceStatus::FunctionValueConvergence`], so
    /// [`ConvergenceStatus::DampingSaturated`] is only reported when
    /// `max_lambda` is reached before that.
    pub fn minimize<P: Problem>(&self, problem: &P, initial_params: Array1<f64>) -> Result<LmResult> {
        let config = &self.config;
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(EqFitError::DimensionMismatch(format!(
                "Expected {} initial parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let criteria = ConvergenceCriteria::new(
            config.xtol,
            config.ftol,
            config.gtol,
            config.max_iterations,
        );

        let mut params = initial_params;
        let mut residuals = problem.eval(&params)?;
        if let Some(bad) = residuals.iter().find(|r| !r.is_finite()) {
            return Err(EqFitError::Evaluation(format!(
                "residual is {} at the initial parameters",
                bad
            )));
        }
        let mut cost = half_sum_of_squares(&residuals);
        let mut func_evals = 1;
        let mut iterations = 0;
        let mut lambda = config.initial_lambda;

        let status = loop {
            let jacobian = problem.jacobian(&params, config.diff_step)?;
            func_evals += n_params + 1;

            let j_t_j = jacobian.t().dot(&jacobian);
            let j_t_r = jacobian.t().dot(&residuals);
            let gradient_norm = j_t_r.iter().fold(0.0_f64, |acc, g| acc.max(g.abs()));

            let status = criteria.check_point(cost, gradient_norm, iterations);
            if status.is_terminated() {
                break status;
            }
            iterations += 1;

            // Raise lambda until a step lowers the cost
            let status = loop {
                if let Ok(trial) = LmStep::calculate_step(&j_t_j, &j_t_r, lambda) {
                    let new_params = &params + &trial.step;
                    if criteria.step_converged(&params, &new_params) {
                        break ConvergenceStatus::ParameterConvergence;
                    }
                    // Even the linear model sees nothing left to gain
                    if trial.predicted_reduction <= config.ftol * cost {
                        break ConvergenceStatus::FunctionValueConvergence;
                    }

                    func_evals += 1;
                    if let Ok(new_residuals) = problem.eval(&new_params) {
                        let new_cost = half_sum_of_squares(&new_residuals);
                        if new_cost.is_finite() && new_cost < cost {
                            let status = criteria.check_step(&params, &new_params, cost, new_cost);
                            params = new_params;
                            residuals = new_residuals;
                            cost = new_cost;
                            lambda = (lambda * config.lambda_down_factor).max(config.min_lambda);
                            break status;
                        }
                    }
                }

                lambda *= config.lambda_up_factor;
                if lambda > config.max_lambda {
                    break ConvergenceStatus::DampingSaturated;
                }
            };

            debug!(
                "LM iteration {}: cost={:.6e} lambda={:.1e} |g|={:.3e}",
                iterations,
                2.0 * cost,
                lambda,
                gradient_norm
            );

            if status.is_terminated() {
                break status;
            }
        };

        Ok(LmResult {
            params,
            residuals,
            cost: 2.0 * cost,
            iterations,
            func_evals,
            success: status.is_converged(),
            status,
            message: status.description().to_string(),
        })
    }
}
