//! Convergence criteria for the Levenberg-Marquardt algorithm.
//!
//! This module defines the criteria used to determine when the solver has
//! converged to a solution, and the ways it can stop without converging.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Possible convergence states of the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// The algorithm is still running.
    Running,

    /// Converged due to a small parameter change.
    ParameterConvergence,

    /// Converged due to a small change of the sum of squares.
    FunctionValueConvergence,

    /// Converged due to a small gradient.
    GradientConvergence,

    /// The residuals are zero to machine precision.
    ExactFit,

    /// Terminated after reaching the maximum number of iterations.
    MaxIterationsReached,

    /// Terminated because the damping hit its upper limit.
    DampingSaturated,
}

impl ConvergenceStatus {
    /// Returns true if the optimization has terminated (either converged or failed).
    pub fn is_terminated(&self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }

    /// Returns true if the optimization has converged.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            ConvergenceStatus::ParameterConvergence
                | ConvergenceStatus::FunctionValueConvergence
                | ConvergenceStatus::GradientConvergence
                | ConvergenceStatus::ExactFit
        )
    }

    /// Returns a description of the convergence status.
    pub fn description(&self) -> &'static str {
        match self {
            ConvergenceStatus::Running => "Optimization is still running",
            ConvergenceStatus::ParameterConvergence => "Converged: small parameter change",
            ConvergenceStatus::FunctionValueConvergence => "Converged: small function value change",
            ConvergenceStatus::GradientConvergence => "Converged: small gradient",
            ConvergenceStatus::ExactFit => "Converged: residuals are zero",
            ConvergenceStatus::MaxIterationsReached => "Terminated: maximum iterations reached",
            ConvergenceStatus::DampingSaturated => "Terminated: damping parameter saturated",
        }
    }
}

/// Criteria for determining when the solver has converged.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceCriteria {
    /// Tolerance for change in parameter values.
    pub xtol: f64,

    /// Tolerance for change in function value.
    pub ftol: f64,

    /// Tolerance for gradient norm.
    pub gtol: f64,

    /// Maximum number of iterations.
    pub max_iterations: usize,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            xtol: 1e-10,
            ftol: 1e-10,
            gtol: 1e-10,
            max_iterations: 1000,
        }
    }
}

impl ConvergenceCriteria {
    /// Creates a new set of convergence criteria with the given tolerances.
    pub fn new(xtol: f64, ftol: f64, gtol: f64, max_iterations: usize) -> Self {
        Self {
            xtol,
            ftol,
            gtol,
            max_iterations,
        }
    }

    /// Largest relative parameter change of a step.
    pub fn relative_step(params: &Array1<f64>, new_params: &Array1<f64>) -> f64 {
        new_params
            .iter()
            .zip(params.iter())
            .map(|(a, b)| (a - b).abs() / b.abs().max(1.0))
            .fold(0.0, f64::max)
    }

    /// Whether a step is too small to make further progress.
    pub fn step_converged(&self, params: &Array1<f64>, new_params: &Array1<f64>) -> bool {
        Self::relative_step(params, new_params) < self.xtol
    }

    /// Checks a point before a step is attempted.
    ///
    /// `cost` is half the sum of squares and `gradient_norm` the infinity norm of Jᵀr.
    pub fn check_point(&self, cost: f64, gradient_norm: f64, iterations: usize) -> ConvergenceStatus {
        if cost <= f64::EPSILON * f64::EPSILON {
            return ConvergenceStatus::ExactFit;
        }
        if gradient_norm < self.gtol {
            return ConvergenceStatus::GradientConvergence;
        }
        if iterations >= self.max_iterations {
            return ConvergenceStatus::MaxIterationsReached;
        }
        ConvergenceStatus::Running
    }

    /// Checks an accepted step.
    pub fn check_step(
        &self,
        params: &Array1<f64>,
        new_params: &Array1<f64>,
        cost: f64,
        new_cost: f64,
    ) -> ConvergenceStatus {
        if self.step_converged(params, new_params) {
            return ConvergenceStatus::ParameterConvergence;
        }

        let cost_change = (cost - new_cost).abs() / cost.max(f64::MIN_POSITIVE);
        if cost_change < self.ftol {
            return ConvergenceStatus::FunctionValueConvergence;
        }

        ConvergenceStatus::Running
    }
}
