//! Finite difference methods for numerical differentiation.
//!
//! Equation models have no analytic derivatives, so the optimizer works from a
//! forward-difference Jacobian computed here.

use crate::error::{EqFitError, Result};
use crate::problem::Problem;
use ndarray::{Array1, Array2};

/// Default step size for finite differences.
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Compute the Jacobian matrix using forward finite differences.
///
/// The Jacobian is the matrix of partial derivatives of the residuals with
/// respect to the parameters: J[i,j] = ∂residual[i]/∂param[j].
///
/// When the forward point cannot be evaluated (for example `sqrt` right at
/// the edge of its domain) a backward difference is used for that column.
///
/// # Arguments
///
/// * `problem` - The problem to evaluate
/// * `params` - The parameter values at which to evaluate the Jacobian
/// * `epsilon` - The relative step size for finite differences (optional)
pub fn jacobian(
    problem: &dyn Problem,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();
    let n_residuals = problem.residual_count();

    let residuals = problem.eval(params)?;
    if residuals.len() != n_residuals {
        return Err(EqFitError::DimensionMismatch(format!(
            "Expected {} residuals, got {}",
            n_residuals,
            residuals.len()
        )));
    }

    let mut jac = Array2::zeros((n_residuals, n_params));

    for j in 0..n_params {
        // Adapt epsilon to parameter scale
        let param_j = params[j];
        let eps_j = if param_j.abs() > 1.0 {
            param_j.abs() * eps
        } else {
            eps
        };

        let mut params_perturbed = params.clone();
        params_perturbed[j] = param_j + eps_j;
        let (residuals_perturbed, step) = match problem.eval(&params_perturbed) {
            Ok(r) => (r, eps_j),
            Err(_) => {
                params_perturbed[j] = param_j - eps_j;
                (problem.eval(&params_perturbed)?, -eps_j)
            }
        };

        for i in 0..n_residuals {
            jac[[i, j]] = (residuals_perturbed[i] - residuals[i]) / step;
        }
    }

    Ok(jac)
}
