//! Step calculation for the Levenberg-Marquardt algorithm.
//!
//! This module computes the damped Gauss-Newton step
//! `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr` with Marquardt's diagonal scaling.

use crate::error::{EqFitError, Result};
use crate::utils::matrix_convert::{nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

/// Floor for the scaling diagonal, so parameters with a vanishing column still get damped.
const MIN_DIAGONAL: f64 = 1e-12;

/// Result of a Levenberg-Marquardt step calculation.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// The calculated step vector
    pub step: Array1<f64>,

    /// The reduction of `0.5·‖r‖²` predicted by the linearized model
    pub predicted_reduction: f64,

    /// The damping parameter used to calculate the step
    pub lambda: f64,
}

/// Handles step calculation for the Levenberg-Marquardt algorithm.
pub struct LmStep;

impl LmStep {
    /// Calculates the Levenberg-Marquardt step.
    ///
    /// # Arguments
    ///
    /// * `j_t_j` - The JᵀJ matrix at the current position
    /// * `j_t_r` - The Jᵀr vector at the current position
    /// * `lambda` - The damping parameter
    pub fn calculate_step(
        j_t_j: &Array2<f64>,
        j_t_r: &Array1<f64>,
        lambda: f64,
    ) -> Result<StepResult> {
        let mut augmented = ndarray_to_nalgebra(j_t_j);
        for i in 0..augmented.nrows() {
            augmented[(i, i)] += lambda * j_t_j[[i, i]].max(MIN_DIAGONAL);
        }

        let rhs = -ndarray_vec_to_nalgebra(j_t_r);
        let step = nalgebra_vec_to_ndarray(&Self::solve(augmented, rhs)?);

        if step.iter().any(|v| !v.is_finite()) {
            return Err(EqFitError::SingularMatrix);
        }

        let predicted_reduction = Self::predicted_reduction(j_t_j, j_t_r, &step);

        Ok(StepResult {
            step,
            predicted_reduction,
            lambda,
        })
    }

    /// Solves `a·x = b`, trying Cholesky, then LU, then a truncated SVD.
    fn solve(a: DMatrix<f64>, b: DVector<f64>) -> Result<DVector<f64>> {
        if let Some(cholesky) = a.clone().cholesky() {
            return Ok(cholesky.solve(&b));
        }
        if let Some(x) = a.clone().lu().solve(&b) {
            return Ok(x);
        }
        a.svd(true, true)
            .solve(&b, 1e-14)
            .map_err(|_| EqFitError::SingularMatrix)
    }

    /// Reduction of `0.5·‖r + Jδ‖²` relative to `0.5·‖r‖²`.
    fn predicted_reduction(j_t_j: &Array2<f64>, j_t_r: &Array1<f64>, step: &Array1<f64>) -> f64 {
        -step.dot(j_t_r) - 0.5 * step.dot(&j_t_j.dot(step))
    }
}
