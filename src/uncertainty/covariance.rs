//! # Covariance Matrix Calculations
//!
//! This module provides functions for calculating covariance, correlation and
//! standard errors from the Jacobian of a nonlinear least-squares fit.

use crate::error::{EqFitError, Result};
use crate::utils::matrix_convert::{nalgebra_to_ndarray, ndarray_to_nalgebra};
use ndarray::{Array1, Array2};

/// Calculate covariance matrix from Jacobian matrix.
///
/// For nonlinear least-squares problems, the covariance matrix is estimated as:
///   covar = redchi * inv(J^T * J)
/// where:
///   - J is the Jacobian matrix
///   - redchi is the reduced chi-square (chi^2 / nfree)
///
/// Returns [`EqFitError::SingularMatrix`] when `J^T * J` cannot be inverted or
/// the inverse has a non-positive diagonal.
pub fn calculate_covariance(jacobian: &Array2<f64>, redchi: f64) -> Result<Array2<f64>> {
    let jtj = ndarray_to_nalgebra(&jacobian.t().dot(jacobian));
    let n = jtj.nrows();

    let inverse = match jtj.clone().cholesky() {
        Some(cholesky) => cholesky.inverse(),
        None => jtj.try_inverse().ok_or(EqFitError::SingularMatrix)?,
    };

    if (0..n).any(|i| !(inverse[(i, i)] > 0.0 && inverse[(i, i)].is_finite())) {
        return Err(EqFitError::SingularMatrix);
    }
    Ok(nalgebra_to_ndarray(&inverse) * redchi)
}

/// Calculate correlation matrix from covariance matrix.
///
/// The correlation matrix is calculated as:
///   correl[i,j] = covar[i,j] / sqrt(covar[i,i] * covar[j,j])
pub fn calculate_correlation(covar: &Array2<f64>) -> Array2<f64> {
    let n = covar.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            return 1.0;
        }
        let denom = (covar[[i, i]] * covar[[j, j]]).sqrt();
        if denom > 0.0 {
            covar[[i, j]] / denom
        } else {
            0.0
        }
    })
}

/// Extract standard errors from the covariance matrix.
///
/// Standard errors are the square roots of the diagonal elements
/// of the covariance matrix.
pub fn standard_errors_from_covariance(covar: &Array2<f64>) -> Array1<f64> {
    covar.diag().mapv(|v| if v > 0.0 { v.sqrt() } else { 0.0 })
}
