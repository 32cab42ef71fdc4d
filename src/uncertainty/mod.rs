//! # Uncertainty Calculation
//!
//! Standard errors and correlations of fitted parameters, following the
//! lmfit convention `covar = redchi * inv(J^T * J)`.

mod covariance;

pub use covariance::{
    calculate_correlation, calculate_covariance, standard_errors_from_covariance,
};

use crate::error::Result;
use ndarray::{Array1, Array2};

/// Structure to hold uncertainty calculation results.
#[derive(Debug, Clone, PartialEq)]
pub struct UncertaintyResult {
    /// Covariance matrix for the varied parameters
    pub covariance: Array2<f64>,
    /// Correlation matrix derived from covariance
    pub correlation: Array2<f64>,
    /// Standard errors, in the order of the Jacobian columns
    pub standard_errors: Array1<f64>,
}

/// Covariance, correlation and standard errors from a Jacobian at the solution.
///
/// `chisqr` is the sum of squared residuals and `nfree` the degrees of freedom,
/// which must be positive.
pub fn uncertainty_from_jacobian(
    jacobian: &Array2<f64>,
    chisqr: f64,
    nfree: usize,
) -> Result<UncertaintyResult> {
    let redchi = chisqr / nfree as f64;
    let covariance = calculate_covariance(jacobian, redchi)?;
    Ok(UncertaintyResult {
        correlation: calculate_correlation(&covariance),
        standard_errors: standard_errors_from_covariance(&covariance),
        covariance,
    })
}
