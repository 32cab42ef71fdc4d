//! The outcome of a fit.

use crate::error::Result;
use crate::model::{EquationModel, Model};
use crate::parameters::Parameters;
use ndarray::{Array1, Array2};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Correlations smaller than this are left out of the report.
const MIN_REPORTED_CORRELATION: f64 = 0.1;

/// Result of fitting a model to data
#[derive(Debug, Clone)]
pub struct FitResult {
    /// Fitted parameters, with standard errors where available
    pub params: Parameters,

    /// Names of the continuously varied parameters, in covariance order
    pub var_names: Vec<String>,

    /// Covariance matrix over `var_names`
    pub covariance: Option<Array2<f64>>,

    /// Correlation matrix over `var_names`
    pub correlation: Option<Array2<f64>>,

    /// Sum of squared residuals
    pub chisqr: f64,

    /// `chisqr / max(nfree, 1)`
    pub redchi: f64,

    /// Number of data points
    pub ndata: usize,

    /// Number of fitted parameters, the breakpoint included
    pub nvarys: usize,

    /// Degrees of freedom, `ndata - nvarys`
    pub nfree: usize,

    /// Coefficient of determination
    pub r_squared: f64,

    /// Solver iterations of the winning fit
    pub iterations: usize,

    /// Model evaluations over the whole fit
    pub func_evals: usize,

    /// Why the solver stopped
    pub message: String,

    pub(crate) model: EquationModel,
    pub(crate) x: Array1<f64>,
    pub(crate) residuals: Array1<f64>,
}

#[derive(Serialize)]
struct FitReport<'a> {
    model: String,
    params: &'a Parameters,
    var_names: &'a [String],
    covariance: Option<Vec<Vec<f64>>>,
    chisqr: f64,
    redchi: f64,
    ndata: usize,
    nvarys: usize,
    nfree: usize,
    r_squared: f64,
    iterations: usize,
    func_evals: usize,
    message: &'a str,
}

impl FitResult {
    /// Fitted values keyed by name.
    pub fn values(&self) -> BTreeMap<String, f64> {
        self.params.values()
    }

    /// Fitted value of one parameter.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.params.get(name).map(|p| p.value())
    }

    /// Standard error of one parameter, if it could be estimated.
    pub fn stderr(&self, name: &str) -> Option<f64> {
        self.params.get(name).and_then(|p| p.stderr())
    }

    /// The model that was fitted.
    pub fn model(&self) -> &EquationModel {
        &self.model
    }

    /// Evaluate the fitted model at arbitrary x values.
    pub fn evaluate(&self, x: &Array1<f64>) -> Result<Array1<f64>> {
        self.model.evaluate(x, &self.values())
    }

    /// The fitted model at the data abscissae.
    pub fn best_fit(&self) -> Result<Array1<f64>> {
        self.evaluate(&self.x)
    }

    /// Residuals `y - f(x)` at the solution.
    pub fn residuals(&self) -> &Array1<f64> {
        &self.residuals
    }

    /// Serialize the parameter report to JSON.
    pub fn to_json(&self) -> Result<String> {
        let report = FitReport {
            model: self.model.to_string(),
            params: &self.params,
            var_names: &self.var_names,
            covariance: self
                .covariance
                .as_ref()
                .map(|c| c.rows().into_iter().map(|row| row.to_vec()).collect()),
            chisqr: self.chisqr,
            redchi: self.redchi,
            ndata: self.ndata,
            nvarys: self.nvarys,
            nfree: self.nfree,
            r_squared: self.r_squared,
            iterations: self.iterations,
            func_evals: self.func_evals,
            message: &self.message,
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[[Model]]")?;
        writeln!(f, "    {}", self.model)?;
        writeln!(f, "[[Fit Statistics]]")?;
        writeln!(f, "    # function evals   = {}", self.func_evals)?;
        writeln!(f, "    # data points      = {}", self.ndata)?;
        writeln!(f, "    # variables        = {}", self.nvarys)?;
        writeln!(f, "    chi-square         = {:.8e}", self.chisqr)?;
        writeln!(f, "    reduced chi-square = {:.8e}", self.redchi)?;
        writeln!(f, "    R-squared          = {:.8}", self.r_squared)?;
        writeln!(f, "    message            = {}", self.message)?;

        writeln!(f, "[[Variables]]")?;
        let width = self.params.names().iter().map(String::len).max().unwrap_or(0);
        for (name, param) in self.params.iter() {
            write!(f, "    {:<width$} {:>14.8}", format!("{}:", name), param.value(), width = width + 1)?;
            match param.stderr() {
                Some(stderr) if param.value() != 0.0 => write!(
                    f,
                    " +/- {:.8} ({:.2}%)",
                    stderr,
                    (stderr / param.value()).abs() * 100.0
                )?,
                Some(stderr) => write!(f, " +/- {:.8}", stderr)?,
                None if !self.var_names.contains(name) && param.vary() => write!(f, " (profiled)")?,
                None if !param.vary() => write!(f, " (fixed)")?,
                None => {}
            }
            if param.bounds().has_lower_bound() || param.bounds().has_upper_bound() {
                write!(f, " bounds=[{}, {}]", param.min(), param.max())?;
            }
            writeln!(f)?;
        }

        if let Some(correlation) = &self.correlation {
            let mut pairs = Vec::new();
            for i in 0..self.var_names.len() {
                for j in (i + 1)..self.var_names.len() {
                    let c = correlation[[i, j]];
                    if c.abs() > MIN_REPORTED_CORRELATION {
                        pairs.push((i, j, c));
                    }
                }
            }
            if !pairs.is_empty() {
                pairs.sort_by(|a, b| b.2.abs().total_cmp(&a.2.abs()));
                writeln!(f, "[[Correlations]] (unreported correlations are < {})", MIN_REPORTED_CORRELATION)?;
                for (i, j, c) in pairs {
                    writeln!(
                        f,
                        "    C({}, {}) = {:+.4}",
                        self.var_names[i], self.var_names[j], c
                    )?;
                }
            }
        }
        Ok(())
    }
}
