//! # Fit Engine
//!
//! Least-squares fitting of equation models to a [`Dataset`].
//!
//! Varied parameters are handed to the Levenberg-Marquardt solver in name
//! order, mapped through their bounds transforms so every trial point stays
//! inside the bounds. Split models additionally profile their breakpoint (see
//! [`breakpoint`]).
//!
//! ## Example Usage
//!
//! ```rust
//! use eqfit_rs::fit::fit_from_str;
//!
//! let x: Vec<f64> = (1..=10).map(f64::from).collect();
//! let y: Vec<f64> = x.iter().map(|x| 2.0 * x.powi(3)).collect();
//!
//! let result = fit_from_str("a*x^b", x, y).unwrap();
//! assert!((result.value("a").unwrap() - 2.0).abs() < 1e-4);
//! assert!((result.value("b").unwrap() - 3.0).abs() < 1e-4);
//! ```

pub mod breakpoint;
pub mod config;
pub mod dataset;
pub mod result;

pub use config::FitConfig;
pub use dataset::{Dataset, IntoColumn};
pub use result::FitResult;

use crate::equation::normalize_exponent;
use crate::error::{EqFitError, Result};
use crate::lm::{LevenbergMarquardt, LmResult};
use crate::model::{parse_and_build, Breakpoint, EquationModel, Model, BREAKPOINT};
use crate::parameters::bounds::{Bounds, BoundsTransform};
use crate::problem::Problem;
use crate::uncertainty::uncertainty_from_jacobian;
use breakpoint::Candidate;
use log::{debug, info, warn};
use ndarray::Array1;
use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A parameter the solver moves, with its bounds and starting point.
#[derive(Debug, Clone)]
struct FreeParameter {
    name: String,
    bounds: Bounds,
    start: f64,
}

/// Adapts a [`Model`] and a [`Dataset`] to the [`Problem`] interface.
///
/// The solver sees the internal, unbounded coordinates of the free parameters;
/// fixed parameters are passed to the model unchanged.
struct ModelProblem<'a, M: Model> {
    model: &'a M,
    data: &'a Dataset,
    fixed: BTreeMap<String, f64>,
    varying: Vec<(String, BoundsTransform)>,
}

impl<'a, M: Model> ModelProblem<'a, M> {
    fn new(
        model: &'a M,
        data: &'a Dataset,
        fixed: BTreeMap<String, f64>,
        varying: &[FreeParameter],
    ) -> Self {
        Self {
            model,
            data,
            fixed,
            varying: varying
                .iter()
                .map(|p| (p.name.clone(), BoundsTransform::new(p.bounds)))
                .collect(),
        }
    }

    /// Full name-to-value map for a vector of internal values.
    fn values(&self, internal: &Array1<f64>) -> BTreeMap<String, f64> {
        let mut values = self.fixed.clone();
        for ((name, transform), &p) in self.varying.iter().zip(internal.iter()) {
            values.insert(name.clone(), transform.to_external(p));
        }
        values
    }
}

impl<M: Model> Problem for ModelProblem<'_, M> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        self.model
            .residuals(self.data.x(), self.data.y(), &self.values(params))
    }

    fn parameter_count(&self) -> usize {
        self.varying.len()
    }

    fn residual_count(&self) -> usize {
        self.data.len()
    }
}

/// A converged (or not) solver run and the parameter values it ended at.
#[derive(Debug, Clone)]
struct Solution {
    values: BTreeMap<String, f64>,
    lm: LmResult,
}

fn solve<M: Model>(
    model: &M,
    data: &Dataset,
    config: &FitConfig,
    fixed: BTreeMap<String, f64>,
    varying: &[FreeParameter],
) -> Result<Solution> {
    let problem = ModelProblem::new(model, data, fixed, varying);
    let initial = varying
        .iter()
        .map(|p| BoundsTransform::new(p.bounds).to_internal(p.start))
        .collect::<std::result::Result<Vec<f64>, _>>()?;

    let lm = LevenbergMarquardt::with_config(config.lm.clone()).minimize(&problem, Array1::from(initial))?;
    Ok(Solution {
        values: problem.values(&lm.params),
        lm,
    })
}

fn not_converged(lm: &LmResult) -> EqFitError {
    EqFitError::FitConvergence(format!("{} after {} iterations", lm.message, lm.iterations))
}

/// Fit every reachable partition of the data and keep the best one.
fn scan_breakpoint<M: Model + Sync>(
    model: &M,
    data: &Dataset,
    config: &FitConfig,
    fixed: &BTreeMap<String, f64>,
    varying: &[FreeParameter],
    breakpoint: Breakpoint<'_>,
) -> Result<(Solution, usize)> {
    let bounds = breakpoint.parameter.bounds();
    let candidates = breakpoint::candidates(&data.distinct_x(), bounds);
    debug!(
        "profiling {} over {} candidate partitions in [{}, {}]",
        BREAKPOINT,
        candidates.len(),
        bounds.min,
        bounds.max
    );

    let run = |candidate: &Candidate| -> Result<Solution> {
        let mut fixed = fixed.clone();
        let mut varying = varying.to_vec();
        if breakpoint.referenced && !candidate.interval.is_degenerate() {
            varying.push(FreeParameter {
                name: BREAKPOINT.to_string(),
                bounds: candidate.interval,
                start: candidate.interval.interior(candidate.x0),
            });
        } else {
            fixed.insert(BREAKPOINT.to_string(), candidate.x0);
        }
        solve(model, data, config, fixed, &varying)
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<Result<Solution>> = if config.parallel {
        candidates.par_iter().map(run).collect()
    } else {
        candidates.iter().map(run).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<Result<Solution>> = candidates.iter().map(run).collect();

    let mut func_evals = 0;
    let mut best: Option<Solution> = None;
    let mut first_error: Option<EqFitError> = None;
    for (candidate, outcome) in candidates.iter().zip(outcomes) {
        let error = match outcome {
            Ok(solution) if solution.lm.success => {
                func_evals += solution.lm.func_evals;
                debug!(
                    "{} = {}: chisqr = {:.6e}",
                    BREAKPOINT, candidate.x0, solution.lm.cost
                );
                if best.as_ref().map_or(true, |b| solution.lm.cost < b.lm.cost) {
                    best = Some(solution);
                }
                continue;
            }
            Ok(solution) => {
                func_evals += solution.lm.func_evals;
                not_converged(&solution.lm)
            }
            Err(e) => e,
        };
        warn!(
            "skipping breakpoint candidate {} = {}: {}",
            BREAKPOINT, candidate.x0, error
        );
        first_error.get_or_insert(error);
    }

    match (best, first_error) {
        (Some(best), _) => Ok((best, func_evals)),
        (None, Some(error)) => Err(error),
        (None, None) => Err(EqFitError::FitConvergence(format!(
            "no position of {} inside [{}, {}] splits the data",
            BREAKPOINT, bounds.min, bounds.max
        ))),
    }
}

/// Fit a model to a dataset with the default configuration.
pub fn fit(model: &EquationModel, data: &Dataset) -> Result<FitResult> {
    fit_with_config(model, data, &FitConfig::default())
}

/// Fit a model to a dataset.
///
/// Parameters start at their initial guess, or at `config.default_initial_value`,
/// clamped into their bounds; parameters bounded on both sides start at the
/// middle of their range.
///
/// # Errors
///
/// * [`EqFitError::Evaluation`] if the model cannot be evaluated at the starting point
/// * [`EqFitError::FitConvergence`] if the solver runs out of iterations or damping
pub fn fit_with_config(
    model: &EquationModel,
    data: &Dataset,
    config: &FitConfig,
) -> Result<FitResult> {
    let breakpoint = model.breakpoint().filter(|bp| bp.parameter.vary());

    let mut fixed = BTreeMap::new();
    let mut varying = Vec::new();
    for (name, param) in model.parameters().iter() {
        if breakpoint.is_some() && name == BREAKPOINT {
            continue;
        }
        if param.vary() {
            varying.push(FreeParameter {
                name: name.clone(),
                bounds: param.bounds(),
                start: param.starting_value(config.default_initial_value),
            });
        } else {
            fixed.insert(name.clone(), param.value());
        }
    }

    let (solution, func_evals) = match breakpoint {
        Some(bp) => scan_breakpoint(model, data, config, &fixed, &varying, bp)?,
        None => {
            let solution = solve(model, data, config, fixed, &varying)?;
            if !solution.lm.success {
                return Err(not_converged(&solution.lm));
            }
            let evals = solution.lm.func_evals;
            (solution, evals)
        }
    };

    let values = solution.values;
    let residuals = model.residuals(data.x(), data.y(), &values)?;
    let chisqr = residuals.dot(&residuals);
    let ndata = data.len();
    let nvarys = varying.len() + usize::from(breakpoint.is_some());
    let nfree = ndata.saturating_sub(nvarys);
    let redchi = chisqr / nfree.max(1) as f64;

    let mean = data.y().mean().unwrap_or(0.0);
    let total = data.y().mapv(|y| (y - mean).powi(2)).sum();
    let r_squared = if total > 0.0 { 1.0 - chisqr / total } else { f64::NAN };

    // Standard errors in external coordinates, breakpoint held at its fitted value
    let var_names: Vec<String> = varying.iter().map(|p| p.name.clone()).collect();
    let mut uncertainty = None;
    if !varying.is_empty() && nfree > 0 {
        let unbounded: Vec<FreeParameter> = varying
            .iter()
            .map(|p| FreeParameter {
                name: p.name.clone(),
                bounds: Bounds::unbounded(),
                start: values.get(&p.name).copied().unwrap_or(p.start),
            })
            .collect();
        let mut held = values.clone();
        held.retain(|name, _| !var_names.contains(name));
        let problem = ModelProblem::new(model, data, held, &unbounded);
        let at: Array1<f64> = unbounded.iter().map(|p| p.start).collect();

        match problem
            .jacobian(&at, config.lm.diff_step)
            .and_then(|jacobian| uncertainty_from_jacobian(&jacobian, chisqr, nfree))
        {
            Ok(u) => uncertainty = Some(u),
            Err(e) => warn!("standard errors unavailable: {}", e),
        }
    }

    let mut params = model.parameters().clone();
    for (name, &value) in &values {
        if let Some(param) = params.get_mut(name) {
            param.set_value(value)?;
            param.set_stderr(None);
        }
    }
    if let Some(u) = &uncertainty {
        for (name, &stderr) in var_names.iter().zip(u.standard_errors.iter()) {
            if let Some(param) = params.get_mut(name) {
                param.set_stderr(Some(stderr));
            }
        }
    }

    info!(
        "fit of {} finished: {} (chisqr = {:.6e}, redchi = {:.6e}, {} iterations)",
        model, solution.lm.message, chisqr, redchi, solution.lm.iterations
    );

    Ok(FitResult {
        params,
        var_names,
        covariance: uncertainty.as_ref().map(|u| u.covariance.clone()),
        correlation: uncertainty.map(|u| u.correlation),
        chisqr,
        redchi,
        ndata,
        nvarys,
        nfree,
        r_squared,
        iterations: solution.lm.iterations,
        func_evals,
        message: solution.lm.message,
        model: model.clone(),
        x: data.x().clone(),
        residuals,
    })
}

/// Parse an equation string and fit it to `x` and `y` in one call.
///
/// `^` is accepted as a shorthand for `**`.
pub fn fit_from_str(equation: &str, x: impl IntoColumn, y: impl IntoColumn) -> Result<FitResult> {
    let model = parse_and_build(&normalize_exponent(equation))?;
    let data = Dataset::new(x, y)?;
    fit(&model, &data)
}
