//! Parameter definition and implementation
//!
//! A [`Parameter`] is one fitted symbol of a model: it has a name, optional
//! bounds, an optional initial guess and, after a fit, a value and standard error.

use crate::parameters::bounds::{Bounds, BoundsError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Bounds error: {0}")]
    BoundsError(#[from] BoundsError),

    #[error("Parameter '{name}' already exists")]
    DuplicateParameter { name: String },
}

/// A fitted parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Name of the parameter
    name: String,

    /// Current value of the parameter
    value: f64,

    /// Initial guess, `None` when the solver default is used
    init_value: Option<f64>,

    /// Whether this parameter can be varied during optimization
    vary: bool,

    /// Minimum and maximum bounds for the parameter value
    bounds: Bounds,

    /// Standard error of the parameter (set after fitting)
    stderr: Option<f64>,
}

impl Parameter {
    /// Value used as the starting point when no initial guess is given.
    pub const DEFAULT_INITIAL_VALUE: f64 = 1.0;

    /// Create an unbounded parameter with no initial guess
    ///
    /// # Examples
    ///
    /// ```
    /// use eqfit_rs::parameters::parameter::Parameter;
    ///
    /// let param = Parameter::new("a");
    /// assert_eq!(param.name(), "a");
    /// assert_eq!(param.value(), 1.0);
    /// assert!(param.init_value().is_none());
    /// ```
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Self::DEFAULT_INITIAL_VALUE,
            init_value: None,
            vary: true,
            bounds: Bounds::default(),
            stderr: None,
        }
    }

    /// Create a parameter with the given bounds
    ///
    /// # Examples
    ///
    /// ```
    /// use eqfit_rs::parameters::parameter::Parameter;
    ///
    /// let param = Parameter::with_bounds("x0", 1.0, 5.0).unwrap();
    /// assert_eq!(param.min(), 1.0);
    /// assert_eq!(param.max(), 5.0);
    /// assert_eq!(param.value(), 3.0);
    /// ```
    pub fn with_bounds(name: &str, min: f64, max: f64) -> Result<Self, ParameterError> {
        let mut param = Self::new(name);
        param.set_bounds(Bounds::new(min, max)?);
        Ok(param)
    }

    /// Create a parameter with an explicit initial guess
    pub fn with_initial_value(name: &str, value: f64) -> Self {
        let mut param = Self::new(name);
        param.init_value = Some(value);
        param.value = value;
        param
    }

    /// Get the name of the parameter
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current value of the parameter
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the value of the parameter, failing if it lies outside the bounds
    pub fn set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        if !value.is_finite() {
            return Err(BoundsError::InfiniteValue.into());
        }
        if !self.bounds.is_within_bounds(value) {
            return Err(ParameterError::BoundsError(BoundsError::ValueOutsideBounds {
                value,
                min: self.bounds.min,
                max: self.bounds.max,
            }));
        }

        self.value = value;
        Ok(())
    }

    /// Get the explicit initial guess, if any
    pub fn init_value(&self) -> Option<f64> {
        self.init_value
    }

    /// Set or clear the initial guess
    pub fn set_init_value(&mut self, init_value: Option<f64>) {
        self.init_value = init_value;
    }

    /// Starting value for a fit: the initial guess clamped into the bounds,
    /// or the bounds' default starting point for `default`.
    ///
    /// A guess on a bound is moved into the interior, see [`Bounds::interior`].
    pub fn starting_value(&self, default: f64) -> f64 {
        match self.init_value {
            Some(value) => self.bounds.interior(self.bounds.clamp(value)),
            None => self.bounds.initial_value(default),
        }
    }

    /// Check if the parameter is varied during optimization
    pub fn vary(&self) -> bool {
        self.vary && !self.bounds.is_degenerate()
    }

    /// Set whether the parameter is varied during optimization
    pub fn set_vary(&mut self, vary: bool) {
        self.vary = vary;
    }

    /// Get the minimum allowed value for the parameter
    pub fn min(&self) -> f64 {
        self.bounds.min
    }

    /// Get the maximum allowed value for the parameter
    pub fn max(&self) -> f64 {
        self.bounds.max
    }

    /// Get the bounds of the parameter
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Replace the bounds; the current value is moved to the bounds' starting point
    /// if it falls outside them.
    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
        if !bounds.is_within_bounds(self.value) || bounds.is_finite() {
            self.value = self.starting_value(Self::DEFAULT_INITIAL_VALUE);
        }
    }

    /// Get the standard error of the parameter (if available)
    pub fn stderr(&self) -> Option<f64> {
        self.stderr
    }

    /// Set the standard error of the parameter
    pub fn set_stderr(&mut self, stderr: Option<f64>) {
        self.stderr = stderr;
    }

}
