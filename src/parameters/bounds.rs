//! Parameter bounds implementation
//!
//! This module provides the bounds of a fitted parameter and the Minuit-style
//! transformation that lets the optimizer work on unbounded internal values while
//! the external values always stay inside the bounds.

use serde::{Deserialize, Serialize};
use std::f64::{INFINITY, NEG_INFINITY};
use thiserror::Error;

/// Errors that can occur when working with parameter bounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("min ({min}) must not be greater than max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("bound is NaN")]
    NanBound,

    #[error("Parameter value {value} is outside bounds: [{min}, {max}]")]
    ValueOutsideBounds { value: f64, min: f64, max: f64 },

    #[error("Infinite parameter value is not allowed")]
    InfiniteValue,
}

/// Represents the bounds constraints on a parameter
///
/// Infinite limits serialize as `null`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum allowed value for the parameter
    pub min: f64,

    /// Maximum allowed value for the parameter
    pub max: f64,
}

#[derive(Serialize, Deserialize)]
struct BoundsRepr {
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
}

impl Serialize for Bounds {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        BoundsRepr {
            min: self.has_lower_bound().then_some(self.min),
            max: self.has_upper_bound().then_some(self.max),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let repr = BoundsRepr::deserialize(deserializer)?;
        Bounds::new(
            repr.min.unwrap_or(NEG_INFINITY),
            repr.max.unwrap_or(INFINITY),
        )
        .map_err(serde::de::Error::custom)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: NEG_INFINITY,
            max: INFINITY,
        }
    }
}

impl Bounds {
    /// Create a new bounds constraint with min and max values
    ///
    /// # Examples
    ///
    /// ```
    /// use eqfit_rs::parameters::bounds::Bounds;
    ///
    /// let bounds = Bounds::new(1.0, 5.0).unwrap();
    /// assert_eq!(bounds.min, 1.0);
    /// assert_eq!(bounds.max, 5.0);
    /// assert!(Bounds::new(5.0, 1.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min.is_nan() || max.is_nan() {
            return Err(BoundsError::NanBound);
        }
        if min > max {
            return Err(BoundsError::InvalidBounds { min, max });
        }

        Ok(Self { min, max })
    }

    /// Create an unbounded constraint (negative infinity to positive infinity)
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Create a bounds constraint with only a minimum value
    pub fn min_only(min: f64) -> Self {
        Self { min, max: INFINITY }
    }

    /// Create a bounds constraint with only a maximum value
    pub fn max_only(max: f64) -> Self {
        Self {
            min: NEG_INFINITY,
            max,
        }
    }

    /// Check if a value is within the bounds (inclusive)
    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Check if both limits are finite
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Check if the parameter is bounded from below
    pub fn has_lower_bound(&self) -> bool {
        self.min.is_finite()
    }

    /// Check if the parameter is bounded from above
    pub fn has_upper_bound(&self) -> bool {
        self.max.is_finite()
    }

    /// Whether the bounds pin the parameter to a single value
    pub fn is_degenerate(&self) -> bool {
        self.is_finite() && self.min == self.max
    }

    /// Clamp a value to be within the bounds
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Starting value for a parameter with these bounds.
    ///
    /// Doubly bounded parameters start at the middle of their range, others at
    /// `default` clamped into the bounds and moved off the edge with [`Bounds::interior`].
    pub fn initial_value(&self, default: f64) -> f64 {
        if self.is_finite() {
            self.min + (self.max - self.min) / 2.0
        } else {
            self.interior(self.clamp(default))
        }
    }

    /// Move a value that sits exactly on a bound into the interior.
    ///
    /// The bounds transform is flat at the edges, so a fit started there never
    /// moves the parameter. A one-sided bound `b` moves the value to
    /// `b ± max(1, |b|)`; a finite range moves it a quarter of the way in.
    /// Degenerate bounds and interior values are returned unchanged.
    pub fn interior(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            return value;
        }
        match (self.has_lower_bound(), self.has_upper_bound()) {
            (true, true) if value == self.min => self.min + (self.max - self.min) / 4.0,
            (true, true) if value == self.max => self.max - (self.max - self.min) / 4.0,
            (true, false) if value == self.min => self.min + self.min.abs().max(1.0),
            (false, true) if value == self.max => self.max - self.max.abs().max(1.0),
            _ => value,
        }
    }
}

/// Implements the Minuit-style parameter transformations for handling bounds constraints
///
/// This allows the optimizer to work with unbounded parameters internally, while the
/// external values are constrained to be within the specified bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsTransform {
    bounds: Bounds,
}

impl BoundsTransform {
    /// Create a new bounds transform
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds }
    }

    /// Transform an internal parameter value to an external value
    pub fn to_external(&self, internal_value: f64) -> f64 {
        let bounds = &self.bounds;
        match (bounds.has_lower_bound(), bounds.has_upper_bound()) {
            (false, false) => internal_value,
            (true, false) => bounds.min - 1.0 + (internal_value * internal_value + 1.0).sqrt(),
            (false, true) => bounds.max + 1.0 - (internal_value * internal_value + 1.0).sqrt(),
            (true, true) => {
                let value =
                    bounds.min + (internal_value.sin() + 1.0) * (bounds.max - bounds.min) / 2.0;
                // sin() rounding can step a hair outside the range
                bounds.clamp(value)
            }
        }
    }

    /// Transform an external parameter value to an internal value
    pub fn to_internal(&self, external_value: f64) -> Result<f64, BoundsError> {
        if !external_value.is_finite() {
            return Err(BoundsError::InfiniteValue);
        }

        let bounds = &self.bounds;
        if !bounds.is_within_bounds(external_value) {
            return Err(BoundsError::ValueOutsideBounds {
                value: external_value,
                min: bounds.min,
                max: bounds.max,
            });
        }

        let internal = match (bounds.has_lower_bound(), bounds.has_upper_bound()) {
            (false, false) => external_value,
            (true, false) => ((external_value - bounds.min + 1.0).powi(2) - 1.0).sqrt(),
            (false, true) => ((bounds.max - external_value + 1.0).powi(2) - 1.0).sqrt(),
            (true, true) if bounds.min == bounds.max => 0.0,
            (true, true) => {
                let scaled = 2.0 * (external_value - bounds.min) / (bounds.max - bounds.min) - 1.0;
                // Ensure scaled is in [-1, 1] for asin
                scaled.clamp(-1.0, 1.0).asin()
            }
        };
        Ok(internal)
    }
}
