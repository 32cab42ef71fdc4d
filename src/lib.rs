//! # eqfit-rs
//!
//! `eqfit-rs` fits models written as equation strings to (x, y) data with a
//! Levenberg-Marquardt least-squares solver.
//!
//! The library provides:
//! - An expression parser: every symbol other than `x` becomes a fitted parameter
//! - Split models `left|right` that switch branch at a fitted breakpoint `x0`,
//!   optionally bounded with a trailing `|min;max`
//! - Bounded parameters, standard errors and fit statistics in the style of `lmfit-py`
//!
//! ## Basic Usage
//!
//! ```
//! use eqfit_rs::{fit, parse_and_build, Dataset};
//!
//! let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
//! let y: Vec<f64> = x
//!     .iter()
//!     .map(|&x| if x <= 4.0 { 2.0 * x } else { 20.0 - x })
//!     .collect();
//!
//! let model = parse_and_build("a*x|b*x+c").unwrap();
//! let data = Dataset::new(x, y).unwrap();
//! let result = fit(&model, &data).unwrap();
//!
//! assert!((result.value("a").unwrap() - 2.0).abs() < 1e-6);
//! assert!((result.value("x0").unwrap() - 4.0).abs() <= 0.5);
//! println!("{}", result);
//! ```

// Public modules
pub mod equation;
pub mod error;
pub mod fit;
pub mod lm;
pub mod model;
pub mod parameters;
pub mod problem;
pub mod uncertainty;
pub mod utils;

// Re-exports for convenience
pub use error::{EqFitError, Result};
pub use fit::{fit, fit_from_str, fit_with_config, Dataset, FitConfig, FitResult};
pub use lm::{LevenbergMarquardt, LmConfig};
pub use model::{parse_and_build, EquationModel, Model};
pub use parameters::{Expression, Parameter, Parameters};
pub use problem::Problem;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
