//! # Parameter System
//!
//! Named, optionally bounded fit parameters and the expression language that
//! models are written in.
//!
//! ## Core Components
//!
//! - [`Expression`]: parse and evaluate infix expressions over `x` and named symbols
//! - [`Parameter`]: a single fitted value with bounds, initial guess and standard error
//! - [`Parameters`]: a name-ordered collection of parameters
//! - [`Bounds`] and [`BoundsTransform`]: keep the optimizer inside the bounds
//!
//! ## Example Usage
//!
//! ```rust
//! use eqfit_rs::parameters::{Expression, Parameters};
//!
//! let expr = Expression::parse("a * x ** b").unwrap();
//! assert_eq!(expr.variables(), vec!["a", "b", "x"]);
//!
//! let mut params = Parameters::new();
//! params.add_param_with_bounds("b", 0.0, 10.0).unwrap();
//! params.get_or_insert("a");
//! assert_eq!(params.names(), vec!["a", "b"]);
//! ```

pub mod bounds;
pub mod expression;
pub mod parameter;
pub mod parameters;

// Re-export key types
pub use bounds::{Bounds, BoundsError, BoundsTransform};
pub use expression::{EvaluationContext, Expression, ExpressionError};
pub use parameter::{Parameter, ParameterError};
pub use parameters::Parameters;
