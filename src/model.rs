//! Model trait and the equation-string model.
//!
//! This module turns parsed expressions into models `y = f(x; params)`. It
//! infers which symbols are parameters, builds plain single-expression models
//! and composes two of them into a split model joined at the breakpoint `x0`.

use crate::equation::{self, EquationForm};
use crate::error::{EqFitError, Result};
use crate::parameters::bounds::Bounds;
use crate::parameters::expression::{EvaluationContext, ExprResult, Expression, ExpressionError};
use crate::parameters::{Parameter, Parameters};
use log::debug;
use ndarray::Array1;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Name of the independent variable.
pub const INDEPENDENT_VARIABLE: &str = "x";

/// Name of the response variable.
pub const RESPONSE_VARIABLE: &str = "y";

/// Name of the breakpoint parameter of a split model.
pub const BREAKPOINT: &str = "x0";

/// A trait representing a model that can be fit to data.
///
/// Models own their [`Parameters`] and evaluate the response at given x values
/// for any name-to-value mapping of those parameters.
pub trait Model {
    /// Returns a reference to the model's parameters.
    fn parameters(&self) -> &Parameters;

    /// Returns a mutable reference to the model's parameters.
    fn parameters_mut(&mut self) -> &mut Parameters;

    /// Evaluates the model at the given x values with the given parameter values.
    fn evaluate(&self, x: &Array1<f64>, values: &BTreeMap<String, f64>) -> Result<Array1<f64>>;

    /// Evaluates the model at the given x values using the current parameter values.
    fn eval(&self, x: &Array1<f64>) -> Result<Array1<f64>> {
        self.evaluate(x, &self.parameters().values())
    }

    /// Calculates the residuals (y_obs - y_pred) for the given parameter values.
    fn residuals(
        &self,
        x: &Array1<f64>,
        y: &Array1<f64>,
        values: &BTreeMap<String, f64>,
    ) -> Result<Array1<f64>> {
        let y_pred = self.evaluate(x, values)?;

        if y.len() != y_pred.len() {
            return Err(EqFitError::DimensionMismatch(format!(
                "Expected {} observed values, got {}",
                y_pred.len(),
                y.len()
            )));
        }

        Ok(y - &y_pred)
    }

    /// The breakpoint of a piecewise model, if it has one.
    ///
    /// The response of a piecewise model is a step function of the breakpoint,
    /// so the fit engine profiles it instead of differentiating it.
    fn breakpoint(&self) -> Option<Breakpoint<'_>> {
        None
    }

    /// Returns the names of all parameters in the model.
    fn parameter_names(&self) -> Vec<String> {
        self.parameters().names()
    }
}

/// The breakpoint of a piecewise model.
#[derive(Debug, Clone, Copy)]
pub struct Breakpoint<'a> {
    /// The breakpoint parameter, carrying its bounds.
    pub parameter: &'a Parameter,

    /// Whether a branch expression uses the breakpoint as a value.
    pub referenced: bool,
}

/// Shape of an [`EquationModel`].
#[derive(Debug, Clone, PartialEq)]
pub enum ModelShape {
    /// `y = f(x)`
    Plain(Expression),

    /// `y = left(x)` for `x <= x0`, `y = right(x)` for `x > x0`.
    Split { left: Expression, right: Expression },
}

/// A model compiled from an equation string.
#[derive(Debug, Clone, PartialEq)]
pub struct EquationModel {
    shape: ModelShape,
    params: Parameters,
}

/// Evaluation context for a single abscissa.
struct PointContext<'a> {
    x: f64,
    values: &'a BTreeMap<String, f64>,
}

impl EvaluationContext for PointContext<'_> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        if name == INDEPENDENT_VARIABLE {
            Ok(self.x)
        } else {
            Err(ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
        }
    }

    fn get_parameter(&self, name: &str) -> ExprResult<f64> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }
}

impl EquationModel {
    /// The shape of the model.
    pub fn shape(&self) -> &ModelShape {
        &self.shape
    }

    /// Whether this is a split model.
    pub fn is_split(&self) -> bool {
        matches!(self.shape, ModelShape::Split { .. })
    }

    /// Evaluate the response at a single x.
    ///
    /// Exactly one branch of a split model is evaluated; `x == x0` belongs to
    /// the left branch.
    pub fn evaluate_at(&self, x: f64, values: &BTreeMap<String, f64>) -> Result<f64> {
        let context = PointContext { x, values };
        let expr = match &self.shape {
            ModelShape::Plain(expr) => expr,
            ModelShape::Split { left, right } => {
                if x <= context.get_parameter(BREAKPOINT)? {
                    left
                } else {
                    right
                }
            }
        };
        Ok(expr.evaluate(&context)?)
    }
}

impl Model for EquationModel {
    fn parameters(&self) -> &Parameters {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.params
    }

    fn evaluate(&self, x: &Array1<f64>, values: &BTreeMap<String, f64>) -> Result<Array1<f64>> {
        x.iter()
            .map(|&xi| self.evaluate_at(xi, values))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from)
    }

    fn breakpoint(&self) -> Option<Breakpoint<'_>> {
        match &self.shape {
            ModelShape::Plain(_) => None,
            ModelShape::Split { left, right } => {
                self.params.get(BREAKPOINT).map(|parameter| Breakpoint {
                    parameter,
                    referenced: left.references(BREAKPOINT) || right.references(BREAKPOINT),
                })
            }
        }
    }
}

impl fmt::Display for EquationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shape {
            ModelShape::Plain(expr) => write!(f, "{} = {}", RESPONSE_VARIABLE, expr),
            ModelShape::Split { left, right } => write!(
                f,
                "{y} = {{ {left} if {x} <= {x0}; {right} if {x} > {x0} }}",
                y = RESPONSE_VARIABLE,
                x = INDEPENDENT_VARIABLE,
                x0 = BREAKPOINT,
                left = left,
                right = right,
            ),
        }
    }
}

/// The parameters of an expression: every symbol except `x`, sorted by name.
///
/// Fails with [`EqFitError::MissingVariable`] if the expression never uses `x`.
pub fn infer_parameters(expr: &Expression) -> Result<Vec<String>> {
    let mut symbols = expr.symbols();
    if !symbols.remove(INDEPENDENT_VARIABLE) {
        return Err(EqFitError::MissingVariable(expr.to_string()));
    }
    Ok(symbols.into_iter().collect())
}

/// Wrap an expression and its parameter names into a plain model.
///
/// Each named symbol becomes a parameter reference; repeated names share one entry.
/// Naming `x` as a parameter fails with [`EqFitError::InvalidEquationFormat`].
pub fn build_model(expr: &Expression, parameter_names: &[String]) -> Result<EquationModel> {
    if let Some(reserved) = parameter_names
        .iter()
        .find(|name| name.as_str() == INDEPENDENT_VARIABLE)
    {
        return Err(EqFitError::InvalidEquationFormat(format!(
            "'{}' is the independent variable and cannot be a parameter",
            reserved
        )));
    }

    let names: BTreeSet<String> = parameter_names.iter().cloned().collect();
    let mut params = Parameters::new();
    for name in &names {
        params.get_or_insert(name);
    }

    Ok(EquationModel {
        shape: ModelShape::Plain(expr.substitute_parameters(&names)),
        params,
    })
}

/// Join two plain models at the breakpoint `x0` with the given bounds.
///
/// Parameters with the same name in both branches become one shared
/// parameter. A branch that uses `x0` refers to the breakpoint itself.
pub fn compose_split(
    left: EquationModel,
    right: EquationModel,
    bounds: Bounds,
) -> Result<EquationModel> {
    let (ModelShape::Plain(left_expr), ModelShape::Plain(right_expr)) = (left.shape, right.shape)
    else {
        return Err(EqFitError::InvalidEquationFormat(
            "only plain models can be joined at a breakpoint".to_string(),
        ));
    };

    let mut params = left.params;
    params.merge(&right.params);
    params.get_or_insert(BREAKPOINT).set_bounds(bounds);

    Ok(EquationModel {
        shape: ModelShape::Split {
            left: left_expr,
            right: right_expr,
        },
        params,
    })
}

fn build_plain(text: &str) -> Result<EquationModel> {
    let expr = Expression::parse(text)?;
    let names = infer_parameters(&expr)?;
    debug!("parsed '{}' as {} with parameters {:?}", text.trim(), expr, names);
    build_model(&expr, &names)
}

/// Parse an equation string and build the plain or split model it describes.
///
/// # Examples
///
/// ```
/// use eqfit_rs::model::{parse_and_build, Model};
///
/// let model = parse_and_build("a*x|b*x+c|1;5").unwrap();
/// assert_eq!(model.parameter_names(), vec!["a", "b", "c", "x0"]);
///
/// let x0 = model.parameters().get("x0").unwrap();
/// assert_eq!((x0.min(), x0.max()), (1.0, 5.0));
/// ```
pub fn parse_and_build(equation: &str) -> Result<EquationModel> {
    match equation::split_equation(equation)? {
        EquationForm::Plain(text) => build_plain(text),
        EquationForm::Split {
            left,
            right,
            bounds,
        } => {
            let bounds = match bounds {
                Some(segment) => equation::parse_bounds(segment)?,
                None => Bounds::unbounded(),
            };
            let model = compose_split(build_plain(left)?, build_plain(right)?, bounds)?;
            debug!("built split model {}", model);
            Ok(model)
        }
    }
}
