//! Equation strings as typed by the user.
//!
//! An equation is either a single expression (`a*x**b`) or a split model made
//! of two expressions joined by `|`, optionally followed by a third `min;max`
//! segment that bounds the breakpoint: `a*x|b*x+c|1;5`.

use crate::error::{EqFitError, Result};
use crate::parameters::bounds::Bounds;

/// Separator between the pieces of a split equation.
pub const PIECE_SEPARATOR: char = '|';

/// Separator between the two limits of the breakpoint bounds.
pub const BOUNDS_SEPARATOR: char = ';';

/// The pieces of an equation string, before any expression is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquationForm<'a> {
    /// A single expression.
    Plain(&'a str),

    /// Two expressions joined at a breakpoint.
    Split {
        left: &'a str,
        right: &'a str,
        bounds: Option<&'a str>,
    },
}

/// Rewrite the `^` shorthand to the `**` power operator.
///
/// ```
/// use eqfit_rs::equation::normalize_exponent;
///
/// assert_eq!(normalize_exponent("a*x^2"), "a*x**2");
/// ```
pub fn normalize_exponent(text: &str) -> String {
    text.replace('^', "**")
}

/// Split an equation string on `|`.
///
/// Zero separators give a plain equation, one or two give a split equation and
/// anything else is an [`EqFitError::InvalidEquationFormat`].
pub fn split_equation(equation: &str) -> Result<EquationForm<'_>> {
    let pieces: Vec<&str> = equation.split(PIECE_SEPARATOR).collect();
    match pieces[..] {
        [plain] => Ok(EquationForm::Plain(plain)),
        [left, right] => Ok(EquationForm::Split {
            left,
            right,
            bounds: None,
        }),
        [left, right, bounds] => Ok(EquationForm::Split {
            left,
            right,
            bounds: Some(bounds),
        }),
        _ => Err(EqFitError::InvalidEquationFormat(format!(
            "expected at most 2 '{}' separators in '{}', found {}",
            PIECE_SEPARATOR,
            equation,
            pieces.len() - 1
        ))),
    }
}

/// Parse a `min;max` bounds segment. An empty side is unbounded.
///
/// ```
/// use eqfit_rs::equation::parse_bounds;
///
/// let bounds = parse_bounds("1;5").unwrap();
/// assert_eq!((bounds.min, bounds.max), (1.0, 5.0));
/// assert_eq!(parse_bounds(";5").unwrap().min, f64::NEG_INFINITY);
/// assert!(parse_bounds("5;1").is_err());
/// ```
pub fn parse_bounds(segment: &str) -> Result<Bounds> {
    let fields: Vec<&str> = segment.split(BOUNDS_SEPARATOR).collect();
    let [min, max] = fields.as_slice() else {
        return Err(EqFitError::InvalidBounds(format!(
            "expected 'min{}max', got '{}'",
            BOUNDS_SEPARATOR, segment
        )));
    };

    let min = parse_limit(min, f64::NEG_INFINITY)?;
    let max = parse_limit(max, f64::INFINITY)?;
    Ok(Bounds::new(min, max)?)
}

fn parse_limit(field: &str, unbounded: f64) -> Result<f64> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(unbounded);
    }
    field
        .parse::<f64>()
        .map_err(|_| EqFitError::InvalidBounds(format!("'{}' is not a number", field)))
}
