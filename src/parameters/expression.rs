//! Expression parsing and evaluation for model equations
//!
//! This module parses infix equation text (`a*x**b*exp(-c*x)`) into an explicit
//! expression tree and evaluates that tree against a context providing values
//! for the independent variable and the fitted parameters.
//!
//! The grammar follows the usual Python precedence rules:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary ('**' unary)?
//! primary := number | function '(' args ')' | identifier | '(' expr ')'
//! ```
//!
//! so `-x**2` is `-(x**2)`, `2**-1` is allowed and `**` is right-associative.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{not, recognize, value},
    error::ErrorKind,
    multi::many0,
    number::complete::recognize_float,
    sequence::{pair, terminated},
    IResult, Parser,
};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Error that can occur during expression parsing or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression: {message}")]
    ParseError { message: String },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Domain error: {message}")]
    DomainError { message: String },
}

/// Result type for expression evaluation
pub type ExprResult<T> = Result<T, ExpressionError>;

type PResult<'a, T> = IResult<&'a str, T>;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant number
    Number(f64),

    /// Free symbol, before parameter substitution
    Variable(String),

    /// Fitted parameter reference, keyed by name
    Parameter(String),

    /// Unary operations
    Unary(UnaryOp, Box<Expression>),

    /// Binary operations
    Binary(BinaryOp, Box<Expression>, Box<Expression>),

    /// Call of a library function
    Function(Function, Vec<Expression>),
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
}

/// Binary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    /// Addition (+)
    Add,

    /// Subtraction (-)
    Sub,

    /// Multiplication (*)
    Mul,

    /// Division (/)
    Div,

    /// Power (**)
    Pow,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "**",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 4,
        }
    }
}

/// Functions known to the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Exp,
    /// Natural logarithm, `log(v)` or `ln(v)`
    Ln,
    /// Logarithm with explicit base, `log(v, base)`
    LogBase,
    Log10,
    Sqrt,
    Abs,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Min,
    Max,
}

impl Function {
    /// Resolve a function name and argument count, `None` if unknown.
    pub fn lookup(name: &str, argc: usize) -> Option<Self> {
        let function = match (name, argc) {
            ("exp", 1) => Function::Exp,
            ("log" | "ln", 1) => Function::Ln,
            ("log", 2) => Function::LogBase,
            ("log10", 1) => Function::Log10,
            ("sqrt", 1) => Function::Sqrt,
            ("abs" | "Abs", 1) => Function::Abs,
            ("sin", 1) => Function::Sin,
            ("cos", 1) => Function::Cos,
            ("tan", 1) => Function::Tan,
            ("asin", 1) => Function::Asin,
            ("acos", 1) => Function::Acos,
            ("atan", 1) => Function::Atan,
            ("sinh", 1) => Function::Sinh,
            ("cosh", 1) => Function::Cosh,
            ("tanh", 1) => Function::Tanh,
            ("min", n) if n >= 2 => Function::Min,
            ("max", n) if n >= 2 => Function::Max,
            _ => return None,
        };
        Some(function)
    }

    /// Whether `name` is reserved for a library function.
    pub fn is_name(name: &str) -> bool {
        Self::lookup(name, 1).is_some() || Self::lookup(name, 2).is_some()
    }

    /// Name used when printing the function.
    pub fn name(self) -> &'static str {
        match self {
            Function::Exp => "exp",
            Function::Ln | Function::LogBase => "log",
            Function::Log10 => "log10",
            Function::Sqrt => "sqrt",
            Function::Abs => "abs",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
            Function::Sinh => "sinh",
            Function::Cosh => "cosh",
            Function::Tanh => "tanh",
            Function::Min => "min",
            Function::Max => "max",
        }
    }

    fn apply(self, args: &[f64]) -> ExprResult<f64> {
        let domain = |message: String| Err(ExpressionError::DomainError { message });
        let v = args[0];
        match self {
            Function::Ln | Function::Log10 if v <= 0.0 => {
                domain(format!("{}({}) is undefined", self.name(), v))
            }
            Function::LogBase if v <= 0.0 || args[1] <= 0.0 || args[1] == 1.0 => {
                domain(format!("log({}, {}) is undefined", v, args[1]))
            }
            Function::Sqrt if v < 0.0 => domain(format!("sqrt({}) is undefined", v)),
            Function::Asin | Function::Acos if !(-1.0..=1.0).contains(&v) => {
                domain(format!("{}({}) is undefined", self.name(), v))
            }
            Function::Exp => Ok(v.exp()),
            Function::Ln => Ok(v.ln()),
            Function::LogBase => Ok(v.ln() / args[1].ln()),
            Function::Log10 => Ok(v.log10()),
            Function::Sqrt => Ok(v.sqrt()),
            Function::Abs => Ok(v.abs()),
            Function::Sin => Ok(v.sin()),
            Function::Cos => Ok(v.cos()),
            Function::Tan => Ok(v.tan()),
            Function::Asin => Ok(v.asin()),
            Function::Acos => Ok(v.acos()),
            Function::Atan => Ok(v.atan()),
            Function::Sinh => Ok(v.sinh()),
            Function::Cosh => Ok(v.cosh()),
            Function::Tanh => Ok(v.tanh()),
            Function::Min => Ok(args.iter().copied().fold(f64::INFINITY, f64::min)),
            Function::Max => Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        }
    }
}

/// Context for expression evaluation, providing symbol values
pub trait EvaluationContext {
    /// Get the value of a free symbol
    fn get_variable(&self, name: &str) -> ExprResult<f64>;

    /// Get the value of a fitted parameter. Defaults to the free symbol lookup.
    fn get_parameter(&self, name: &str) -> ExprResult<f64> {
        self.get_variable(name)
    }
}

impl Expression {
    /// Parse an expression from a string
    pub fn parse(input: &str) -> ExprResult<Self> {
        if input.trim().is_empty() {
            return Err(ExpressionError::ParseError {
                message: "empty expression".to_string(),
            });
        }

        match expr_parser(input) {
            Ok((remainder, expr)) => {
                // Make sure the entire input was consumed
                if remainder.trim().is_empty() {
                    Ok(expr)
                } else {
                    Err(ExpressionError::ParseError {
                        message: format!("unexpected input '{}'", remainder.trim()),
                    })
                }
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let message = match e.code {
                    ErrorKind::Verify => format!(
                        "unknown function or wrong number of arguments at '{}'",
                        e.input.trim()
                    ),
                    ErrorKind::Satisfy => format!(
                        "function name used without arguments at '{}'",
                        e.input.trim()
                    ),
                    _ if e.input.trim().is_empty() => {
                        "unexpected end of expression".to_string()
                    }
                    _ => format!("unexpected input '{}'", e.input.trim()),
                };
                Err(ExpressionError::ParseError { message })
            }
            Err(nom::Err::Incomplete(_)) => Err(ExpressionError::ParseError {
                message: "incomplete expression".to_string(),
            }),
        }
    }

    /// Evaluate the expression with the given context
    pub fn evaluate<C: EvaluationContext + ?Sized>(&self, context: &C) -> ExprResult<f64> {
        let value = match self {
            Self::Number(n) => *n,

            Self::Variable(name) => context.get_variable(name)?,

            Self::Parameter(name) => context.get_parameter(name)?,

            Self::Unary(UnaryOp::Neg, expr) => -expr.evaluate(context)?,

            Self::Binary(op, left, right) => {
                let lhs = left.evaluate(context)?;
                let rhs = right.evaluate(context)?;

                match op {
                    BinaryOp::Add => lhs + rhs,
                    BinaryOp::Sub => lhs - rhs,
                    BinaryOp::Mul => lhs * rhs,
                    BinaryOp::Div => {
                        if rhs == 0.0 {
                            return Err(ExpressionError::DivisionByZero);
                        }
                        lhs / rhs
                    }
                    BinaryOp::Pow => {
                        if lhs == 0.0 && rhs < 0.0 {
                            return Err(ExpressionError::DivisionByZero);
                        }
                        lhs.powf(rhs)
                    }
                }
            }

            Self::Function(function, args) => {
                let evaluated_args = args
                    .iter()
                    .map(|arg| arg.evaluate(context))
                    .collect::<ExprResult<Vec<f64>>>()?;
                function.apply(&evaluated_args)?
            }
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(ExpressionError::DomainError {
                message: format!("'{}' evaluated to {}", self, value),
            })
        }
    }

    /// Find all symbol names used in the expression, sorted
    pub fn variables(&self) -> Vec<String> {
        self.symbols().into_iter().collect()
    }

    /// Set of all symbol names (free symbols and parameters) in the expression
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut symbols = BTreeSet::new();
        self.collect_symbols(&mut symbols);
        symbols
    }

    /// Recursively collect all symbol names used in the expression
    fn collect_symbols(&self, symbols: &mut BTreeSet<String>) {
        match self {
            Self::Number(_) => {}

            Self::Variable(name) | Self::Parameter(name) => {
                symbols.insert(name.clone());
            }

            Self::Unary(_, expr) => expr.collect_symbols(symbols),

            Self::Binary(_, left, right) => {
                left.collect_symbols(symbols);
                right.collect_symbols(symbols);
            }

            Self::Function(_, args) => {
                for arg in args {
                    arg.collect_symbols(symbols);
                }
            }
        }
    }

    /// Whether the expression references the named symbol anywhere
    pub fn references(&self, name: &str) -> bool {
        match self {
            Self::Number(_) => false,
            Self::Variable(n) | Self::Parameter(n) => n == name,
            Self::Unary(_, expr) => expr.references(name),
            Self::Binary(_, left, right) => left.references(name) || right.references(name),
            Self::Function(_, args) => args.iter().any(|arg| arg.references(name)),
        }
    }

    /// Rewrite every free symbol whose name is in `names` into a parameter leaf.
    ///
    /// Returns a new tree; `self` is left untouched.
    pub fn substitute_parameters(&self, names: &BTreeSet<String>) -> Expression {
        match self {
            Self::Variable(name) if names.contains(name) => Self::Parameter(name.clone()),
            Self::Number(_) | Self::Variable(_) | Self::Parameter(_) => self.clone(),
            Self::Unary(op, expr) => Self::Unary(*op, Box::new(expr.substitute_parameters(names))),
            Self::Binary(op, left, right) => Self::Binary(
                *op,
                Box::new(left.substitute_parameters(names)),
                Box::new(right.substitute_parameters(names)),
            ),
            Self::Function(function, args) => Self::Function(
                *function,
                args.iter().map(|arg| arg.substitute_parameters(names)).collect(),
            ),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Binary(op, _, _) => op.precedence(),
            Self::Unary(_, _) => 3,
            _ => 5,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn operand(f: &mut fmt::Formatter<'_>, expr: &Expression, paren: bool) -> fmt::Result {
            if paren {
                write!(f, "({})", expr)
            } else {
                write!(f, "{}", expr)
            }
        }

        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Variable(name) | Self::Parameter(name) => write!(f, "{}", name),
            Self::Unary(UnaryOp::Neg, expr) => {
                write!(f, "-")?;
                operand(f, expr, expr.precedence() < 3)
            }
            Self::Binary(op, left, right) => {
                let prec = op.precedence();
                let (left_paren, right_paren) = match op {
                    BinaryOp::Pow => (left.precedence() <= prec, right.precedence() < 3),
                    BinaryOp::Add | BinaryOp::Mul => {
                        (left.precedence() < prec, right.precedence() <= prec)
                    }
                    BinaryOp::Sub | BinaryOp::Div => {
                        (left.precedence() < prec, right.precedence() <= prec)
                    }
                };
                operand(f, left, left_paren)?;
                write!(f, "{}", op.symbol())?;
                operand(f, right, right_paren)
            }
            Self::Function(function, args) => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

// Parser functions using nom

fn ws(input: &str) -> PResult<'_, &str> {
    multispace0(input)
}

/// Parse an identifier (variable or function name)
fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

/// Parse an unsigned number
fn number(input: &str) -> PResult<'_, Expression> {
    if !input.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Float,
        )));
    }
    let (rest, text) = recognize_float(input)?;
    match text.parse::<f64>() {
        Ok(n) => Ok((rest, Expression::Number(n))),
        Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::Float,
        ))),
    }
}

/// Parse a comma-separated list of expressions (for function arguments)
fn args_list(input: &str) -> PResult<'_, Vec<Expression>> {
    let (mut input, first) = expr_parser(input)?;
    let mut args = vec![first];

    loop {
        let (after_ws, _) = ws(input)?;
        match char::<&str, nom::error::Error<&str>>(',').parse(after_ws) {
            Ok((after_comma, _)) => {
                let (rest, arg) = expr_parser(after_comma)?;
                args.push(arg);
                input = rest;
            }
            Err(_) => return Ok((input, args)),
        }
    }
}

/// Parse a function call, resolving the function against the known library
fn function_call(input: &str) -> PResult<'_, Expression> {
    let start = input;
    let (input, name) = identifier(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = char('(').parse(input)?;

    // From here on the call is committed: a bad argument list is a hard error
    let (input, args) = args_list(input).map_err(cut_error)?;
    let (input, _) = ws(input)?;
    let (input, _) = char(')').parse(input).map_err(cut_error)?;

    match Function::lookup(name, args.len()) {
        Some(function) => Ok((input, Expression::Function(function, args))),
        None => Err(nom::Err::Failure(nom::error::Error::new(
            start,
            ErrorKind::Verify,
        ))),
    }
}

fn cut_error(err: nom::Err<nom::error::Error<&str>>) -> nom::Err<nom::error::Error<&str>> {
    match err {
        nom::Err::Error(e) => nom::Err::Failure(e),
        other => other,
    }
}

/// Parse a symbol reference; `pi` and `E` are numeric constants.
///
/// Function names are not symbols, so `exp` without a call is an error.
fn symbol(input: &str) -> PResult<'_, Expression> {
    let start = input;
    let (input, name) = identifier(input)?;
    let expr = match name {
        "pi" => Expression::Number(std::f64::consts::PI),
        "E" => Expression::Number(std::f64::consts::E),
        _ if Function::is_name(name) => {
            return Err(nom::Err::Failure(nom::error::Error::new(
                start,
                ErrorKind::Satisfy,
            )))
        }
        _ => Expression::Variable(name.to_string()),
    };
    Ok((input, expr))
}

/// Parse a parenthesized expression
fn parens(input: &str) -> PResult<'_, Expression> {
    let (input, _) = char('(').parse(input)?;
    let (input, expr) = expr_parser(input).map_err(cut_error)?;
    let (input, _) = ws(input)?;
    let (input, _) = char(')').parse(input).map_err(cut_error)?;
    Ok((input, expr))
}

/// Parse a primary expression (number, function call, symbol, or parenthesized expression)
fn primary(input: &str) -> PResult<'_, Expression> {
    let (input, _) = ws(input)?;
    alt((number, function_call, symbol, parens)).parse(input)
}

/// Parse a power expression (primary ** unary)
fn power(input: &str) -> PResult<'_, Expression> {
    let (input, base) = primary(input)?;
    let (after_ws, _) = ws(input)?;

    match tag::<&str, &str, nom::error::Error<&str>>("**").parse(after_ws) {
        Ok((after_op, _)) => {
            let (rest, exponent) = unary(after_op)?;
            Ok((
                rest,
                Expression::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
            ))
        }
        Err(_) => Ok((input, base)),
    }
}

/// Parse a unary expression (-expr, +expr)
fn unary(input: &str) -> PResult<'_, Expression> {
    let (input, _) = ws(input)?;

    if let Ok((rest, _)) = char::<&str, nom::error::Error<&str>>('-').parse(input) {
        let (rest, operand) = unary(rest)?;
        return Ok((rest, Expression::Unary(UnaryOp::Neg, Box::new(operand))));
    }
    if let Ok((rest, _)) = char::<&str, nom::error::Error<&str>>('+').parse(input) {
        return unary(rest);
    }

    power(input)
}

fn mul_op(input: &str) -> PResult<'_, BinaryOp> {
    let (input, _) = ws(input)?;
    alt((
        value(BinaryOp::Mul, terminated(char('*'), not(char('*')))),
        value(BinaryOp::Div, char('/')),
    ))
    .parse(input)
}

fn add_op(input: &str) -> PResult<'_, BinaryOp> {
    let (input, _) = ws(input)?;
    alt((value(BinaryOp::Add, char('+')), value(BinaryOp::Sub, char('-')))).parse(input)
}

/// Fold `operand (op operand)*` into a left-associative tree
fn left_assoc<'a>(
    input: &'a str,
    operand: fn(&'a str) -> PResult<'a, Expression>,
    operator: fn(&'a str) -> PResult<'a, BinaryOp>,
) -> PResult<'a, Expression> {
    let (mut input, mut acc) = operand(input)?;
    loop {
        match operator(input) {
            Ok((after_op, op)) => {
                let (rest, rhs) = operand(after_op).map_err(cut_error)?;
                acc = Expression::Binary(op, Box::new(acc), Box::new(rhs));
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, acc)),
            Err(e) => return Err(e),
        }
    }
}

/// Parse a multiplicative expression (expr * expr, expr / expr)
fn term(input: &str) -> PResult<'_, Expression> {
    left_assoc(input, unary, mul_op)
}

/// Parse an additive expression (expr + expr, expr - expr)
fn expr_parser(input: &str) -> PResult<'_, Expression> {
    left_assoc(input, term, add_op)
}
