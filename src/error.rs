use thiserror::Error;

/// Error types for the eqfit-rs library.
#[derive(Error, Debug)]
pub enum EqFitError {
    /// The expression text is malformed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The expression never references the independent variable.
    #[error("Expression '{0}' does not reference the independent variable 'x'")]
    MissingVariable(String),

    /// The equation string or the structure it describes is malformed.
    #[error("Invalid equation format: {0}")]
    InvalidEquationFormat(String),

    /// The breakpoint bound segment is not a valid 'min;max' pair.
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    /// The x/y data are empty, of different lengths or not finite.
    #[error("Data shape error: {0}")]
    DataShape(String),

    /// The solver ran out of iterations or damping without converging.
    #[error("Fit did not converge: {0}")]
    FitConvergence(String),

    /// Numeric domain violation while evaluating a model.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error indicating a singular matrix was encountered.
    #[error("Singular matrix encountered")]
    SingularMatrix,

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<crate::parameters::expression::ExpressionError> for EqFitError {
    fn from(err: crate::parameters::expression::ExpressionError) -> Self {
        use crate::parameters::expression::ExpressionError;
        match err {
            ExpressionError::ParseError { message } => EqFitError::Parse(message),
            other => EqFitError::Evaluation(other.to_string()),
        }
    }
}

impl From<crate::parameters::bounds::BoundsError> for EqFitError {
    fn from(err: crate::parameters::bounds::BoundsError) -> Self {
        EqFitError::InvalidBounds(err.to_string())
    }
}

impl From<crate::parameters::parameter::ParameterError> for EqFitError {
    fn from(err: crate::parameters::parameter::ParameterError) -> Self {
        use crate::parameters::parameter::ParameterError;
        match err {
            ParameterError::BoundsError(e) => e.into(),
            other => EqFitError::Evaluation(other.to_string()),
        }
    }
}

/// Result type alias for eqfit-rs operations.
pub type Result<T> = std::result::Result<T, EqFitError>;
