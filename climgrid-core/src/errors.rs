use thiserror::Error;

/// Error type for invalid grid operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    /// A named coordinate or variable is not present
    #[error("{0} not found")]
    KeyNotFound(String),
    /// Caller supplied arguments violate a precondition
    #[error("Invalid input. {0}")]
    InvalidInput(String),
    /// An internal consistency check failed after computation
    #[error("{0}")]
    RuntimeInvariant(String),
    #[error("Shape mismatch for {name}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Invalid calendar {0:?}. Try \"365_day\" or \"gregorian\".")]
    InvalidCalendar(String),
    #[error("Invalid units {units:?}. {reason}")]
    InvalidTimeUnits { units: String, reason: String },
    #[error("Invalid data. {0}")]
    InvalidData(String),
}

/// Convenience type for `Result<T, GridError>`.
pub type GridResult<T> = Result<T, GridError>;

impl From<GridError> for pyo3::PyErr {
    fn from(err: GridError) -> Self {
        use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyValueError};

        match err {
            GridError::KeyNotFound(_) => PyKeyError::new_err(err.to_string()),
            GridError::RuntimeInvariant(_) => PyRuntimeError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}
