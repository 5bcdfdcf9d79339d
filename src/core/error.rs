//! Error handling and error types for the histogram core.
//!
//! Every fallible operation returns [`Result`]. Range, configuration and
//! state errors carry the offending values so callers can report them
//! without re-deriving context.

use thiserror::Error;

/// Main error type for the crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistError {
    /// Configuration and validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Out of bounds access
    #[error("Index out of bounds: index {index}, length {length}")]
    IndexOutOfBounds { index: usize, length: usize },

    /// Malformed half-open range
    #[error("Invalid range: begin {begin} > end {end}")]
    InvalidRange { begin: usize, end: usize },

    /// Dimension mismatch errors
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// Histogram requested for a node the collection does not hold
    #[error("Histogram for node {node} not found")]
    NodeNotFound { node: u32 },

    /// Scratch histogram requested for a (thread, node) pair not registered by `reset`
    #[error("No histogram registered for thread {thread}, node {node}")]
    UnregisteredHistogram { thread: usize, node: usize },

    /// Thread pool construction errors
    #[error("Threading error: {message}")]
    Threading { message: String },

    /// Configuration parsing errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

/// Type alias for Results using HistError
pub type Result<T> = std::result::Result<T, HistError>;

impl HistError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        HistError::Config {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        HistError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an index out of bounds error
    pub fn index_out_of_bounds(index: usize, length: usize) -> Self {
        HistError::IndexOutOfBounds { index, length }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch<E, A>(expected: E, actual: A) -> Self
    where
        E: Into<String>,
        A: Into<String>,
    {
        HistError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a threading error
    pub fn threading<S: Into<String>>(message: S) -> Self {
        HistError::Threading {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        HistError::Serialization {
            message: message.into(),
        }
    }

    /// Check if this error is a caller-side range violation
    pub fn is_range_error(&self) -> bool {
        matches!(
            self,
            HistError::IndexOutOfBounds { .. } | HistError::InvalidRange { .. }
        )
    }

    /// Check if this error was raised while validating configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            HistError::Config { .. } | HistError::InvalidParameter { .. }
        )
    }

    /// Get error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            HistError::Config { .. } | HistError::InvalidParameter { .. } => "config",
            HistError::IndexOutOfBounds { .. } | HistError::InvalidRange { .. } => "range",
            HistError::DimensionMismatch { .. } => "dimension",
            HistError::NodeNotFound { .. } | HistError::UnregisteredHistogram { .. } => "state",
            HistError::Threading { .. } => "threading",
            HistError::Serialization { .. } => "serialization",
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for HistError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        HistError::threading(err.to_string())
    }
}
