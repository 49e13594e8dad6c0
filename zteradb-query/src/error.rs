//! Build-time validation errors.

use thiserror::Error;

/// Raised when a filter or query builder is given invalid input. These
/// surface immediately, before anything touches the network.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("operator {op:?} requires at least {min} operands, got {got}")]
    NotEnoughOperands {
        op: &'static str,
        min: usize,
        got: usize,
    },

    #[error("operator {op:?} requires a non-empty field name")]
    EmptyField { op: &'static str },

    #[error("operator {op:?} requires non-empty string arguments")]
    EmptyString { op: &'static str },

    #[error("operator {op:?} requires scalar operands, got an array")]
    InvalidOperand { op: &'static str },

    #[error("field name {0:?} is reserved")]
    ReservedField(String),

    #[error("filter value for field {0:?} must be a scalar, not an object")]
    NonScalarFilter(String),

    #[error("sort order for field {field:?} must be 1 or -1, got {order}")]
    InvalidSortOrder { field: String, order: i64 },

    #[error("sort map must not be empty")]
    EmptySort,

    #[error("limit bounds must be non-negative, got [{start}, {end})")]
    NegativeLimit { start: i64, end: i64 },

    #[error("limit start must be strictly less than end, got [{start}, {end})")]
    InvalidLimitRange { start: i64, end: i64 },

    #[error("query type must be set before generating the query document")]
    MissingQueryType,

    #[error("environment {0:?} is not one of dev, staging, qa, prod")]
    InvalidEnv(String),

    #[error("malformed filter node: {0}")]
    MalformedNode(String),
}
