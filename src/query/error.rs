//! Query errors
//!
//! None of these abort a query: they are rendered into the listing's error
//! list and the best-effort result is still returned.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Segment names no known tag; the pipeline is left unchanged
    #[error("Unknown tag '{0}'")]
    UnknownTag(String),

    #[error("Illegal operator '{0}'")]
    IllegalOperator(String),

    /// Tokens following `evaluate`
    #[error("Illegal appendix after evaluate: '{0}'")]
    IllegalAppendix(String),

    /// Operator expecting a value segment at the end of the query
    #[error("Operator '{0}' is missing its value")]
    MissingValue(String),

    #[error("Invalid value '{value}' for operator '{operator}': {reason}")]
    InvalidValue {
        operator: String,
        value: String,
        reason: String,
    },

    /// `else` without a preceding tag filter
    #[error("'else' needs a preceding tag")]
    DanglingElse,

    /// `not` or a scope operator that nothing followed
    #[error("Operator '{0}' has nothing to apply to")]
    Dangling(String),
}
