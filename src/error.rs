use thiserror::Error;

/// Errors raised while building, rendering or executing statements.
#[derive(Debug, Error)]
pub enum Error {
    #[error("No connection provided")]
    NoConnection,

    /// A required projection or key produced SQL NULL.
    #[error("Null result")]
    NullResult,

    #[error("More than one result found")]
    NonUniqueResult,

    #[error("No value bound for parameter '{0}'")]
    ParamNotSet(String),

    #[error(
        "Undeclared path '{0}'. A delete operation can only reference a single table. \
         Consider this alternative: DELETE ... WHERE EXISTS (subquery)"
    )]
    UndeclaredPath(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Expected {expected} parameters, but got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    #[error("Batch item {index} does not render the same statement as the first batch item")]
    BatchMismatch { index: usize },

    #[error("Nothing to execute: {0}")]
    EmptyClause(&'static str),

    #[error("Cannot convert {found} to {expected}")]
    Conversion {
        expected: &'static str,
        found: &'static str,
    },

    #[error("No column named '{0}'")]
    NoSuchColumn(String),

    #[error("Expression is not part of the projection: {0}")]
    NotInProjection(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Connection lock poisoned")]
    LockPoisoned,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
