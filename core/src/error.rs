//! Error types shared across the projection system.

use chrono::{DateTime, Utc};

/// Error type for projection operations.
///
/// Configuration errors (bad period expressions, malformed query
/// construction) are surfaced immediately and should not be retried.
/// [`ProjectionError::Conflict`] is the one recoverable variant: it signals
/// a lost conditional-write race and the engine re-reads and retries.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// The period expression could not be parsed.
    #[error("invalid period expression '{expression}': {reason}")]
    InvalidPeriodExpression {
        /// The offending expression as supplied by the caller.
        expression: String,
        /// What made it unparseable.
        reason: String,
    },

    /// A projection definition was built without any periods.
    #[error("projection definition '{name}' declares no periods")]
    EmptyPeriods {
        /// Name of the offending definition.
        name: String,
    },

    /// Two definitions with the same name were registered.
    #[error("projection definition '{name}' is already registered")]
    DuplicateDefinition {
        /// The duplicated definition name.
        name: String,
    },

    /// `between` was called before a name filter was applied.
    #[error("a projection name filter is required before 'between'")]
    MissingProjectionName,

    /// `between` was called before a period filter was applied.
    #[error("a period filter is required before 'between'")]
    MissingProjectionPeriod,

    /// The definition's merge function failed; the stored bucket is untouched.
    #[error("merge failed for projection '{name}' ({period}): {reason}")]
    MergeFailed {
        /// Definition whose merge function failed.
        name: String,
        /// Canonical period expression of the target bucket.
        period: String,
        /// The merge function's error message.
        reason: String,
    },

    /// No definition is registered under the given name.
    #[error("no projection definition registered under '{name}'")]
    UnknownDefinition {
        /// The unknown definition name.
        name: String,
    },

    /// A conditional write lost a race against a concurrent writer.
    #[error("concurrent update on bucket '{name}' ({period}) at {start_date}")]
    Conflict {
        /// Projection name of the contended bucket.
        name: String,
        /// Canonical period expression of the contended bucket.
        period: String,
        /// Aligned start of the contended bucket.
        start_date: DateTime<Utc>,
    },

    /// Store-layer failure, passed through uninterpreted.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
