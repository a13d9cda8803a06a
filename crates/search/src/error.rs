//! Error types for the search subsystem.
//!
//! Errors are grouped by the stage that raises them: query generation,
//! include resolution, search execution, parameter registry and configuration.
//! Cache misses, unsupported search/sort parameters and truncated results are
//! not errors and never appear here.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::expressions::FieldName;

/// The primary error type for search operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Query generation defects
    #[error(transparent)]
    Generation(#[from] QueryGenerationError),

    /// Include resolution errors
    #[error(transparent)]
    Include(#[from] IncludeError),

    /// Errors reported by the search execution boundary
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Search parameter registry errors
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SearchError {
    /// Returns true if the error was caused by request cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            SearchError::Include(IncludeError::Cancelled { .. })
                | SearchError::Execution(ExecutionError::Cancelled)
        )
    }
}

/// A mismatch between the expression model and a query generator.
///
/// These can only be produced by a construction defect upstream (request
/// parameters are validated before an expression tree is built), so callers
/// must not retry them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryGenerationError {
    /// The generator has no column for the requested field.
    #[error("{generator} query generator does not support field {field}")]
    UnsupportedField {
        generator: &'static str,
        field: FieldName,
    },

    /// The generator does not handle this kind of expression node.
    #[error("{generator} query generator does not support {expression} expressions")]
    UnsupportedExpression {
        generator: &'static str,
        expression: &'static str,
    },

    /// A field-level expression appeared outside of a search parameter scope.
    #[error("{expression} expression on field {field} is not scoped to a search parameter")]
    MissingParameterScope {
        expression: &'static str,
        field: FieldName,
    },

    /// The operator is not meaningful for the field.
    #[error("{generator} query generator does not support operator {operator}")]
    UnsupportedOperator {
        generator: &'static str,
        operator: &'static str,
    },

    /// A composite parameter was addressed without a component index.
    #[error("{generator} expressions must name a component index")]
    MissingComponentIndex { generator: &'static str },

    /// A component index that the composite parameter does not define.
    #[error("component index {index} is out of range for {generator} (components: {count})")]
    InvalidComponentIndex {
        generator: &'static str,
        index: u32,
        count: usize,
    },

    /// A boolean combinator without operands.
    #[error("{operator} expression has no operands")]
    EmptyOperands { operator: &'static str },

    /// An `In` expression without values.
    #[error("IN expression on field {field} has no values")]
    EmptyValueList { field: FieldName },
}

/// Errors raised while resolving `_include` directives.
#[derive(Error, Debug)]
pub enum IncludeError {
    /// The directive string is not `Type:param[:Target]`.
    #[error("invalid include directive '{directive}': {message}")]
    InvalidDirective { directive: String, message: String },

    /// The directive names a parameter that is not defined for the source type.
    #[error("unknown search parameter {resource_type}.{param}")]
    UnknownSearchParameter { resource_type: String, param: String },

    /// The parameter can reference several types and the directive names none.
    #[error(
        "include target for {resource_type}:{param} is ambiguous ({}); specify a target type",
        targets.join(", ")
    )]
    AmbiguousTargetType {
        resource_type: String,
        param: String,
        targets: Vec<String>,
    },

    /// The parameter declares no target types and the directive names none.
    #[error("search parameter {resource_type}.{param} declares no target resource type")]
    NoTargetType { resource_type: String, param: String },

    /// A secondary search could not return every referenced resource.
    #[error("include search for {resource_type} is incomplete: {reason}")]
    Incomplete { resource_type: String, reason: String },

    /// The request was cancelled before every include group resolved.
    #[error("include resolution cancelled after {resolved} of {total} groups")]
    Cancelled { resolved: usize, total: usize },
}

/// Errors reported by the search execution boundary.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The request was cancelled.
    #[error("search execution cancelled")]
    Cancelled,

    /// The search exceeded its time budget.
    #[error("search execution timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The backing store failed.
    #[error("search backend {backend_name} failed: {message}")]
    Backend {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A background task running a secondary search failed to complete.
    #[error("search task failed: {message}")]
    Task { message: String },
}

/// Errors related to the search parameter registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A parameter with the same canonical URL is already registered.
    #[error("search parameter already registered: {url}")]
    DuplicateUrl { url: String },
}

/// Errors in the search configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A configuration value is out of range or malformed.
    #[error("invalid configuration value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// Result type alias for search operations.
pub type SearchOutcome<T> = Result<T, SearchError>;

/// Result type alias for query generation.
pub type GenerationResult<T> = Result<T, QueryGenerationError>;

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for ExecutionError {
    fn from(err: rusqlite::Error) -> Self {
        ExecutionError::Backend {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for SearchError {
    fn from(err: rusqlite::Error) -> Self {
        SearchError::Execution(err.into())
    }
}

impl From<tokio::task::JoinError> for ExecutionError {
    fn from(err: tokio::task::JoinError) -> Self {
        ExecutionError::Task {
            message: err.to_string(),
        }
    }
}
