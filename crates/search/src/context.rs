//! Per-request context.
//!
//! A [`RequestContext`] is created once per incoming search request and passed
//! explicitly through compilation, execution and result assembly. It carries
//! the request's correlation id (stamped on the response bundle) and the
//! cancellation signal that every secondary search must observe.

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Request-scoped state shared by every stage of one search request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id for request tracing; becomes the bundle id.
    correlation_id: String,
    /// Cancellation signal of the governing request.
    cancellation: CancellationToken,
}

impl RequestContext {
    /// Creates a context with the given correlation id.
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Creates a context with a freshly generated correlation id.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Attaches the cancellation token of the governing request.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns the correlation id.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Returns the cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns true once the request has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
