//! Search request pipeline.
//!
//! A search request flows through a chain of [`SearchResourceHandler`]s. The
//! innermost, [`SearchResourceService`], runs the search through the
//! [`SearchService`] execution boundary and assembles the bundle; behaviors
//! such as [`IncludeSearchBehavior`] wrap it.

use async_trait::async_trait;

use crate::bundle::{Bundle, Issue};
use crate::context::RequestContext;
use crate::error::SearchOutcome;
use crate::types::{SearchResult, UnsupportedParameter};

mod include;
mod service;

pub use include::{IncludeGroup, IncludeSearchBehavior};
pub use service::SearchResourceService;

/// The search execution boundary.
///
/// Implementations run a search for `resource_type` with already-parsed
/// `queries` and must honour the cancellation token carried by `ctx`.
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Runs a search.
    async fn search(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        queries: &[(String, String)],
    ) -> SearchOutcome<SearchResult>;
}

/// A search request.
#[derive(Debug, Clone, Default)]
pub struct SearchResourceRequest {
    /// Resource type to search.
    pub resource_type: String,
    /// Query parameters in request order.
    pub queries: Vec<(String, String)>,
    /// Issues raised while handling the request so far.
    pub diagnostics: Vec<Issue>,
}

impl SearchResourceRequest {
    /// Creates a request.
    pub fn new<I, K, V>(resource_type: impl Into<String>, queries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            resource_type: resource_type.into(),
            queries: queries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            diagnostics: Vec::new(),
        }
    }

    /// Adds a diagnostic issue.
    pub fn with_diagnostic(mut self, issue: Issue) -> Self {
        self.diagnostics.push(issue);
        self
    }
}

/// The response to a search request: the bundle plus the paging metadata of
/// the search that produced it.
#[derive(Debug, Clone)]
pub struct SearchResourceResponse {
    /// The assembled bundle.
    pub bundle: Bundle,
    /// Search parameters that were ignored.
    pub unsupported_search_params: Vec<UnsupportedParameter>,
    /// Sort parameters that were ignored.
    pub unsupported_sorting_params: Vec<UnsupportedParameter>,
    /// Raw continuation token of the search.
    pub continuation_token: Option<String>,
    /// Total number of matches, when known.
    pub total_count: Option<u64>,
}

/// One stage of the search pipeline.
#[async_trait]
pub trait SearchResourceHandler: Send + Sync {
    /// Handles a search request.
    async fn handle(
        &self,
        ctx: &RequestContext,
        request: SearchResourceRequest,
    ) -> SearchOutcome<SearchResourceResponse>;
}
