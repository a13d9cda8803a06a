//! Result set produced by the search execution boundary.

use serde::{Deserialize, Serialize};

use super::ResourceWrapper;

/// How an entry came to be in a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEntryMode {
    /// This is a match to the search parameters.
    Match,
    /// This is included because of _include.
    Include,
    /// This is an OperationOutcome about the search.
    Outcome,
}

/// One resource in a result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultEntry {
    /// The resource.
    pub resource: ResourceWrapper,
    /// Why the resource is in the result set.
    pub mode: SearchEntryMode,
}

impl SearchResultEntry {
    /// Creates a match entry.
    pub fn matched(resource: ResourceWrapper) -> Self {
        Self {
            resource,
            mode: SearchEntryMode::Match,
        }
    }

    /// Creates an include entry.
    pub fn included(resource: ResourceWrapper) -> Self {
        Self {
            resource,
            mode: SearchEntryMode::Include,
        }
    }
}

/// A search or sort parameter that was accepted by the request but ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsupportedParameter {
    /// Parameter name as it appeared in the request.
    pub name: String,
    /// Human-readable reason it was ignored.
    pub reason: String,
}

impl UnsupportedParameter {
    /// Creates a new unsupported parameter record.
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// An ordered result set plus pagination metadata.
///
/// `partial` is true only when execution stopped before exhausting every
/// match (for example a time or row budget). It is a signal, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Entries in result order.
    pub results: Vec<SearchResultEntry>,
    /// Opaque pagination cursor for the next page.
    pub continuation_token: Option<String>,
    /// Total number of matches, when known.
    pub total_count: Option<u64>,
    /// Whether execution was truncated.
    pub partial: bool,
    /// Search parameters that were ignored.
    pub unsupported_search_params: Vec<UnsupportedParameter>,
    /// Sort parameters that were ignored.
    pub unsupported_sorting_params: Vec<UnsupportedParameter>,
}

impl SearchResult {
    /// Creates a complete result with the given entries.
    pub fn new(results: Vec<SearchResultEntry>) -> Self {
        Self {
            results,
            ..Default::default()
        }
    }

    /// Sets the continuation token.
    pub fn with_continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }

    /// Sets the total count.
    pub fn with_total(mut self, total: u64) -> Self {
        self.total_count = Some(total);
        self
    }

    /// Marks the result as truncated.
    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    /// Records an ignored search parameter.
    pub fn with_unsupported_search_param(mut self, param: UnsupportedParameter) -> Self {
        self.unsupported_search_params.push(param);
        self
    }

    /// Records an ignored sort parameter.
    pub fn with_unsupported_sorting_param(mut self, param: UnsupportedParameter) -> Self {
        self.unsupported_sorting_params.push(param);
        self
    }

    /// Iterates over the match entries.
    pub fn matches(&self) -> impl Iterator<Item = &SearchResultEntry> {
        self.results
            .iter()
            .filter(|e| e.mode == SearchEntryMode::Match)
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
