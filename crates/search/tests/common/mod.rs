//! Shared test utilities for search integration tests.

#![allow(dead_code)]

pub mod fixtures;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use helios_search::bundle::{QueryUrlResolver, decode_continuation_token};
use helios_search::context::RequestContext;
use helios_search::error::{ExecutionError, SearchOutcome};
use helios_search::pipeline::SearchService;
use helios_search::search::{JsonPathIndexer, SearchParameterRegistry};
use helios_search::types::{ResourceWrapper, SearchResult, SearchResultEntry, UnsupportedParameter};
use helios_search::{BundleFactory, IncludeSearchBehavior, SearchConfig, SearchResourceService};

/// Installs an env-filtered fmt subscriber once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helios_search=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// A recorded call to [`InMemorySearchService::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCall {
    pub resource_type: String,
    pub queries: Vec<(String, String)>,
}

/// Search service over a fixed set of resources.
///
/// `_id` searches return the stored resources of the type with one of the
/// listed ids, in storage order, paged when a page size is set for the type.
/// Any other search returns every resource of the type, decorated with the
/// configured paging metadata.
#[derive(Default)]
pub struct InMemorySearchService {
    resources: Vec<ResourceWrapper>,
    failing: HashSet<String>,
    slow: HashSet<String>,
    continuation_token: Option<String>,
    id_page_sizes: HashMap<String, usize>,
    partial_ids: HashSet<String>,
    stuck_ids: HashSet<String>,
    total: Option<u64>,
    partial: bool,
    unsupported: Vec<UnsupportedParameter>,
    calls: Mutex<Vec<SearchCall>>,
}

impl InMemorySearchService {
    pub fn new(resources: Vec<ResourceWrapper>) -> Self {
        Self {
            resources,
            ..Default::default()
        }
    }

    /// Searches for `resource_type` fail with a backend error.
    pub fn failing_for(mut self, resource_type: &str) -> Self {
        self.failing.insert(resource_type.to_string());
        self
    }

    /// Searches for `resource_type` block until cancelled.
    pub fn slow_for(mut self, resource_type: &str) -> Self {
        self.slow.insert(resource_type.to_string());
        self
    }

    pub fn with_continuation_token(mut self, token: &str) -> Self {
        self.continuation_token = Some(token.to_string());
        self
    }

    /// `_id` searches for `resource_type` return at most `size` entries per
    /// page, whatever `_count` asks for.
    pub fn id_page_size_for(mut self, resource_type: &str, size: usize) -> Self {
        self.id_page_sizes.insert(resource_type.to_string(), size);
        self
    }

    /// `_id` searches for `resource_type` report a partial result.
    pub fn partial_ids_for(mut self, resource_type: &str) -> Self {
        self.partial_ids.insert(resource_type.to_string());
        self
    }

    /// `_id` searches for `resource_type` always answer with the same
    /// continuation token.
    pub fn stuck_ids_for(mut self, resource_type: &str) -> Self {
        self.stuck_ids.insert(resource_type.to_string());
        self
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn with_partial(mut self) -> Self {
        self.partial = true;
        self
    }

    pub fn with_unsupported(mut self, name: &str) -> Self {
        self.unsupported
            .push(UnsupportedParameter::new(name, "not indexed"));
        self
    }

    pub fn calls(&self) -> Vec<SearchCall> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, resource_type: &str) -> Vec<SearchCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.resource_type == resource_type)
            .collect()
    }
}

#[async_trait]
impl SearchService for InMemorySearchService {
    async fn search(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        queries: &[(String, String)],
    ) -> SearchOutcome<SearchResult> {
        self.calls.lock().push(SearchCall {
            resource_type: resource_type.to_string(),
            queries: queries.to_vec(),
        });

        if self.slow.contains(resource_type) {
            tokio::select! {
                _ = ctx.cancellation().cancelled() => return Err(ExecutionError::Cancelled.into()),
                _ = tokio::time::sleep(Duration::from_secs(30)) => {}
            }
        }
        if self.failing.contains(resource_type) {
            return Err(ExecutionError::Backend {
                backend_name: "memory".to_string(),
                message: format!("{} search failed", resource_type),
                source: None,
            }
            .into());
        }

        let ids: Option<Vec<&str>> = queries
            .iter()
            .find(|(name, _)| name == "_id")
            .map(|(_, value)| value.split(',').collect());

        let results: Vec<SearchResultEntry> = self
            .resources
            .iter()
            .filter(|r| r.resource_type() == resource_type)
            .filter(|r| ids.as_ref().is_none_or(|ids| ids.contains(&r.id())))
            .cloned()
            .map(SearchResultEntry::matched)
            .collect();

        if ids.is_some() {
            if self.stuck_ids.contains(resource_type) {
                return Ok(SearchResult::new(results).with_continuation_token("again"));
            }
            let offset: usize = queries
                .iter()
                .find(|(name, _)| name == "ct")
                .and_then(|(_, value)| decode_continuation_token(value))
                .and_then(|token| token.parse().ok())
                .unwrap_or(0);
            let page_size = self
                .id_page_sizes
                .get(resource_type)
                .copied()
                .unwrap_or(usize::MAX);
            let end = offset.saturating_add(page_size).min(results.len());
            let mut result = SearchResult::new(results[offset.min(end)..end].to_vec());
            if end < results.len() {
                result.continuation_token = Some(end.to_string());
            }
            result.partial = self.partial_ids.contains(resource_type);
            return Ok(result);
        }

        let mut result = SearchResult::new(results);
        result.continuation_token = self.continuation_token.clone();
        result.total_count = self.total;
        result.partial = self.partial;
        result.unsupported_search_params = self.unsupported.clone();
        Ok(result)
    }
}

pub fn factory() -> Arc<BundleFactory> {
    let config = SearchConfig::default();
    Arc::new(BundleFactory::new(
        Arc::new(QueryUrlResolver::from_config(&config)),
        &config,
    ))
}

/// Wires the include behavior around a plain search service, both over
/// `search` and the fixture registry.
pub fn include_pipeline(search: Arc<InMemorySearchService>) -> IncludeSearchBehavior {
    include_pipeline_with(search, &SearchConfig::default())
}

pub fn include_pipeline_with(
    search: Arc<InMemorySearchService>,
    config: &SearchConfig,
) -> IncludeSearchBehavior {
    let registry = Arc::new(RwLock::new(fixtures::registry()));
    let factory = factory();
    let inner = Arc::new(SearchResourceService::new(search.clone(), factory.clone()));
    let indexer = Arc::new(JsonPathIndexer::new(registry.clone()));
    IncludeSearchBehavior::new(inner, search, indexer, registry, factory, config)
}

pub fn shared_registry() -> Arc<RwLock<SearchParameterRegistry>> {
    Arc::new(RwLock::new(fixtures::registry()))
}
