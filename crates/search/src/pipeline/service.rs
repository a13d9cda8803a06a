use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::bundle::{BundleFactory, SearchRoute};
use crate::context::RequestContext;
use crate::error::{ExecutionError, SearchOutcome};

use super::{SearchResourceHandler, SearchResourceRequest, SearchResourceResponse, SearchService};

/// Innermost pipeline stage: runs the search and assembles a searchset bundle.
pub struct SearchResourceService {
    search: Arc<dyn SearchService>,
    factory: Arc<BundleFactory>,
}

impl SearchResourceService {
    /// Creates the service.
    pub fn new(search: Arc<dyn SearchService>, factory: Arc<BundleFactory>) -> Self {
        Self { search, factory }
    }
}

#[async_trait]
impl SearchResourceHandler for SearchResourceService {
    #[instrument(
        skip(self, ctx, request),
        fields(resource_type = %request.resource_type, correlation_id = %ctx.correlation_id())
    )]
    async fn handle(
        &self,
        ctx: &RequestContext,
        request: SearchResourceRequest,
    ) -> SearchOutcome<SearchResourceResponse> {
        if ctx.is_cancelled() {
            return Err(ExecutionError::Cancelled.into());
        }

        let result = self
            .search
            .search(ctx, &request.resource_type, &request.queries)
            .await?;
        debug!(
            entries = result.results.len(),
            partial = result.partial,
            "Search completed"
        );

        let unsupported_search_params = result.unsupported_search_params.clone();
        let unsupported_sorting_params = result.unsupported_sorting_params.clone();
        let continuation_token = result.continuation_token.clone();
        let total_count = result.total_count;

        let route = SearchRoute::new(request.resource_type, request.queries);
        let bundle = self
            .factory
            .create_search_bundle(ctx, &route, result, request.diagnostics);

        Ok(SearchResourceResponse {
            bundle,
            unsupported_search_params,
            unsupported_sorting_params,
            continuation_token,
            total_count,
        })
    }
}
