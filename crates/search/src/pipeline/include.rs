use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::bundle::{
    BundleEntry, BundleFactory, BundleParts, BundleType, SearchRoute, encode_continuation_token,
    url,
};
use crate::config::SearchConfig;
use crate::context::RequestContext;
use crate::error::{ExecutionError, IncludeError, SearchError, SearchOutcome};
use crate::search::{SearchIndexer, SearchParameterDefinition, SearchParameterDefinitionManager};
use crate::types::{IncludeDirective, ResourceWrapper, SearchEntryMode, SearchResult};

use super::{SearchResourceHandler, SearchResourceRequest, SearchResourceResponse, SearchService};

/// Search parameter used to fetch included resources.
const ID_PARAMETER: &str = "_id";

const COUNT_PARAMETER: &str = "_count";

/// A batch of referenced ids fetched with one secondary search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeGroup {
    /// Resource type searched.
    pub resource_type: String,
    /// Search parameter the ids are matched on.
    pub param: String,
    /// Referenced ids, first-seen order, without duplicates.
    pub ids: Vec<String>,
}

impl IncludeGroup {
    /// Query for one page of the group. The requested count covers every id;
    /// backends that cap it answer with a continuation token.
    fn query(&self, continuation: Option<&str>) -> Vec<(String, String)> {
        let mut query = vec![
            (self.param.clone(), self.ids.join(",")),
            (COUNT_PARAMETER.to_string(), self.ids.len().to_string()),
        ];
        if let Some(token) = continuation {
            query.push((
                url::CONTINUATION_TOKEN_PARAMETER.to_string(),
                encode_continuation_token(token),
            ));
        }
        query
    }

    fn incomplete(&self, reason: impl Into<String>) -> SearchError {
        IncludeError::Incomplete {
            resource_type: self.resource_type.clone(),
            reason: reason.into(),
        }
        .into()
    }
}

/// Fetches every page of a group's `_id` search.
///
/// A partial page fails the group. So does a continuation token that repeats
/// or outlives the number of ids, since every page must return at least one.
async fn fetch_group(
    search: &dyn SearchService,
    ctx: &RequestContext,
    group: &IncludeGroup,
) -> SearchOutcome<SearchResult> {
    let mut merged = SearchResult::new(Vec::new());
    let mut continuation: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let query = group.query(continuation.as_deref());
        let page = search.search(ctx, &group.resource_type, &query).await?;
        pages += 1;

        if page.partial {
            return Err(group.incomplete("secondary search returned a partial result"));
        }
        merged.results.extend(page.results);

        match page.continuation_token {
            None => return Ok(merged),
            Some(token) if continuation.as_deref() == Some(token.as_str()) => {
                return Err(group.incomplete("continuation token did not advance"));
            }
            Some(_) if pages >= group.ids.len() => {
                return Err(group.incomplete(format!(
                    "{} ids still paging after {} pages",
                    group.ids.len(),
                    pages
                )));
            }
            Some(token) => {
                debug!(
                    resource_type = %group.resource_type,
                    pages,
                    "Following include continuation token"
                );
                continuation = Some(token);
            }
        }
    }
}

/// A directive checked against the parameter registry.
struct ResolvedDirective {
    directive: IncludeDirective,
    parameter: Arc<SearchParameterDefinition>,
    target_type: String,
}

/// Pipeline behavior resolving `_include` directives.
///
/// Directives are removed from the query before the wrapped handler runs.
/// References of the matched entries are then grouped per target type and
/// fetched with one `_id` search per group, following its continuation
/// tokens until every page is read. A group that cannot be read in full fails
/// the request. Included resources follow the original entries; paging
/// metadata stays that of the original search.
pub struct IncludeSearchBehavior {
    inner: Arc<dyn SearchResourceHandler>,
    search: Arc<dyn SearchService>,
    indexer: Arc<dyn SearchIndexer>,
    definitions: Arc<dyn SearchParameterDefinitionManager>,
    factory: Arc<BundleFactory>,
    include_parameter: String,
    max_concurrent_includes: usize,
}

impl IncludeSearchBehavior {
    /// Wraps `inner`.
    pub fn new(
        inner: Arc<dyn SearchResourceHandler>,
        search: Arc<dyn SearchService>,
        indexer: Arc<dyn SearchIndexer>,
        definitions: Arc<dyn SearchParameterDefinitionManager>,
        factory: Arc<BundleFactory>,
        config: &SearchConfig,
    ) -> Self {
        Self {
            inner,
            search,
            indexer,
            definitions,
            factory,
            include_parameter: config.include_parameter.clone(),
            max_concurrent_includes: config.max_concurrent_includes.max(1),
        }
    }

    fn resolve_directive(&self, raw: &str) -> Result<ResolvedDirective, IncludeError> {
        let directive = IncludeDirective::parse(raw)?;
        let parameter = self
            .definitions
            .get_search_parameter(&directive.source_type, &directive.search_param)
            .ok_or_else(|| IncludeError::UnknownSearchParameter {
                resource_type: directive.source_type.clone(),
                param: directive.search_param.clone(),
            })?;

        let target_type = match &directive.target_type {
            Some(target) => target.clone(),
            None => match parameter.target_types() {
                [single] => single.clone(),
                [] => {
                    return Err(IncludeError::NoTargetType {
                        resource_type: directive.source_type.clone(),
                        param: directive.search_param.clone(),
                    });
                }
                targets => {
                    return Err(IncludeError::AmbiguousTargetType {
                        resource_type: directive.source_type.clone(),
                        param: directive.search_param.clone(),
                        targets: targets.to_vec(),
                    });
                }
            },
        };

        Ok(ResolvedDirective {
            directive,
            parameter,
            target_type,
        })
    }

    /// Collects the references of the match entries into include groups, in
    /// first-seen group order. Ids are unique within a group only.
    fn collect_groups(
        &self,
        entries: &[BundleEntry],
        directives: &[ResolvedDirective],
    ) -> Vec<IncludeGroup> {
        let mut groups: Vec<(IncludeGroup, HashSet<String>)> = Vec::new();

        for entry in entries.iter().filter(|e| e.is_match()) {
            let (Some((resource_type, id)), Some(content)) = (entry.resource_key(), &entry.resource)
            else {
                continue;
            };
            let applicable: Vec<&ResolvedDirective> = directives
                .iter()
                .filter(|d| d.directive.source_type == resource_type)
                .collect();
            if applicable.is_empty() {
                continue;
            }

            let resource = ResourceWrapper::new(resource_type, id, content.clone());
            let extracted = self.indexer.extract(&resource);

            for resolved in applicable {
                let references = extracted
                    .iter()
                    .filter(|e| e.parameter.url == resolved.parameter.url)
                    .filter_map(|e| e.value.reference_target());

                for (ref_type, ref_id) in references {
                    if ref_type != resolved.target_type {
                        continue;
                    }

                    let position = groups.iter().position(|(g, _)| {
                        g.resource_type == resolved.target_type && g.param == ID_PARAMETER
                    });
                    let (group, seen) = match position {
                        Some(i) => &mut groups[i],
                        None => {
                            groups.push((
                                IncludeGroup {
                                    resource_type: resolved.target_type.clone(),
                                    param: ID_PARAMETER.to_string(),
                                    ids: Vec::new(),
                                },
                                HashSet::new(),
                            ));
                            let last = groups.len() - 1;
                            &mut groups[last]
                        }
                    };
                    if seen.insert(ref_id.to_string()) {
                        group.ids.push(ref_id.to_string());
                    }
                }
            }
        }

        groups.into_iter().map(|(group, _)| group).collect()
    }

    /// Runs one secondary search per group, at most
    /// `max_concurrent_includes` at a time. Results come back in group order.
    async fn resolve_groups(
        &self,
        ctx: &RequestContext,
        groups: Vec<IncludeGroup>,
    ) -> SearchOutcome<Vec<SearchResult>> {
        let total = groups.len();
        if ctx.is_cancelled() {
            return Err(IncludeError::Cancelled { resolved: 0, total }.into());
        }

        let permits = Arc::new(Semaphore::new(self.max_concurrent_includes));
        let mut tasks: JoinSet<(usize, SearchOutcome<SearchResult>)> = JoinSet::new();

        for (index, group) in groups.into_iter().enumerate() {
            let permits = Arc::clone(&permits);
            let search = Arc::clone(&self.search);
            let ctx = ctx.clone();
            tasks.spawn(async move {
                let cancellation = ctx.cancellation().clone();
                let result: SearchOutcome<SearchResult> = tokio::select! {
                    _ = cancellation.cancelled() => Err(ExecutionError::Cancelled.into()),
                    result = async {
                        let _permit = permits
                            .acquire()
                            .await
                            .map_err(|_| SearchError::from(ExecutionError::Cancelled))?;
                        fetch_group(search.as_ref(), &ctx, &group).await
                    } => result,
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<SearchResult>> = vec![None; total];
        let mut resolved = 0;
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.map_err(ExecutionError::from)?;
            match result {
                Ok(result) => {
                    results[index] = Some(result);
                    resolved += 1;
                }
                Err(err) if err.is_cancelled() || ctx.is_cancelled() => {
                    warn!(resolved, total, "Include resolution cancelled");
                    return Err(IncludeError::Cancelled { resolved, total }.into());
                }
                Err(err) => {
                    warn!(error = %err, "Include search failed");
                    return Err(err);
                }
            }
        }

        Ok(results.into_iter().flatten().collect())
    }
}

#[async_trait]
impl SearchResourceHandler for IncludeSearchBehavior {
    #[instrument(
        skip(self, ctx, request),
        fields(resource_type = %request.resource_type, correlation_id = %ctx.correlation_id())
    )]
    async fn handle(
        &self,
        ctx: &RequestContext,
        request: SearchResourceRequest,
    ) -> SearchOutcome<SearchResourceResponse> {
        let (includes, filters): (Vec<_>, Vec<_>) = request
            .queries
            .iter()
            .cloned()
            .partition(|(name, _)| *name == self.include_parameter);

        if includes.is_empty() {
            return self.inner.handle(ctx, request).await;
        }

        let directives = includes
            .iter()
            .map(|(_, value)| self.resolve_directive(value))
            .collect::<Result<Vec<_>, _>>()?;

        let route = SearchRoute::new(request.resource_type.clone(), request.queries.clone());
        let response = self
            .inner
            .handle(
                ctx,
                SearchResourceRequest {
                    queries: filters,
                    ..request
                },
            )
            .await?;

        let groups = self.collect_groups(response.bundle.entries(), &directives);
        debug!(
            directives = directives.len(),
            groups = groups.len(),
            "Resolving include groups"
        );

        let included = self.resolve_groups(ctx, groups).await?;

        let mut entries = response.bundle.entries().to_vec();
        entries.extend(
            included
                .iter()
                .flat_map(|result| result.results.iter())
                .filter(|entry| entry.mode != SearchEntryMode::Outcome)
                .map(|entry| self.factory.included_entry(&entry.resource)),
        );

        let bundle = self.factory.assemble(
            ctx,
            &route,
            BundleType::Searchset,
            BundleParts {
                entries,
                unsupported_search_params: response.unsupported_search_params.clone(),
                unsupported_sorting_params: response.unsupported_sorting_params.clone(),
                continuation_token: response.continuation_token.clone(),
                total_count: response.total_count,
                partial: false,
                diagnostics: Vec::new(),
            },
        );

        Ok(SearchResourceResponse { bundle, ..response })
    }
}
