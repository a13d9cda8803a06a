//! Result assembly: search results to response envelopes.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::context::RequestContext;
use crate::types::{
    HttpVerb, ResourceWrapper, SearchEntryMode, SearchResult, SearchResultEntry,
    UnsupportedParameter,
};

use super::model::{Bundle, BundleEntry, BundleEntryRequest, BundleEntryResponse, BundleType};
use super::outcome::{Issue, IssueType, OperationOutcome};
use super::url::{SearchRoute, UrlResolver, encode_continuation_token};

/// Everything a bundle is assembled from, apart from the request itself.
///
/// `diagnostics` are issues raised while handling the request; they are
/// consumed by assembly and rendered once, in the leading outcome entry.
#[derive(Debug, Clone, Default)]
pub struct BundleParts {
    /// Entries already mapped to their final representation.
    pub entries: Vec<BundleEntry>,
    /// Search parameters that were ignored.
    pub unsupported_search_params: Vec<UnsupportedParameter>,
    /// Sort parameters that were ignored.
    pub unsupported_sorting_params: Vec<UnsupportedParameter>,
    /// Raw (unencoded) continuation token.
    pub continuation_token: Option<String>,
    /// Total number of matches, when known.
    pub total_count: Option<u64>,
    /// Whether execution was truncated.
    pub partial: bool,
    /// Issues to report in the leading outcome entry.
    pub diagnostics: Vec<Issue>,
}

/// Assembles search and history bundles.
pub struct BundleFactory {
    url_resolver: Arc<dyn UrlResolver>,
    truncated_message: String,
    clock: fn() -> DateTime<Utc>,
}

impl BundleFactory {
    /// Creates a factory.
    pub fn new(url_resolver: Arc<dyn UrlResolver>, config: &SearchConfig) -> Self {
        Self {
            url_resolver,
            truncated_message: config.truncated_message.clone(),
            clock: Utc::now,
        }
    }

    /// Replaces the clock used to stamp `meta.lastUpdated`.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Creates a searchset bundle. Each entry gets its full URL and search mode.
    pub fn create_search_bundle(
        &self,
        ctx: &RequestContext,
        route: &SearchRoute,
        result: SearchResult,
        diagnostics: Vec<Issue>,
    ) -> Bundle {
        self.create_bundle(
            ctx,
            route,
            BundleType::Searchset,
            result,
            diagnostics,
            |entry| self.search_entry(entry),
        )
    }

    /// Creates a history bundle.
    ///
    /// Entries carry versioned full URLs, `response.etag`/`lastModified`, and
    /// `request` metadata when the recorded HTTP verb is recognised.
    pub fn create_history_bundle(
        &self,
        ctx: &RequestContext,
        route: &SearchRoute,
        result: SearchResult,
        diagnostics: Vec<Issue>,
    ) -> Bundle {
        self.create_bundle(
            ctx,
            route,
            BundleType::History,
            result,
            diagnostics,
            |entry| self.history_entry(entry),
        )
    }

    /// Creates a bundle of `bundle_type`, mapping every result entry with
    /// `mapper`.
    pub fn create_bundle<F>(
        &self,
        ctx: &RequestContext,
        route: &SearchRoute,
        bundle_type: BundleType,
        result: SearchResult,
        diagnostics: Vec<Issue>,
        mapper: F,
    ) -> Bundle
    where
        F: Fn(&SearchResultEntry) -> BundleEntry,
    {
        let entries = result.results.iter().map(mapper).collect();

        let mut diagnostics = diagnostics;
        diagnostics.extend(unsupported_issues(
            &result.unsupported_search_params,
            "search parameter",
        ));
        diagnostics.extend(unsupported_issues(
            &result.unsupported_sorting_params,
            "sort parameter",
        ));

        self.assemble(
            ctx,
            route,
            bundle_type,
            BundleParts {
                entries,
                unsupported_search_params: result.unsupported_search_params,
                unsupported_sorting_params: result.unsupported_sorting_params,
                continuation_token: result.continuation_token,
                total_count: result.total_count,
                partial: result.partial,
                diagnostics,
            },
        )
    }

    /// Assembles a bundle from already-mapped entries.
    ///
    /// Ignored parameters only shape the links here; [`create_bundle`]
    /// turns them into diagnostics before calling this.
    ///
    /// [`create_bundle`]: Self::create_bundle
    pub fn assemble(
        &self,
        ctx: &RequestContext,
        route: &SearchRoute,
        bundle_type: BundleType,
        parts: BundleParts,
    ) -> Bundle {
        let BundleParts {
            entries: mapped,
            unsupported_search_params,
            unsupported_sorting_params,
            continuation_token,
            total_count,
            partial,
            diagnostics,
        } = parts;

        let mut entries = Vec::with_capacity(mapped.len() + 2);

        let outcome = OperationOutcome::new(diagnostics);
        if !outcome.is_empty() {
            debug!(
                correlation_id = ctx.correlation_id(),
                issues = outcome.issues().len(),
                "Adding outcome entry to bundle"
            );
            entries.push(BundleEntry::outcome(outcome.to_json()));
        }

        entries.extend(mapped);

        let next_link = continuation_token.as_deref().map(|token| {
            self.url_resolver.resolve_route_url(
                route,
                &unsupported_search_params,
                &unsupported_sorting_params,
                Some(&encode_continuation_token(token)),
            )
        });

        if partial {
            warn!(
                correlation_id = ctx.correlation_id(),
                resource_type = %route.resource_type,
                "Search result is partial"
            );
            let truncated = OperationOutcome::default().add_issue(Issue::warning(
                IssueType::Incomplete,
                self.truncated_message.clone(),
            ));
            entries.push(BundleEntry::outcome(truncated.to_json()));
        }

        let self_link = self.url_resolver.resolve_route_url(
            route,
            &unsupported_search_params,
            &unsupported_sorting_params,
            None,
        );

        Bundle {
            id: ctx.correlation_id().to_string(),
            bundle_type,
            total: total_count,
            self_link,
            next_link,
            last_updated: (self.clock)(),
            entries,
        }
    }

    /// Maps a resource found by an include search to an include-mode entry.
    pub fn included_entry(&self, resource: &ResourceWrapper) -> BundleEntry {
        BundleEntry::with_resource(
            resource.content().clone(),
            Some(self.url_resolver.resolve_resource_url(resource, false)),
            Some(SearchEntryMode::Include),
        )
    }

    fn search_entry(&self, entry: &SearchResultEntry) -> BundleEntry {
        BundleEntry::with_resource(
            entry.resource.content().clone(),
            Some(
                self.url_resolver
                    .resolve_resource_url(&entry.resource, false),
            ),
            Some(entry.mode),
        )
    }

    fn history_entry(&self, entry: &SearchResultEntry) -> BundleEntry {
        let resource = &entry.resource;

        let request = match resource.request_method().map(HttpVerb::from_str) {
            Some(Ok(method)) => {
                let url = match method {
                    HttpVerb::Post => resource.resource_type().to_string(),
                    _ => resource.reference(),
                };
                Some(BundleEntryRequest { method, url })
            }
            Some(Err(err)) => {
                warn!(
                    resource_type = resource.resource_type(),
                    id = resource.id(),
                    error = %err,
                    "Unrecognised request method in history entry"
                );
                None
            }
            None => None,
        };

        BundleEntry {
            full_url: Some(self.url_resolver.resolve_resource_url(resource, true)),
            resource: Some(resource.content().clone()),
            search_mode: None,
            request,
            response: Some(BundleEntryResponse {
                etag: resource.etag(),
                last_modified: resource.last_modified(),
            }),
        }
    }
}

fn unsupported_issues<'a>(
    params: &'a [UnsupportedParameter],
    what: &'a str,
) -> impl Iterator<Item = Issue> + 'a {
    params.iter().map(move |p| {
        Issue::warning(
            IssueType::NotSupported,
            format!("The {what} \"{}\" was ignored: {}", p.name, p.reason),
        )
        .with_expression(p.name.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::url::QueryUrlResolver;
    use serde_json::json;

    fn factory() -> BundleFactory {
        let config = SearchConfig::default();
        BundleFactory::new(Arc::new(QueryUrlResolver::from_config(&config)), &config)
    }

    fn patient(id: &str) -> ResourceWrapper {
        ResourceWrapper::new("Patient", id, json!({"resourceType": "Patient", "id": id}))
    }

    #[test]
    fn test_search_bundle_basics() {
        let ctx = RequestContext::new("corr-1");
        let route = SearchRoute::new("Patient", vec![("name".into(), "smith".into())]);
        let result = SearchResult::new(vec![SearchResultEntry::matched(patient("1"))]).with_total(1);

        let bundle = factory().create_search_bundle(&ctx, &route, result, Vec::new());

        assert_eq!(bundle.id(), "corr-1");
        assert_eq!(bundle.bundle_type(), BundleType::Searchset);
        assert_eq!(bundle.total(), Some(1));
        assert_eq!(bundle.self_link(), "http://localhost:8080/Patient?name=smith");
        assert!(bundle.next_link().is_none());
        assert_eq!(bundle.entries().len(), 1);
        assert_eq!(
            bundle.entries()[0].full_url.as_deref(),
            Some("http://localhost:8080/Patient/1")
        );
        assert!(bundle.entries()[0].is_match());
    }

    #[test]
    fn test_diagnostics_are_prepended_once() {
        let ctx = RequestContext::new("corr-2");
        let route = SearchRoute::new("Patient", Vec::new());
        let result = SearchResult::new(vec![SearchResultEntry::matched(patient("1"))])
            .with_unsupported_search_param(UnsupportedParameter::new("foo", "unknown"));

        let bundle = factory().create_search_bundle(
            &ctx,
            &route,
            result,
            vec![Issue::information(IssueType::Informational, "note")],
        );

        assert_eq!(bundle.entries().len(), 2);
        let outcome = bundle.entries()[0].resource.as_ref().unwrap();
        assert_eq!(bundle.entries()[0].search_mode, Some(SearchEntryMode::Outcome));
        assert_eq!(outcome["issue"].as_array().unwrap().len(), 2);
        assert_eq!(outcome["issue"][1]["code"], "not-supported");
        assert_eq!(outcome["issue"][1]["expression"][0], "foo");
    }

    #[test]
    fn test_history_entry_request_metadata() {
        let ctx = RequestContext::new("corr-3");
        let route = SearchRoute::new("Patient", Vec::new());
        let created = patient("1").with_request_method("post");
        let updated = ResourceWrapper::from_storage(
            "Patient",
            "1",
            "2",
            Utc::now(),
            json!({"resourceType": "Patient", "id": "1"}),
        )
        .with_request_method("PUT");
        let unknown = patient("2").with_request_method("TELEPORT");
        let result = SearchResult::new(vec![
            SearchResultEntry::matched(created),
            SearchResultEntry::matched(updated),
            SearchResultEntry::matched(unknown),
        ]);

        let bundle = factory().create_history_bundle(&ctx, &route, result, Vec::new());
        let entries = bundle.entries();

        assert_eq!(bundle.bundle_type(), BundleType::History);
        let post = entries[0].request.as_ref().unwrap();
        assert_eq!(post.method, HttpVerb::Post);
        assert_eq!(post.url, "Patient");

        let put = entries[1].request.as_ref().unwrap();
        assert_eq!(put.url, "Patient/1");
        assert_eq!(
            entries[1].full_url.as_deref(),
            Some("http://localhost:8080/Patient/1/_history/2")
        );
        assert_eq!(entries[1].response.as_ref().unwrap().etag, "W/\"2\"");

        assert!(entries[2].request.is_none());
        assert!(entries[2].response.is_some());
    }
}
