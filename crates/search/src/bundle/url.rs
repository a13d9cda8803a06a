//! URL construction for bundle links and entry full URLs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use url::form_urlencoded;

use crate::config::SearchConfig;
use crate::types::{ResourceWrapper, UnsupportedParameter};

/// Query key carrying the encoded continuation token in next links.
pub const CONTINUATION_TOKEN_PARAMETER: &str = "ct";

/// The search a bundle answers: resource type plus the query as received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRoute {
    /// Resource type searched.
    pub resource_type: String,
    /// Query parameters in request order.
    pub queries: Vec<(String, String)>,
}

impl SearchRoute {
    /// Creates a route.
    pub fn new(resource_type: impl Into<String>, queries: Vec<(String, String)>) -> Self {
        Self {
            resource_type: resource_type.into(),
            queries,
        }
    }
}

/// Resolves the URLs embedded in bundles.
pub trait UrlResolver: Send + Sync {
    /// Returns the full URL of a resource, optionally pinned to its version.
    fn resolve_resource_url(&self, resource: &ResourceWrapper, include_version: bool) -> String;

    /// Returns the URL of a search, without the ignored search and sort
    /// parameters. `continuation_token` is already encoded and is appended
    /// verbatim when present.
    fn resolve_route_url(
        &self,
        route: &SearchRoute,
        unsupported_search_params: &[UnsupportedParameter],
        unsupported_sorting_params: &[UnsupportedParameter],
        continuation_token: Option<&str>,
    ) -> String;
}

/// Builds URLs as `{base}/{type}?{query}` under the configured base URL.
#[derive(Debug, Clone)]
pub struct QueryUrlResolver {
    base_url: String,
}

impl QueryUrlResolver {
    /// Creates a resolver rooted at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Creates a resolver from the search configuration.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.base_url())
    }
}

impl UrlResolver for QueryUrlResolver {
    fn resolve_resource_url(&self, resource: &ResourceWrapper, include_version: bool) -> String {
        let mut url = format!(
            "{}/{}/{}",
            self.base_url,
            resource.resource_type(),
            resource.id()
        );
        if include_version {
            url.push_str("/_history/");
            url.push_str(resource.version_id());
        }
        url
    }

    fn resolve_route_url(
        &self,
        route: &SearchRoute,
        unsupported_search_params: &[UnsupportedParameter],
        unsupported_sorting_params: &[UnsupportedParameter],
        continuation_token: Option<&str>,
    ) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        let mut empty = true;

        for (name, value) in &route.queries {
            if name == CONTINUATION_TOKEN_PARAMETER
                || unsupported_search_params.iter().any(|p| &p.name == name)
            {
                continue;
            }

            if name == "_sort" {
                let kept: Vec<&str> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|key| {
                        let key = key.trim_start_matches('-');
                        !key.is_empty() && !unsupported_sorting_params.iter().any(|p| p.name == key)
                    })
                    .collect();
                if kept.is_empty() {
                    continue;
                }
                query.append_pair(name, &kept.join(","));
            } else {
                query.append_pair(name, value);
            }
            empty = false;
        }

        if let Some(token) = continuation_token {
            query.append_pair(CONTINUATION_TOKEN_PARAMETER, token);
            empty = false;
        }

        let mut url = format!("{}/{}", self.base_url, route.resource_type);
        if !empty {
            url.push('?');
            url.push_str(&query.finish());
        }
        url
    }
}

/// Encodes a continuation token for embedding in a link.
pub fn encode_continuation_token(token: &str) -> String {
    STANDARD.encode(token.as_bytes())
}

/// Decodes a continuation token taken from a next link.
///
/// Returns `None` for anything that is not base64-encoded UTF-8.
pub fn decode_continuation_token(encoded: &str) -> Option<String> {
    STANDARD
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
