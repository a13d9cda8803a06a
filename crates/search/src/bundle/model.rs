//! Response envelope model.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::types::{HttpVerb, SearchEntryMode};

/// Bundle types produced by the search subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleType {
    /// Search results bundle.
    Searchset,
    /// History results bundle.
    History,
    /// Collection bundle.
    Collection,
}

impl BundleType {
    /// Returns the FHIR code string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleType::Searchset => "searchset",
            BundleType::History => "history",
            BundleType::Collection => "collection",
        }
    }
}

/// A link in a Bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLink {
    /// The relation type (self, next).
    pub relation: String,
    /// The URL.
    pub url: String,
}

impl BundleLink {
    /// Creates a new link.
    pub fn new(relation: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            url: url.into(),
        }
    }

    /// Converts to FHIR JSON.
    pub fn to_json(&self) -> Value {
        json!({
            "relation": self.relation,
            "url": self.url
        })
    }
}

/// Request information of a history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntryRequest {
    /// HTTP method of the recorded interaction.
    pub method: HttpVerb,
    /// Relative URL of the interaction.
    pub url: String,
}

/// Response information of a history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntryResponse {
    /// Weak ETag of the version.
    pub etag: String,
    /// When the version was written.
    pub last_modified: DateTime<Utc>,
}

/// An entry in a Bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleEntry {
    /// Full URL of the resource.
    pub full_url: Option<String>,
    /// The resource itself.
    pub resource: Option<Value>,
    /// Search mode (for searchset bundles).
    pub search_mode: Option<SearchEntryMode>,
    /// Request information (for history bundles).
    pub request: Option<BundleEntryRequest>,
    /// Response information (for history bundles).
    pub response: Option<BundleEntryResponse>,
}

impl BundleEntry {
    /// Creates an entry with a resource and search mode.
    pub fn with_resource(
        resource: Value,
        full_url: Option<String>,
        search_mode: Option<SearchEntryMode>,
    ) -> Self {
        Self {
            full_url,
            resource: Some(resource),
            search_mode,
            request: None,
            response: None,
        }
    }

    /// Creates an outcome-mode entry.
    pub fn outcome(operation_outcome: Value) -> Self {
        Self::with_resource(operation_outcome, None, Some(SearchEntryMode::Outcome))
    }

    /// Returns true for match-mode entries.
    pub fn is_match(&self) -> bool {
        self.search_mode == Some(SearchEntryMode::Match)
    }

    /// Returns the resource type and id of the entry's resource.
    pub fn resource_key(&self) -> Option<(&str, &str)> {
        let resource = self.resource.as_ref()?;
        Some((
            resource.get("resourceType")?.as_str()?,
            resource.get("id")?.as_str()?,
        ))
    }

    /// Converts to FHIR JSON.
    pub fn to_json(&self) -> Value {
        let mut entry = json!({});

        if let Some(url) = &self.full_url {
            entry["fullUrl"] = json!(url);
        }

        if let Some(resource) = &self.resource {
            entry["resource"] = resource.clone();
        }

        if let Some(mode) = &self.search_mode {
            entry["search"] = json!({ "mode": mode });
        }

        if let Some(request) = &self.request {
            entry["request"] = json!({
                "method": request.method.to_string(),
                "url": request.url
            });
        }

        if let Some(response) = &self.response {
            entry["response"] = json!({
                "etag": response.etag,
                "lastModified": format_instant(response.last_modified)
            });
        }

        entry
    }
}

/// A response envelope.
///
/// Built once by the [`BundleFactory`](super::BundleFactory) and read-only
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub(crate) id: String,
    pub(crate) bundle_type: BundleType,
    pub(crate) total: Option<u64>,
    pub(crate) self_link: String,
    pub(crate) next_link: Option<String>,
    pub(crate) last_updated: DateTime<Utc>,
    pub(crate) entries: Vec<BundleEntry>,
}

impl Bundle {
    /// Returns the bundle id (the request's correlation id).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the bundle type.
    pub fn bundle_type(&self) -> BundleType {
        self.bundle_type
    }

    /// Returns the total number of matches, when known.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Returns the self link.
    pub fn self_link(&self) -> &str {
        &self.self_link
    }

    /// Returns the next-page link, present only when more results exist.
    pub fn next_link(&self) -> Option<&str> {
        self.next_link.as_deref()
    }

    /// Returns when the bundle was assembled.
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Returns the entries in order.
    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    /// Returns the entries with the given search mode.
    pub fn entries_with_mode(
        &self,
        mode: SearchEntryMode,
    ) -> impl Iterator<Item = &BundleEntry> + '_ {
        self.entries
            .iter()
            .filter(move |e| e.search_mode == Some(mode))
    }

    /// Converts to FHIR JSON.
    pub fn to_json(&self) -> Value {
        let mut links = vec![BundleLink::new("self", &self.self_link).to_json()];
        if let Some(next) = &self.next_link {
            links.push(BundleLink::new("next", next).to_json());
        }

        let mut bundle = json!({
            "resourceType": "Bundle",
            "id": self.id,
            "meta": { "lastUpdated": format_instant(self.last_updated) },
            "type": self.bundle_type.as_str(),
            "link": links
        });

        if let Some(total) = self.total {
            bundle["total"] = json!(total);
        }

        if !self.entries.is_empty() {
            bundle["entry"] = json!(
                self.entries
                    .iter()
                    .map(BundleEntry::to_json)
                    .collect::<Vec<_>>()
            );
        }

        bundle
    }
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}
