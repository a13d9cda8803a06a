//! Resource wrapper returned by the search execution boundary.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored resource together with the metadata result assembly needs.
///
/// The resource body is kept as opaque JSON; the search subsystem never looks
/// inside it except through the [`SearchIndexer`](crate::search::SearchIndexer).
///
/// # Examples
///
/// ```
/// use helios_search::types::ResourceWrapper;
/// use serde_json::json;
///
/// let resource = ResourceWrapper::new(
///     "Patient",
///     "123",
///     json!({"resourceType": "Patient", "id": "123"}),
/// );
///
/// assert_eq!(resource.resource_type(), "Patient");
/// assert_eq!(resource.version_id(), "1");
/// assert_eq!(resource.etag(), "W/\"1\"");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceWrapper {
    resource_type: String,
    id: String,
    version_id: String,
    last_modified: DateTime<Utc>,
    /// HTTP verb stored with the version, as recorded. Not validated.
    request_method: Option<String>,
    content: Value,
}

impl ResourceWrapper {
    /// Creates version 1 of a resource, last modified now.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>, content: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            version_id: "1".to_string(),
            last_modified: Utc::now(),
            request_method: None,
            content,
        }
    }

    /// Creates a wrapper from stored data.
    pub fn from_storage(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        version_id: impl Into<String>,
        last_modified: DateTime<Utc>,
        content: Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            version_id: version_id.into(),
            last_modified,
            request_method: None,
            content,
        }
    }

    /// Sets the HTTP verb recorded for this version.
    pub fn with_request_method(mut self, method: impl Into<String>) -> Self {
        self.request_method = Some(method.into());
        self
    }

    /// Returns the resource type.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the logical id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the version id.
    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    /// Returns the last modification time.
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Returns the recorded HTTP verb, unparsed.
    pub fn request_method(&self) -> Option<&str> {
        self.request_method.as_deref()
    }

    /// Returns the resource body.
    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Returns the weak ETag for this version.
    pub fn etag(&self) -> String {
        format!("W/\"{}\"", self.version_id)
    }

    /// Returns `Type/id`.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }
}

/// HTTP verb of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    /// GET
    Get,
    /// HEAD
    Head,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpVerb::Get => write!(f, "GET"),
            HttpVerb::Head => write!(f, "HEAD"),
            HttpVerb::Post => write!(f, "POST"),
            HttpVerb::Put => write!(f, "PUT"),
            HttpVerb::Patch => write!(f, "PATCH"),
            HttpVerb::Delete => write!(f, "DELETE"),
        }
    }
}

impl FromStr for HttpVerb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(HttpVerb::Get),
            "HEAD" => Ok(HttpVerb::Head),
            "POST" => Ok(HttpVerb::Post),
            "PUT" => Ok(HttpVerb::Put),
            "PATCH" => Ok(HttpVerb::Patch),
            "DELETE" => Ok(HttpVerb::Delete),
            _ => Err(format!("unknown HTTP verb: {}", s)),
        }
    }
}
