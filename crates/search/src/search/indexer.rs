//! Searchable value extraction.
//!
//! Include resolution needs the reference-valued index entries of every
//! matched resource. [`SearchIndexer`] is that collaborator; [`JsonPathIndexer`]
//! is the default implementation, evaluating the simple dotted element paths
//! (`Observation.subject | Observation.focus`) found in search parameter
//! definitions against the resource JSON.

use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::types::{ResourceWrapper, SearchParamType};

use super::registry::{
    SearchParameterDefinition, SearchParameterDefinitionManager, SearchParameterRegistry,
};

/// A value prepared for indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexValue {
    /// String value for string parameters.
    String(String),

    /// Token value (code with optional system).
    Token {
        /// Code system URI (e.g., "http://loinc.org").
        system: Option<String>,
        /// Code value.
        code: String,
    },

    /// Date/DateTime value as written in the resource.
    Date(String),

    /// Numeric value.
    Number(Decimal),

    /// Quantity value with optional unit.
    Quantity {
        /// Numeric value.
        value: Decimal,
        /// Unit system URI (e.g., "http://unitsofmeasure.org").
        system: Option<String>,
        /// Unit code (e.g., "mm[Hg]").
        code: Option<String>,
    },

    /// Reference to another resource.
    Reference {
        /// Reference string (e.g., "Patient/123").
        reference: String,
        /// Server base of an absolute reference.
        base_uri: Option<String>,
        /// Resource type if known.
        resource_type: Option<String>,
        /// Resource ID if extractable.
        resource_id: Option<String>,
    },

    /// URI value.
    Uri(String),
}

impl IndexValue {
    /// Creates a token index value.
    pub fn token(system: Option<String>, code: impl Into<String>) -> Self {
        IndexValue::Token {
            system,
            code: code.into(),
        }
    }

    /// Creates a reference index value, splitting out type and id.
    pub fn reference(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        let parts = parse_reference(&reference);
        IndexValue::Reference {
            reference,
            base_uri: parts.base_uri,
            resource_type: parts.resource_type,
            resource_id: parts.resource_id,
        }
    }

    /// Returns the referenced `(type, id)` pair when both are known.
    pub fn reference_target(&self) -> Option<(&str, &str)> {
        match self {
            IndexValue::Reference {
                resource_type: Some(resource_type),
                resource_id: Some(resource_id),
                ..
            } => Some((resource_type, resource_id)),
            _ => None,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ReferenceParts {
    base_uri: Option<String>,
    resource_type: Option<String>,
    resource_id: Option<String>,
}

/// Splits `[base/]Type/id[/_history/v]` into its parts.
///
/// Contained (`#id`), URN (`urn:uuid:..`) and malformed references keep only
/// the raw string.
fn parse_reference(reference: &str) -> ReferenceParts {
    if reference.starts_with('#') || reference.starts_with("urn:") {
        return ReferenceParts::default();
    }

    let unversioned = match reference.find("/_history/") {
        Some(pos) => &reference[..pos],
        None => reference,
    };

    let absolute = unversioned.starts_with("http://") || unversioned.starts_with("https://");
    let parts: Vec<&str> = unversioned.rsplitn(3, '/').collect();
    match (absolute, parts.as_slice()) {
        (true, [id, resource_type, base]) if is_type_name(resource_type) && !id.is_empty() => {
            ReferenceParts {
                base_uri: Some((*base).to_string()),
                resource_type: Some((*resource_type).to_string()),
                resource_id: Some((*id).to_string()),
            }
        }
        (false, [id, resource_type]) if is_type_name(resource_type) && !id.is_empty() => {
            ReferenceParts {
                base_uri: None,
                resource_type: Some((*resource_type).to_string()),
                resource_id: Some((*id).to_string()),
            }
        }
        _ => ReferenceParts::default(),
    }
}

fn is_type_name(segment: &str) -> bool {
    segment.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && segment.chars().all(|c| c.is_ascii_alphanumeric())
}

/// One searchable value of a resource, tagged with its parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchIndexEntry {
    /// The parameter the value was extracted for.
    pub parameter: Arc<SearchParameterDefinition>,
    /// The extracted value.
    pub value: IndexValue,
}

/// Extracts searchable values from a stored resource.
pub trait SearchIndexer: Send + Sync {
    /// Returns every searchable value of `resource`, in parameter order.
    fn extract(&self, resource: &ResourceWrapper) -> Vec<SearchIndexEntry>;
}

/// Indexer that evaluates dotted element paths against the resource JSON.
///
/// Supports `Type.element.child` paths joined with `|`. Function calls such as
/// `.where(..)` or `.as(..)` end the path; the values selected so far are used.
pub struct JsonPathIndexer {
    registry: Arc<RwLock<SearchParameterRegistry>>,
}

impl JsonPathIndexer {
    /// Creates a new indexer over the given registry.
    pub fn new(registry: Arc<RwLock<SearchParameterRegistry>>) -> Self {
        Self { registry }
    }

    /// Extracts the values of one parameter.
    pub fn extract_param(
        param: &SearchParameterDefinition,
        resource_type: &str,
        content: &Value,
    ) -> Vec<IndexValue> {
        let mut values = Vec::new();
        for path in param.expression.split('|').map(str::trim) {
            for node in select(content, resource_type, path) {
                convert(node, param.param_type, &mut values);
            }
        }
        values
    }
}

impl SearchIndexer for JsonPathIndexer {
    fn extract(&self, resource: &ResourceWrapper) -> Vec<SearchIndexEntry> {
        let params = self
            .registry
            .read()
            .get_search_parameters(resource.resource_type());

        let mut entries = Vec::new();
        for param in params {
            for value in Self::extract_param(&param, resource.resource_type(), resource.content())
            {
                entries.push(SearchIndexEntry {
                    parameter: Arc::clone(&param),
                    value,
                });
            }
        }

        trace!(
            resource_type = resource.resource_type(),
            id = resource.id(),
            count = entries.len(),
            "Extracted searchable values"
        );
        entries
    }
}

impl SearchParameterDefinitionManager for RwLock<SearchParameterRegistry> {
    fn get_search_parameter(
        &self,
        resource_type: &str,
        code: &str,
    ) -> Option<Arc<SearchParameterDefinition>> {
        self.read().get_search_parameter(resource_type, code)
    }

    fn get_search_parameters(&self, resource_type: &str) -> Vec<Arc<SearchParameterDefinition>> {
        self.read().get_search_parameters(resource_type)
    }
}

/// Selects the nodes a dotted path points at, flattening arrays.
fn select<'v>(content: &'v Value, resource_type: &str, path: &str) -> Vec<&'v Value> {
    let mut segments = path.split('.');
    match segments.next() {
        Some(root) if root == resource_type || root == "Resource" || root == "DomainResource" => {}
        _ => return Vec::new(),
    }

    let mut current = vec![content];
    for segment in segments {
        if segment.contains('(') {
            break;
        }
        current = current
            .into_iter()
            .filter_map(|node| node.get(segment))
            .flat_map(|child| match child {
                Value::Array(items) => items.iter().collect::<Vec<_>>(),
                other => vec![other],
            })
            .collect();
    }
    current
}

fn convert(node: &Value, param_type: SearchParamType, out: &mut Vec<IndexValue>) {
    match param_type {
        SearchParamType::String => match node {
            Value::String(s) => out.push(IndexValue::String(s.clone())),
            Value::Object(map) => {
                for key in ["text", "family", "given", "line", "city", "value"] {
                    match map.get(key) {
                        Some(Value::String(s)) => out.push(IndexValue::String(s.clone())),
                        Some(Value::Array(items)) => out.extend(
                            items
                                .iter()
                                .filter_map(Value::as_str)
                                .map(|s| IndexValue::String(s.to_string())),
                        ),
                        _ => {}
                    }
                }
            }
            _ => {}
        },
        SearchParamType::Token => convert_token(node, out),
        SearchParamType::Date => {
            if let Some(s) = node.as_str() {
                out.push(IndexValue::Date(s.to_string()));
            } else if let Some(start) = node.get("start").and_then(Value::as_str) {
                out.push(IndexValue::Date(start.to_string()));
            }
        }
        SearchParamType::Number => {
            if let Some(value) = decimal(node) {
                out.push(IndexValue::Number(value));
            }
        }
        SearchParamType::Quantity => {
            if let Some(value) = node.get("value").and_then(decimal) {
                out.push(IndexValue::Quantity {
                    value,
                    system: string_field(node, "system"),
                    code: string_field(node, "code").or_else(|| string_field(node, "unit")),
                });
            }
        }
        SearchParamType::Reference => {
            if let Some(reference) = node.get("reference").and_then(Value::as_str) {
                out.push(IndexValue::reference(reference));
            }
        }
        SearchParamType::Uri => {
            if let Some(s) = node.as_str() {
                out.push(IndexValue::Uri(s.to_string()));
            }
        }
        SearchParamType::Composite | SearchParamType::Special => {}
    }
}

fn convert_token(node: &Value, out: &mut Vec<IndexValue>) {
    match node {
        Value::String(code) => out.push(IndexValue::token(None, code.clone())),
        Value::Bool(b) => out.push(IndexValue::token(None, b.to_string())),
        Value::Object(map) => {
            if let Some(Value::Array(codings)) = map.get("coding") {
                for coding in codings {
                    convert_token(coding, out);
                }
            } else if let Some(code) = map.get("code").and_then(Value::as_str) {
                out.push(IndexValue::token(string_field(node, "system"), code));
            } else if let Some(value) = map.get("value").and_then(Value::as_str) {
                // Identifier
                out.push(IndexValue::token(string_field(node, "system"), value));
            }
        }
        _ => {}
    }
}

fn string_field(node: &Value, key: &str) -> Option<String> {
    node.get(key).and_then(Value::as_str).map(str::to_string)
}

fn decimal(node: &Value) -> Option<Decimal> {
    match node {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
