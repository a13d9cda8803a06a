//! Search parameter type tags.
//!
//! [`SearchParamType`] is the FHIR parameter type as declared in a
//! SearchParameter definition. [`ParameterKind`] is the physical storage kind
//! used to select a query generator: it separates the resource-table
//! parameters (`_id`, `_lastUpdated`) and distinguishes composite layouts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// FHIR search parameter types.
///
/// See: https://build.fhir.org/search.html#ptypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamType {
    /// A simple string, like a name or description.
    String,
    /// A search against a URI.
    Uri,
    /// A search for a number.
    Number,
    /// A search for a date, dateTime, or period.
    Date,
    /// A quantity, with a number and units.
    Quantity,
    /// A code from a code system or value set.
    Token,
    /// A reference to another resource.
    Reference,
    /// A composite search parameter that combines others.
    Composite,
    /// Special search parameters (_id, _lastUpdated, etc.).
    Special,
}

impl fmt::Display for SearchParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchParamType::String => write!(f, "string"),
            SearchParamType::Uri => write!(f, "uri"),
            SearchParamType::Number => write!(f, "number"),
            SearchParamType::Date => write!(f, "date"),
            SearchParamType::Quantity => write!(f, "quantity"),
            SearchParamType::Token => write!(f, "token"),
            SearchParamType::Reference => write!(f, "reference"),
            SearchParamType::Composite => write!(f, "composite"),
            SearchParamType::Special => write!(f, "special"),
        }
    }
}

impl FromStr for SearchParamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" => Ok(SearchParamType::String),
            "uri" => Ok(SearchParamType::Uri),
            "number" => Ok(SearchParamType::Number),
            "date" => Ok(SearchParamType::Date),
            "quantity" => Ok(SearchParamType::Quantity),
            "token" => Ok(SearchParamType::Token),
            "reference" => Ok(SearchParamType::Reference),
            "composite" => Ok(SearchParamType::Composite),
            "special" => Ok(SearchParamType::Special),
            _ => Err(format!("unknown search parameter type: {}", s)),
        }
    }
}

/// Physical layout of a composite search parameter.
///
/// Each component's columns carry a 1-based suffix in the composite table,
/// e.g. `SystemId1`, `Code1`, `QuantityCodeId2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositeKind {
    /// token$token (e.g. Observation.code-value-concept)
    TokenToken,
    /// token$quantity (e.g. Observation.code-value-quantity)
    TokenQuantity,
    /// token$date (e.g. Observation.code-value-date)
    TokenDate,
    /// token$string (e.g. Observation.code-value-string)
    TokenString,
    /// token$number$number (e.g. RiskAssessment.probability ranges)
    TokenNumberNumber,
    /// reference$token (e.g. Group.characteristic-reference)
    ReferenceToken,
}

impl CompositeKind {
    /// Returns the storage kind of every component, in component order.
    pub fn components(&self) -> &'static [ParameterKind] {
        match self {
            CompositeKind::TokenToken => &[ParameterKind::Token, ParameterKind::Token],
            CompositeKind::TokenQuantity => &[ParameterKind::Token, ParameterKind::Quantity],
            CompositeKind::TokenDate => &[ParameterKind::Token, ParameterKind::Date],
            CompositeKind::TokenString => &[ParameterKind::Token, ParameterKind::String],
            CompositeKind::TokenNumberNumber => &[
                ParameterKind::Token,
                ParameterKind::Number,
                ParameterKind::Number,
            ],
            CompositeKind::ReferenceToken => &[ParameterKind::Reference, ParameterKind::Token],
        }
    }
}

impl fmt::Display for CompositeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeKind::TokenToken => write!(f, "token-token"),
            CompositeKind::TokenQuantity => write!(f, "token-quantity"),
            CompositeKind::TokenDate => write!(f, "token-date"),
            CompositeKind::TokenString => write!(f, "token-string"),
            CompositeKind::TokenNumberNumber => write!(f, "token-number-number"),
            CompositeKind::ReferenceToken => write!(f, "reference-token"),
        }
    }
}

/// Storage kind of a search parameter; selects its query generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterKind {
    /// `StringSearchParam`
    String,
    /// `TokenSearchParam`
    Token,
    /// `QuantitySearchParam`
    Quantity,
    /// `NumberSearchParam`
    Number,
    /// `DateTimeSearchParam`
    Date,
    /// `ReferenceSearchParam`
    Reference,
    /// `UriSearchParam`
    Uri,
    /// One of the composite tables.
    Composite(CompositeKind),
    /// Columns of the `Resource` table itself (`_id`, `_lastUpdated`).
    Resource,
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKind::String => write!(f, "string"),
            ParameterKind::Token => write!(f, "token"),
            ParameterKind::Quantity => write!(f, "quantity"),
            ParameterKind::Number => write!(f, "number"),
            ParameterKind::Date => write!(f, "date"),
            ParameterKind::Reference => write!(f, "reference"),
            ParameterKind::Uri => write!(f, "uri"),
            ParameterKind::Composite(kind) => write!(f, "composite {}", kind),
            ParameterKind::Resource => write!(f, "resource"),
        }
    }
}
