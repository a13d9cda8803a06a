//! Field roles, operators and literal values used by expression nodes.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Logical column role addressed by an expression.
///
/// A field is not a physical column: the query generator of the enclosing
/// search parameter maps it to one (and, for composite parameters, applies the
/// component suffix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldName {
    /// Quantity value (point value).
    Quantity,
    /// Lower bound of a quantity range.
    QuantityLow,
    /// Upper bound of a quantity range.
    QuantityHigh,
    /// Quantity unit code.
    QuantityCode,
    /// Quantity unit system.
    QuantitySystem,
    /// Token code.
    TokenCode,
    /// Token system.
    TokenSystem,
    /// String value.
    String,
    /// Number value (point value).
    Number,
    /// Lower bound of a number range.
    NumberLow,
    /// Upper bound of a number range.
    NumberHigh,
    /// Start of a date/time period.
    DateTimeStart,
    /// End of a date/time period.
    DateTimeEnd,
    /// URI value.
    Uri,
    /// Base URI of an absolute reference.
    ReferenceBaseUri,
    /// Resource type of the referenced resource.
    ReferenceResourceType,
    /// Logical id of the referenced resource.
    ReferenceResourceId,
    /// Logical id of the resource itself (`_id`).
    ResourceId,
    /// Last update time of the resource itself (`_lastUpdated`).
    LastUpdated,
}

impl FieldName {
    /// Returns the kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Quantity => "quantity",
            FieldName::QuantityLow => "quantity-low",
            FieldName::QuantityHigh => "quantity-high",
            FieldName::QuantityCode => "quantity-code",
            FieldName::QuantitySystem => "quantity-system",
            FieldName::TokenCode => "token-code",
            FieldName::TokenSystem => "token-system",
            FieldName::String => "string",
            FieldName::Number => "number",
            FieldName::NumberLow => "number-low",
            FieldName::NumberHigh => "number-high",
            FieldName::DateTimeStart => "date-time-start",
            FieldName::DateTimeEnd => "date-time-end",
            FieldName::Uri => "uri",
            FieldName::ReferenceBaseUri => "reference-base-uri",
            FieldName::ReferenceResourceType => "reference-resource-type",
            FieldName::ReferenceResourceId => "reference-resource-id",
            FieldName::ResourceId => "resource-id",
            FieldName::LastUpdated => "last-updated",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operator of a binary expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    /// `=`
    Equal,
    /// `<>`
    NotEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
}

impl BinaryOperator {
    /// Returns the SQL operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
        }
    }

    /// Returns true for `=` and `<>`.
    pub fn is_equality(&self) -> bool {
        matches!(self, BinaryOperator::Equal | BinaryOperator::NotEqual)
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Operator of a string match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StringOperator {
    /// Whole-value match.
    Equals,
    /// Prefix match.
    StartsWith,
    /// Suffix match.
    EndsWith,
    /// Substring match.
    Contains,
}

impl StringOperator {
    /// Returns the operator name used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            StringOperator::Equals => "equals",
            StringOperator::StartsWith => "starts-with",
            StringOperator::EndsWith => "ends-with",
            StringOperator::Contains => "contains",
        }
    }
}

/// A literal value from the request. Always bound, never inlined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiteralValue {
    /// Exact decimal.
    Decimal(Decimal),
    /// Integer.
    Integer(i64),
    /// Instant in UTC.
    DateTime(DateTime<Utc>),
    /// Text.
    Text(String),
}

impl LiteralValue {
    /// Returns the text, if this is a text literal.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            LiteralValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Decimal> for LiteralValue {
    fn from(value: Decimal) -> Self {
        LiteralValue::Decimal(value)
    }
}

impl From<i64> for LiteralValue {
    fn from(value: i64) -> Self {
        LiteralValue::Integer(value)
    }
}

impl From<DateTime<Utc>> for LiteralValue {
    fn from(value: DateTime<Utc>) -> Self {
        LiteralValue::DateTime(value)
    }
}

impl From<&str> for LiteralValue {
    fn from(value: &str) -> Self {
        LiteralValue::Text(value.to_string())
    }
}

impl From<String> for LiteralValue {
    fn from(value: String) -> Self {
        LiteralValue::Text(value)
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Decimal(d) => write!(f, "{}", d),
            LiteralValue::Integer(i) => write!(f, "{}", i),
            LiteralValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            LiteralValue::Text(s) => f.write_str(s),
        }
    }
}
