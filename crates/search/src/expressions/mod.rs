//! Search expression model.
//!
//! An [`Expression`] is an immutable tree of typed predicates built upstream
//! from the validated search parameters of a request. Field-level nodes
//! ([`Expression::Binary`], [`Expression::StringMatch`],
//! [`Expression::MissingField`], [`Expression::In`]) only make sense below an
//! [`Expression::SearchParameter`] node, which binds them to one parameter and
//! therefore to one query generator. The resource-level fields `_id` and
//! `_lastUpdated` are the exception: they may appear anywhere.
//!
//! # Example
//!
//! ```
//! use helios_search::expressions::{
//!     BinaryOperator, Expression, FieldName, ParameterRef, StringOperator,
//! };
//! use helios_search::types::ParameterKind;
//! use rust_decimal::Decimal;
//!
//! // Observation?value-quantity=lt5.4|http://unitsofmeasure.org|mg
//! let value_quantity = ParameterRef::new(
//!     "value-quantity",
//!     "http://hl7.org/fhir/SearchParameter/Observation-value-quantity",
//!     ParameterKind::Quantity,
//! );
//! let expr = Expression::search_parameter(
//!     value_quantity,
//!     Expression::and(vec![
//!         Expression::binary(FieldName::QuantityHigh, BinaryOperator::LessThan, Decimal::new(54, 1)),
//!         Expression::string_match(FieldName::QuantityCode, StringOperator::Equals, "mg", false),
//!     ]),
//! );
//! assert!(matches!(expr, Expression::SearchParameter(_)));
//! ```

mod field;

pub use field::{BinaryOperator, FieldName, LiteralValue, StringOperator};

use serde::{Deserialize, Serialize};

use crate::types::ParameterKind;

/// Identifies the search parameter a subtree is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterRef {
    /// Parameter code as used in the request.
    pub name: String,
    /// Canonical URL; normalized through the `SearchParam` namespace.
    pub url: String,
    /// Storage kind; selects the query generator.
    pub kind: ParameterKind,
}

impl ParameterRef {
    /// Creates a new parameter reference.
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
        }
    }
}

/// Comparison of a field against a literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryExpression {
    /// Field role.
    pub field: FieldName,
    /// Comparison operator.
    pub operator: BinaryOperator,
    /// Literal to compare against.
    pub value: LiteralValue,
    /// Zero-based component of a composite parameter.
    pub component_index: Option<u32>,
}

/// Text match of a field against a literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringExpression {
    /// Field role.
    pub field: FieldName,
    /// Match operator.
    pub operator: StringOperator,
    /// Text to match.
    pub value: String,
    /// Whether the match ignores case.
    pub ignore_case: bool,
    /// Zero-based component of a composite parameter.
    pub component_index: Option<u32>,
}

/// Tests that a field holds no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingFieldExpression {
    /// Field role.
    pub field: FieldName,
    /// Zero-based component of a composite parameter.
    pub component_index: Option<u32>,
}

/// Tests a field against a list of literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InExpression {
    /// Field role.
    pub field: FieldName,
    /// Accepted values.
    pub values: Vec<LiteralValue>,
    /// Zero-based component of a composite parameter.
    pub component_index: Option<u32>,
}

/// Tests whether a resource has (or lacks) any value for a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingParameterExpression {
    /// The parameter.
    pub parameter: ParameterRef,
    /// `true` for `:missing=true`.
    pub is_missing: bool,
}

/// Follows a reference parameter and evaluates a predicate on the other end.
///
/// Forward chains (`subject:Patient.name=x`) evaluate `expression` on the
/// referenced `target_type` resource. Reverse chains
/// (`_has:Observation:subject:code=x`) evaluate it on the referencing
/// `source_type` resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainedExpression {
    /// Reference parameter, defined on `source_type`.
    pub reference: ParameterRef,
    /// Type holding the reference.
    pub source_type: String,
    /// Type being referenced.
    pub target_type: String,
    /// `true` for `_has` chains.
    pub reversed: bool,
    /// Predicate on the far resource.
    pub expression: Box<Expression>,
}

/// Binds a subtree to one search parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParameterExpression {
    /// The parameter.
    pub parameter: ParameterRef,
    /// Field-level predicate on the parameter's rows.
    pub expression: Box<Expression>,
}

/// Node of a search expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression {
    /// Field comparison.
    Binary(BinaryExpression),
    /// Field text match.
    StringMatch(StringExpression),
    /// Field has no value.
    MissingField(MissingFieldExpression),
    /// Field is one of several values.
    In(InExpression),
    /// Resource has no value for a parameter.
    MissingParameter(MissingParameterExpression),
    /// Chained or reverse chained reference.
    Chained(ChainedExpression),
    /// Parameter scope.
    SearchParameter(SearchParameterExpression),
    /// Component predicates of a composite parameter that must hold on the
    /// same index row.
    CompositeGroup(Vec<Expression>),
    /// All operands hold.
    And(Vec<Expression>),
    /// Any operand holds.
    Or(Vec<Expression>),
    /// Operand does not hold.
    Not(Box<Expression>),
}

impl Expression {
    /// Creates a binary comparison.
    pub fn binary(field: FieldName, operator: BinaryOperator, value: impl Into<LiteralValue>) -> Self {
        Expression::Binary(BinaryExpression {
            field,
            operator,
            value: value.into(),
            component_index: None,
        })
    }

    /// Creates a binary comparison on one component of a composite parameter.
    pub fn component_binary(
        component_index: u32,
        field: FieldName,
        operator: BinaryOperator,
        value: impl Into<LiteralValue>,
    ) -> Self {
        Expression::Binary(BinaryExpression {
            field,
            operator,
            value: value.into(),
            component_index: Some(component_index),
        })
    }

    /// Creates a string match.
    pub fn string_match(
        field: FieldName,
        operator: StringOperator,
        value: impl Into<String>,
        ignore_case: bool,
    ) -> Self {
        Expression::StringMatch(StringExpression {
            field,
            operator,
            value: value.into(),
            ignore_case,
            component_index: None,
        })
    }

    /// Creates a string match on one component of a composite parameter.
    pub fn component_string_match(
        component_index: u32,
        field: FieldName,
        operator: StringOperator,
        value: impl Into<String>,
        ignore_case: bool,
    ) -> Self {
        Expression::StringMatch(StringExpression {
            field,
            operator,
            value: value.into(),
            ignore_case,
            component_index: Some(component_index),
        })
    }

    /// Creates a missing-field check.
    pub fn missing_field(field: FieldName) -> Self {
        Expression::MissingField(MissingFieldExpression {
            field,
            component_index: None,
        })
    }

    /// Creates a value-list match.
    pub fn in_list<V: Into<LiteralValue>>(field: FieldName, values: impl IntoIterator<Item = V>) -> Self {
        Expression::In(InExpression {
            field,
            values: values.into_iter().map(Into::into).collect(),
            component_index: None,
        })
    }

    /// Creates a `:missing` check.
    pub fn missing_parameter(parameter: ParameterRef, is_missing: bool) -> Self {
        Expression::MissingParameter(MissingParameterExpression {
            parameter,
            is_missing,
        })
    }

    /// Creates a forward chain.
    pub fn chained(
        reference: ParameterRef,
        source_type: impl Into<String>,
        target_type: impl Into<String>,
        expression: Expression,
    ) -> Self {
        Expression::Chained(ChainedExpression {
            reference,
            source_type: source_type.into(),
            target_type: target_type.into(),
            reversed: false,
            expression: Box::new(expression),
        })
    }

    /// Creates a reverse chain (`_has`).
    pub fn reverse_chained(
        reference: ParameterRef,
        source_type: impl Into<String>,
        target_type: impl Into<String>,
        expression: Expression,
    ) -> Self {
        Expression::Chained(ChainedExpression {
            reference,
            source_type: source_type.into(),
            target_type: target_type.into(),
            reversed: true,
            expression: Box::new(expression),
        })
    }

    /// Scopes a subtree to a parameter.
    pub fn search_parameter(parameter: ParameterRef, expression: Expression) -> Self {
        Expression::SearchParameter(SearchParameterExpression {
            parameter,
            expression: Box::new(expression),
        })
    }

    /// Creates a composite group.
    pub fn composite_group(components: Vec<Expression>) -> Self {
        Expression::CompositeGroup(components)
    }

    /// Creates a conjunction.
    pub fn and(operands: Vec<Expression>) -> Self {
        Expression::And(operands)
    }

    /// Creates a disjunction.
    pub fn or(operands: Vec<Expression>) -> Self {
        Expression::Or(operands)
    }

    /// Creates a negation.
    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Expression) -> Self {
        Expression::Not(Box::new(operand))
    }

    /// Returns the variant name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expression::Binary(_) => "binary",
            Expression::StringMatch(_) => "string",
            Expression::MissingField(_) => "missing-field",
            Expression::In(_) => "in",
            Expression::MissingParameter(_) => "missing-parameter",
            Expression::Chained(_) => "chained",
            Expression::SearchParameter(_) => "search-parameter",
            Expression::CompositeGroup(_) => "composite-group",
            Expression::And(_) => "and",
            Expression::Or(_) => "or",
            Expression::Not(_) => "not",
        }
    }
}
