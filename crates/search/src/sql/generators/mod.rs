//! Per-kind query generators.
//!
//! Each search parameter kind is stored in its own table with a fixed column
//! layout. A [`SearchParameterQueryGenerator`] knows that layout: it maps
//! expression fields to columns and renders field-level expression nodes
//! against them. The generator for a parameter is selected once, from the
//! parameter's [`ParameterKind`], via [`generator_for`].

mod composite;
mod date;
mod number;
mod quantity;
mod reference;
mod resource;
mod string;
mod token;
mod uri;

pub use composite::CompositeQueryGenerator;
pub use date::DateTimeQueryGenerator;
pub use number::NumberQueryGenerator;
pub use quantity::QuantityQueryGenerator;
pub use reference::ReferenceQueryGenerator;
pub use resource::ResourceTableQueryGenerator;
pub use string::StringQueryGenerator;
pub use token::TokenQueryGenerator;
pub use uri::UriQueryGenerator;

use crate::catalog::KeyNamespace;
use crate::error::{GenerationResult, QueryGenerationError};
use crate::expressions::{
    BinaryExpression, BinaryOperator, FieldName, InExpression, LiteralValue,
    MissingFieldExpression, StringExpression,
};
use crate::types::{CompositeKind, ParameterKind};

use super::context::QueryContext;
use super::schema::{Column, Table};

/// Renders field-level expressions against one search parameter table.
///
/// Implementations emit a predicate over the current table alias of the
/// context. Every literal goes through [`QueryContext::bind`].
pub trait SearchParameterQueryGenerator: Send + Sync {
    /// Name used in error messages.
    fn name(&self) -> &'static str;

    /// The table this generator targets.
    fn table(&self) -> Table;

    /// Maps a field to its column.
    fn column(&self, field: FieldName) -> GenerationResult<Column>;

    /// Returns the surrogate key namespace of a normalized field.
    fn namespace(&self, _field: FieldName) -> Option<KeyNamespace> {
        None
    }

    /// Renders a comparison.
    fn visit_binary<'a>(
        &self,
        expr: &BinaryExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>>;

    /// Renders a string match.
    fn visit_string<'a>(
        &self,
        _expr: &StringExpression,
        _ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        Err(QueryGenerationError::UnsupportedExpression {
            generator: self.name(),
            expression: "string",
        })
    }

    /// Renders `<column><suffix> IS NULL`.
    fn visit_missing_field<'a>(
        &self,
        expr: &MissingFieldExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        let column = self.column(expr.field)?;
        Ok(ctx
            .append_column(&column, expr.component_index)
            .append(" IS NULL"))
    }

    /// Renders a value list match.
    ///
    /// Plain columns become `IN (@p0, @p1, ..)`. Normalized columns become a
    /// disjunction of normalized equalities so each value can take the cache
    /// fast path independently.
    fn visit_in<'a>(
        &self,
        expr: &InExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        if expr.values.is_empty() {
            return Err(QueryGenerationError::EmptyValueList { field: expr.field });
        }
        let column = self.column(expr.field)?;

        match self.namespace(expr.field) {
            Some(namespace) => {
                let mut ctx = ctx.append("(");
                for (i, value) in expr.values.iter().enumerate() {
                    if i > 0 {
                        ctx = ctx.append(" OR ");
                    }
                    let text = expect_text(self.name(), expr.field, value)?;
                    ctx = ctx.normalized_equality(&column, expr.component_index, namespace, text);
                }
                Ok(ctx.append(")"))
            }
            None => {
                let mut ctx = ctx.append_column(&column, expr.component_index).append(" IN (");
                for (i, value) in expr.values.iter().enumerate() {
                    if i > 0 {
                        ctx = ctx.append(", ");
                    }
                    ctx = ctx.bind(value);
                }
                Ok(ctx.append(")"))
            }
        }
    }
}

/// Returns the generator for a parameter kind.
pub fn generator_for(kind: ParameterKind) -> &'static dyn SearchParameterQueryGenerator {
    match kind {
        ParameterKind::String => &StringQueryGenerator,
        ParameterKind::Token => &TokenQueryGenerator,
        ParameterKind::Quantity => &QuantityQueryGenerator,
        ParameterKind::Number => &NumberQueryGenerator,
        ParameterKind::Date => &DateTimeQueryGenerator,
        ParameterKind::Reference => &ReferenceQueryGenerator,
        ParameterKind::Uri => &UriQueryGenerator,
        ParameterKind::Composite(kind) => composite_generator(kind),
        ParameterKind::Resource => &ResourceTableQueryGenerator,
    }
}

fn composite_generator(kind: CompositeKind) -> &'static dyn SearchParameterQueryGenerator {
    match kind {
        CompositeKind::TokenToken => &CompositeQueryGenerator::TOKEN_TOKEN,
        CompositeKind::TokenQuantity => &CompositeQueryGenerator::TOKEN_QUANTITY,
        CompositeKind::TokenDate => &CompositeQueryGenerator::TOKEN_DATE,
        CompositeKind::TokenString => &CompositeQueryGenerator::TOKEN_STRING,
        CompositeKind::TokenNumberNumber => &CompositeQueryGenerator::TOKEN_NUMBER_NUMBER,
        CompositeKind::ReferenceToken => &CompositeQueryGenerator::REFERENCE_TOKEN,
    }
}

pub(crate) fn unsupported_field(generator: &'static str, field: FieldName) -> QueryGenerationError {
    QueryGenerationError::UnsupportedField { generator, field }
}

/// `<column><suffix> <op> @p`
pub(crate) fn visit_simple_binary<'a>(
    ctx: QueryContext<'a>,
    column: &Column,
    component_index: Option<u32>,
    operator: BinaryOperator,
    value: &LiteralValue,
) -> QueryContext<'a> {
    ctx.append_column(column, component_index)
        .append(" ")
        .append(operator.as_sql())
        .append(" ")
        .bind(value)
}

/// `<nullCheck><suffix> IS NOT NULL AND <column><suffix> <op> @p`
///
/// A range row is only valid when its low bound is populated, so the high
/// bound is null-checked through the low column.
pub(crate) fn visit_range_binary<'a>(
    ctx: QueryContext<'a>,
    column: &Column,
    null_check: &Column,
    component_index: Option<u32>,
    operator: BinaryOperator,
    value: &LiteralValue,
) -> QueryContext<'a> {
    let ctx = ctx
        .append_column(null_check, component_index)
        .append(" IS NOT NULL AND ");
    visit_simple_binary(ctx, column, component_index, operator, value)
}

/// Extracts the text of a literal bound to a normalized or textual column.
pub(crate) fn expect_text<'v>(
    generator: &'static str,
    field: FieldName,
    value: &'v LiteralValue,
) -> GenerationResult<&'v str> {
    value
        .as_text()
        .ok_or(QueryGenerationError::UnsupportedField { generator, field })
}

/// Escapes LIKE wildcards with `!`.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '!') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped
}

/// Escapes GLOB wildcards by wrapping each in a one-character class.
pub(crate) fn escape_glob(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '*' | '?' | '[') {
            escaped.push('[');
            escaped.push(c);
            escaped.push(']');
        } else {
            escaped.push(c);
        }
    }
    escaped
}
