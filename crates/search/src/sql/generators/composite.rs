//! Composite parameter query generator.
//!
//! Components are rendered by the generator of their own kind, against the
//! composite table's suffixed columns.

use crate::catalog::KeyNamespace;
use crate::error::{GenerationResult, QueryGenerationError};
use crate::expressions::{
    BinaryExpression, FieldName, InExpression, MissingFieldExpression, StringExpression,
};
use crate::sql::context::QueryContext;
use crate::sql::schema::{Column, Table, composite_table};
use crate::types::CompositeKind;

use super::{SearchParameterQueryGenerator, generator_for};

/// Generator for the composite tables.
///
/// A composite row stores every component side by side. Each field-level
/// expression names its component through `component_index`; the generator
/// hands the expression to the component kind's generator, which applies the
/// `component_index + 1` suffix to every column it touches.
#[derive(Debug, Clone, Copy)]
pub struct CompositeQueryGenerator {
    kind: CompositeKind,
    name: &'static str,
}

#[allow(missing_docs)]
impl CompositeQueryGenerator {
    pub const TOKEN_TOKEN: Self = Self::new(CompositeKind::TokenToken, "composite token-token");
    pub const TOKEN_QUANTITY: Self =
        Self::new(CompositeKind::TokenQuantity, "composite token-quantity");
    pub const TOKEN_DATE: Self = Self::new(CompositeKind::TokenDate, "composite token-date");
    pub const TOKEN_STRING: Self = Self::new(CompositeKind::TokenString, "composite token-string");
    pub const TOKEN_NUMBER_NUMBER: Self = Self::new(
        CompositeKind::TokenNumberNumber,
        "composite token-number-number",
    );
    pub const REFERENCE_TOKEN: Self =
        Self::new(CompositeKind::ReferenceToken, "composite reference-token");
}

impl CompositeQueryGenerator {
    const fn new(kind: CompositeKind, name: &'static str) -> Self {
        Self { kind, name }
    }

    /// Returns the composite layout.
    pub fn kind(&self) -> CompositeKind {
        self.kind
    }

    /// Resolves the generator of the addressed component.
    fn component(
        &self,
        component_index: Option<u32>,
    ) -> GenerationResult<&'static dyn SearchParameterQueryGenerator> {
        let index = component_index.ok_or(QueryGenerationError::MissingComponentIndex {
            generator: self.name,
        })?;
        let components = self.kind.components();
        components
            .get(index as usize)
            .map(|kind| generator_for(*kind))
            .ok_or(QueryGenerationError::InvalidComponentIndex {
                generator: self.name,
                index,
                count: components.len(),
            })
    }
}

impl SearchParameterQueryGenerator for CompositeQueryGenerator {
    fn name(&self) -> &'static str {
        self.name
    }

    fn table(&self) -> Table {
        composite_table(self.kind)
    }

    fn column(&self, _field: FieldName) -> GenerationResult<Column> {
        Err(QueryGenerationError::MissingComponentIndex {
            generator: self.name,
        })
    }

    fn namespace(&self, _field: FieldName) -> Option<KeyNamespace> {
        None
    }

    fn visit_binary<'a>(
        &self,
        expr: &BinaryExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        self.component(expr.component_index)?.visit_binary(expr, ctx)
    }

    fn visit_string<'a>(
        &self,
        expr: &StringExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        self.component(expr.component_index)?.visit_string(expr, ctx)
    }

    fn visit_missing_field<'a>(
        &self,
        expr: &MissingFieldExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        self.component(expr.component_index)?
            .visit_missing_field(expr, ctx)
    }

    fn visit_in<'a>(
        &self,
        expr: &InExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        self.component(expr.component_index)?.visit_in(expr, ctx)
    }
}
