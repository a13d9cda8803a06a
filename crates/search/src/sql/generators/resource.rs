//! Query generator for columns of the `Resource` table itself.

use crate::error::GenerationResult;
use crate::expressions::{BinaryExpression, FieldName, StringExpression};
use crate::sql::context::QueryContext;
use crate::sql::schema::{Column, ResourceTable, Table};

use super::string::{require_equals, visit_text_match};
use super::{SearchParameterQueryGenerator, unsupported_field, visit_simple_binary};

/// Generator for the columns of the `Resource` table itself (`_id`,
/// `_lastUpdated`). Used with the alias of the resource being filtered.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceTableQueryGenerator;

impl SearchParameterQueryGenerator for ResourceTableQueryGenerator {
    fn name(&self) -> &'static str {
        "resource"
    }

    fn table(&self) -> Table {
        ResourceTable::TABLE
    }

    fn column(&self, field: FieldName) -> GenerationResult<Column> {
        match field {
            FieldName::ResourceId => Ok(ResourceTable::RESOURCE_ID),
            FieldName::LastUpdated => Ok(ResourceTable::LAST_UPDATED),
            other => Err(unsupported_field(self.name(), other)),
        }
    }

    fn visit_binary<'a>(
        &self,
        expr: &BinaryExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        let column = self.column(expr.field)?;
        Ok(visit_simple_binary(
            ctx,
            &column,
            expr.component_index,
            expr.operator,
            &expr.value,
        ))
    }

    fn visit_string<'a>(
        &self,
        expr: &StringExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        if expr.field != FieldName::ResourceId {
            return Err(unsupported_field(self.name(), expr.field));
        }
        require_equals(self.name(), expr.operator)?;
        Ok(visit_text_match(ctx, &ResourceTable::RESOURCE_ID, expr))
    }
}
