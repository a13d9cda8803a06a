//! URI parameter query generator.

use crate::error::{GenerationResult, QueryGenerationError};
use crate::expressions::{BinaryExpression, FieldName, StringExpression};
use crate::sql::context::QueryContext;
use crate::sql::schema::{Column, Table, UriSearchParamTable};

use super::string::visit_text_match;
use super::{SearchParameterQueryGenerator, unsupported_field, visit_simple_binary};

/// Generator for `UriSearchParam`. `:below` and `:above` arrive as prefix
/// and suffix string matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct UriQueryGenerator;

impl SearchParameterQueryGenerator for UriQueryGenerator {
    fn name(&self) -> &'static str {
        "uri"
    }

    fn table(&self) -> Table {
        UriSearchParamTable::TABLE
    }

    fn column(&self, field: FieldName) -> GenerationResult<Column> {
        match field {
            FieldName::Uri => Ok(UriSearchParamTable::URI),
            other => Err(unsupported_field(self.name(), other)),
        }
    }

    fn visit_binary<'a>(
        &self,
        expr: &BinaryExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        let column = self.column(expr.field)?;
        if !expr.operator.is_equality() {
            return Err(QueryGenerationError::UnsupportedOperator {
                generator: self.name(),
                operator: expr.operator.as_sql(),
            });
        }
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
        let column = self.column(expr.field)?;
        Ok(visit_text_match(ctx, &column, expr))
    }
}
