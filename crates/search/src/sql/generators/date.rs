//! Date parameter query generator.

use crate::error::GenerationResult;
use crate::expressions::{BinaryExpression, FieldName};
use crate::sql::context::QueryContext;
use crate::sql::schema::{Column, DateTimeSearchParamTable, Table};

use super::{SearchParameterQueryGenerator, unsupported_field, visit_simple_binary};

/// Generator for `DateTimeSearchParam`. Every value is stored as the period
/// `[StartDateTime, EndDateTime]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeQueryGenerator;

impl SearchParameterQueryGenerator for DateTimeQueryGenerator {
    fn name(&self) -> &'static str {
        "date"
    }

    fn table(&self) -> Table {
        DateTimeSearchParamTable::TABLE
    }

    fn column(&self, field: FieldName) -> GenerationResult<Column> {
        match field {
            FieldName::DateTimeStart => Ok(DateTimeSearchParamTable::START_DATE_TIME),
            FieldName::DateTimeEnd => Ok(DateTimeSearchParamTable::END_DATE_TIME),
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
}
