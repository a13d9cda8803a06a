//! Number parameter query generator.

use crate::error::GenerationResult;
use crate::expressions::{BinaryExpression, FieldName};
use crate::sql::context::QueryContext;
use crate::sql::schema::{Column, NumberSearchParamTable, Table};

use super::{SearchParameterQueryGenerator, unsupported_field, visit_range_binary};

/// Generator for `NumberSearchParam`. Same range layout as quantities,
/// without units.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberQueryGenerator;

impl SearchParameterQueryGenerator for NumberQueryGenerator {
    fn name(&self) -> &'static str {
        "number"
    }

    fn table(&self) -> Table {
        NumberSearchParamTable::TABLE
    }

    fn column(&self, field: FieldName) -> GenerationResult<Column> {
        match field {
            FieldName::Number => Ok(NumberSearchParamTable::SINGLE_VALUE),
            FieldName::NumberLow => Ok(NumberSearchParamTable::LOW_VALUE),
            FieldName::NumberHigh => Ok(NumberSearchParamTable::HIGH_VALUE),
            other => Err(unsupported_field(self.name(), other)),
        }
    }

    fn visit_binary<'a>(
        &self,
        expr: &BinaryExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        let column = self.column(expr.field)?;
        let null_check = match expr.field {
            FieldName::NumberHigh => NumberSearchParamTable::LOW_VALUE,
            _ => column,
        };

        Ok(visit_range_binary(
            ctx,
            &column,
            &null_check,
            expr.component_index,
            expr.operator,
            &expr.value,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSnapshot;
    use crate::expressions::{BinaryOperator, LiteralValue};

    #[test]
    fn test_low_bound() {
        let catalog = CatalogSnapshot::new();
        let expr = BinaryExpression {
            field: FieldName::NumberLow,
            operator: BinaryOperator::GreaterThanOrEqual,
            value: LiteralValue::Integer(3),
            component_index: Some(2),
        };
        let query = NumberQueryGenerator
            .visit_binary(&expr, QueryContext::new(&catalog))
            .unwrap()
            .finish();
        assert_eq!(query.sql, "LowValue3 IS NOT NULL AND LowValue3 >= @p0");
    }
}
