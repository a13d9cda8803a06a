//! Quantity parameter query generator.

use crate::catalog::KeyNamespace;
use crate::error::GenerationResult;
use crate::expressions::{BinaryExpression, FieldName, StringExpression};
use crate::sql::context::QueryContext;
use crate::sql::schema::{Column, QuantitySearchParamTable, Table};

use super::string::require_equals;
use super::{SearchParameterQueryGenerator, unsupported_field, visit_range_binary};

/// Generator for `QuantitySearchParam`.
///
/// Values are stored either as a point (`SingleValue`) or as a range
/// (`LowValue`/`HighValue`). Unit code and system are normalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuantityQueryGenerator;

impl SearchParameterQueryGenerator for QuantityQueryGenerator {
    fn name(&self) -> &'static str {
        "quantity"
    }

    fn table(&self) -> Table {
        QuantitySearchParamTable::TABLE
    }

    fn column(&self, field: FieldName) -> GenerationResult<Column> {
        match field {
            FieldName::Quantity => Ok(QuantitySearchParamTable::SINGLE_VALUE),
            FieldName::QuantityLow => Ok(QuantitySearchParamTable::LOW_VALUE),
            FieldName::QuantityHigh => Ok(QuantitySearchParamTable::HIGH_VALUE),
            FieldName::QuantityCode => Ok(QuantitySearchParamTable::QUANTITY_CODE_ID),
            FieldName::QuantitySystem => Ok(QuantitySearchParamTable::SYSTEM_ID),
            other => Err(unsupported_field(self.name(), other)),
        }
    }

    fn namespace(&self, field: FieldName) -> Option<KeyNamespace> {
        match field {
            FieldName::QuantityCode => Some(KeyNamespace::QuantityCode),
            FieldName::QuantitySystem => Some(KeyNamespace::System),
            _ => None,
        }
    }

    fn visit_binary<'a>(
        &self,
        expr: &BinaryExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        let (column, null_check) = match expr.field {
            FieldName::Quantity => (
                QuantitySearchParamTable::SINGLE_VALUE,
                QuantitySearchParamTable::SINGLE_VALUE,
            ),
            FieldName::QuantityLow => (
                QuantitySearchParamTable::LOW_VALUE,
                QuantitySearchParamTable::LOW_VALUE,
            ),
            FieldName::QuantityHigh => (
                QuantitySearchParamTable::HIGH_VALUE,
                QuantitySearchParamTable::LOW_VALUE,
            ),
            other => return Err(unsupported_field(self.name(), other)),
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

    fn visit_string<'a>(
        &self,
        expr: &StringExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        let column = self.column(expr.field)?;
        let namespace = self
            .namespace(expr.field)
            .ok_or_else(|| unsupported_field(self.name(), expr.field))?;
        require_equals(self.name(), expr.operator)?;

        Ok(ctx.normalized_equality(&column, expr.component_index, namespace, &expr.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSnapshot;
    use crate::error::QueryGenerationError;
    use crate::expressions::{BinaryOperator, LiteralValue, StringOperator};
    use crate::sql::context::SqlValue;
    use rust_decimal::Decimal;

    fn binary(field: FieldName, component_index: Option<u32>) -> BinaryExpression {
        BinaryExpression {
            field,
            operator: BinaryOperator::LessThan,
            value: LiteralValue::Decimal(Decimal::new(54, 1)),
            component_index,
        }
    }

    #[test]
    fn test_high_bound_null_checks_low_column() {
        let catalog = CatalogSnapshot::new();
        let query = QuantityQueryGenerator
            .visit_binary(&binary(FieldName::QuantityHigh, None), QueryContext::new(&catalog))
            .unwrap()
            .finish();
        assert_eq!(query.sql, "LowValue IS NOT NULL AND HighValue < @p0");
        assert_eq!(
            query.parameter("@p0"),
            Some(&SqlValue::Decimal(Decimal::new(54, 1)))
        );
    }

    #[test]
    fn test_component_suffix_applies_to_both_columns() {
        let catalog = CatalogSnapshot::new();
        let query = QuantityQueryGenerator
            .visit_binary(&binary(FieldName::QuantityHigh, Some(1)), QueryContext::new(&catalog))
            .unwrap()
            .finish();
        assert_eq!(query.sql, "LowValue2 IS NOT NULL AND HighValue2 < @p0");
    }

    #[test]
    fn test_point_value_null_checks_itself() {
        let catalog = CatalogSnapshot::new();
        let query = QuantityQueryGenerator
            .visit_binary(&binary(FieldName::Quantity, None), QueryContext::new(&catalog))
            .unwrap()
            .finish();
        assert_eq!(query.sql, "SingleValue IS NOT NULL AND SingleValue < @p0");
    }

    #[test]
    fn test_unit_system_fallback() {
        let catalog = CatalogSnapshot::new();
        let expr = StringExpression {
            field: FieldName::QuantitySystem,
            operator: StringOperator::Equals,
            value: "http://unitsofmeasure.org".into(),
            ignore_case: false,
            component_index: None,
        };
        let query = QuantityQueryGenerator
            .visit_string(&expr, QueryContext::new(&catalog))
            .unwrap()
            .finish();
        assert_eq!(
            query.sql,
            "SystemId IN (SELECT SystemId FROM System WHERE Value = @p0)"
        );
    }

    #[test]
    fn test_token_field_is_a_construction_defect() {
        let catalog = CatalogSnapshot::new();
        let err = QuantityQueryGenerator
            .visit_binary(&binary(FieldName::TokenCode, None), QueryContext::new(&catalog))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "quantity query generator does not support field token-code"
        );
        assert!(matches!(err, QueryGenerationError::UnsupportedField { .. }));
    }
}
