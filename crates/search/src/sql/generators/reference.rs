//! Reference parameter query generator.

use crate::catalog::KeyNamespace;
use crate::error::{GenerationResult, QueryGenerationError};
use crate::expressions::{BinaryExpression, BinaryOperator, FieldName, StringExpression, StringOperator};
use crate::sql::context::QueryContext;
use crate::sql::schema::{Column, ReferenceSearchParamTable, Table};

use super::string::{require_equals, visit_text_match};
use super::{SearchParameterQueryGenerator, expect_text, unsupported_field};

/// Generator for `ReferenceSearchParam`.
///
/// A reference is split into base URI (absolute references only), target
/// resource type (normalized through `ResourceType`) and target id.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceQueryGenerator;

impl SearchParameterQueryGenerator for ReferenceQueryGenerator {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn table(&self) -> Table {
        ReferenceSearchParamTable::TABLE
    }

    fn column(&self, field: FieldName) -> GenerationResult<Column> {
        match field {
            FieldName::ReferenceBaseUri => Ok(ReferenceSearchParamTable::BASE_URI),
            FieldName::ReferenceResourceType => {
                Ok(ReferenceSearchParamTable::REFERENCE_RESOURCE_TYPE_ID)
            }
            FieldName::ReferenceResourceId => Ok(ReferenceSearchParamTable::REFERENCE_RESOURCE_ID),
            other => Err(unsupported_field(self.name(), other)),
        }
    }

    fn namespace(&self, field: FieldName) -> Option<KeyNamespace> {
        (field == FieldName::ReferenceResourceType).then_some(KeyNamespace::ResourceType)
    }

    fn visit_binary<'a>(
        &self,
        expr: &BinaryExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        if !expr.operator.is_equality() {
            return Err(QueryGenerationError::UnsupportedOperator {
                generator: self.name(),
                operator: expr.operator.as_sql(),
            });
        }
        let value = expect_text(self.name(), expr.field, &expr.value)?;
        let ctx = if expr.operator == BinaryOperator::NotEqual {
            ctx.append("NOT (")
        } else {
            ctx.append("(")
        };

        let as_string = StringExpression {
            field: expr.field,
            operator: StringOperator::Equals,
            value: value.to_string(),
            ignore_case: false,
            component_index: expr.component_index,
        };
        Ok(self.visit_string(&as_string, ctx)?.append(")"))
    }

    fn visit_string<'a>(
        &self,
        expr: &StringExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        let column = self.column(expr.field)?;
        match self.namespace(expr.field) {
            Some(namespace) => {
                require_equals(self.name(), expr.operator)?;
                Ok(ctx.normalized_equality(&column, expr.component_index, namespace, &expr.value))
            }
            None => Ok(visit_text_match(ctx, &column, expr)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSnapshot;
    use crate::expressions::LiteralValue;

    #[test]
    fn test_resource_type_is_normalized() {
        let catalog = CatalogSnapshot::new().with_entry(KeyNamespace::ResourceType, "Patient", 103);
        let expr = BinaryExpression {
            field: FieldName::ReferenceResourceType,
            operator: BinaryOperator::Equal,
            value: LiteralValue::Text("Patient".into()),
            component_index: None,
        };
        let query = ReferenceQueryGenerator
            .visit_binary(&expr, QueryContext::new(&catalog))
            .unwrap()
            .finish();
        assert_eq!(query.sql, "(ReferenceResourceTypeId = @p0)");
    }

    #[test]
    fn test_ordering_operators_rejected() {
        let catalog = CatalogSnapshot::new();
        let expr = BinaryExpression {
            field: FieldName::ReferenceResourceId,
            operator: BinaryOperator::GreaterThan,
            value: LiteralValue::Text("42".into()),
            component_index: None,
        };
        assert!(
            ReferenceQueryGenerator
                .visit_binary(&expr, QueryContext::new(&catalog))
                .is_err()
        );
    }
}
