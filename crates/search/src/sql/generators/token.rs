//! Token parameter query generator.

use crate::catalog::KeyNamespace;
use crate::error::{GenerationResult, QueryGenerationError};
use crate::expressions::{BinaryExpression, BinaryOperator, FieldName, StringExpression};
use crate::sql::context::QueryContext;
use crate::sql::schema::{Column, Table, TokenSearchParamTable};

use super::string::{require_equals, visit_text_match};
use super::{SearchParameterQueryGenerator, expect_text, unsupported_field, visit_simple_binary};

/// Generator for `TokenSearchParam`.
///
/// The system is normalized through the `System` namespace; the code is
/// stored as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenQueryGenerator;

impl SearchParameterQueryGenerator for TokenQueryGenerator {
    fn name(&self) -> &'static str {
        "token"
    }

    fn table(&self) -> Table {
        TokenSearchParamTable::TABLE
    }

    fn column(&self, field: FieldName) -> GenerationResult<Column> {
        match field {
            FieldName::TokenCode => Ok(TokenSearchParamTable::CODE),
            FieldName::TokenSystem => Ok(TokenSearchParamTable::SYSTEM_ID),
            other => Err(unsupported_field(self.name(), other)),
        }
    }

    fn namespace(&self, field: FieldName) -> Option<KeyNamespace> {
        (field == FieldName::TokenSystem).then_some(KeyNamespace::System)
    }

    fn visit_binary<'a>(
        &self,
        expr: &BinaryExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        let column = self.column(expr.field)?;
        match (expr.field, expr.operator) {
            (FieldName::TokenSystem, BinaryOperator::Equal) => {
                let system = expect_text(self.name(), expr.field, &expr.value)?;
                Ok(ctx.normalized_equality(
                    &column,
                    expr.component_index,
                    KeyNamespace::System,
                    system,
                ))
            }
            (FieldName::TokenCode, op) if op.is_equality() => Ok(visit_simple_binary(
                ctx,
                &column,
                expr.component_index,
                op,
                &expr.value,
            )),
            (_, op) => Err(QueryGenerationError::UnsupportedOperator {
                generator: self.name(),
                operator: op.as_sql(),
            }),
        }
    }

    fn visit_string<'a>(
        &self,
        expr: &StringExpression,
        ctx: QueryContext<'a>,
    ) -> GenerationResult<QueryContext<'a>> {
        let column = self.column(expr.field)?;
        require_equals(self.name(), expr.operator)?;
        match expr.field {
            FieldName::TokenSystem => Ok(ctx.normalized_equality(
                &column,
                expr.component_index,
                KeyNamespace::System,
                &expr.value,
            )),
            _ => Ok(visit_text_match(ctx, &column, expr)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSnapshot;
    use crate::expressions::StringOperator;

    #[test]
    fn test_code_and_system() {
        let catalog = CatalogSnapshot::new().with_entry(KeyNamespace::System, "http://loinc.org", 4);

        let system = StringExpression {
            field: FieldName::TokenSystem,
            operator: StringOperator::Equals,
            value: "http://loinc.org".into(),
            ignore_case: false,
            component_index: None,
        };
        let code = StringExpression {
            field: FieldName::TokenCode,
            value: "8867-4".into(),
            ..system.clone()
        };

        let ctx = TokenQueryGenerator
            .visit_string(&system, QueryContext::new(&catalog))
            .unwrap()
            .append(" AND ");
        let query = TokenQueryGenerator.visit_string(&code, ctx).unwrap().finish();

        assert_eq!(query.sql, "SystemId = @p0 AND Code = @p1");
        assert_eq!(query.parameters.len(), 2);
    }

    #[test]
    fn test_prefix_match_on_token_is_rejected() {
        let catalog = CatalogSnapshot::new();
        let expr = StringExpression {
            field: FieldName::TokenCode,
            operator: StringOperator::StartsWith,
            value: "88".into(),
            ignore_case: false,
            component_index: None,
        };
        let err = TokenQueryGenerator
            .visit_string(&expr, QueryContext::new(&catalog))
            .unwrap_err();
        assert_eq!(
            err,
            QueryGenerationError::UnsupportedOperator {
                generator: "token",
                operator: "starts-with"
            }
        );
    }
}
