//! String parameter query generator and the shared text match rendering.

use crate::error::{GenerationResult, QueryGenerationError};
use crate::expressions::{BinaryExpression, FieldName, StringExpression, StringOperator};
use crate::sql::context::QueryContext;
use crate::sql::schema::{Column, StringSearchParamTable, Table};

use super::{
    SearchParameterQueryGenerator, escape_glob, escape_like, unsupported_field, visit_simple_binary,
};

/// Generator for `StringSearchParam`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringQueryGenerator;

impl SearchParameterQueryGenerator for StringQueryGenerator {
    fn name(&self) -> &'static str {
        "string"
    }

    fn table(&self) -> Table {
        StringSearchParamTable::TABLE
    }

    fn column(&self, field: FieldName) -> GenerationResult<Column> {
        match field {
            FieldName::String => Ok(StringSearchParamTable::TEXT),
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
        let column = self.column(expr.field)?;
        Ok(visit_text_match(ctx, &column, expr))
    }
}

/// Renders a text match on a plain text column.
///
/// Case-insensitive matches compare `LOWER(column)` with the lowercased
/// value; their prefix, suffix and substring forms use `LIKE` with the
/// wildcards escaped and the escape character bound as a parameter. SQLite's
/// `LIKE` ignores ASCII case, so case-sensitive pattern matches use `GLOB`.
pub(crate) fn visit_text_match<'a>(
    ctx: QueryContext<'a>,
    column: &Column,
    expr: &StringExpression,
) -> QueryContext<'a> {
    let ctx = if expr.ignore_case {
        ctx.append("LOWER(")
            .append_column(column, expr.component_index)
            .append(")")
    } else {
        ctx.append_column(column, expr.component_index)
    };

    let value = if expr.ignore_case {
        expr.value.to_lowercase()
    } else {
        expr.value.clone()
    };

    if expr.operator == StringOperator::Equals {
        return ctx.append(" = ").bind(value);
    }

    if !expr.ignore_case {
        let escaped = escape_glob(&value);
        let pattern = match expr.operator {
            StringOperator::StartsWith => format!("{}*", escaped),
            StringOperator::EndsWith => format!("*{}", escaped),
            _ => format!("*{}*", escaped),
        };
        return ctx.append(" GLOB ").bind(pattern);
    }

    let escaped = escape_like(&value);
    let pattern = match expr.operator {
        StringOperator::StartsWith => format!("{}%", escaped),
        StringOperator::EndsWith => format!("%{}", escaped),
        _ => format!("%{}%", escaped),
    };
    ctx.append(" LIKE ")
        .bind(pattern)
        .append(" ESCAPE ")
        .bind("!")
}

/// Rejects anything but whole-value matches on columns that cannot be
/// pattern-matched.
pub(crate) fn require_equals(
    generator: &'static str,
    operator: StringOperator,
) -> GenerationResult<()> {
    match operator {
        StringOperator::Equals => Ok(()),
        other => Err(QueryGenerationError::UnsupportedOperator {
            generator,
            operator: other.as_str(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSnapshot;
    use crate::expressions::Expression;
    use crate::sql::context::SqlValue;

    fn render(expr: &Expression) -> crate::sql::CompiledQuery {
        let catalog = CatalogSnapshot::new();
        let ctx = QueryContext::new(&catalog);
        let ctx = match expr {
            Expression::StringMatch(e) => StringQueryGenerator.visit_string(e, ctx),
            Expression::Binary(e) => StringQueryGenerator.visit_binary(e, ctx),
            _ => unreachable!(),
        };
        ctx.unwrap().finish()
    }

    #[test]
    fn test_case_insensitive_prefix_match() {
        let query = render(&Expression::string_match(
            FieldName::String,
            StringOperator::StartsWith,
            "Smi_th",
            true,
        ));
        assert_eq!(query.sql, "LOWER(Text) LIKE @p0 ESCAPE @p1");
        assert_eq!(query.parameter("@p0"), Some(&SqlValue::Text("smi!_th%".into())));
        assert_eq!(query.parameter("@p1"), Some(&SqlValue::Text("!".into())));
    }

    #[test]
    fn test_exact_match_binds_value() {
        let query = render(&Expression::string_match(
            FieldName::String,
            StringOperator::Equals,
            "O'Brien",
            false,
        ));
        assert_eq!(query.sql, "Text = @p0");
        assert!(!query.sql.contains("O'Brien"));
    }

    #[test]
    fn test_contains_wraps_pattern() {
        let query = render(&Expression::string_match(
            FieldName::String,
            StringOperator::Contains,
            "ann",
            true,
        ));
        assert_eq!(query.parameter("@p0"), Some(&SqlValue::Text("%ann%".into())));
    }

    #[test]
    fn test_case_sensitive_patterns_use_glob() {
        let query = render(&Expression::string_match(
            FieldName::String,
            StringOperator::EndsWith,
            "Ann*",
            false,
        ));
        assert_eq!(query.sql, "Text GLOB @p0");
        assert_eq!(query.parameter("@p0"), Some(&SqlValue::Text("*Ann[*]".into())));
    }

    #[test]
    fn test_unsupported_field() {
        let catalog = CatalogSnapshot::new();
        let expr = StringExpression {
            field: FieldName::TokenCode,
            operator: StringOperator::Equals,
            value: "x".into(),
            ignore_case: false,
            component_index: None,
        };
        let err = StringQueryGenerator
            .visit_string(&expr, QueryContext::new(&catalog))
            .unwrap_err();
        assert!(matches!(err, QueryGenerationError::UnsupportedField { .. }));
    }
}
