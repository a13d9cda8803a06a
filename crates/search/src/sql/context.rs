//! Query generation context.
//!
//! [`QueryContext`] is threaded by value through every generation step: each
//! step consumes the context and returns the extended one. It owns the SQL
//! text and the ordered list of bound parameters, and borrows the surrogate
//! key lookup used for normalization.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;

use crate::catalog::{KeyNamespace, SurrogateKeyLookup};
use crate::error::GenerationResult;
use crate::expressions::LiteralValue;

use super::schema::{Column, LookupTable};

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Integer parameter.
    Integer(i64),
    /// Decimal parameter.
    Decimal(Decimal),
    /// Text parameter.
    Text(String),
    /// Instant parameter.
    DateTime(DateTime<Utc>),
}

impl SqlValue {
    /// Returns the text form stored for instants.
    pub fn format_instant(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl From<LiteralValue> for SqlValue {
    fn from(value: LiteralValue) -> Self {
        match value {
            LiteralValue::Decimal(d) => SqlValue::Decimal(d),
            LiteralValue::Integer(i) => SqlValue::Integer(i),
            LiteralValue::DateTime(dt) => SqlValue::DateTime(dt),
            LiteralValue::Text(s) => SqlValue::Text(s),
        }
    }
}

impl From<&LiteralValue> for SqlValue {
    fn from(value: &LiteralValue) -> Self {
        value.clone().into()
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Decimal(d) => write!(f, "{}", d),
            SqlValue::Text(s) => f.write_str(s),
            SqlValue::DateTime(dt) => f.write_str(&SqlValue::format_instant(dt)),
        }
    }
}

/// A named bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParam {
    /// Placeholder name as it appears in the SQL text (e.g. `@p0`).
    pub name: String,
    /// Bound value.
    pub value: SqlValue,
}

/// Finished SQL text with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// SQL text. User-supplied literals appear only as placeholders.
    pub sql: String,
    /// Parameters in placeholder order.
    pub parameters: Vec<SqlParam>,
}

impl CompiledQuery {
    /// Returns the value bound to a placeholder.
    pub fn parameter(&self, name: &str) -> Option<&SqlValue> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

/// Accumulates SQL text and bound parameters.
pub struct QueryContext<'a> {
    sql: String,
    parameters: Vec<SqlParam>,
    catalog: &'a dyn SurrogateKeyLookup,
    table_alias: Option<String>,
    alias_counter: usize,
}

impl<'a> QueryContext<'a> {
    /// Creates an empty context.
    pub fn new(catalog: &'a dyn SurrogateKeyLookup) -> Self {
        Self {
            sql: String::new(),
            parameters: Vec::new(),
            catalog,
            table_alias: None,
            alias_counter: 0,
        }
    }

    /// Appends raw SQL text. Never pass user input here.
    pub fn append(mut self, text: &str) -> Self {
        self.sql.push_str(text);
        self
    }

    /// Appends a column reference, qualified with the current table alias
    /// and suffixed with `component_index + 1` when a component is addressed.
    pub fn append_column(mut self, column: &Column, component_index: Option<u32>) -> Self {
        if let Some(alias) = &self.table_alias {
            self.sql.push_str(alias);
            self.sql.push('.');
        }
        self.sql.push_str(column.name);
        if let Some(index) = component_index {
            self.sql.push_str(&(index + 1).to_string());
        }
        self
    }

    /// Appends a column of an explicitly named alias.
    pub fn append_qualified(mut self, alias: &str, column: &Column) -> Self {
        self.sql.push_str(alias);
        self.sql.push('.');
        self.sql.push_str(column.name);
        self
    }

    /// Binds a value and appends its placeholder.
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        let name = format!("@p{}", self.parameters.len());
        self.sql.push_str(&name);
        self.parameters.push(SqlParam {
            name,
            value: value.into(),
        });
        self
    }

    /// Emits an equality between a surrogate key column and a raw value.
    ///
    /// When the catalog knows the value, this is a direct integer comparison.
    /// Otherwise it falls back to a subquery against the namespace's lookup
    /// table, matching on the raw value. Both forms bind the value.
    pub fn normalized_equality(
        self,
        column: &Column,
        component_index: Option<u32>,
        namespace: KeyNamespace,
        value: &str,
    ) -> Self {
        let ctx = self.append_column(column, component_index);
        match ctx.catalog.lookup(namespace, value) {
            Some(id) => ctx.append(" = ").bind(id),
            None => {
                tracing::debug!(
                    namespace = %namespace,
                    column = column.name,
                    "surrogate key not cached, using lookup subquery"
                );
                let lookup = LookupTable::for_namespace(namespace);
                ctx.append(" IN (SELECT ")
                    .append(lookup.id_column.name)
                    .append(" FROM ")
                    .append(lookup.table.name)
                    .append(" WHERE ")
                    .append(lookup.value_column.name)
                    .append(" = ")
                    .bind(value)
                    .append(")")
            }
        }
    }

    /// Runs `f` with `alias` as the current table alias, restoring the
    /// previous alias afterwards.
    pub fn with_alias<F>(mut self, alias: &str, f: F) -> GenerationResult<Self>
    where
        F: FnOnce(Self) -> GenerationResult<Self>,
    {
        let previous = self.table_alias.replace(alias.to_string());
        let mut ctx = f(self)?;
        ctx.table_alias = previous;
        Ok(ctx)
    }

    /// Allocates a fresh table alias with the given prefix.
    pub fn next_alias(mut self, prefix: &str) -> (Self, String) {
        let alias = format!("{}{}", prefix, self.alias_counter);
        self.alias_counter += 1;
        (self, alias)
    }

    /// Returns the current table alias.
    pub fn table_alias(&self) -> Option<&str> {
        self.table_alias.as_deref()
    }

    /// Returns the surrogate key lookup.
    pub fn catalog(&self) -> &'a dyn SurrogateKeyLookup {
        self.catalog
    }

    /// Returns the SQL text generated so far.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the parameters bound so far.
    pub fn parameters(&self) -> &[SqlParam] {
        &self.parameters
    }

    /// Finishes generation.
    pub fn finish(self) -> CompiledQuery {
        CompiledQuery {
            sql: self.sql,
            parameters: self.parameters,
        }
    }
}

impl fmt::Debug for QueryContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryContext")
            .field("sql", &self.sql)
            .field("parameters", &self.parameters)
            .field("table_alias", &self.table_alias)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSnapshot;
    use crate::sql::schema::QuantitySearchParamTable;

    #[test]
    fn test_bind_numbers_placeholders() {
        let catalog = CatalogSnapshot::new();
        let query = QueryContext::new(&catalog)
            .append("a = ")
            .bind("x")
            .append(" AND b = ")
            .bind(3i64)
            .finish();

        assert_eq!(query.sql, "a = @p0 AND b = @p1");
        assert_eq!(query.parameter("@p0"), Some(&SqlValue::Text("x".into())));
        assert_eq!(query.parameter("@p1"), Some(&SqlValue::Integer(3)));
    }

    #[test]
    fn test_column_suffix_and_alias() {
        let catalog = CatalogSnapshot::new();
        let ctx = QueryContext::new(&catalog)
            .with_alias("p0", |ctx| {
                Ok(ctx.append_column(&QuantitySearchParamTable::LOW_VALUE, Some(1)))
            })
            .unwrap();
        assert_eq!(ctx.table_alias(), None);

        let ctx = ctx
            .append(" ")
            .append_column(&QuantitySearchParamTable::LOW_VALUE, None);
        assert_eq!(ctx.sql(), "p0.LowValue2 LowValue");
    }

    #[test]
    fn test_normalized_equality_hit_and_miss() {
        let catalog =
            CatalogSnapshot::new().with_entry(KeyNamespace::QuantityCode, "mg", 12);

        let hit = QueryContext::new(&catalog)
            .normalized_equality(
                &QuantitySearchParamTable::QUANTITY_CODE_ID,
                None,
                KeyNamespace::QuantityCode,
                "mg",
            )
            .finish();
        assert_eq!(hit.sql, "QuantityCodeId = @p0");
        assert_eq!(hit.parameter("@p0"), Some(&SqlValue::Integer(12)));

        let miss = QueryContext::new(&catalog)
            .normalized_equality(
                &QuantitySearchParamTable::QUANTITY_CODE_ID,
                None,
                KeyNamespace::QuantityCode,
                "kg",
            )
            .finish();
        assert_eq!(
            miss.sql,
            "QuantityCodeId IN (SELECT QuantityCodeId FROM QuantityCode WHERE Value = @p0)"
        );
        assert_eq!(miss.parameter("@p0"), Some(&SqlValue::Text("kg".into())));
    }

    #[test]
    fn test_next_alias_is_unique() {
        let catalog = CatalogSnapshot::new();
        let ctx = QueryContext::new(&catalog);
        let (ctx, a) = ctx.next_alias("p");
        let (_, b) = ctx.next_alias("p");
        assert_ne!(a, b);
    }
}
