use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, Row, ToSql};
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, instrument};

use crate::bundle::decode_continuation_token;
use crate::catalog::{CatalogSnapshot, SurrogateKeyCatalog};
use crate::config::SearchConfig;
use crate::context::RequestContext;
use crate::error::{ExecutionError, SearchOutcome};
use crate::expressions::{Expression, FieldName};
use crate::pipeline::SearchService;
use crate::sql::{CompiledQuery, PageRequest, SqlSearchCompiler, SqlValue};
use crate::types::{ResourceWrapper, SearchResult, SearchResultEntry, UnsupportedParameter};

use super::schema::load_catalog_snapshot;

fn backend_error(message: String) -> ExecutionError {
    ExecutionError::Backend {
        backend_name: "sqlite".to_string(),
        message,
        source: None,
    }
}

/// One row of a compiled search.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    /// `ResourceSurrogateId` of the row, the paging cursor.
    pub surrogate_id: i64,
    /// The stored resource.
    pub resource: ResourceWrapper,
}

/// Executes compiled queries against a SQLite connection.
#[derive(Clone)]
pub struct SqliteQueryRunner {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteQueryRunner {
    /// Creates a runner owning `conn`.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Reads the lookup tables into a catalog snapshot.
    pub fn load_catalog(&self) -> SearchOutcome<CatalogSnapshot> {
        load_catalog_snapshot(&self.conn.lock())
    }

    /// Runs `query` and returns every row it selects.
    pub fn fetch(&self, query: &CompiledQuery) -> SearchOutcome<Vec<StoredRow>> {
        let mut bound: Vec<(&str, Box<dyn ToSql>)> = Vec::with_capacity(query.parameters.len());
        for param in &query.parameters {
            bound.push((param.name.as_str(), to_sql(&param.value)?));
        }
        let named: Vec<(&str, &dyn ToSql)> = bound
            .iter()
            .map(|(name, value)| (*name, value.as_ref()))
            .collect();

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&query.sql)?;
        let raw_rows = stmt
            .query_map(named.as_slice(), read_row)?
            .collect::<Result<Vec<_>, _>>()?;

        raw_rows.into_iter().map(RawRow::into_stored).collect()
    }

    /// Runs `query` compiled for `page` and shapes the rows into a result
    /// page. The continuation token is the surrogate id of the last entry
    /// when more rows exist.
    pub fn fetch_page(&self, query: &CompiledQuery, page: PageRequest) -> SearchOutcome<SearchResult> {
        let mut rows = self.fetch(query)?;
        let page_size = page.page_size as usize;

        let continuation_token = if rows.len() > page_size {
            rows.truncate(page_size);
            rows.last().map(|row| row.surrogate_id.to_string())
        } else {
            None
        };

        let mut result = SearchResult::new(
            rows.into_iter()
                .map(|row| SearchResultEntry::matched(row.resource))
                .collect(),
        );
        result.continuation_token = continuation_token;
        Ok(result)
    }
}

struct RawRow {
    surrogate_id: i64,
    resource_id: String,
    version: i64,
    last_updated: String,
    request_method: Option<String>,
    raw_resource: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        surrogate_id: row.get(0)?,
        resource_id: row.get(1)?,
        version: row.get(2)?,
        last_updated: row.get(3)?,
        request_method: row.get(4)?,
        raw_resource: row.get(5)?,
    })
}

impl RawRow {
    fn into_stored(self) -> SearchOutcome<StoredRow> {
        let content: serde_json::Value = serde_json::from_str(&self.raw_resource)
            .map_err(|e| backend_error(format!("Failed to deserialize resource: {}", e)))?;
        let resource_type = content
            .get("resourceType")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                backend_error(format!(
                    "Stored resource {} has no resourceType",
                    self.resource_id
                ))
            })?
            .to_string();
        let last_updated = DateTime::parse_from_rfc3339(&self.last_updated)
            .map_err(|e| backend_error(format!("Failed to parse LastUpdated: {}", e)))?
            .with_timezone(&Utc);

        let mut resource = ResourceWrapper::from_storage(
            resource_type,
            self.resource_id,
            self.version.to_string(),
            last_updated,
            content,
        );
        if let Some(method) = self.request_method {
            resource = resource.with_request_method(method);
        }

        Ok(StoredRow {
            surrogate_id: self.surrogate_id,
            resource,
        })
    }
}

fn to_sql(value: &SqlValue) -> Result<Box<dyn ToSql>, ExecutionError> {
    let boxed: Box<dyn ToSql> = match value {
        SqlValue::Integer(i) => Box::new(*i),
        SqlValue::Decimal(d) => Box::new(
            d.to_f64()
                .ok_or_else(|| backend_error(format!("Decimal {} does not fit a REAL", d)))?,
        ),
        SqlValue::Text(s) => Box::new(s.clone()),
        SqlValue::DateTime(dt) => Box::new(SqlValue::format_instant(dt)),
    };
    Ok(boxed)
}

/// A [`SearchService`] over the SQLite schema.
///
/// Understands `_id` (comma-separated ids), `_count` and the `ct`
/// continuation token. Every other search parameter is reported as
/// unsupported, and so is every `_sort` key; results come in storage order.
pub struct SqliteSearchService {
    runner: SqliteQueryRunner,
    catalog: Arc<SurrogateKeyCatalog>,
    config: SearchConfig,
}

impl SqliteSearchService {
    /// Creates the service.
    pub fn new(
        runner: SqliteQueryRunner,
        catalog: Arc<SurrogateKeyCatalog>,
        config: SearchConfig,
    ) -> Self {
        Self {
            runner,
            catalog,
            config,
        }
    }

    /// Reloads the catalog from the lookup tables and publishes it.
    pub fn refresh_catalog(&self) -> SearchOutcome<()> {
        let snapshot = self.runner.load_catalog()?;
        self.catalog.publish(snapshot);
        Ok(())
    }
}

#[async_trait]
impl SearchService for SqliteSearchService {
    #[instrument(skip(self, ctx, queries), fields(correlation_id = %ctx.correlation_id()))]
    async fn search(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        queries: &[(String, String)],
    ) -> SearchOutcome<SearchResult> {
        if ctx.is_cancelled() {
            return Err(ExecutionError::Cancelled.into());
        }

        let mut filters = Vec::new();
        let mut unsupported_search_params = Vec::new();
        let mut unsupported_sorting_params = Vec::new();
        let mut count = None;
        let mut token = None;

        for (name, value) in queries {
            match name.as_str() {
                "_id" => {
                    let ids: Vec<String> = value
                        .split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect();
                    if ids.is_empty() {
                        unsupported_search_params
                            .push(UnsupportedParameter::new(name, "no ids given"));
                    } else {
                        filters.push(Expression::in_list(FieldName::ResourceId, ids));
                    }
                }
                "_count" => count = value.parse().ok(),
                "ct" => token = decode_continuation_token(value),
                "_sort" => unsupported_sorting_params.extend(
                    value
                        .split(',')
                        .map(|key| key.trim().trim_start_matches('-'))
                        .filter(|key| !key.is_empty())
                        .map(|key| UnsupportedParameter::new(key, "sorting is not supported")),
                ),
                _ => unsupported_search_params.push(UnsupportedParameter::new(
                    name,
                    "search parameter is not supported",
                )),
            }
        }

        let expression = match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Expression::and(filters)),
        };
        let page = PageRequest::from_continuation(self.config.page_size(count), token.as_deref());

        let snapshot = self.catalog.snapshot();
        let query =
            SqlSearchCompiler::new(snapshot.as_ref()).compile(resource_type, expression.as_ref(), page)?;
        let mut result = self.runner.fetch_page(&query, page)?;

        debug!(
            resource_type,
            entries = result.results.len(),
            has_more = result.continuation_token.is_some(),
            "SQLite search completed"
        );

        result.unsupported_search_params = unsupported_search_params;
        result.unsupported_sorting_params = unsupported_sorting_params;
        Ok(result)
    }
}
