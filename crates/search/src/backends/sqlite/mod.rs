//! SQLite backend.
//!
//! Creates the physical search schema, loads the surrogate key catalog from
//! its lookup tables, and executes [`CompiledQuery`](crate::sql::CompiledQuery)
//! values with their named parameters bound.

mod runner;
mod schema;

pub use runner::{SqliteQueryRunner, SqliteSearchService, StoredRow};
pub use schema::{create_schema, ensure_lookup_value, load_catalog_snapshot};
