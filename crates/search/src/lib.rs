//! Helios FHIR Server Search
//!
//! This crate compiles parsed FHIR search requests into parameterized SQL over
//! a fixed, per-parameter-type physical schema, and assembles the results into
//! searchset and history bundles, resolving `_include` directives on the way.
//!
//! # Features
//!
//! - **Query Generation**: one generator per search parameter type (string,
//!   token, quantity, number, date, reference, uri, composite) with surrogate
//!   key normalization and a subquery fallback for uncached values
//! - **Bound Parameters**: user-supplied literals never appear in SQL text
//! - **Bundle Assembly**: self/next links, opaque continuation tokens, outcome
//!   entries for ignored parameters and truncated results
//! - **Include Resolution**: batched, bounded-parallel, cancellable secondary
//!   searches for `_include`
//!
//! Available backend features:
//! - `sqlite` (default) - schema creation, catalog loading and query execution
//!
//! # Architecture
//!
//! - [`catalog`] - Surrogate key catalog (string value to integer id)
//! - [`expressions`] - Search expression tree
//! - [`sql`] - Physical schema, query generators and the expression compiler
//! - [`search`] - Search parameter registry and searchable value extraction
//! - [`bundle`] - Response envelope model and assembly
//! - [`pipeline`] - Search execution boundary and request pipeline stages
//! - [`backends`] - Backend implementations
//!
//! # Compiling a search
//!
//! ```
//! use helios_search::catalog::{CatalogSnapshot, KeyNamespace};
//! use helios_search::expressions::{Expression, FieldName, ParameterRef, StringOperator};
//! use helios_search::sql::{PageRequest, SqlSearchCompiler};
//! use helios_search::types::ParameterKind;
//!
//! let catalog = CatalogSnapshot::new().with_entry(KeyNamespace::QuantityCode, "mg", 7);
//! let dose = ParameterRef::new(
//!     "dose",
//!     "http://example.org/SearchParameter/dose",
//!     ParameterKind::Quantity,
//! );
//! let expr = Expression::search_parameter(
//!     dose,
//!     Expression::string_match(FieldName::QuantityCode, StringOperator::Equals, "mg", false),
//! );
//!
//! let query = SqlSearchCompiler::new(&catalog)
//!     .compile("MedicationRequest", Some(&expr), PageRequest::first(20))
//!     .unwrap();
//!
//! assert!(query.sql.contains("QuantityCodeId = @p"));
//! assert!(!query.sql.contains("mg"));
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod bundle;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod expressions;
pub mod pipeline;
pub mod search;
pub mod sql;
pub mod types;

// Re-export commonly used types at crate root
pub use bundle::{Bundle, BundleFactory};
pub use catalog::{CatalogSnapshot, SurrogateKeyCatalog, SurrogateKeyLookup};
pub use config::SearchConfig;
pub use context::RequestContext;
pub use error::{SearchError, SearchOutcome};
pub use pipeline::{IncludeSearchBehavior, SearchResourceService, SearchService};
pub use sql::{CompiledQuery, SqlSearchCompiler};
