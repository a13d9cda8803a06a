//! Search expression compiler.
//!
//! Turns an [`Expression`](crate::expressions::Expression) tree into SQL text
//! plus an ordered list of bound parameters, targeting the fixed schema in
//! [`schema`]. User-supplied literals only ever reach the database as bound
//! parameters.

pub mod compiler;
pub mod context;
pub mod generators;
pub mod schema;

pub use compiler::{PageRequest, SELECTED_COLUMNS, SqlSearchCompiler};
pub use context::{CompiledQuery, QueryContext, SqlParam, SqlValue};
pub use generators::{SearchParameterQueryGenerator, generator_for};
