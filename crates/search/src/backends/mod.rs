//! Database backends for executing compiled searches.

#[cfg(feature = "sqlite")]
pub mod sqlite;
