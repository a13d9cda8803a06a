//! Search parameter definitions and searchable value extraction.

pub mod indexer;
pub mod registry;

pub use indexer::{IndexValue, JsonPathIndexer, SearchIndexEntry, SearchIndexer};
pub use registry::{
    SearchParameterDefinition, SearchParameterDefinitionManager, SearchParameterRegistry,
    SearchParameterStatus,
};
