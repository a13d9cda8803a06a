//! Core types shared across the search subsystem.

mod include;
mod resource;
mod search_params;
mod search_result;

pub use include::IncludeDirective;
pub use resource::{HttpVerb, ResourceWrapper};
pub use search_params::{CompositeKind, ParameterKind, SearchParamType};
pub use search_result::{SearchEntryMode, SearchResult, SearchResultEntry, UnsupportedParameter};
