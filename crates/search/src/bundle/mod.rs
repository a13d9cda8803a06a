//! Response envelope assembly.
//!
//! [`BundleFactory`] turns a [`SearchResult`](crate::types::SearchResult) into
//! a [`Bundle`]: mapped entries, a leading outcome entry for diagnostics and
//! ignored parameters, a truncation warning for partial results, self and
//! next links, and the request's correlation id.

pub mod factory;
pub mod model;
pub mod outcome;
pub mod url;

pub use factory::{BundleFactory, BundleParts};
pub use model::{Bundle, BundleEntry, BundleEntryRequest, BundleEntryResponse, BundleLink, BundleType};
pub use outcome::{Issue, IssueSeverity, IssueType, OperationOutcome};
pub use url::{
    QueryUrlResolver, SearchRoute, UrlResolver, decode_continuation_token,
    encode_continuation_token,
};
