//! SearchParameter registry.
//!
//! Holds the active SearchParameter definitions, indexed by both
//! (resource_type, param_code) and canonical URL. Include resolution looks up
//! reference parameters here to find their target resource types.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::types::SearchParamType;

/// Status of a SearchParameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchParameterStatus {
    /// Active - can be used in searches.
    #[default]
    Active,
    /// Draft - informational, not yet active.
    Draft,
    /// Retired - disabled, not usable.
    Retired,
}

impl SearchParameterStatus {
    /// Returns true if this status allows the parameter to be used in searches.
    pub fn is_usable(&self) -> bool {
        *self == SearchParameterStatus::Active
    }
}

/// Definition of a SearchParameter, reduced to what search needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParameterDefinition {
    /// Canonical URL (unique identifier).
    pub url: String,

    /// Parameter code (the URL param name, e.g., "subject").
    pub code: String,

    /// The parameter type.
    pub param_type: SearchParamType,

    /// Extraction path, e.g. `Observation.subject`.
    pub expression: String,

    /// Resource types this parameter applies to.
    pub base: Vec<String>,

    /// Target resource types (for reference parameters).
    pub target: Option<Vec<String>>,

    /// Current status.
    pub status: SearchParameterStatus,
}

impl SearchParameterDefinition {
    /// Creates a new SearchParameter definition.
    pub fn new(
        url: impl Into<String>,
        code: impl Into<String>,
        param_type: SearchParamType,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            code: code.into(),
            param_type,
            expression: expression.into(),
            base: Vec::new(),
            target: None,
            status: SearchParameterStatus::Active,
        }
    }

    /// Sets the base resource types.
    pub fn with_base<I, S>(mut self, base: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base = base.into_iter().map(Into::into).collect();
        self
    }

    /// Sets target types for reference parameters.
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target = Some(targets.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: SearchParameterStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns the declared target types, empty when none are declared.
    pub fn target_types(&self) -> &[String] {
        self.target.as_deref().unwrap_or(&[])
    }
}

/// Lookup of search parameter definitions.
pub trait SearchParameterDefinitionManager: Send + Sync {
    /// Returns the usable definition of `code` on `resource_type`.
    fn get_search_parameter(
        &self,
        resource_type: &str,
        code: &str,
    ) -> Option<Arc<SearchParameterDefinition>>;

    /// Returns every usable definition that applies to `resource_type`.
    fn get_search_parameters(&self, resource_type: &str) -> Vec<Arc<SearchParameterDefinition>>;
}

/// In-memory registry of SearchParameter definitions.
#[derive(Default)]
pub struct SearchParameterRegistry {
    /// Parameters indexed by (resource_type, param_code).
    params_by_type: HashMap<String, HashMap<String, Arc<SearchParameterDefinition>>>,

    /// Parameters indexed by canonical URL.
    params_by_url: HashMap<String, Arc<SearchParameterDefinition>>,
}

impl SearchParameterRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered parameters.
    pub fn len(&self) -> usize {
        self.params_by_url.len()
    }

    /// Returns true if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.params_by_url.is_empty()
    }

    /// Registers a new parameter.
    pub fn register(&mut self, param: SearchParameterDefinition) -> Result<(), RegistryError> {
        if self.params_by_url.contains_key(&param.url) {
            return Err(RegistryError::DuplicateUrl { url: param.url });
        }

        let param = Arc::new(param);
        self.params_by_url
            .insert(param.url.clone(), Arc::clone(&param));

        for base in &param.base {
            self.params_by_type
                .entry(base.clone())
                .or_default()
                .insert(param.code.clone(), Arc::clone(&param));
        }

        Ok(())
    }

    /// Returns every definition whose base lists one of the wildcard types,
    /// which apply to every resource type.
    fn wildcard_params(&self) -> impl Iterator<Item = &Arc<SearchParameterDefinition>> {
        ["Resource", "DomainResource"]
            .into_iter()
            .filter_map(|base| self.params_by_type.get(base))
            .flat_map(|params| params.values())
    }
}

impl SearchParameterDefinitionManager for SearchParameterRegistry {
    fn get_search_parameter(
        &self,
        resource_type: &str,
        code: &str,
    ) -> Option<Arc<SearchParameterDefinition>> {
        self.params_by_type
            .get(resource_type)
            .and_then(|params| params.get(code))
            .or_else(|| self.wildcard_params().find(|p| p.code == code))
            .filter(|p| p.status.is_usable())
            .cloned()
    }

    fn get_search_parameters(&self, resource_type: &str) -> Vec<Arc<SearchParameterDefinition>> {
        let mut params: Vec<_> = self
            .params_by_type
            .get(resource_type)
            .map(|params| params.values().cloned().collect())
            .unwrap_or_default();
        params.extend(self.wildcard_params().cloned());
        params.retain(|p| p.status.is_usable());
        params.sort_by(|a, b| a.url.cmp(&b.url));
        params.dedup_by(|a, b| a.url == b.url);
        params
    }
}

impl std::fmt::Debug for SearchParameterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchParameterRegistry")
            .field("params_count", &self.params_by_url.len())
            .field(
                "resource_types",
                &self.params_by_type.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}
