//! Search configuration.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SEARCH_BASE_URL` | http://localhost:8080 | Base URL used in bundle links |
//! | `SEARCH_INCLUDE_PARAMETER` | _include | Query key that carries include directives |
//! | `SEARCH_MAX_CONCURRENT_INCLUDES` | 4 | Secondary searches run at once (1 = sequential) |
//! | `SEARCH_DEFAULT_PAGE_SIZE` | 20 | Page size when the request names none |
//! | `SEARCH_MAX_PAGE_SIZE` | 1000 | Upper bound for requested page sizes |
//!
//! # Example
//!
//! ```
//! use helios_search::SearchConfig;
//!
//! let config = SearchConfig {
//!     base_url: "https://fhir.example.org".to_string(),
//!     max_concurrent_includes: 1,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Diagnostics text attached to the truncation warning of a partial result.
pub const DEFAULT_TRUNCATED_MESSAGE: &str =
    "The search exceeded its execution budget; the result set is incomplete.";

/// Configuration for search compilation and result assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base URL for the server (used in fullUrl and Bundle links).
    pub base_url: String,

    /// Query parameter name that carries include directives.
    pub include_parameter: String,

    /// Maximum number of secondary include searches in flight.
    pub max_concurrent_includes: usize,

    /// Diagnostics text for the truncation warning.
    pub truncated_message: String,

    /// Default page size for search results.
    pub default_page_size: u32,

    /// Maximum page size for search results.
    pub max_page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            include_parameter: "_include".to_string(),
            max_concurrent_includes: 4,
            truncated_message: DEFAULT_TRUNCATED_MESSAGE.to_string(),
            default_page_size: 20,
            max_page_size: 1000,
        }
    }
}

impl SearchConfig {
    /// Creates a configuration from environment variables, falling back to
    /// the defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("SEARCH_BASE_URL").unwrap_or(defaults.base_url),
            include_parameter: env::var("SEARCH_INCLUDE_PARAMETER")
                .unwrap_or(defaults.include_parameter),
            max_concurrent_includes: env_or(
                "SEARCH_MAX_CONCURRENT_INCLUDES",
                defaults.max_concurrent_includes,
            ),
            truncated_message: defaults.truncated_message,
            default_page_size: env_or("SEARCH_DEFAULT_PAGE_SIZE", defaults.default_page_size),
            max_page_size: env_or("SEARCH_MAX_PAGE_SIZE", defaults.max_page_size),
        }
    }

    /// Returns the base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Clamps a requested page size to the configured bounds.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size)
            .max(1)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "base_url",
                message: "base URL cannot be empty".to_string(),
            });
        }

        if self.include_parameter.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "include_parameter",
                message: "include parameter name cannot be empty".to_string(),
            });
        }

        if self.max_concurrent_includes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_includes",
                message: "at least one include search must be allowed".to_string(),
            });
        }

        if self.default_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_page_size",
                message: "default page size cannot be 0".to_string(),
            });
        }

        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::InvalidValue {
                field: "default_page_size",
                message: "default page size cannot exceed max page size".to_string(),
            });
        }

        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
