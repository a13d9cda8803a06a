//! `_include` directives.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IncludeError;

/// A parsed `Type:param[:Target]` include directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncludeDirective {
    /// Resource type whose matches are followed.
    pub source_type: String,

    /// Reference search parameter to follow.
    pub search_param: String,

    /// Explicit target type, if given.
    pub target_type: Option<String>,
}

impl IncludeDirective {
    /// Parses a directive string.
    ///
    /// ```
    /// use helios_search::types::IncludeDirective;
    ///
    /// let d = IncludeDirective::parse("Observation:subject:Patient").unwrap();
    /// assert_eq!(d.source_type, "Observation");
    /// assert_eq!(d.search_param, "subject");
    /// assert_eq!(d.target_type.as_deref(), Some("Patient"));
    ///
    /// assert!(IncludeDirective::parse("Observation::Patient").is_err());
    /// ```
    pub fn parse(directive: &str) -> Result<Self, IncludeError> {
        let invalid = |message: &str| IncludeError::InvalidDirective {
            directive: directive.to_string(),
            message: message.to_string(),
        };

        let segments: Vec<&str> = directive.split(':').collect();
        if !(2..=3).contains(&segments.len()) {
            return Err(invalid("expected Type:param or Type:param:Target"));
        }
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(invalid("empty segment"));
        }

        Ok(Self {
            source_type: segments[0].trim().to_string(),
            search_param: segments[1].trim().to_string(),
            target_type: segments.get(2).map(|s| s.trim().to_string()),
        })
    }
}

impl FromStr for IncludeDirective {
    type Err = IncludeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for IncludeDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_type, self.search_param)?;
        if let Some(target) = &self.target_type {
            write!(f, ":{}", target)?;
        }
        Ok(())
    }
}
