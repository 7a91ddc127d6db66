//! Activated cleanup configuration.

use crate::error::{CleanupError, Result};
use crate::filter::PathFilter;
use crate::repository::path;

/// Cleanup settings with the path patterns compiled.
///
/// Built once when the component is activated and never changed afterwards.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// JCR-SQL2 query that selects candidates for deletion
    pub selection_query: String,
    /// Paths that are allowed to be deleted
    pub path_filter: PathFilter,
    /// Node under which quarantine folders are created
    pub staging_parent: String,
}

impl CleanupConfig {
    pub fn new(selection_query: impl Into<String>, path_filter: PathFilter) -> Self {
        Self {
            selection_query: selection_query.into(),
            path_filter,
            staging_parent: String::from("/tmp"),
        }
    }

    pub fn with_staging_parent(mut self, staging_parent: impl Into<String>) -> Self {
        self.staging_parent = staging_parent.into();
        self
    }

    /// Check the settings that can be checked without a repository.
    pub fn validate(&self) -> Result<()> {
        if self.selection_query.trim().is_empty() {
            return Err(CleanupError::MissingQuery);
        }
        path::validate(&self.staging_parent)?;
        Ok(())
    }
}

impl TryFrom<&common::config::CleanupConfig> for CleanupConfig {
    type Error = CleanupError;

    fn try_from(config: &common::config::CleanupConfig) -> Result<Self> {
        let query = config.query.clone().ok_or(CleanupError::MissingQuery)?;
        let compiled = Self::new(query, PathFilter::compile(config.path_regexps.iter().cloned())?)
            .with_staging_parent(config.staging_parent.clone());
        compiled.validate()?;
        Ok(compiled)
    }
}
