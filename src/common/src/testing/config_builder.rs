//! Test configuration builder for creating test setups quickly.

use crate::config::{Configuration, StartupMode};

/// Builder for creating test configurations.
///
/// Starts from [`Configuration::default`], which leaves the cleanup inert
/// (restart mode, no query, no patterns).
#[derive(Debug, Clone)]
pub struct TestConfigBuilder {
    config: Configuration,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Configuration::default(),
        }
    }

    /// Report the given startup mode.
    pub fn with_mode(mut self, mode: StartupMode) -> Self {
        self.config.startup.mode = mode;
        self
    }

    /// Shorthand for `with_mode(StartupMode::Update)`.
    pub fn update_mode(self) -> Self {
        self.with_mode(StartupMode::Update)
    }

    /// Set the selection query.
    pub fn with_query(mut self, query: &str) -> Self {
        self.config.cleanup.query = Some(query.to_string());
        self
    }

    /// Append a deletable path pattern.
    pub fn with_path_regexp(mut self, regexp: &str) -> Self {
        self.config.cleanup.path_regexps.push(regexp.to_string());
        self
    }

    /// Set the parent node of the quarantine folder.
    pub fn with_staging_parent(mut self, parent: &str) -> Self {
        self.config.cleanup.staging_parent = parent.to_string();
        self
    }

    /// Point the filesystem repository at `dir` (typically a `TempDir`).
    pub fn with_repository_root(mut self, dir: &str) -> Self {
        self.config.repository.root = dir.to_string();
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Configuration {
        self.config
    }
}
