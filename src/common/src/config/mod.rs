use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "upgrade-cleanup.toml";

/// Prefix for environment variable overrides, nested keys are split on `__`.
pub const ENV_PREFIX: &str = "UPGRADE_CLEANUP__";

/// How the host repository was started.
///
/// Only [`StartupMode::Update`] enables the upgrade cleanup.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum StartupMode {
    /// First start on an empty repository
    Install,
    /// First start after the installation was upgraded in place
    Update,
    /// Any later start of an already installed instance
    #[default]
    Restart,
}

impl fmt::Display for StartupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StartupMode::Install => "install",
            StartupMode::Update => "update",
            StartupMode::Restart => "restart",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct StartupConfig {
    /// Startup mode reported to the cleanup component
    pub mode: StartupMode,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Directory holding the content tree of the filesystem repository
    pub root: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            root: String::from(".data/content"),
        }
    }
}

/// Raw cleanup settings as read from configuration.
///
/// Patterns are kept as strings here; they are compiled when the cleanup
/// component is activated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// JCR-SQL2 query that selects candidates for deletion
    #[serde(default)]
    pub query: Option<String>,

    /// Regular expressions that define which paths are allowed to be deleted.
    ///
    /// An empty list means nothing is removable.
    #[serde(default)]
    pub path_regexps: Vec<String>,

    /// Parent node under which the quarantine folder is created
    #[serde(default = "default_staging_parent")]
    pub staging_parent: String,
}

fn default_staging_parent() -> String {
    String::from("/tmp")
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            query: None,
            path_regexps: Vec::new(),
            staging_parent: default_staging_parent(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    /// Startup mode signal
    #[serde(default)]
    pub startup: StartupConfig,
    /// Content repository location
    #[serde(default)]
    pub repository: RepositoryConfig,
    /// Upgrade cleanup settings
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

impl Configuration {
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(path))
    }

    fn figment(file: figment::providers::Data<Toml>) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_configuration_is_inert() {
        let config = Configuration::default();

        assert_eq!(config.startup.mode, StartupMode::Restart);
        assert_eq!(config.repository.root, ".data/content");
        assert!(config.cleanup.query.is_none());
        assert!(config.cleanup.path_regexps.is_empty());
        assert_eq!(config.cleanup.staging_parent, "/tmp");
    }

    #[test]
    fn test_configless_operation() {
        Jail::expect_with(|_jail| {
            let config = Configuration::load().map_err(|e| *e)?;

            assert_eq!(config.startup.mode, StartupMode::Restart);
            assert!(config.cleanup.path_regexps.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "cleanup.toml",
                r#"
                [startup]
                mode = "update"

                [repository]
                root = "/srv/content"

                [cleanup]
                query = "SELECT * FROM [nt:base] AS n WHERE ISDESCENDANTNODE(n, '/etc/old')"
                path_regexps = ['/etc/old/.*', '/var/cache/[^/]+']
                "#,
            )?;

            let config =
                Configuration::load_from_path(Path::new("cleanup.toml")).map_err(|e| *e)?;

            assert_eq!(config.startup.mode, StartupMode::Update);
            assert_eq!(config.repository.root, "/srv/content");
            assert_eq!(
                config.cleanup.query.as_deref(),
                Some("SELECT * FROM [nt:base] AS n WHERE ISDESCENDANTNODE(n, '/etc/old')")
            );
            assert_eq!(
                config.cleanup.path_regexps,
                vec!["/etc/old/.*".to_string(), "/var/cache/[^/]+".to_string()]
            );
            // not present in the file, falls back to the default
            assert_eq!(config.cleanup.staging_parent, "/tmp");
            Ok(())
        });
    }

    #[test]
    fn test_env_var_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                [startup]
                mode = "install"
                "#,
            )?;
            jail.set_env("UPGRADE_CLEANUP__STARTUP__MODE", "update");
            jail.set_env("UPGRADE_CLEANUP__CLEANUP__STAGING_PARENT", "/var/quarantine");
            jail.set_env("UPGRADE_CLEANUP__CLEANUP__PATH_REGEXPS", r#"["/etc/.*"]"#);

            let config = Configuration::load().map_err(|e| *e)?;

            assert_eq!(config.startup.mode, StartupMode::Update);
            assert_eq!(config.cleanup.staging_parent, "/var/quarantine");
            assert_eq!(config.cleanup.path_regexps, vec!["/etc/.*".to_string()]);
            Ok(())
        });
    }

    #[test]
    fn test_unknown_startup_mode_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("UPGRADE_CLEANUP__STARTUP__MODE", "upgrade");

            assert!(Configuration::load().is_err());
            Ok(())
        });
    }

    #[test]
    fn test_startup_mode_display() {
        assert_eq!(StartupMode::Install.to_string(), "install");
        assert_eq!(StartupMode::Update.to_string(), "update");
        assert_eq!(StartupMode::Restart.to_string(), "restart");
    }
}
