use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments shared by the cleanup binaries
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Common subcommands
#[derive(Subcommand, Debug, Clone, Default)]
pub enum CommonCommands {
    /// Run the startup sequence (default behavior)
    #[default]
    Start,
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::{Configuration, StartupMode};
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Pick the log filter from CLI flags, `RUST_LOG` wins when neither is set.
    pub fn log_filter(args: &CommonArgs) -> EnvFilter {
        if args.quiet {
            EnvFilter::new("warn")
        } else if args.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        }
    }

    /// Initialize logging based on CLI arguments
    pub fn init_logging(args: &CommonArgs) {
        tracing_subscriber::fmt()
            .with_env_filter(log_filter(args))
            .init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("Upgrade Cleanup Configuration:");
            println!("==============================");
            println!("Startup mode: {}", config.startup.mode);
            println!("Repository root: {}", config.repository.root);
            println!(
                "Selection query: {}",
                config.cleanup.query.as_deref().unwrap_or("<none>")
            );
            println!("Deletable path patterns: {:?}", config.cleanup.path_regexps);
            println!("Staging parent: {}", config.cleanup.staging_parent);
        }
        Ok(())
    }

    /// Validate configuration and report any issues.
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        if config.repository.root.is_empty() {
            anyhow::bail!("Repository root cannot be empty");
        }

        if !config.cleanup.staging_parent.starts_with('/') {
            anyhow::bail!(
                "Staging parent must be an absolute node path, got {:?}",
                config.cleanup.staging_parent
            );
        }

        if config.startup.mode == StartupMode::Update {
            let query = config.cleanup.query.as_deref().unwrap_or_default();
            if query.trim().is_empty() {
                anyhow::bail!("A selection query is required when starting in update mode");
            }
        }

        // same check activation applies, each expression must compile on its own
        for pattern in &config.cleanup.path_regexps {
            regex::Regex::new(pattern)
                .with_context(|| format!("Invalid deletable path pattern {pattern:?}"))?;
        }

        if config.cleanup.path_regexps.is_empty() {
            log::warn!("No deletable path patterns configured, nothing will be removed");
        }

        log::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle common CLI commands that don't require running the cleanup
    pub async fn handle_common_command(
        command: &CommonCommands,
        config: &Configuration,
    ) -> Result<bool> {
        match command {
            CommonCommands::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            CommonCommands::Validate => {
                validate_config(config)?;
                Ok(true)
            }
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(true)
            }
            CommonCommands::Start => Ok(false),
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}
