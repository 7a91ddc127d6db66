use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cleanup::{
    CleanupOutcome, ExecutionGuard, FsRepository, Repository, TokioDispatcher,
    UpgradeContentCleanup,
};
use common::cli::{CommonArgs, CommonCommands, utils};
use common::config::StartupMode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "upgrade-cleanup")]
#[command(about = "Remove obsolete repository content on the first start after an upgrade")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Override the startup mode from configuration
    #[arg(long, value_enum, global = true)]
    mode: Option<StartupMode>,

    #[command(subcommand)]
    command: Option<UpgradeCleanupCommands>,
}

#[derive(Subcommand)]
enum UpgradeCleanupCommands {
    #[command(flatten)]
    Common(CommonCommands),
}

impl Default for UpgradeCleanupCommands {
    fn default() -> Self {
        Self::Common(CommonCommands::Start)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on CLI arguments
    utils::init_logging(&cli.common);

    let mut config = utils::load_config(cli.common.config.as_ref())?;
    if let Some(mode) = cli.mode {
        config.startup.mode = mode;
    }

    let command = cli.command.unwrap_or_default();
    let UpgradeCleanupCommands::Common(ref common_cmd) = command;
    if utils::handle_common_command(common_cmd, &config).await? {
        return Ok(());
    }

    log::info!("Loaded configuration:");
    log::info!("  Startup mode: {}", config.startup.mode);
    log::info!("  Repository root: {}", config.repository.root);

    let repository: Arc<dyn Repository> = Arc::new(
        FsRepository::open(&config.repository.root)
            .await
            .context("Failed to open content repository")?,
    );

    // one guard per process, shared by every cleanup instance
    let guard = ExecutionGuard::new();
    let dispatcher = Arc::new(TokioDispatcher::new());

    let cleanup = UpgradeContentCleanup::activate(
        &config.startup.mode,
        &config.cleanup,
        guard,
        dispatcher.clone(),
    )
    .context("Invalid upgrade cleanup configuration")?;

    match cleanup.process_repository(repository).await {
        CleanupOutcome::Completed(batch) => log::info!(
            "Cleanup pass finished, {} nodes quarantined under {}",
            batch.moved_count,
            batch.staging_root
        ),
        CleanupOutcome::Failed => log::warn!("Cleanup pass failed, continuing startup"),
        CleanupOutcome::Disabled | CleanupOutcome::Contended => {}
    }

    log::info!("Startup sequence complete, waiting for background deletions");
    dispatcher.drain().await;

    Ok(())
}
