//! Quarantine-then-delete pass run once after an in-place upgrade.
//!
//! Candidates selected by the configured query are moved under a fresh
//! staging folder in a single session and committed once. The staging folder
//! is then handed to a [`BackgroundDeleter`] so the host startup does not wait
//! for a potentially large subtree removal.
//!
//! A pass never fails from the caller's point of view: every error is logged
//! and turned into [`CleanupOutcome::Failed`].

use std::sync::Arc;

use chrono::Utc;
use common::config::StartupMode;
use futures::TryStreamExt;
use tracing::{debug, info, warn};

use crate::config::CleanupConfig;
use crate::deleter::{BackgroundDeleter, Dispatcher};
use crate::error::Result;
use crate::filter::PathFilter;
use crate::guard::ExecutionGuard;
use crate::repository::{NodePaths, QUERY_DIALECT, Repository, ScopedSession, path};
use crate::startup::StartupHandler;

/// Name prefix of quarantine folders, followed by the creation time in
/// milliseconds since the epoch.
pub const STAGING_PREFIX: &str = "pre-upgrade-cleanup-";

/// Nodes moved into one quarantine folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantineBatch {
    pub staging_root: String,
    pub moved_count: usize,
    pub ignored_count: usize,
}

/// What a pass did. Informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Host was not started in update mode
    Disabled,
    /// Another pass was already running
    Contended,
    Completed(QuarantineBatch),
    /// The pass hit an error and was abandoned; details are in the log
    Failed,
}

/// The upgrade cleanup component.
pub struct UpgradeContentCleanup {
    mode: StartupMode,
    config: Option<CleanupConfig>,
    guard: ExecutionGuard,
    dispatcher: Arc<dyn Dispatcher>,
}

impl UpgradeContentCleanup {
    /// Read the startup mode and, in update mode, compile the settings.
    ///
    /// The mode is read exactly once here. An invalid pattern or a missing
    /// query is only an error when the cleanup would actually run.
    pub fn activate(
        startup: &dyn StartupHandler,
        settings: &common::config::CleanupConfig,
        guard: ExecutionGuard,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self> {
        let mode = startup.startup_mode();
        let config = if mode == StartupMode::Update {
            info!(mode = %mode, "Startup mode is {mode}, cleanup will be done");
            let config = CleanupConfig::try_from(settings)?;
            info!(query = %config.selection_query, "Cleanup query");
            info!(
                path_regexps = ?config.path_filter.expressions(),
                staging_parent = %config.staging_parent,
                "Paths allowed for deletion"
            );
            Some(config)
        } else {
            info!(mode = %mode, "Startup mode is {mode}, nothing to do");
            None
        };

        Ok(Self {
            mode,
            config,
            guard,
            dispatcher,
        })
    }

    pub fn mode(&self) -> StartupMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Run one cleanup pass against `repository`.
    pub async fn process_repository(&self, repository: Arc<dyn Repository>) -> CleanupOutcome {
        let Some(config) = &self.config else {
            debug!(mode = %self.mode, "Cleanup disabled, skipping repository");
            return CleanupOutcome::Disabled;
        };

        let Some(_permit) = self.guard.try_enter() else {
            info!("Concurrent execution detected, won't do anything");
            return CleanupOutcome::Contended;
        };

        let batch = match quarantine(config, repository.as_ref()).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "Exception in cleanup");
                return CleanupOutcome::Failed;
            }
        };

        info!(
            staging_root = %batch.staging_root,
            moved = batch.moved_count,
            ignored = batch.ignored_count,
            "{} nodes deleted, {} ignored",
            batch.moved_count,
            batch.ignored_count
        );

        if batch.moved_count > 0 {
            BackgroundDeleter::new(repository)
                .spawn(self.dispatcher.as_ref(), batch.staging_root.clone());
        }

        CleanupOutcome::Completed(batch)
    }
}

/// Move every removable candidate under a new staging folder.
///
/// The session is logged out before this returns, whatever happens.
async fn quarantine(
    config: &CleanupConfig,
    repository: &dyn Repository,
) -> Result<QuarantineBatch> {
    let mut session = ScopedSession::new(repository.login_administrative().await?);
    let mut candidates = session.query(&config.selection_query, QUERY_DIALECT).await?;

    let name = format!("{STAGING_PREFIX}{}", Utc::now().timestamp_millis());
    let staging_root = session.add_node(&config.staging_parent, &name).await?;
    session.save().await?;
    debug!(staging_root = %staging_root, "Created quarantine folder");

    let mut batch = QuarantineBatch {
        staging_root,
        moved_count: 0,
        ignored_count: 0,
    };

    // one commit for the whole batch, also when a move failed halfway
    let relocated = relocate(
        &config.path_filter,
        &mut session,
        &mut candidates,
        &mut batch,
    )
    .await;
    let committed = session.save().await;
    if let (Err(_), Err(e)) = (&relocated, &committed) {
        warn!(error = %e, "Commit after failed move also failed");
    }
    relocated?;
    committed?;

    Ok(batch)
}

async fn relocate(
    filter: &PathFilter,
    session: &mut ScopedSession,
    candidates: &mut NodePaths,
    batch: &mut QuarantineBatch,
) -> Result<()> {
    while let Some(candidate) = candidates.try_next().await? {
        // descendants of a node moved earlier in this pass travel with it
        if !session.node_exists(&candidate).await? {
            debug!(path = %candidate, "Candidate no longer exists, skipping");
            continue;
        }
        if !filter.is_removable(&candidate) {
            batch.ignored_count += 1;
            continue;
        }
        let target = path::join(&batch.staging_root, &batch.moved_count.to_string());
        info!(from = %candidate, to = %target, "Moving");
        session.move_node(&candidate, &target).await?;
        batch.moved_count += 1;
    }
    Ok(())
}
