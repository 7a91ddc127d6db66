//! Upgrade content cleanup.
//!
//! When a content repository starts for the first time after an in-place
//! upgrade, content that the new version no longer wants is selected with a
//! query, checked against a whitelist of path patterns, moved into a
//! quarantine folder in one transaction and then deleted in the background.

pub mod config;
pub mod deleter;
pub mod error;
pub mod filter;
pub mod guard;
pub mod pipeline;
pub mod repository;
pub mod startup;

pub use config::CleanupConfig;
pub use deleter::{
    BackgroundDeleter, BackgroundTask, DeferredDispatcher, DeletionOutcome, Dispatcher,
    TokioDispatcher,
};
pub use error::{CleanupError, Result};
pub use filter::PathFilter;
pub use guard::{ExecutionGuard, ExecutionPermit};
pub use pipeline::{CleanupOutcome, QuarantineBatch, STAGING_PREFIX, UpgradeContentCleanup};
pub use repository::{FsRepository, InMemoryRepository, Repository, RepositoryError, Session};
pub use startup::StartupHandler;
