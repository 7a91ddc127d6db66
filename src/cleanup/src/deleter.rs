//! Fire-and-forget removal of quarantine folders.
//!
//! Deletion of a large subtree can take a long time, so the pipeline hands it
//! to a [`Dispatcher`] and returns. Failures end up in the log and nowhere
//! else; an operator has to clean up by hand if a deletion fails.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::{Instrument, info, warn};

use crate::repository::{Repository, RepositoryResult, ScopedSession};

/// Detached unit of work handed to a [`Dispatcher`].
pub type BackgroundTask = BoxFuture<'static, ()>;

/// Schedules background tasks without waiting for them.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, name: String, task: BackgroundTask);
}

/// Runs each task on the tokio runtime.
///
/// Handles are kept so a host can [`drain`](TokioDispatcher::drain) them
/// before it exits; nothing in the cleanup ever awaits them.
#[derive(Debug, Default)]
pub struct TokioDispatcher {
    handles: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl TokioDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for every task dispatched so far.
    pub async fn drain(&self) {
        let handles = std::mem::take(
            &mut *self
                .handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for (name, handle) in handles {
            if let Err(e) = handle.await {
                warn!(task = %name, error = %e, "Background task did not complete");
            }
        }
    }
}

impl Dispatcher for TokioDispatcher {
    fn dispatch(&self, name: String, task: BackgroundTask) {
        let span = tracing::info_span!("background_task", task = %name);
        let handle = tokio::spawn(task.instrument(span));
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name, handle));
    }
}

/// Queues tasks until the host decides to run them.
#[derive(Default)]
pub struct DeferredDispatcher {
    queue: Mutex<Vec<(String, BackgroundTask)>>,
}

impl DeferredDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the tasks waiting to run.
    pub fn pending(&self) -> Vec<String> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Run queued tasks one after another, returns how many ran.
    pub async fn run_all(&self) -> usize {
        let tasks = std::mem::take(
            &mut *self
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let count = tasks.len();
        for (name, task) in tasks {
            task.instrument(tracing::info_span!("background_task", task = %name))
                .await;
        }
        count
    }
}

impl Dispatcher for DeferredDispatcher {
    fn dispatch(&self, name: String, task: BackgroundTask) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name, task));
    }
}

/// How a deletion attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    /// Already removed, or never created
    NotFound,
    Failed,
}

/// Removes a quarantine folder in its own administrative session.
#[derive(Clone)]
pub struct BackgroundDeleter {
    repository: Arc<dyn Repository>,
}

impl BackgroundDeleter {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Hand the deletion of `path` to `dispatcher` and return immediately.
    pub fn spawn(self, dispatcher: &dyn Dispatcher, path: String) {
        info!(path = %path, "Starting background job to delete");
        let name = format!("Delete {path}");
        dispatcher.dispatch(
            name,
            Box::pin(async move {
                self.delete(&path).await;
            }),
        );
    }

    /// Delete `path` now. Never fails; the outcome is only informational.
    pub async fn delete(&self, path: &str) -> DeletionOutcome {
        match self.remove_subtree(path).await {
            Ok(true) => {
                info!(path = %path, "Deleted");
                DeletionOutcome::Deleted
            }
            Ok(false) => {
                warn!(path = %path, "Path to delete not found");
                DeletionOutcome::NotFound
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Exception while deleting");
                DeletionOutcome::Failed
            }
        }
    }

    async fn remove_subtree(&self, path: &str) -> RepositoryResult<bool> {
        let mut session = ScopedSession::new(self.repository.login_administrative().await?);
        if !session.node_exists(path).await? {
            return Ok(false);
        }
        session.remove_node(path).await?;
        session.save().await?;
        Ok(true)
    }
}
