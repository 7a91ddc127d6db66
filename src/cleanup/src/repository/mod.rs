//! Content repository capability consumed by the cleanup.
//!
//! The cleanup never constructs a repository itself; the host hands one in.
//! Two backends ship with the crate:
//!
//! - `memory`: a transactional in-memory node tree, used by tests and embedders
//! - `fs`: nodes mapped onto a directory tree on local disk
//!
//! Both understand the same small subset of JCR-SQL2, see [`query`].

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::ops::{Deref, DerefMut};

pub mod fs;
pub mod memory;
pub mod path;
pub mod query;

pub use fs::FsRepository;
pub use memory::InMemoryRepository;

/// Query language the cleanup issues its selection query in.
pub const QUERY_DIALECT: &str = "JCR-SQL2";

/// Error types that can occur during repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Node already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid node path: {0}")]
    InvalidPath(String),

    #[error("Unsupported {dialect} query: {statement}")]
    UnsupportedQuery { dialect: String, statement: String },

    #[error("Session is no longer live")]
    SessionClosed,

    #[error("Failed to persist changes: {0}")]
    Conflict(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Forward-only sequence of node paths produced by a query.
pub type NodePaths = BoxStream<'static, RepositoryResult<String>>;

/// Entry point to a content repository.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    /// Open a session with administrative privileges.
    async fn login_administrative(&self) -> RepositoryResult<Box<dyn Session>>;
}

/// A unit of work against the repository.
///
/// Changes made through a session become durable on [`Session::save`];
/// whether they are visible to other sessions before that depends on the
/// backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Session: Send + Sync {
    async fn node_exists(&self, path: &str) -> RepositoryResult<bool>;

    /// Create `name` below `parent` and return the path of the new node.
    async fn add_node(&mut self, parent: &str, name: &str) -> RepositoryResult<String>;

    /// Move (rename) the subtree at `from` to `to`. `to` must not exist yet.
    async fn move_node(&mut self, from: &str, to: &str) -> RepositoryResult<()>;

    /// Remove the subtree rooted at `path`.
    async fn remove_node(&mut self, path: &str) -> RepositoryResult<()>;

    /// Commit pending changes.
    async fn save(&mut self) -> RepositoryResult<()>;

    /// Run `statement` in `dialect` and stream the paths of matching nodes.
    async fn query(&self, statement: &str, dialect: &str) -> RepositoryResult<NodePaths>;

    /// Release the session. Unsaved changes are discarded.
    fn logout(&mut self);
}

/// Session that is logged out when dropped, on every exit path.
pub struct ScopedSession {
    inner: Box<dyn Session>,
}

impl ScopedSession {
    pub fn new(inner: Box<dyn Session>) -> Self {
        Self { inner }
    }
}

impl Deref for ScopedSession {
    type Target = dyn Session;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DerefMut for ScopedSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.as_mut()
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        self.inner.logout();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_session_logs_out_on_drop() {
        let mut session = MockSession::new();
        session.expect_logout().times(1).return_const(());

        let scoped = ScopedSession::new(Box::new(session));
        drop(scoped);
    }

    #[tokio::test]
    async fn test_scoped_session_forwards_calls() {
        let mut session = MockSession::new();
        session
            .expect_node_exists()
            .withf(|path| path == "/tmp")
            .times(1)
            .returning(|_| Ok(true));
        session.expect_logout().times(1).return_const(());

        let scoped = ScopedSession::new(Box::new(session));
        assert!(scoped.node_exists("/tmp").await.unwrap());
    }

    #[test]
    fn test_error_messages() {
        let err = RepositoryError::UnsupportedQuery {
            dialect: "xpath".to_string(),
            statement: "//element(*)".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported xpath query: //element(*)");
        assert_eq!(
            RepositoryError::NotFound("/a".to_string()).to_string(),
            "Node not found: /a"
        );
    }
}
