use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;

use super::path::{self, ROOT};
use super::query::{Scope, SelectionQuery};
use super::{NodePaths, Repository, RepositoryError, RepositoryResult, Session};

/// Content repository backed by a directory tree.
///
/// Node `/a/b` is the entry `a/b` below the root directory. The filesystem
/// offers no transactions: changes take effect immediately and `save` has
/// nothing left to flush.
#[derive(Debug, Clone)]
pub struct FsRepository {
    root: PathBuf,
}

impl FsRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root directory if needed and return the repository.
    pub async fn open(root: impl Into<PathBuf>) -> RepositoryResult<Self> {
        let repository = Self::new(root);
        tokio::fs::create_dir_all(&repository.root)
            .await
            .map_err(|source| RepositoryError::Io {
                path: repository.root.display().to_string(),
                source,
            })?;
        Ok(repository)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Repository for FsRepository {
    async fn login_administrative(&self) -> RepositoryResult<Box<dyn Session>> {
        Ok(Box::new(FsSession {
            root: self.root.clone(),
            live: true,
        }))
    }
}

fn io_error(node: &str, source: io::Error) -> RepositoryError {
    match source.kind() {
        io::ErrorKind::NotFound => RepositoryError::NotFound(node.to_string()),
        io::ErrorKind::AlreadyExists => RepositoryError::AlreadyExists(node.to_string()),
        _ => RepositoryError::Io {
            path: node.to_string(),
            source,
        },
    }
}

pub struct FsSession {
    root: PathBuf,
    live: bool,
}

impl FsSession {
    fn ensure_live(&self) -> RepositoryResult<()> {
        if self.live {
            Ok(())
        } else {
            Err(RepositoryError::SessionClosed)
        }
    }

    fn resolve(&self, node: &str) -> RepositoryResult<PathBuf> {
        path::validate(node)?;
        if node == ROOT {
            Ok(self.root.clone())
        } else {
            Ok(self.root.join(&node[1..]))
        }
    }

    /// Entry type without following symlinks, `None` if absent.
    async fn entry_type(&self, node: &str) -> RepositoryResult<Option<std::fs::FileType>> {
        match tokio::fs::symlink_metadata(self.resolve(node)?).await {
            Ok(meta) => Ok(Some(meta.file_type())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(node, e)),
        }
    }

    async fn children(&self, node: &str) -> RepositoryResult<Vec<(String, bool)>> {
        let mut entries = match tokio::fs::read_dir(self.resolve(node)?).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(node, e)),
        };

        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(node, e))? {
            let Ok(name) = entry.file_name().into_string() else {
                tracing::debug!(parent = %node, "Skipping entry with non UTF-8 name");
                continue;
            };
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| io_error(node, e))?
                .is_dir();
            children.push((path::join(node, &name), is_dir));
        }
        children.sort();
        Ok(children)
    }
}

#[async_trait]
impl Session for FsSession {
    async fn node_exists(&self, node: &str) -> RepositoryResult<bool> {
        self.ensure_live()?;
        Ok(self.entry_type(node).await?.is_some())
    }

    async fn add_node(&mut self, parent: &str, name: &str) -> RepositoryResult<String> {
        self.ensure_live()?;
        path::validate_name(name)?;
        match self.entry_type(parent).await? {
            Some(kind) if kind.is_dir() => {}
            _ => return Err(RepositoryError::NotFound(parent.to_string())),
        }
        let child = path::join(parent, name);
        tokio::fs::create_dir(self.resolve(&child)?)
            .await
            .map_err(|e| io_error(&child, e))?;
        Ok(child)
    }

    async fn move_node(&mut self, from: &str, to: &str) -> RepositoryResult<()> {
        self.ensure_live()?;
        if from == ROOT || self.entry_type(from).await?.is_none() {
            return Err(RepositoryError::NotFound(from.to_string()));
        }
        if self.entry_type(to).await?.is_some() {
            return Err(RepositoryError::AlreadyExists(to.to_string()));
        }
        if path::is_descendant(to, from) {
            return Err(RepositoryError::InvalidPath(to.to_string()));
        }
        let parent = path::parent(to).unwrap_or(ROOT);
        match self.entry_type(parent).await? {
            Some(kind) if kind.is_dir() => {}
            _ => return Err(RepositoryError::NotFound(parent.to_string())),
        }
        tokio::fs::rename(self.resolve(from)?, self.resolve(to)?)
            .await
            .map_err(|e| io_error(from, e))
    }

    async fn remove_node(&mut self, node: &str) -> RepositoryResult<()> {
        self.ensure_live()?;
        if node == ROOT {
            return Err(RepositoryError::InvalidPath(node.to_string()));
        }
        let target = self.resolve(node)?;
        let result = match self.entry_type(node).await? {
            None => return Err(RepositoryError::NotFound(node.to_string())),
            Some(kind) if kind.is_dir() => tokio::fs::remove_dir_all(&target).await,
            Some(_) => tokio::fs::remove_file(&target).await,
        };
        result.map_err(|e| io_error(node, e))
    }

    async fn save(&mut self) -> RepositoryResult<()> {
        self.ensure_live()
    }

    async fn query(&self, statement: &str, dialect: &str) -> RepositoryResult<NodePaths> {
        self.ensure_live()?;
        let query = SelectionQuery::parse(statement, dialect)?;

        // depth-first, pre-order, siblings sorted by name
        let mut found = Vec::new();
        let mut stack = self.children(&query.root).await?;
        stack.reverse();
        while let Some((node, is_dir)) = stack.pop() {
            if query.matches(&node) {
                found.push(node.clone());
            }
            if is_dir && query.scope == Scope::Descendants {
                let mut children = self.children(&node).await?;
                children.reverse();
                stack.extend(children);
            }
        }

        Ok(stream::iter(found.into_iter().map(Ok)).boxed())
    }

    fn logout(&mut self) {
        self.live = false;
    }
}
