use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tokio::sync::RwLock;

use super::path::{self, ROOT};
use super::query::SelectionQuery;
use super::{NodePaths, Repository, RepositoryError, RepositoryResult, Session};

/// Every node path in the tree except the root, which always exists.
type Tree = BTreeSet<String>;

/// In-memory content repository.
///
/// Each session works on a snapshot taken at login. Changes are recorded and
/// replayed atomically against the shared tree on save, so other sessions
/// never observe unsaved state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    nodes: Arc<RwLock<Tree>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository holding `paths`; missing ancestors are created too.
    pub fn with_nodes<I, S>(paths: I) -> RepositoryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Tree::new();
        for node in paths {
            let node = node.as_ref();
            path::validate(node)?;
            let mut current = Some(node);
            while let Some(p) = current.filter(|p| *p != ROOT) {
                tree.insert(p.to_string());
                current = path::parent(p);
            }
        }
        Ok(Self {
            nodes: Arc::new(RwLock::new(tree)),
        })
    }

    /// Committed node paths in document order.
    pub async fn paths(&self) -> Vec<String> {
        self.nodes.read().await.iter().cloned().collect()
    }

    /// True if `node` exists in committed state.
    pub async fn contains(&self, node: &str) -> bool {
        exists(&*self.nodes.read().await, node)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn login_administrative(&self) -> RepositoryResult<Box<dyn Session>> {
        let view = self.nodes.read().await.clone();
        Ok(Box::new(InMemorySession {
            shared: Arc::clone(&self.nodes),
            view,
            pending: Vec::new(),
            live: true,
        }))
    }
}

#[derive(Debug, Clone)]
enum Change {
    Add { parent: String, name: String },
    Move { from: String, to: String },
    Remove { path: String },
}

fn exists(tree: &Tree, node: &str) -> bool {
    node == ROOT || tree.contains(node)
}

fn subtree(tree: &Tree, root: &str) -> Vec<String> {
    tree.range(root.to_string()..)
        .take_while(|p| p.starts_with(root))
        .filter(|p| p.as_str() == root || path::is_descendant(p, root))
        .cloned()
        .collect()
}

fn apply(tree: &mut Tree, change: &Change) -> RepositoryResult<()> {
    match change {
        Change::Add { parent, name } => {
            if !exists(tree, parent) {
                return Err(RepositoryError::NotFound(parent.clone()));
            }
            let child = path::join(parent, name);
            if exists(tree, &child) {
                return Err(RepositoryError::AlreadyExists(child));
            }
            tree.insert(child);
        }
        Change::Move { from, to } => {
            if from == ROOT || !exists(tree, from) {
                return Err(RepositoryError::NotFound(from.clone()));
            }
            if exists(tree, to) {
                return Err(RepositoryError::AlreadyExists(to.clone()));
            }
            if path::is_descendant(to, from) {
                return Err(RepositoryError::InvalidPath(to.clone()));
            }
            let parent = path::parent(to).unwrap_or(ROOT);
            if !exists(tree, parent) {
                return Err(RepositoryError::NotFound(parent.to_string()));
            }
            for old in subtree(tree, from) {
                tree.remove(&old);
                tree.insert(format!("{to}{}", &old[from.len()..]));
            }
        }
        Change::Remove { path } => {
            if path == ROOT || !exists(tree, path) {
                return Err(RepositoryError::NotFound(path.clone()));
            }
            for old in subtree(tree, path) {
                tree.remove(&old);
            }
        }
    }
    Ok(())
}

pub struct InMemorySession {
    shared: Arc<RwLock<Tree>>,
    view: Tree,
    pending: Vec<Change>,
    live: bool,
}

impl InMemorySession {
    fn ensure_live(&self) -> RepositoryResult<()> {
        if self.live {
            Ok(())
        } else {
            Err(RepositoryError::SessionClosed)
        }
    }

    fn record(&mut self, change: Change) -> RepositoryResult<()> {
        self.ensure_live()?;
        apply(&mut self.view, &change)?;
        self.pending.push(change);
        Ok(())
    }
}

#[async_trait]
impl Session for InMemorySession {
    async fn node_exists(&self, node: &str) -> RepositoryResult<bool> {
        self.ensure_live()?;
        path::validate(node)?;
        Ok(exists(&self.view, node))
    }

    async fn add_node(&mut self, parent: &str, name: &str) -> RepositoryResult<String> {
        path::validate(parent)?;
        path::validate_name(name)?;
        self.record(Change::Add {
            parent: parent.to_string(),
            name: name.to_string(),
        })?;
        Ok(path::join(parent, name))
    }

    async fn move_node(&mut self, from: &str, to: &str) -> RepositoryResult<()> {
        path::validate(from)?;
        path::validate(to)?;
        self.record(Change::Move {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    async fn remove_node(&mut self, node: &str) -> RepositoryResult<()> {
        path::validate(node)?;
        self.record(Change::Remove {
            path: node.to_string(),
        })
    }

    async fn save(&mut self) -> RepositoryResult<()> {
        self.ensure_live()?;
        let mut shared = self.shared.write().await;
        let mut next = shared.clone();
        for change in &self.pending {
            apply(&mut next, change).map_err(|e| RepositoryError::Conflict(e.to_string()))?;
        }
        *shared = next;
        self.pending.clear();
        self.view = shared.clone();
        Ok(())
    }

    async fn query(&self, statement: &str, dialect: &str) -> RepositoryResult<NodePaths> {
        self.ensure_live()?;
        let query = SelectionQuery::parse(statement, dialect)?;
        let matches: Vec<String> = self
            .view
            .iter()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        Ok(stream::iter(matches.into_iter().map(Ok)).boxed())
    }

    fn logout(&mut self) {
        self.live = false;
        self.pending.clear();
        self.view.clear();
    }
}
