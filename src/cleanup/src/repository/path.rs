//! Helpers for absolute, slash-separated node paths.

use super::{RepositoryError, RepositoryResult};

pub const ROOT: &str = "/";

/// Reject anything that is not a normalized absolute node path.
pub fn validate(path: &str) -> RepositoryResult<()> {
    if path == ROOT {
        return Ok(());
    }
    let valid = path.starts_with('/')
        && !path.ends_with('/')
        && path[1..]
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(RepositoryError::InvalidPath(path.to_string()))
    }
}

/// Validate a single path segment used as a node name.
pub fn validate_name(name: &str) -> RepositoryResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        Err(RepositoryError::InvalidPath(name.to_string()))
    } else {
        Ok(())
    }
}

pub fn join(parent: &str, name: &str) -> String {
    if parent == ROOT {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Parent of `path`, `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// True if `path` lies strictly below `ancestor`.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == ROOT {
        return path != ROOT && path.starts_with('/');
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Last segment of `path`, empty for the root.
pub fn name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}
