//! The JCR-SQL2 subset understood by the bundled backends.
//!
//! Supported statements select every node below a path, optionally narrowed
//! down by node name:
//!
//! ```text
//! SELECT * FROM [nt:base] AS n WHERE ISDESCENDANTNODE(n, '/etc/old')
//! SELECT * FROM [nt:base] WHERE ISCHILDNODE('/var/cache') AND NAME() = 'tmp'
//! ```
//!
//! The node type in brackets is accepted but not checked, nodes are untyped
//! in both backends.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{QUERY_DIALECT, RepositoryError, RepositoryResult, path};

static STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^\s*SELECT\s+\*\s+FROM\s+\[[^\]]+\](?:\s+AS\s+(?P<alias>\w+))?\s+WHERE\s+(?P<scope>ISDESCENDANTNODE|ISCHILDNODE)\s*\(\s*(?:(?P<scope_sel>\w+)\s*,\s*)?'(?P<path>[^']*)'\s*\)(?:\s+AND\s+NAME\s*\(\s*(?P<name_sel>\w+)?\s*\)\s*=\s*'(?P<name>[^']*)')?\s*$",
    )
    .expect("statement pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Any node strictly below the root
    Descendants,
    /// Direct children of the root only
    Children,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionQuery {
    pub scope: Scope,
    pub root: String,
    pub name: Option<String>,
}

impl SelectionQuery {
    pub fn parse(statement: &str, dialect: &str) -> RepositoryResult<Self> {
        let unsupported = || RepositoryError::UnsupportedQuery {
            dialect: dialect.to_string(),
            statement: statement.to_string(),
        };

        if !dialect.eq_ignore_ascii_case(QUERY_DIALECT) {
            return Err(unsupported());
        }

        let caps = STATEMENT.captures(statement).ok_or_else(unsupported)?;

        // selectors referenced in the constraint must be the declared alias
        if let Some(alias) = caps.name("alias") {
            for sel in [caps.name("scope_sel"), caps.name("name_sel")]
                .into_iter()
                .flatten()
            {
                if sel.as_str() != alias.as_str() {
                    return Err(unsupported());
                }
            }
        }

        let scope = if caps["scope"].eq_ignore_ascii_case("ISCHILDNODE") {
            Scope::Children
        } else {
            Scope::Descendants
        };

        let root = caps["path"].to_string();
        path::validate(&root)?;

        Ok(Self {
            scope,
            root,
            name: caps.name("name").map(|m| m.as_str().to_string()),
        })
    }

    /// True if the node at `node_path` is selected by this query.
    pub fn matches(&self, node_path: &str) -> bool {
        let in_scope = match self.scope {
            Scope::Descendants => path::is_descendant(node_path, &self.root),
            Scope::Children => path::parent(node_path) == Some(self.root.as_str()),
        };
        in_scope
            && self
                .name
                .as_deref()
                .is_none_or(|name| path::name(node_path) == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descendant_query_with_alias() {
        let query = SelectionQuery::parse(
            "SELECT * FROM [nt:base] AS n WHERE ISDESCENDANTNODE(n, '/etc/old')",
            "JCR-SQL2",
        )
        .unwrap();

        assert_eq!(query.scope, Scope::Descendants);
        assert_eq!(query.root, "/etc/old");
        assert_eq!(query.name, None);
    }

    #[test]
    fn test_parse_child_query_with_name() {
        let query = SelectionQuery::parse(
            "select * from [nt:unstructured] where ischildnode('/var/cache') and name() = 'tmp'",
            "jcr-sql2",
        )
        .unwrap();

        assert_eq!(query.scope, Scope::Children);
        assert_eq!(query.root, "/var/cache");
        assert_eq!(query.name.as_deref(), Some("tmp"));
    }

    #[test]
    fn test_unsupported_statements() {
        for statement in [
            "SELECT * FROM [nt:base]",
            "SELECT [jcr:path] FROM [nt:base] WHERE ISDESCENDANTNODE('/etc')",
            "DELETE FROM [nt:base] WHERE ISDESCENDANTNODE('/etc')",
            "SELECT * FROM [nt:base] AS n WHERE ISDESCENDANTNODE(m, '/etc')",
        ] {
            let err = SelectionQuery::parse(statement, "JCR-SQL2").unwrap_err();
            assert!(
                matches!(err, RepositoryError::UnsupportedQuery { .. }),
                "{statement} should be rejected, got {err}"
            );
        }
    }

    #[test]
    fn test_other_dialects_are_rejected() {
        let err = SelectionQuery::parse("/jcr:root/etc//*", "xpath").unwrap_err();
        assert!(matches!(err, RepositoryError::UnsupportedQuery { .. }));
    }

    #[test]
    fn test_invalid_root_path() {
        let err = SelectionQuery::parse(
            "SELECT * FROM [nt:base] WHERE ISDESCENDANTNODE('etc/')",
            "JCR-SQL2",
        )
        .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidPath(_)));
    }

    #[test]
    fn test_matches() {
        let descendants = SelectionQuery {
            scope: Scope::Descendants,
            root: "/etc".to_string(),
            name: None,
        };
        assert!(descendants.matches("/etc/a"));
        assert!(descendants.matches("/etc/a/b"));
        assert!(!descendants.matches("/etc"));
        assert!(!descendants.matches("/etcetera"));

        let named_children = SelectionQuery {
            scope: Scope::Children,
            root: "/etc".to_string(),
            name: Some("old".to_string()),
        };
        assert!(named_children.matches("/etc/old"));
        assert!(!named_children.matches("/etc/new"));
        assert!(!named_children.matches("/etc/a/old"));
    }
}
