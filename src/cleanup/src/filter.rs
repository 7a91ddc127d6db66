//! Whitelist of node paths the cleanup may remove.

use regex::Regex;

use crate::error::{CleanupError, Result};

/// Ordered set of compiled path patterns.
///
/// A path is removable only if it matches one of the patterns in full.
/// An empty filter removes nothing.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    expressions: Vec<String>,
    patterns: Vec<Regex>,
}

impl PathFilter {
    /// Compile `expressions` in order, failing on the first invalid one.
    pub fn compile<I, S>(expressions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filter = Self::default();
        for expression in expressions {
            let expression = expression.into();
            let invalid = |source| CleanupError::InvalidPattern {
                pattern: expression.clone(),
                source,
            };
            // check the expression on its own, the anchoring group could
            // otherwise balance a stray parenthesis
            Regex::new(&expression).map_err(invalid)?;
            let pattern = Regex::new(&format!("^(?:{expression})$")).map_err(invalid)?;
            filter.expressions.push(expression);
            filter.patterns.push(pattern);
        }
        Ok(filter)
    }

    /// The patterns as configured.
    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_removable(&self, path: &str) -> bool {
        let hit = self
            .patterns
            .iter()
            .zip(&self.expressions)
            .find(|(pattern, _)| pattern.is_match(path));

        match hit {
            Some((_, expression)) => {
                tracing::debug!(path = %path, pattern = %expression, "Path matches, ok to remove");
                true
            }
            None => {
                tracing::debug!(path = %path, "Path does not match any pattern, won't remove");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_match_only() {
        let filter = PathFilter::compile(["/etc/.*"]).unwrap();

        assert!(filter.is_removable("/etc/old"));
        assert!(filter.is_removable("/etc/old/deep/node"));
        assert!(!filter.is_removable("/content/etc/old"));
        assert!(!filter.is_removable("/etc"));
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let filter = PathFilter::compile(["/a|/b"]).unwrap();

        assert!(filter.is_removable("/a"));
        assert!(filter.is_removable("/b"));
        assert!(!filter.is_removable("/a/x"));
        assert!(!filter.is_removable("/x/b"));
    }

    #[test]
    fn test_any_pattern_matches() {
        let filter = PathFilter::compile(["/var/cache/[^/]+", "/etc/old"]).unwrap();

        assert!(filter.is_removable("/var/cache/thumbs"));
        assert!(filter.is_removable("/etc/old"));
        assert!(!filter.is_removable("/var/cache/thumbs/1"));
        assert!(!filter.is_removable("/etc/old/x"));
    }

    #[test]
    fn test_empty_filter_removes_nothing() {
        let filter = PathFilter::compile(Vec::<String>::new()).unwrap();

        assert!(filter.is_empty());
        assert!(!filter.is_removable("/"));
        assert!(!filter.is_removable("/etc/old"));
        assert!(!filter.is_removable(""));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = PathFilter::compile(["/etc/.*", "/var/(unclosed"]).unwrap_err();

        match err {
            CleanupError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "/var/(unclosed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_stray_parenthesis_is_rejected() {
        for expression in ["/etc/x)|(.*", "/etc/x)(.*"] {
            let err = PathFilter::compile([expression]).unwrap_err();
            match err {
                CleanupError::InvalidPattern { pattern, .. } => assert_eq!(pattern, expression),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_expressions_keep_configuration_order() {
        let filter = PathFilter::compile(["/b/.*", "/a/.*"]).unwrap();
        assert_eq!(filter.expressions(), ["/b/.*", "/a/.*"]);
    }
}
