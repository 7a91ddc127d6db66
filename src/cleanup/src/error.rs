use crate::repository::RepositoryError;

/// Errors raised by the cleanup component
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("Invalid deletable path pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("No selection query configured, it is required in update mode")]
    MissingQuery,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type Result<T> = std::result::Result<T, CleanupError>;
