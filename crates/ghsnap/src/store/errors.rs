use sea_orm::DbErr;
use thiserror::Error;

/// Errors that can occur while writing to or reading from a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sea-orm.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// A save referenced a parent that is not present in the current
    /// generation.
    #[error("Not found: {context}")]
    NotFound { context: String },

    /// A save or commit was attempted outside of `begin`/`commit`.
    #[error("No transaction in progress")]
    NoTransaction,

    /// `begin` was called while another download is open on this store.
    #[error("A transaction is already in progress")]
    TransactionInProgress,

    /// Writing trace output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Repository missing from the generation.
    pub fn repository_not_found(owner: &str, name: &str) -> Self {
        Self::NotFound {
            context: format!("repository {owner}/{name}"),
        }
    }

    /// Issue missing from the generation.
    pub fn issue_not_found(owner: &str, name: &str, number: i64) -> Self {
        Self::NotFound {
            context: format!("issue {owner}/{name}#{number}"),
        }
    }

    /// Pull request missing from the generation.
    pub fn pull_request_not_found(owner: &str, name: &str, number: i64) -> Self {
        Self::NotFound {
            context: format!("pull request {owner}/{name}#{number}"),
        }
    }

    /// Review missing from the generation.
    pub fn review_not_found(owner: &str, name: &str, number: i64, review_id: i64) -> Self {
        Self::NotFound {
            context: format!("review {review_id} on pull request {owner}/{name}#{number}"),
        }
    }

    /// Whether this is the parent-missing condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_helpers_render_context() {
        let err = StoreError::pull_request_not_found("src-d", "go-git", 7);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: pull request src-d/go-git#7");

        let err = StoreError::review_not_found("src-d", "go-git", 7, 99);
        assert_eq!(
            err.to_string(),
            "Not found: review 99 on pull request src-d/go-git#7"
        );
        assert!(!StoreError::NoTransaction.is_not_found());
    }
}
