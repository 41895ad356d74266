use thiserror::Error;

use crate::github::GitHubError;
use crate::store::StoreError;

/// Why a top-level traversal was aborted.
///
/// Every variant aborts the whole repository or organization download and
/// rolls the store back; nothing is skipped per entity.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// A page could not be fetched, after the client's own retries.
    #[error("Failed to fetch {context}: {source}")]
    Fetch {
        context: String,
        #[source]
        source: GitHubError,
    },

    /// The store rejected a save or a lifecycle call.
    #[error("Failed to store {context}: {source}")]
    Store {
        context: String,
        #[source]
        source: StoreError,
    },
}

impl DownloadError {
    pub fn fetch(context: impl Into<String>, source: GitHubError) -> Self {
        Self::Fetch {
            context: context.into(),
            source,
        }
    }

    pub fn store(context: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            context: context.into(),
            source,
        }
    }

    /// A save referenced a parent missing from the generation. This means the
    /// traversal order is broken, not that anything transient happened.
    pub fn is_ordering_violation(&self) -> bool {
        matches!(self, Self::Store { source, .. } if source.is_not_found())
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}

/// Result type alias for download operations.
pub type Result<T> = std::result::Result<T, DownloadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_error_kinds() {
        let fetch = DownloadError::fetch("issues", GitHubError::api(502, "bad gateway"));
        assert!(fetch.is_fetch());
        assert!(!fetch.is_ordering_violation());

        let ordering = DownloadError::store(
            "pull request comment",
            StoreError::pull_request_not_found("src-d", "go-git", 7),
        );
        assert!(ordering.is_ordering_violation());
        assert_eq!(
            ordering.to_string(),
            "Failed to store pull request comment: Not found: pull request src-d/go-git#7"
        );

        let sink = DownloadError::store("commit", StoreError::NoTransaction);
        assert!(!sink.is_ordering_violation());
        assert!(!sink.is_fetch());
    }
}
