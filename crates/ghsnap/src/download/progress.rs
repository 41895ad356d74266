//! Progress events for download runs.
//!
//! The downloader, the GitHub client's retry loop, and the generation
//! management calls all report through the same callback so a front end can
//! render one consistent view of a run.

/// Progress events emitted while downloading and publishing generations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum DownloadProgress {
    /// Starting a repository traversal.
    RepositoryStarted {
        owner: String,
        name: String,
        version: i32,
    },

    /// Repository fields and topics were saved.
    RepositorySaved {
        owner: String,
        name: String,
        topics: usize,
    },

    /// An issue and its comments were saved.
    IssueSaved {
        owner: String,
        name: String,
        number: i64,
        comments: usize,
    },

    /// A pull request and its comments, reviews and review comments were saved.
    PullRequestSaved {
        owner: String,
        name: String,
        number: i64,
        comments: usize,
        reviews: usize,
    },

    /// A follow-up page of some connection was fetched.
    PageFetched {
        /// Human-readable connection name, e.g. `"issue comments"`.
        connection: &'static str,
        /// Number of nodes on the page.
        count: usize,
    },

    /// The repository traversal committed.
    RepositoryFinished {
        owner: String,
        name: String,
        version: i32,
        issues: usize,
        pull_requests: usize,
    },

    /// The repository traversal failed and was rolled back.
    RepositoryFailed {
        owner: String,
        name: String,
        error: String,
    },

    /// Starting an organization traversal.
    OrganizationStarted { login: String, version: i32 },

    /// One organization member was saved.
    MemberSaved { login: String },

    /// The organization traversal committed.
    OrganizationFinished {
        login: String,
        version: i32,
        members: usize,
    },

    /// The organization traversal failed and was rolled back.
    OrganizationFailed { login: String, error: String },

    /// A request failed with a retryable error and will be retried.
    RetryBackoff {
        /// What was being attempted.
        operation: String,
        /// How long until the next attempt.
        retry_after_ms: u64,
        /// Attempt number that failed (1-indexed).
        attempt: u32,
    },

    /// A generation became the active one.
    Activated { version: i32 },

    /// Generations other than `version` (and the active one) were removed.
    CleanedUp { version: i32 },
}

/// Callback invoked for each progress event.
pub type ProgressCallback = Box<dyn Fn(DownloadProgress) + Send + Sync>;

/// Invoke the callback if one is registered.
#[inline]
pub fn emit(callback: Option<&ProgressCallback>, event: DownloadProgress) {
    if let Some(cb) = callback {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn emit_without_callback_is_a_no_op() {
        emit(None, DownloadProgress::Activated { version: 3 });
    }

    #[test]
    fn emit_forwards_event_to_callback() {
        let seen: Arc<Mutex<Vec<DownloadProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let capture = Arc::clone(&seen);
        let callback: ProgressCallback = Box::new(move |event| {
            capture.lock().unwrap().push(event);
        });

        emit(Some(&callback), DownloadProgress::CleanedUp { version: 9 });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], DownloadProgress::CleanedUp { version: 9 }));
    }
}
