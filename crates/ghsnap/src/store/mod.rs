//! Storage sinks for downloaded metadata.
//!
//! The downloader depends only on [`MetadataStore`]. Three backends implement
//! it with different guarantees:
//!
//! - [`DbStore`] - durable, transactional, generation-tagged rows with an
//!   atomic active-generation pointer.
//! - [`TraceStore`] - writes a human-readable line per save; every lifecycle
//!   call is a no-op. Used for dry runs.
//! - [`MemStore`] - accumulates pull requests into an in-process map for a
//!   single short-lived run; lifecycle calls are no-ops.

use async_trait::async_trait;

use crate::github::types::{
    IssueComment, IssueFields, OrganizationFields, PullRequestFields, PullRequestReviewComment,
    PullRequestReviewFields, RepositoryFields, UserExtended,
};

pub mod db;
pub mod errors;
pub mod mem;
pub mod query;
pub mod trace;

pub use db::DbStore;
pub use errors::{Result, StoreError};
pub use mem::{MemStore, PullRequestEntry, Repo, ReviewEntry};
pub use trace::TraceStore;

/// Capability interface of a generation-aware metadata sink.
///
/// A download calls [`begin`](Self::begin) with its generation, then the save
/// methods in parent-before-child order, then [`commit`](Self::commit) or
/// [`rollback`](Self::rollback). The generation is bound to the transaction:
/// every save until `commit`/`rollback` is tagged with it, and a second
/// `begin` cannot change it. Saves are idempotent per entity id within a
/// generation. A save whose parent is not present in the same generation
/// fails with [`StoreError::NotFound`].
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn save_organization(&self, organization: &OrganizationFields) -> Result<()>;

    async fn save_user(&self, user: &UserExtended) -> Result<()>;

    async fn save_repository(&self, repository: &RepositoryFields, topics: &[String])
    -> Result<()>;

    async fn save_issue(
        &self,
        owner: &str,
        name: &str,
        issue: &IssueFields,
        assignees: &[String],
        labels: &[String],
    ) -> Result<()>;

    async fn save_issue_comment(
        &self,
        owner: &str,
        name: &str,
        issue_number: i64,
        comment: &IssueComment,
    ) -> Result<()>;

    async fn save_pull_request(
        &self,
        owner: &str,
        name: &str,
        pull_request: &PullRequestFields,
        assignees: &[String],
        labels: &[String],
    ) -> Result<()>;

    async fn save_pull_request_comment(
        &self,
        owner: &str,
        name: &str,
        pull_request_number: i64,
        comment: &IssueComment,
    ) -> Result<()>;

    async fn save_pull_request_review(
        &self,
        owner: &str,
        name: &str,
        pull_request_number: i64,
        review: &PullRequestReviewFields,
    ) -> Result<()>;

    /// `review_id` is the parent review's `databaseId`.
    async fn save_pull_request_review_comment(
        &self,
        owner: &str,
        name: &str,
        pull_request_number: i64,
        review_id: i64,
        comment: &PullRequestReviewComment,
    ) -> Result<()>;

    /// Open the transaction for generation `version`.
    async fn begin(&self, version: i32) -> Result<()>;

    async fn commit(&self) -> Result<()>;

    /// Discard everything saved since `begin`.
    async fn rollback(&self) -> Result<()>;

    /// Publish `version` as the generation readers see by default.
    async fn set_active_version(&self, version: i32) -> Result<()>;

    /// Remove every committed generation except `current_version` and the
    /// active one. Generations still being written are left alone.
    async fn cleanup(&self, current_version: i32) -> Result<()>;
}

// ---------- Test-only recording store ----------

#[cfg(test)]
use std::sync::Mutex;

/// Records every call as a short line, optionally failing on one of them.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingStore {
    events: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

#[cfg(test)]
impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail (with `NotFound`) when a call renders exactly as `event`.
    pub fn failing_on(event: &str) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_on: Some(event.to_string()),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Only the save calls, without lifecycle events.
    pub fn saves(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| {
                !matches!(e.as_str(), "commit" | "rollback") && !e.starts_with("begin ")
            })
            .collect()
    }

    fn record(&self, event: String) -> Result<()> {
        if self.fail_on.as_deref() == Some(event.as_str()) {
            return Err(StoreError::NotFound { context: event });
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[cfg(test)]
#[async_trait]
impl MetadataStore for RecordingStore {
    async fn save_organization(&self, organization: &OrganizationFields) -> Result<()> {
        self.record(format!("organization {}", organization.login))
    }

    async fn save_user(&self, user: &UserExtended) -> Result<()> {
        self.record(format!("user {}", user.login))
    }

    async fn save_repository(
        &self,
        repository: &RepositoryFields,
        topics: &[String],
    ) -> Result<()> {
        self.record(format!(
            "repository {} [{}]",
            repository.name_with_owner,
            topics.join(",")
        ))
    }

    async fn save_issue(
        &self,
        _owner: &str,
        _name: &str,
        issue: &IssueFields,
        assignees: &[String],
        labels: &[String],
    ) -> Result<()> {
        self.record(format!(
            "issue #{} assignees=[{}] labels=[{}]",
            issue.number,
            assignees.join(","),
            labels.join(",")
        ))
    }

    async fn save_issue_comment(
        &self,
        _owner: &str,
        _name: &str,
        issue_number: i64,
        comment: &IssueComment,
    ) -> Result<()> {
        self.record(format!("issue comment #{issue_number} {}", comment.id))
    }

    async fn save_pull_request(
        &self,
        _owner: &str,
        _name: &str,
        pull_request: &PullRequestFields,
        assignees: &[String],
        labels: &[String],
    ) -> Result<()> {
        self.record(format!(
            "pr #{} assignees=[{}] labels=[{}]",
            pull_request.number,
            assignees.join(","),
            labels.join(",")
        ))
    }

    async fn save_pull_request_comment(
        &self,
        _owner: &str,
        _name: &str,
        pull_request_number: i64,
        comment: &IssueComment,
    ) -> Result<()> {
        self.record(format!("pr comment #{pull_request_number} {}", comment.id))
    }

    async fn save_pull_request_review(
        &self,
        _owner: &str,
        _name: &str,
        pull_request_number: i64,
        review: &PullRequestReviewFields,
    ) -> Result<()> {
        self.record(format!(
            "review #{pull_request_number} {}",
            review.database_id
        ))
    }

    async fn save_pull_request_review_comment(
        &self,
        _owner: &str,
        _name: &str,
        pull_request_number: i64,
        review_id: i64,
        comment: &PullRequestReviewComment,
    ) -> Result<()> {
        self.record(format!(
            "review comment #{pull_request_number}/{review_id} {}",
            comment.id
        ))
    }

    async fn begin(&self, version: i32) -> Result<()> {
        self.record(format!("begin {version}"))
    }

    async fn commit(&self) -> Result<()> {
        self.record("commit".to_string())
    }

    async fn rollback(&self) -> Result<()> {
        self.record("rollback".to_string())
    }

    async fn set_active_version(&self, version: i32) -> Result<()> {
        self.record(format!("activate {version}"))
    }

    async fn cleanup(&self, current_version: i32) -> Result<()> {
        self.record(format!("cleanup {current_version}"))
    }
}
