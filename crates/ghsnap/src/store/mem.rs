//! Transient in-process store.
//!
//! Repositories and their pull request subgraphs are accumulated into one
//! mutex-guarded map keyed by owner, then name, then pull request number.
//! There is no transaction or generation support: every lifecycle call is a
//! no-op and a failed download leaves whatever was saved before the failure.
//!
//! Callers must drive a `MemStore` from a single sequential download. The
//! lock makes concurrent access memory-safe but does not make interleaved
//! downloads meaningful.
//!
//! Issues, issue comments, organizations and users are only traced, not
//! retained.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::errors::{Result, StoreError};
use super::trace::excerpt;
use super::MetadataStore;
use crate::github::types::{
    IssueComment, IssueFields, OrganizationFields, PullRequestFields, PullRequestReviewComment,
    PullRequestReviewFields, RepositoryFields, UserExtended, author_login,
};

/// A repository and its pull requests, ordered by number.
#[derive(Debug, Clone, PartialEq)]
pub struct Repo {
    pub fields: RepositoryFields,
    pub topics: Vec<String>,
    pub pull_requests: BTreeMap<i64, PullRequestEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PullRequestEntry {
    pub pull_request: PullRequestFields,
    pub assignees: Vec<String>,
    pub labels: Vec<String>,
    /// Top-level comments in arrival order.
    pub comments: Vec<IssueComment>,
    /// Reviews keyed by `databaseId`.
    pub reviews: BTreeMap<i64, ReviewEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewEntry {
    pub review: PullRequestReviewFields,
    /// Review comments in arrival order.
    pub comments: Vec<PullRequestReviewComment>,
}

type Repos = HashMap<String, HashMap<String, Repo>>;

#[derive(Debug, Default)]
pub struct MemStore {
    repos: Mutex<Repos>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Repos> {
        self.repos.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of one repository.
    pub fn repository(&self, owner: &str, name: &str) -> Option<Repo> {
        self.lock().get(owner).and_then(|r| r.get(name)).cloned()
    }

    /// Number of repositories held.
    pub fn len(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_pull_request<F>(&self, owner: &str, name: &str, number: i64, f: F) -> Result<()>
    where
        F: FnOnce(&mut PullRequestEntry) -> Result<()>,
    {
        let mut repos = self.lock();
        let entry = repos
            .get_mut(owner)
            .and_then(|r| r.get_mut(name))
            .and_then(|repo| repo.pull_requests.get_mut(&number))
            .ok_or_else(|| StoreError::pull_request_not_found(owner, name, number))?;
        f(entry)
    }
}

/// Replace the entry with the same id in place, or append a new one.
fn upsert_by<T: Clone>(entries: &mut Vec<T>, item: &T, id: impl Fn(&T) -> &str) {
    match entries.iter_mut().find(|e| id(e) == id(item)) {
        Some(existing) => *existing = item.clone(),
        None => entries.push(item.clone()),
    }
}

#[async_trait]
impl MetadataStore for MemStore {
    async fn save_organization(&self, organization: &OrganizationFields) -> Result<()> {
        tracing::debug!(login = %organization.login, "Organization data fetched");
        Ok(())
    }

    async fn save_user(&self, user: &UserExtended) -> Result<()> {
        tracing::debug!(login = %user.login, "User data fetched");
        Ok(())
    }

    async fn save_repository(
        &self,
        repository: &RepositoryFields,
        topics: &[String],
    ) -> Result<()> {
        let owner = repository.owner.login.clone();
        tracing::debug!(owner = %owner, name = %repository.name, "Repository data fetched");

        self.lock().entry(owner).or_default().insert(
            repository.name.clone(),
            Repo {
                fields: repository.clone(),
                topics: topics.to_vec(),
                pull_requests: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn save_issue(
        &self,
        _owner: &str,
        _name: &str,
        issue: &IssueFields,
        _assignees: &[String],
        _labels: &[String],
    ) -> Result<()> {
        tracing::debug!(number = issue.number, title = %issue.title, "Issue data fetched");
        Ok(())
    }

    async fn save_issue_comment(
        &self,
        _owner: &str,
        _name: &str,
        issue_number: i64,
        comment: &IssueComment,
    ) -> Result<()> {
        tracing::debug!(
            issue = issue_number,
            author = author_login(&comment.author),
            body = %excerpt(&comment.body),
            "Issue comment data fetched"
        );
        Ok(())
    }

    async fn save_pull_request(
        &self,
        owner: &str,
        name: &str,
        pull_request: &PullRequestFields,
        assignees: &[String],
        labels: &[String],
    ) -> Result<()> {
        tracing::debug!(
            number = pull_request.number,
            title = %pull_request.title,
            "PR data fetched"
        );

        let mut repos = self.lock();
        let repo = repos
            .get_mut(owner)
            .and_then(|r| r.get_mut(name))
            .ok_or_else(|| StoreError::repository_not_found(owner, name))?;
        repo.pull_requests.insert(
            pull_request.number,
            PullRequestEntry {
                pull_request: pull_request.clone(),
                assignees: assignees.to_vec(),
                labels: labels.to_vec(),
                comments: Vec::new(),
                reviews: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn save_pull_request_comment(
        &self,
        owner: &str,
        name: &str,
        pull_request_number: i64,
        comment: &IssueComment,
    ) -> Result<()> {
        tracing::debug!(
            pull_request = pull_request_number,
            author = author_login(&comment.author),
            "PR comment data fetched"
        );
        self.with_pull_request(owner, name, pull_request_number, |pr| {
            upsert_by(&mut pr.comments, comment, |c| c.id.as_str());
            Ok(())
        })
    }

    async fn save_pull_request_review(
        &self,
        owner: &str,
        name: &str,
        pull_request_number: i64,
        review: &PullRequestReviewFields,
    ) -> Result<()> {
        tracing::debug!(
            pull_request = pull_request_number,
            author = author_login(&review.author),
            state = %review.state,
            "PR review data fetched"
        );
        self.with_pull_request(owner, name, pull_request_number, |pr| {
            pr.reviews.insert(
                review.database_id,
                ReviewEntry {
                    review: review.clone(),
                    comments: Vec::new(),
                },
            );
            Ok(())
        })
    }

    async fn save_pull_request_review_comment(
        &self,
        owner: &str,
        name: &str,
        pull_request_number: i64,
        review_id: i64,
        comment: &PullRequestReviewComment,
    ) -> Result<()> {
        tracing::debug!(
            pull_request = pull_request_number,
            review = review_id,
            author = author_login(&comment.author),
            "PR review comment data fetched"
        );
        self.with_pull_request(owner, name, pull_request_number, |pr| {
            let review = pr.reviews.get_mut(&review_id).ok_or_else(|| {
                StoreError::review_not_found(owner, name, pull_request_number, review_id)
            })?;
            upsert_by(&mut review.comments, comment, |c| c.id.as_str());
            Ok(())
        })
    }

    async fn begin(&self, _version: i32) -> Result<()> {
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        Ok(())
    }

    async fn set_active_version(&self, _version: i32) -> Result<()> {
        Ok(())
    }

    async fn cleanup(&self, _current_version: i32) -> Result<()> {
        Ok(())
    }
}
