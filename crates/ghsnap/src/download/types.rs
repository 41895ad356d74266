//! Per-run statistics returned by the downloader.

use serde::Serialize;

/// What one repository download saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryStats {
    pub owner: String,
    pub name: String,
    pub version: i32,
    pub topics: usize,
    pub issues: usize,
    pub issue_comments: usize,
    pub pull_requests: usize,
    pub pull_request_comments: usize,
    pub reviews: usize,
    pub review_comments: usize,
    /// Follow-up pages fetched beyond the root query.
    pub pages_fetched: usize,
}

impl RepositoryStats {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, version: i32) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            version,
            ..Self::default()
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Every saved entity, the repository itself included.
    pub fn entities(&self) -> usize {
        1 + self.issues
            + self.issue_comments
            + self.pull_requests
            + self.pull_request_comments
            + self.reviews
            + self.review_comments
    }
}

/// What one organization download saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrganizationStats {
    pub login: String,
    pub version: i32,
    pub members: usize,
    pub pages_fetched: usize,
}

impl OrganizationStats {
    pub fn new(login: impl Into<String>, version: i32) -> Self {
        Self {
            login: login.into(),
            version,
            ..Self::default()
        }
    }
}
