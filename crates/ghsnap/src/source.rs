//! The cursor page source contract consumed by the walker and downloader.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::github::GitHubError;
use crate::github::types::{Connection, Organization, RateLimit, Repository};

/// GitHub caps `first:` at 100 for every connection.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size per connection kind.
///
/// Different connections are paged at very different rates: an issue rarely
/// has more than a couple of assignees, while an organization may have
/// thousands of members. The defaults keep each root query under GitHub's
/// node limit while the nested first pages are embedded in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSizes {
    pub issues: u32,
    pub pull_requests: u32,
    pub issue_comments: u32,
    pub pr_reviews: u32,
    pub pr_review_comments: u32,
    pub assignees: u32,
    pub labels: u32,
    pub topics: u32,
    pub org_members: u32,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            issues: 50,
            pull_requests: 50,
            issue_comments: 10,
            pr_reviews: 5,
            pr_review_comments: 5,
            assignees: 2,
            labels: 2,
            topics: 50,
            org_members: 100,
        }
    }
}

impl PageSizes {
    /// Clamp every size into GitHub's accepted `1..=100` range.
    #[must_use]
    pub fn clamped(self) -> Self {
        let c = |n: u32| n.clamp(1, MAX_PAGE_SIZE);
        Self {
            issues: c(self.issues),
            pull_requests: c(self.pull_requests),
            issue_comments: c(self.issue_comments),
            pr_reviews: c(self.pr_reviews),
            pr_review_comments: c(self.pr_review_comments),
            assignees: c(self.assignees),
            labels: c(self.labels),
            topics: c(self.topics),
            org_members: c(self.org_members),
        }
    }

    /// Page size used when paging through `kind`.
    #[must_use]
    pub fn for_kind(&self, kind: ConnectionKind) -> u32 {
        match kind {
            ConnectionKind::RepositoryTopics => self.topics,
            ConnectionKind::Issues => self.issues,
            ConnectionKind::PullRequests => self.pull_requests,
            ConnectionKind::IssueAssignees | ConnectionKind::PullRequestAssignees => {
                self.assignees
            }
            ConnectionKind::IssueLabels | ConnectionKind::PullRequestLabels => self.labels,
            ConnectionKind::IssueComments | ConnectionKind::PullRequestComments => {
                self.issue_comments
            }
            ConnectionKind::PullRequestReviews => self.pr_reviews,
            ConnectionKind::ReviewComments => self.pr_review_comments,
            ConnectionKind::OrganizationMembers => self.org_members,
        }
    }
}

/// Every paginated relation the downloader walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    RepositoryTopics,
    Issues,
    PullRequests,
    IssueAssignees,
    IssueLabels,
    IssueComments,
    PullRequestAssignees,
    PullRequestLabels,
    PullRequestComments,
    PullRequestReviews,
    ReviewComments,
    OrganizationMembers,
}

impl ConnectionKind {
    /// GraphQL type of the parent node.
    #[must_use]
    pub fn parent_type(self) -> &'static str {
        match self {
            Self::RepositoryTopics | Self::Issues | Self::PullRequests => "Repository",
            Self::IssueAssignees | Self::IssueLabels | Self::IssueComments => "Issue",
            Self::PullRequestAssignees
            | Self::PullRequestLabels
            | Self::PullRequestComments
            | Self::PullRequestReviews => "PullRequest",
            Self::ReviewComments => "PullRequestReview",
            Self::OrganizationMembers => "Organization",
        }
    }

    /// GraphQL field holding the connection on the parent.
    #[must_use]
    pub fn field(self) -> &'static str {
        match self {
            Self::RepositoryTopics => "repositoryTopics",
            Self::Issues => "issues",
            Self::PullRequests => "pullRequests",
            Self::IssueAssignees | Self::PullRequestAssignees => "assignees",
            Self::IssueLabels | Self::PullRequestLabels => "labels",
            Self::IssueComments | Self::PullRequestComments | Self::ReviewComments => "comments",
            Self::PullRequestReviews => "reviews",
            Self::OrganizationMembers => "membersWithRole",
        }
    }

    /// Human-readable name for logs and progress events.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::RepositoryTopics => "repository topics",
            Self::Issues => "issues",
            Self::PullRequests => "pull requests",
            Self::IssueAssignees => "issue assignees",
            Self::IssueLabels => "issue labels",
            Self::IssueComments => "issue comments",
            Self::PullRequestAssignees => "pull request assignees",
            Self::PullRequestLabels => "pull request labels",
            Self::PullRequestComments => "pull request comments",
            Self::PullRequestReviews => "pull request reviews",
            Self::ReviewComments => "review comments",
            Self::OrganizationMembers => "organization members",
        }
    }

    /// Organization members are addressed by login, everything else by node id.
    #[must_use]
    pub fn parent_is_login(self) -> bool {
        matches!(self, Self::OrganizationMembers)
    }
}

impl std::fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

/// One follow-up page request.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    /// Node id of the parent (login for organization members).
    pub parent: &'a str,
    pub kind: ConnectionKind,
    pub page_size: u32,
    /// `endCursor` of the previous page of this same connection.
    pub cursor: &'a str,
    /// Sizes for connections nested inside the returned nodes.
    pub sizes: &'a PageSizes,
}

/// A cursor-paginated source of GitHub metadata.
///
/// Root queries embed the first page of every nested connection; only
/// follow-up pages go through [`GraphSource::fetch_page`]. Implementations
/// are expected to retry transient failures themselves: any error returned
/// here is definitive.
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Fetch a repository with the first page of topics, issues and pull
    /// requests (and, inside those, their own first pages).
    async fn repository(
        &self,
        owner: &str,
        name: &str,
        sizes: &PageSizes,
    ) -> Result<Repository, GitHubError>;

    /// Fetch an organization with the first page of its members.
    async fn organization(
        &self,
        login: &str,
        sizes: &PageSizes,
    ) -> Result<Organization, GitHubError>;

    /// Fetch the page after `request.cursor`. Nodes are left as raw JSON and
    /// decoded by the caller, which knows the node type.
    async fn fetch_page(
        &self,
        request: PageRequest<'_>,
    ) -> Result<Connection<serde_json::Value>, GitHubError>;

    /// Remaining API budget.
    async fn rate_remaining(&self) -> Result<RateLimit, GitHubError>;
}

// ---------- Test-only scripted source ----------

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::Mutex;

/// A request observed by [`FakeSource`].
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPage {
    pub parent: String,
    pub kind: ConnectionKind,
    pub page_size: u32,
    pub cursor: String,
}

#[cfg(test)]
type PageKey = (String, ConnectionKind, String);

/// In-memory [`GraphSource`] that replays scripted pages.
///
/// Pages are keyed by `(parent, kind, cursor)`; asking for an unscripted
/// page is an error, so tests also catch unexpected fetches.
#[cfg(test)]
#[derive(Default)]
pub struct FakeSource {
    repository: Mutex<Option<Repository>>,
    organization: Mutex<Option<Organization>>,
    pages: Mutex<HashMap<PageKey, Result<Connection<serde_json::Value>, u16>>>,
    requests: Mutex<Vec<RecordedPage>>,
}

#[cfg(test)]
impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(self, repository: Repository) -> Self {
        *self.repository.lock().unwrap() = Some(repository);
        self
    }

    pub fn with_organization(self, organization: Organization) -> Self {
        *self.organization.lock().unwrap() = Some(organization);
        self
    }

    /// Script the page served after `cursor`.
    pub fn page<T: Serialize>(
        self,
        parent: &str,
        kind: ConnectionKind,
        cursor: &str,
        page: Connection<T>,
    ) -> Self {
        let nodes = page
            .nodes
            .iter()
            .map(|n| serde_json::to_value(n).unwrap())
            .collect();
        self.pages.lock().unwrap().insert(
            (parent.to_string(), kind, cursor.to_string()),
            Ok(Connection::new(nodes, page.page_info)),
        );
        self
    }

    /// Script an HTTP failure for the page after `cursor`.
    pub fn failing_page(
        self,
        parent: &str,
        kind: ConnectionKind,
        cursor: &str,
        status: u16,
    ) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert((parent.to_string(), kind, cursor.to_string()), Err(status));
        self
    }

    pub fn requests(&self) -> Vec<RecordedPage> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl GraphSource for FakeSource {
    async fn repository(
        &self,
        owner: &str,
        name: &str,
        _sizes: &PageSizes,
    ) -> Result<Repository, GitHubError> {
        self.repository
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| GitHubError::NotFound(format!("repository {owner}/{name}")))
    }

    async fn organization(
        &self,
        login: &str,
        _sizes: &PageSizes,
    ) -> Result<Organization, GitHubError> {
        self.organization
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| GitHubError::NotFound(format!("organization {login}")))
    }

    async fn fetch_page(
        &self,
        request: PageRequest<'_>,
    ) -> Result<Connection<serde_json::Value>, GitHubError> {
        self.requests.lock().unwrap().push(RecordedPage {
            parent: request.parent.to_string(),
            kind: request.kind,
            page_size: request.page_size,
            cursor: request.cursor.to_string(),
        });
        let key = (
            request.parent.to_string(),
            request.kind,
            request.cursor.to_string(),
        );
        match self.pages.lock().unwrap().get(&key) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(status)) => Err(GitHubError::api(*status, "scripted failure")),
            None => Err(GitHubError::NotFound(format!(
                "no page scripted for {} {} after {}",
                request.kind, request.parent, request.cursor
            ))),
        }
    }

    async fn rate_remaining(&self) -> Result<RateLimit, GitHubError> {
        Ok(RateLimit {
            limit: 5000,
            remaining: 4321,
            ..RateLimit::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_crawl_tuning() {
        let sizes = PageSizes::default();
        assert_eq!(sizes.for_kind(ConnectionKind::IssueComments), 10);
        assert_eq!(sizes.for_kind(ConnectionKind::PullRequestReviews), 5);
        assert_eq!(sizes.for_kind(ConnectionKind::ReviewComments), 5);
        assert_eq!(sizes.for_kind(ConnectionKind::OrganizationMembers), 100);
    }

    #[test]
    fn pull_request_labels_use_label_page_size() {
        let sizes = PageSizes {
            assignees: 3,
            labels: 7,
            ..PageSizes::default()
        };
        assert_eq!(sizes.for_kind(ConnectionKind::PullRequestLabels), 7);
        assert_eq!(sizes.for_kind(ConnectionKind::PullRequestAssignees), 3);
    }

    #[test]
    fn clamped_keeps_sizes_in_api_range() {
        let sizes = PageSizes {
            issues: 0,
            org_members: 500,
            ..PageSizes::default()
        }
        .clamped();
        assert_eq!(sizes.issues, 1);
        assert_eq!(sizes.org_members, MAX_PAGE_SIZE);
        assert_eq!(sizes.labels, 2);
    }

    #[test]
    fn connection_kinds_map_to_graphql_fields() {
        assert_eq!(ConnectionKind::ReviewComments.parent_type(), "PullRequestReview");
        assert_eq!(ConnectionKind::ReviewComments.field(), "comments");
        assert_eq!(ConnectionKind::OrganizationMembers.field(), "membersWithRole");
        assert!(ConnectionKind::OrganizationMembers.parent_is_login());
        assert!(!ConnectionKind::Issues.parent_is_login());
        assert_eq!(ConnectionKind::IssueLabels.to_string(), "issue labels");
    }
}
