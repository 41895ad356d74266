//! GraphQL response shapes for the GitHub v4 API.
//!
//! Every entity is split into its scalar `*Fields` (what a store persists) and
//! a wrapper carrying the first page of each nested connection, exactly as the
//! enclosing query returns it. Fields default when absent so fixtures and
//! partial selections deserialize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pagination state of one connection page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageInfo {
    pub has_next_page: bool,
    /// Opaque resume token; only meaningful for the connection it came from.
    pub end_cursor: Option<String>,
}

impl PageInfo {
    /// Page info for a connection with nothing after this page.
    #[must_use]
    pub fn last() -> Self {
        Self::default()
    }

    /// Page info for a page followed by the one at `cursor`.
    #[must_use]
    pub fn next(cursor: impl Into<String>) -> Self {
        Self {
            has_next_page: true,
            end_cursor: Some(cursor.into()),
        }
    }
}

/// One page of a cursor-paginated connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
    #[serde(default)]
    pub page_info: PageInfo,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            page_info: PageInfo::default(),
        }
    }
}

impl<T> Connection<T> {
    #[must_use]
    pub fn new(nodes: Vec<T>, page_info: PageInfo) -> Self {
        Self { nodes, page_info }
    }
}

/// A user, bot or organization reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Actor {
    pub login: String,
}

impl Actor {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
        }
    }
}

/// Login of an optional author; deleted accounts come back as `null`.
#[must_use]
pub fn author_login(author: &Option<Actor>) -> &str {
    author.as_ref().map_or("ghost", |a| a.login.as_str())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topic {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicNode {
    pub topic: Topic,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepositoryFields {
    pub id: String,
    pub database_id: i64,
    pub name: String,
    pub name_with_owner: String,
    pub owner: Actor,
    pub description: Option<String>,
    pub url: String,
    pub homepage_url: Option<String>,
    pub primary_language: Option<NamedRef>,
    pub default_branch_ref: Option<NamedRef>,
    pub is_archived: bool,
    pub is_fork: bool,
    pub is_private: bool,
    pub is_template: bool,
    pub has_issues_enabled: bool,
    pub has_wiki_enabled: bool,
    pub stargazer_count: i64,
    pub fork_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
}

/// Root repository query result with the first page of every connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    #[serde(flatten)]
    pub fields: RepositoryFields,
    #[serde(default)]
    pub repository_topics: Connection<TopicNode>,
    #[serde(default)]
    pub issues: Connection<Issue>,
    #[serde(default)]
    pub pull_requests: Connection<PullRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueFields {
    pub id: String,
    pub database_id: i64,
    pub number: i64,
    pub title: String,
    pub body: String,
    /// `OPEN` or `CLOSED`.
    pub state: String,
    pub author: Option<Actor>,
    pub url: String,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(flatten)]
    pub fields: IssueFields,
    #[serde(default)]
    pub assignees: Connection<Actor>,
    #[serde(default)]
    pub labels: Connection<Label>,
    #[serde(default)]
    pub comments: Connection<IssueComment>,
}

/// A top-level comment on an issue or pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueComment {
    pub id: String,
    pub database_id: i64,
    pub author: Option<Actor>,
    pub body: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PullRequestFields {
    pub id: String,
    pub database_id: i64,
    pub number: i64,
    pub title: String,
    pub body: String,
    /// `OPEN`, `CLOSED` or `MERGED`.
    pub state: String,
    pub author: Option<Actor>,
    pub url: String,
    pub base_ref_name: String,
    pub head_ref_name: String,
    pub is_draft: bool,
    pub locked: bool,
    pub merged: bool,
    pub additions: i64,
    pub deletions: i64,
    pub changed_files: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequestFields {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == "OPEN"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    #[serde(flatten)]
    pub fields: PullRequestFields,
    #[serde(default)]
    pub assignees: Connection<Actor>,
    #[serde(default)]
    pub labels: Connection<Label>,
    #[serde(default)]
    pub comments: Connection<IssueComment>,
    #[serde(default)]
    pub reviews: Connection<PullRequestReview>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PullRequestReviewFields {
    pub id: String,
    pub database_id: i64,
    pub author: Option<Actor>,
    pub body: String,
    /// `APPROVED`, `CHANGES_REQUESTED`, `COMMENTED`, `DISMISSED` or `PENDING`.
    pub state: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestReview {
    #[serde(flatten)]
    pub fields: PullRequestReviewFields,
    #[serde(default)]
    pub comments: Connection<PullRequestReviewComment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PullRequestReviewComment {
    pub id: String,
    pub database_id: i64,
    pub author: Option<Actor>,
    pub body: String,
    pub path: String,
    pub position: Option<i64>,
    pub original_position: Option<i64>,
    pub diff_hunk: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrganizationFields {
    pub id: String,
    pub database_id: i64,
    pub login: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    #[serde(flatten)]
    pub fields: OrganizationFields,
    #[serde(default)]
    pub members_with_role: Connection<UserExtended>,
}

/// An organization member with profile details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserExtended {
    pub id: String,
    pub database_id: i64,
    pub login: String,
    pub name: Option<String>,
    pub email: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Remaining GraphQL budget as reported by `rateLimit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimit {
    pub limit: i64,
    pub remaining: i64,
    pub used: i64,
    pub reset_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn issue_deserializes_fields_and_nested_first_pages() {
        let issue: Issue = serde_json::from_value(json!({
            "id": "I_1",
            "databaseId": 101,
            "number": 3,
            "title": "Crash on start",
            "body": "stack trace",
            "state": "OPEN",
            "author": {"login": "mcuadros"},
            "createdAt": "2019-06-01T10:00:00Z",
            "updatedAt": "2019-06-02T10:00:00Z",
            "closedAt": null,
            "assignees": {
                "nodes": [{"login": "smola"}],
                "pageInfo": {"hasNextPage": false, "endCursor": null}
            },
            "labels": {
                "nodes": [{"name": "bug"}, {"name": "p1"}],
                "pageInfo": {"hasNextPage": true, "endCursor": "Y3Vy"}
            },
            "comments": {"nodes": [], "pageInfo": {"hasNextPage": false}}
        }))
        .unwrap();

        assert_eq!(issue.fields.number, 3);
        assert_eq!(author_login(&issue.fields.author), "mcuadros");
        assert_eq!(issue.assignees.nodes, vec![Actor::new("smola")]);
        assert_eq!(issue.labels.nodes.len(), 2);
        assert_eq!(issue.labels.page_info, PageInfo::next("Y3Vy"));
        assert!(issue.comments.nodes.is_empty());
        assert!(issue.fields.closed_at.is_none());
    }

    #[test]
    fn missing_connections_default_to_empty_last_page() {
        let pr: PullRequest = serde_json::from_value(json!({
            "number": 42,
            "state": "MERGED",
            "author": null
        }))
        .unwrap();

        assert_eq!(pr.fields.number, 42);
        assert!(!pr.fields.is_open());
        assert_eq!(author_login(&pr.fields.author), "ghost");
        assert!(pr.reviews.nodes.is_empty());
        assert!(!pr.reviews.page_info.has_next_page);
    }

    #[test]
    fn repository_flattens_owner_and_topics() {
        let repo: Repository = serde_json::from_value(json!({
            "id": "R_1",
            "name": "go-git",
            "nameWithOwner": "src-d/go-git",
            "owner": {"login": "src-d"},
            "defaultBranchRef": {"name": "master"},
            "repositoryTopics": {
                "nodes": [{"topic": {"name": "git"}}, {"topic": {"name": "golang"}}],
                "pageInfo": {"hasNextPage": false, "endCursor": "MQ"}
            }
        }))
        .unwrap();

        assert_eq!(repo.fields.owner.login, "src-d");
        assert_eq!(
            repo.fields.default_branch_ref.as_ref().map(|r| r.name.as_str()),
            Some("master")
        );
        let topics: Vec<_> = repo
            .repository_topics
            .nodes
            .iter()
            .map(|t| t.topic.name.as_str())
            .collect();
        assert_eq!(topics, ["git", "golang"]);
    }
}
