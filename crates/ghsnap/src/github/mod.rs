//! GitHub GraphQL v4 adapter: response types, query documents and the client.

pub mod client;
pub mod error;
pub mod query;
pub mod types;

pub use client::{GITHUB_GRAPHQL_ENDPOINT, GitHubClient};
pub use error::{GitHubError, short_error_message};
pub use types::{
    Actor, Connection, Issue, IssueComment, IssueFields, Label, Organization, OrganizationFields,
    PageInfo, PullRequest, PullRequestFields, PullRequestReview, PullRequestReviewComment,
    PullRequestReviewFields, RateLimit, Repository, RepositoryFields, TopicNode, UserExtended,
    author_login,
};
