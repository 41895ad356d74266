//! GraphQL documents for the repository, organization and page queries.
//!
//! Page sizes are rendered as literals rather than variables: a page query
//! only selects one connection, and GraphQL rejects documents that declare
//! variables they never use. Cursors and ids always travel as variables.

use crate::source::{ConnectionKind, PageSizes};

const PAGE_INFO: &str = "pageInfo { hasNextPage endCursor }";

const REPOSITORY_FIELDS: &str = "id databaseId name nameWithOwner owner { login } description \
url homepageUrl primaryLanguage { name } defaultBranchRef { name } isArchived isFork isPrivate \
isTemplate hasIssuesEnabled hasWikiEnabled stargazerCount forkCount createdAt updatedAt pushedAt";

const ISSUE_FIELDS: &str = "id databaseId number title body state author { login } url locked \
createdAt updatedAt closedAt";

const PULL_REQUEST_FIELDS: &str = "id databaseId number title body state author { login } url \
baseRefName headRefName isDraft locked merged additions deletions changedFiles createdAt \
updatedAt closedAt mergedAt";

const ISSUE_COMMENT_FIELDS: &str = "id databaseId author { login } body url createdAt updatedAt";

const REVIEW_FIELDS: &str = "id databaseId author { login } body state url createdAt submittedAt";

const REVIEW_COMMENT_FIELDS: &str = "id databaseId author { login } body path position \
originalPosition diffHunk url createdAt updatedAt";

const ORGANIZATION_FIELDS: &str = "id databaseId login name description email location url \
createdAt updatedAt";

const USER_FIELDS: &str = "id databaseId login name email company location bio url createdAt \
updatedAt";

/// Remaining GraphQL budget.
pub const RATE_LIMIT_QUERY: &str = "query { rateLimit { limit remaining used resetAt } }";

/// Render `field(first: n[, after: $cursor]) { nodes { … } pageInfo { … } }`.
fn connection(field: &str, first: u32, paged: bool, selection: &str) -> String {
    let after = if paged { ", after: $cursor" } else { "" };
    format!("{field}(first: {first}{after}) {{ nodes {{ {selection} }} {PAGE_INFO} }}")
}

fn review_selection(sizes: &PageSizes) -> String {
    format!(
        "{REVIEW_FIELDS} {}",
        connection("comments", sizes.pr_review_comments, false, REVIEW_COMMENT_FIELDS)
    )
}

fn issue_selection(sizes: &PageSizes) -> String {
    format!(
        "{ISSUE_FIELDS} {} {} {}",
        connection("assignees", sizes.assignees, false, "login"),
        connection("labels", sizes.labels, false, "name"),
        connection("comments", sizes.issue_comments, false, ISSUE_COMMENT_FIELDS),
    )
}

fn pull_request_selection(sizes: &PageSizes) -> String {
    format!(
        "{PULL_REQUEST_FIELDS} {} {} {} {}",
        connection("assignees", sizes.assignees, false, "login"),
        connection("labels", sizes.labels, false, "name"),
        connection("comments", sizes.issue_comments, false, ISSUE_COMMENT_FIELDS),
        connection("reviews", sizes.pr_reviews, false, &review_selection(sizes)),
    )
}

/// Node selection for one page of `kind`, including nested first pages.
pub fn node_selection(kind: ConnectionKind, sizes: &PageSizes) -> String {
    match kind {
        ConnectionKind::RepositoryTopics => "topic { name }".to_string(),
        ConnectionKind::Issues => issue_selection(sizes),
        ConnectionKind::PullRequests => pull_request_selection(sizes),
        ConnectionKind::IssueAssignees | ConnectionKind::PullRequestAssignees => {
            "login".to_string()
        }
        ConnectionKind::IssueLabels | ConnectionKind::PullRequestLabels => "name".to_string(),
        ConnectionKind::IssueComments | ConnectionKind::PullRequestComments => {
            ISSUE_COMMENT_FIELDS.to_string()
        }
        ConnectionKind::PullRequestReviews => review_selection(sizes),
        ConnectionKind::ReviewComments => REVIEW_COMMENT_FIELDS.to_string(),
        ConnectionKind::OrganizationMembers => USER_FIELDS.to_string(),
    }
}

/// Root query for `repository(owner:, name:)`.
pub fn repository_query(sizes: &PageSizes) -> String {
    format!(
        "query($owner: String!, $name: String!) {{ repository(owner: $owner, name: $name) {{ \
{REPOSITORY_FIELDS} {} {} {} }} }}",
        connection("repositoryTopics", sizes.topics, false, "topic { name }"),
        connection("issues", sizes.issues, false, &issue_selection(sizes)),
        connection(
            "pullRequests",
            sizes.pull_requests,
            false,
            &pull_request_selection(sizes)
        ),
    )
}

/// Root query for `organization(login:)`.
pub fn organization_query(sizes: &PageSizes) -> String {
    format!(
        "query($login: String!) {{ organization(login: $login) {{ {ORGANIZATION_FIELDS} {} }} }}",
        connection("membersWithRole", sizes.org_members, false, USER_FIELDS),
    )
}

/// Follow-up page query for one connection.
///
/// Node-addressed connections take `$id`; organization members take `$login`.
pub fn page_query(kind: ConnectionKind, page_size: u32, sizes: &PageSizes) -> String {
    let conn = connection(kind.field(), page_size, true, &node_selection(kind, sizes));
    if kind.parent_is_login() {
        format!(
            "query($login: String!, $cursor: String) {{ organization(login: $login) {{ {conn} }} }}"
        )
    } else {
        format!(
            "query($id: ID!, $cursor: String) {{ node(id: $id) {{ ... on {} {{ {conn} }} }} }}",
            kind.parent_type()
        )
    }
}
