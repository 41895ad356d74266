//! Read side of the durable store.
//!
//! Readers go through the `active_version` pointer. [`load_repository`]
//! resolves the pointer and reads the whole repository graph inside one read
//! transaction, so a concurrent activation is observed either entirely or not
//! at all.

use std::collections::BTreeSet;

use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use serde::Serialize;

use super::errors::Result;
use crate::entity::active_version::POINTER_ID;
use crate::entity::{
    active_version, issue, issue_comment, list_from_json, organization, pull_request,
    pull_request_comment, pull_request_review, pull_request_review_comment, repository, user,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositorySnapshot {
    pub version: i32,
    pub repository: repository::Model,
    pub topics: Vec<String>,
    /// Ordered by number.
    pub issues: Vec<IssueSnapshot>,
    /// Ordered by number.
    pub pull_requests: Vec<PullRequestSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueSnapshot {
    pub issue: issue::Model,
    pub assignees: Vec<String>,
    pub labels: Vec<String>,
    /// In arrival order.
    pub comments: Vec<issue_comment::Model>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequestSnapshot {
    pub pull_request: pull_request::Model,
    pub assignees: Vec<String>,
    pub labels: Vec<String>,
    pub comments: Vec<pull_request_comment::Model>,
    /// In arrival order.
    pub reviews: Vec<ReviewSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewSnapshot {
    pub review: pull_request_review::Model,
    pub comments: Vec<pull_request_review_comment::Model>,
}

/// Row counts of one stored generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationSummary {
    pub version: i32,
    pub active: bool,
    pub repositories: u64,
    pub issues: u64,
    pub pull_requests: u64,
    pub organizations: u64,
    pub users: u64,
}

/// The generation default readers observe, if one was ever published.
pub async fn active_version<C: ConnectionTrait>(db: &C) -> Result<Option<i32>> {
    Ok(active_version::Entity::find_by_id(POINTER_ID)
        .one(db)
        .await?
        .map(|pointer| pointer.version))
}

/// Every generation with at least one root row (repository or
/// organization), ascending.
pub async fn versions<C: ConnectionTrait>(db: &C) -> Result<Vec<i32>> {
    let mut all = BTreeSet::new();

    let repository_versions: Vec<i32> = repository::Entity::find()
        .select_only()
        .column(repository::Column::Version)
        .distinct()
        .into_tuple()
        .all(db)
        .await?;
    all.extend(repository_versions);

    let organization_versions: Vec<i32> = organization::Entity::find()
        .select_only()
        .column(organization::Column::Version)
        .distinct()
        .into_tuple()
        .all(db)
        .await?;
    all.extend(organization_versions);

    Ok(all.into_iter().collect())
}

/// Highest generation number in use, counting the active pointer.
pub async fn latest_version<C: ConnectionTrait>(db: &C) -> Result<Option<i32>> {
    let stored = versions(db).await?.last().copied();
    let active = active_version(db).await?;
    Ok(stored.max(active))
}

/// The generation number a new download should use.
pub async fn next_version<C: ConnectionTrait>(db: &C) -> Result<i32> {
    Ok(latest_version(db).await?.map_or(1, |v| v + 1))
}

pub async fn generation_summaries<C: ConnectionTrait>(db: &C) -> Result<Vec<GenerationSummary>> {
    let active = active_version(db).await?;
    let mut summaries = Vec::new();
    for version in versions(db).await? {
        summaries.push(GenerationSummary {
            version,
            active: active == Some(version),
            repositories: repository::Entity::find()
                .filter(repository::Column::Version.eq(version))
                .count(db)
                .await?,
            issues: issue::Entity::find()
                .filter(issue::Column::Version.eq(version))
                .count(db)
                .await?,
            pull_requests: pull_request::Entity::find()
                .filter(pull_request::Column::Version.eq(version))
                .count(db)
                .await?,
            organizations: organization::Entity::find()
                .filter(organization::Column::Version.eq(version))
                .count(db)
                .await?,
            users: user::Entity::find()
                .filter(user::Column::Version.eq(version))
                .count(db)
                .await?,
        });
    }
    Ok(summaries)
}

/// Load a repository from the active generation.
///
/// Returns `None` when nothing was activated yet or the active generation
/// does not contain the repository.
pub async fn load_repository(
    db: &DatabaseConnection,
    owner: &str,
    name: &str,
) -> Result<Option<RepositorySnapshot>> {
    let txn = db.begin().await?;
    let snapshot = match active_version(&txn).await? {
        Some(version) => load_repository_at(&txn, version, owner, name).await?,
        None => None,
    };
    txn.commit().await?;
    Ok(snapshot)
}

/// Load a repository from a specific generation.
pub async fn load_repository_at<C: ConnectionTrait>(
    db: &C,
    version: i32,
    owner: &str,
    name: &str,
) -> Result<Option<RepositorySnapshot>> {
    let Some(repo) = repository::Entity::find()
        .filter(repository::Column::Version.eq(version))
        .filter(repository::Column::Owner.eq(owner))
        .filter(repository::Column::Name.eq(name))
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let issues = issue::Entity::find()
        .filter(issue::Column::Version.eq(version))
        .filter(issue::Column::RepositoryOwner.eq(owner))
        .filter(issue::Column::RepositoryName.eq(name))
        .order_by_asc(issue::Column::Number)
        .all(db)
        .await?;
    let issue_comments = issue_comment::Entity::find()
        .filter(issue_comment::Column::Version.eq(version))
        .filter(issue_comment::Column::RepositoryOwner.eq(owner))
        .filter(issue_comment::Column::RepositoryName.eq(name))
        .order_by_asc(issue_comment::Column::Sequence)
        .all(db)
        .await?;

    let pull_requests = pull_request::Entity::find()
        .filter(pull_request::Column::Version.eq(version))
        .filter(pull_request::Column::RepositoryOwner.eq(owner))
        .filter(pull_request::Column::RepositoryName.eq(name))
        .order_by_asc(pull_request::Column::Number)
        .all(db)
        .await?;
    let pr_comments = pull_request_comment::Entity::find()
        .filter(pull_request_comment::Column::Version.eq(version))
        .filter(pull_request_comment::Column::RepositoryOwner.eq(owner))
        .filter(pull_request_comment::Column::RepositoryName.eq(name))
        .order_by_asc(pull_request_comment::Column::Sequence)
        .all(db)
        .await?;
    let reviews = pull_request_review::Entity::find()
        .filter(pull_request_review::Column::Version.eq(version))
        .filter(pull_request_review::Column::RepositoryOwner.eq(owner))
        .filter(pull_request_review::Column::RepositoryName.eq(name))
        .order_by_asc(pull_request_review::Column::Sequence)
        .all(db)
        .await?;
    let review_comments = pull_request_review_comment::Entity::find()
        .filter(pull_request_review_comment::Column::Version.eq(version))
        .filter(pull_request_review_comment::Column::RepositoryOwner.eq(owner))
        .filter(pull_request_review_comment::Column::RepositoryName.eq(name))
        .order_by_asc(pull_request_review_comment::Column::Sequence)
        .all(db)
        .await?;

    let issues = issues
        .into_iter()
        .map(|issue| IssueSnapshot {
            assignees: list_from_json(&issue.assignees),
            labels: list_from_json(&issue.labels),
            comments: issue_comments
                .iter()
                .filter(|c| c.issue_number == issue.number)
                .cloned()
                .collect(),
            issue,
        })
        .collect();

    let pull_requests = pull_requests
        .into_iter()
        .map(|pr| PullRequestSnapshot {
            assignees: list_from_json(&pr.assignees),
            labels: list_from_json(&pr.labels),
            comments: pr_comments
                .iter()
                .filter(|c| c.pull_request_number == pr.number)
                .cloned()
                .collect(),
            reviews: reviews
                .iter()
                .filter(|r| r.pull_request_number == pr.number)
                .map(|review| ReviewSnapshot {
                    comments: review_comments
                        .iter()
                        .filter(|c| {
                            c.pull_request_number == pr.number
                                && c.pull_request_review_id == review.database_id
                        })
                        .cloned()
                        .collect(),
                    review: review.clone(),
                })
                .collect(),
            pull_request: pr,
        })
        .collect();

    Ok(Some(RepositorySnapshot {
        version,
        topics: list_from_json(&repo.topics),
        repository: repo,
        issues,
        pull_requests,
    }))
}
