//! Durable, generation-tagged store backed by sea-orm.
//!
//! Every row carries the generation it was downloaded in. A download writes
//! its whole generation inside one database transaction; readers resolve the
//! `active_version` pointer first and only read rows of that generation, so
//! publishing a new generation is a single-row upsert.
//!
//! Activation and cleanup run on their own connections and never wait for the
//! open download of this store. On SQLite they still queue behind its write
//! lock, and an in-memory SQLite database has a single connection, so there
//! they can only run between downloads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{OnConflict, Query, SelectStatement};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, TransactionTrait,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::MetadataStore;
use super::errors::{Result, StoreError};
use super::query;
use crate::entity::active_version::POINTER_ID;
use crate::entity::{
    active_version, issue, issue_comment, json_list, organization, pull_request,
    pull_request_comment, pull_request_review, pull_request_review_comment, repository, user,
};
use crate::github::types::{
    IssueComment, IssueFields, OrganizationFields, PullRequestFields, PullRequestReviewComment,
    PullRequestReviewFields, RepositoryFields, UserExtended, author_login,
};

/// Columns an upsert never overwrites.
const KEPT_ON_RESAVE: [&str; 2] = ["id", "sequence"];

/// Upsert clause on a natural key: every other column except `id` and
/// `sequence` is overwritten, so re-saving an entity within a generation keeps
/// its row id and its arrival position.
fn on_natural_key<C: ColumnTrait>(keys: &[C]) -> OnConflict {
    let update: Vec<C> = C::iter()
        .filter(|c| {
            let name = c.as_str();
            !KEPT_ON_RESAVE.iter().any(|kept| *kept == name)
                && !keys.iter().any(|k| k.as_str() == name)
        })
        .collect();
    OnConflict::columns(keys.iter().copied())
        .update_columns(update)
        .to_owned()
}

fn ts(at: &DateTime<Utc>) -> sea_orm::prelude::DateTimeWithTimeZone {
    at.fixed_offset()
}

fn ts_opt(at: Option<&DateTime<Utc>>) -> Option<sea_orm::prelude::DateTimeWithTimeZone> {
    at.map(ts)
}

/// The download in progress: its transaction and the generation it writes.
struct OpenGeneration {
    txn: DatabaseTransaction,
    version: i32,
    next_sequence: i64,
}

impl OpenGeneration {
    fn next_sequence(&mut self) -> i64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}

pub struct DbStore {
    db: DatabaseConnection,
    open: Mutex<Option<OpenGeneration>>,
}

impl DbStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            open: Mutex::new(None),
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn repository_exists(
        txn: &DatabaseTransaction,
        version: i32,
        owner: &str,
        name: &str,
    ) -> Result<bool> {
        let count = repository::Entity::find()
            .filter(repository::Column::Version.eq(version))
            .filter(repository::Column::Owner.eq(owner))
            .filter(repository::Column::Name.eq(name))
            .count(txn)
            .await?;
        Ok(count > 0)
    }

    async fn issue_exists(
        txn: &DatabaseTransaction,
        version: i32,
        owner: &str,
        name: &str,
        number: i64,
    ) -> Result<bool> {
        let count = issue::Entity::find()
            .filter(issue::Column::Version.eq(version))
            .filter(issue::Column::RepositoryOwner.eq(owner))
            .filter(issue::Column::RepositoryName.eq(name))
            .filter(issue::Column::Number.eq(number))
            .count(txn)
            .await?;
        Ok(count > 0)
    }

    async fn pull_request_exists(
        txn: &DatabaseTransaction,
        version: i32,
        owner: &str,
        name: &str,
        number: i64,
    ) -> Result<bool> {
        let count = pull_request::Entity::find()
            .filter(pull_request::Column::Version.eq(version))
            .filter(pull_request::Column::RepositoryOwner.eq(owner))
            .filter(pull_request::Column::RepositoryName.eq(name))
            .filter(pull_request::Column::Number.eq(number))
            .count(txn)
            .await?;
        Ok(count > 0)
    }

    async fn review_exists(
        txn: &DatabaseTransaction,
        version: i32,
        owner: &str,
        name: &str,
        number: i64,
        review_id: i64,
    ) -> Result<bool> {
        let count = pull_request_review::Entity::find()
            .filter(pull_request_review::Column::Version.eq(version))
            .filter(pull_request_review::Column::RepositoryOwner.eq(owner))
            .filter(pull_request_review::Column::RepositoryName.eq(name))
            .filter(pull_request_review::Column::PullRequestNumber.eq(number))
            .filter(pull_request_review::Column::DatabaseId.eq(review_id))
            .count(txn)
            .await?;
        Ok(count > 0)
    }

    /// Delete every row of every versioned table in `stale`.
    async fn delete_generations(txn: &DatabaseTransaction, stale: &[i32]) -> Result<u64> {
        let mut deleted = 0;

        deleted += delete_stale::<pull_request_review_comment::Entity>(
            txn,
            pull_request_review_comment::Column::Version,
            stale,
        )
        .await?;
        deleted += delete_stale::<pull_request_review::Entity>(
            txn,
            pull_request_review::Column::Version,
            stale,
        )
        .await?;
        deleted += delete_stale::<pull_request_comment::Entity>(
            txn,
            pull_request_comment::Column::Version,
            stale,
        )
        .await?;
        deleted += delete_stale::<pull_request::Entity>(
            txn,
            pull_request::Column::Version,
            stale,
        )
        .await?;
        deleted += delete_stale::<issue_comment::Entity>(
            txn,
            issue_comment::Column::Version,
            stale,
        )
        .await?;
        deleted += delete_stale::<issue::Entity>(txn, issue::Column::Version, stale).await?;
        deleted += delete_stale::<repository::Entity>(
            txn,
            repository::Column::Version,
            stale,
        )
        .await?;
        deleted += delete_stale::<user::Entity>(txn, user::Column::Version, stale).await?;
        deleted += delete_stale::<organization::Entity>(
            txn,
            organization::Column::Version,
            stale,
        )
        .await?;

        Ok(deleted)
    }
}

/// `SELECT version FROM active_version`, evaluated inside each delete so a
/// generation activated while cleanup runs is never removed.
fn active_pointer() -> SelectStatement {
    Query::select()
        .column(active_version::Column::Version)
        .from(active_version::Entity)
        .to_owned()
}

async fn delete_stale<E: EntityTrait>(
    txn: &DatabaseTransaction,
    version: E::Column,
    stale: &[i32],
) -> Result<u64> {
    let result = E::delete_many()
        .filter(version.is_in(stale.iter().copied()))
        .filter(version.not_in_subquery(active_pointer()))
        .exec(txn)
        .await?;
    Ok(result.rows_affected)
}

impl std::fmt::Debug for DbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl MetadataStore for DbStore {
    async fn save_organization(&self, org: &OrganizationFields) -> Result<()> {
        let guard = self.open.lock().await;
        let open = guard.as_ref().ok_or(StoreError::NoTransaction)?;
        let (txn, version) = (&open.txn, open.version);

        let row = organization::ActiveModel {
            id: Set(Uuid::new_v4()),
            version: Set(version),
            node_id: Set(org.id.clone()),
            database_id: Set(org.database_id),
            login: Set(org.login.clone()),
            name: Set(org.name.clone()),
            description: Set(org.description.clone()),
            email: Set(org.email.clone()),
            location: Set(org.location.clone()),
            url: Set(org.url.clone()),
            created_at: Set(ts(&org.created_at)),
            updated_at: Set(ts(&org.updated_at)),
        };
        organization::Entity::insert(row)
            .on_conflict(on_natural_key(&[
                organization::Column::Version,
                organization::Column::Login,
            ]))
            .exec_without_returning(txn)
            .await?;

        tracing::debug!(login = %org.login, version, "Saved organization");
        Ok(())
    }

    async fn save_user(&self, member: &UserExtended) -> Result<()> {
        let guard = self.open.lock().await;
        let open = guard.as_ref().ok_or(StoreError::NoTransaction)?;
        let (txn, version) = (&open.txn, open.version);

        let row = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            version: Set(version),
            node_id: Set(member.id.clone()),
            database_id: Set(member.database_id),
            login: Set(member.login.clone()),
            name: Set(member.name.clone()),
            email: Set(member.email.clone()),
            company: Set(member.company.clone()),
            location: Set(member.location.clone()),
            bio: Set(member.bio.clone()),
            url: Set(member.url.clone()),
            created_at: Set(ts(&member.created_at)),
            updated_at: Set(ts(&member.updated_at)),
        };
        user::Entity::insert(row)
            .on_conflict(on_natural_key(&[user::Column::Version, user::Column::Login]))
            .exec_without_returning(txn)
            .await?;

        tracing::debug!(login = %member.login, version, "Saved user");
        Ok(())
    }

    async fn save_repository(&self, repo: &RepositoryFields, topics: &[String]) -> Result<()> {
        let guard = self.open.lock().await;
        let open = guard.as_ref().ok_or(StoreError::NoTransaction)?;
        let (txn, version) = (&open.txn, open.version);

        let row = repository::ActiveModel {
            id: Set(Uuid::new_v4()),
            version: Set(version),
            node_id: Set(repo.id.clone()),
            database_id: Set(repo.database_id),
            owner: Set(repo.owner.login.clone()),
            name: Set(repo.name.clone()),
            name_with_owner: Set(repo.name_with_owner.clone()),
            description: Set(repo.description.clone()),
            url: Set(repo.url.clone()),
            homepage_url: Set(repo.homepage_url.clone()),
            primary_language: Set(repo.primary_language.as_ref().map(|l| l.name.clone())),
            default_branch: Set(repo.default_branch_ref.as_ref().map(|b| b.name.clone())),
            topics: Set(json_list(topics)),
            is_archived: Set(repo.is_archived),
            is_fork: Set(repo.is_fork),
            is_private: Set(repo.is_private),
            is_template: Set(repo.is_template),
            has_issues_enabled: Set(repo.has_issues_enabled),
            has_wiki_enabled: Set(repo.has_wiki_enabled),
            stargazer_count: Set(repo.stargazer_count),
            fork_count: Set(repo.fork_count),
            created_at: Set(ts(&repo.created_at)),
            updated_at: Set(ts(&repo.updated_at)),
            pushed_at: Set(ts_opt(repo.pushed_at.as_ref())),
        };
        repository::Entity::insert(row)
            .on_conflict(on_natural_key(&[
                repository::Column::Version,
                repository::Column::Owner,
                repository::Column::Name,
            ]))
            .exec_without_returning(txn)
            .await?;

        tracing::debug!(
            owner = %repo.owner.login,
            name = %repo.name,
            version,
            "Saved repository"
        );
        Ok(())
    }

    async fn save_issue(
        &self,
        owner: &str,
        name: &str,
        fields: &IssueFields,
        assignees: &[String],
        labels: &[String],
    ) -> Result<()> {
        let guard = self.open.lock().await;
        let open = guard.as_ref().ok_or(StoreError::NoTransaction)?;
        let (txn, version) = (&open.txn, open.version);

        if !Self::repository_exists(txn, version, owner, name).await? {
            return Err(StoreError::repository_not_found(owner, name));
        }

        let row = issue::ActiveModel {
            id: Set(Uuid::new_v4()),
            version: Set(version),
            node_id: Set(fields.id.clone()),
            database_id: Set(fields.database_id),
            repository_owner: Set(owner.to_string()),
            repository_name: Set(name.to_string()),
            number: Set(fields.number),
            title: Set(fields.title.clone()),
            body: Set(fields.body.clone()),
            state: Set(fields.state.clone()),
            author: Set(author_login(&fields.author).to_string()),
            url: Set(fields.url.clone()),
            locked: Set(fields.locked),
            assignees: Set(json_list(assignees)),
            labels: Set(json_list(labels)),
            created_at: Set(ts(&fields.created_at)),
            updated_at: Set(ts(&fields.updated_at)),
            closed_at: Set(ts_opt(fields.closed_at.as_ref())),
        };
        issue::Entity::insert(row)
            .on_conflict(on_natural_key(&[
                issue::Column::Version,
                issue::Column::RepositoryOwner,
                issue::Column::RepositoryName,
                issue::Column::Number,
            ]))
            .exec_without_returning(txn)
            .await?;

        tracing::debug!(owner, name, number = fields.number, version, "Saved issue");
        Ok(())
    }

    async fn save_issue_comment(
        &self,
        owner: &str,
        name: &str,
        issue_number: i64,
        comment: &IssueComment,
    ) -> Result<()> {
        let mut guard = self.open.lock().await;
        let open = guard.as_mut().ok_or(StoreError::NoTransaction)?;
        let sequence = open.next_sequence();
        let (txn, version) = (&open.txn, open.version);

        if !Self::issue_exists(txn, version, owner, name, issue_number).await? {
            return Err(StoreError::issue_not_found(owner, name, issue_number));
        }

        let row = issue_comment::ActiveModel {
            id: Set(Uuid::new_v4()),
            version: Set(version),
            node_id: Set(comment.id.clone()),
            database_id: Set(comment.database_id),
            repository_owner: Set(owner.to_string()),
            repository_name: Set(name.to_string()),
            issue_number: Set(issue_number),
            sequence: Set(sequence),
            author: Set(author_login(&comment.author).to_string()),
            body: Set(comment.body.clone()),
            url: Set(comment.url.clone()),
            created_at: Set(ts(&comment.created_at)),
            updated_at: Set(ts(&comment.updated_at)),
        };
        issue_comment::Entity::insert(row)
            .on_conflict(on_natural_key(&[
                issue_comment::Column::Version,
                issue_comment::Column::NodeId,
            ]))
            .exec_without_returning(txn)
            .await?;

        Ok(())
    }

    async fn save_pull_request(
        &self,
        owner: &str,
        name: &str,
        fields: &PullRequestFields,
        assignees: &[String],
        labels: &[String],
    ) -> Result<()> {
        let guard = self.open.lock().await;
        let open = guard.as_ref().ok_or(StoreError::NoTransaction)?;
        let (txn, version) = (&open.txn, open.version);

        if !Self::repository_exists(txn, version, owner, name).await? {
            return Err(StoreError::repository_not_found(owner, name));
        }

        let row = pull_request::ActiveModel {
            id: Set(Uuid::new_v4()),
            version: Set(version),
            node_id: Set(fields.id.clone()),
            database_id: Set(fields.database_id),
            repository_owner: Set(owner.to_string()),
            repository_name: Set(name.to_string()),
            number: Set(fields.number),
            title: Set(fields.title.clone()),
            body: Set(fields.body.clone()),
            state: Set(fields.state.clone()),
            author: Set(author_login(&fields.author).to_string()),
            url: Set(fields.url.clone()),
            base_ref_name: Set(fields.base_ref_name.clone()),
            head_ref_name: Set(fields.head_ref_name.clone()),
            assignees: Set(json_list(assignees)),
            labels: Set(json_list(labels)),
            is_draft: Set(fields.is_draft),
            locked: Set(fields.locked),
            merged: Set(fields.merged),
            additions: Set(fields.additions),
            deletions: Set(fields.deletions),
            changed_files: Set(fields.changed_files),
            created_at: Set(ts(&fields.created_at)),
            updated_at: Set(ts(&fields.updated_at)),
            closed_at: Set(ts_opt(fields.closed_at.as_ref())),
            merged_at: Set(ts_opt(fields.merged_at.as_ref())),
        };
        pull_request::Entity::insert(row)
            .on_conflict(on_natural_key(&[
                pull_request::Column::Version,
                pull_request::Column::RepositoryOwner,
                pull_request::Column::RepositoryName,
                pull_request::Column::Number,
            ]))
            .exec_without_returning(txn)
            .await?;

        tracing::debug!(owner, name, number = fields.number, version, "Saved pull request");
        Ok(())
    }

    async fn save_pull_request_comment(
        &self,
        owner: &str,
        name: &str,
        pull_request_number: i64,
        comment: &IssueComment,
    ) -> Result<()> {
        let mut guard = self.open.lock().await;
        let open = guard.as_mut().ok_or(StoreError::NoTransaction)?;
        let sequence = open.next_sequence();
        let (txn, version) = (&open.txn, open.version);

        if !Self::pull_request_exists(txn, version, owner, name, pull_request_number).await? {
            return Err(StoreError::pull_request_not_found(
                owner,
                name,
                pull_request_number,
            ));
        }

        let row = pull_request_comment::ActiveModel {
            id: Set(Uuid::new_v4()),
            version: Set(version),
            node_id: Set(comment.id.clone()),
            database_id: Set(comment.database_id),
            repository_owner: Set(owner.to_string()),
            repository_name: Set(name.to_string()),
            pull_request_number: Set(pull_request_number),
            sequence: Set(sequence),
            author: Set(author_login(&comment.author).to_string()),
            body: Set(comment.body.clone()),
            url: Set(comment.url.clone()),
            created_at: Set(ts(&comment.created_at)),
            updated_at: Set(ts(&comment.updated_at)),
        };
        pull_request_comment::Entity::insert(row)
            .on_conflict(on_natural_key(&[
                pull_request_comment::Column::Version,
                pull_request_comment::Column::NodeId,
            ]))
            .exec_without_returning(txn)
            .await?;

        Ok(())
    }

    async fn save_pull_request_review(
        &self,
        owner: &str,
        name: &str,
        pull_request_number: i64,
        review: &PullRequestReviewFields,
    ) -> Result<()> {
        let mut guard = self.open.lock().await;
        let open = guard.as_mut().ok_or(StoreError::NoTransaction)?;
        let sequence = open.next_sequence();
        let (txn, version) = (&open.txn, open.version);

        if !Self::pull_request_exists(txn, version, owner, name, pull_request_number).await? {
            return Err(StoreError::pull_request_not_found(
                owner,
                name,
                pull_request_number,
            ));
        }

        let row = pull_request_review::ActiveModel {
            id: Set(Uuid::new_v4()),
            version: Set(version),
            node_id: Set(review.id.clone()),
            database_id: Set(review.database_id),
            repository_owner: Set(owner.to_string()),
            repository_name: Set(name.to_string()),
            pull_request_number: Set(pull_request_number),
            sequence: Set(sequence),
            author: Set(author_login(&review.author).to_string()),
            body: Set(review.body.clone()),
            state: Set(review.state.clone()),
            url: Set(review.url.clone()),
            created_at: Set(ts(&review.created_at)),
            submitted_at: Set(ts_opt(review.submitted_at.as_ref())),
        };
        pull_request_review::Entity::insert(row)
            .on_conflict(on_natural_key(&[
                pull_request_review::Column::Version,
                pull_request_review::Column::NodeId,
            ]))
            .exec_without_returning(txn)
            .await?;

        Ok(())
    }

    async fn save_pull_request_review_comment(
        &self,
        owner: &str,
        name: &str,
        pull_request_number: i64,
        review_id: i64,
        comment: &PullRequestReviewComment,
    ) -> Result<()> {
        let mut guard = self.open.lock().await;
        let open = guard.as_mut().ok_or(StoreError::NoTransaction)?;
        let sequence = open.next_sequence();
        let (txn, version) = (&open.txn, open.version);

        if !Self::review_exists(txn, version, owner, name, pull_request_number, review_id).await? {
            return Err(StoreError::review_not_found(
                owner,
                name,
                pull_request_number,
                review_id,
            ));
        }

        let row = pull_request_review_comment::ActiveModel {
            id: Set(Uuid::new_v4()),
            version: Set(version),
            node_id: Set(comment.id.clone()),
            database_id: Set(comment.database_id),
            repository_owner: Set(owner.to_string()),
            repository_name: Set(name.to_string()),
            pull_request_number: Set(pull_request_number),
            pull_request_review_id: Set(review_id),
            sequence: Set(sequence),
            author: Set(author_login(&comment.author).to_string()),
            body: Set(comment.body.clone()),
            path: Set(comment.path.clone()),
            position: Set(comment.position),
            original_position: Set(comment.original_position),
            diff_hunk: Set(comment.diff_hunk.clone()),
            url: Set(comment.url.clone()),
            created_at: Set(ts(&comment.created_at)),
            updated_at: Set(ts(&comment.updated_at)),
        };
        pull_request_review_comment::Entity::insert(row)
            .on_conflict(on_natural_key(&[
                pull_request_review_comment::Column::Version,
                pull_request_review_comment::Column::NodeId,
            ]))
            .exec_without_returning(txn)
            .await?;

        Ok(())
    }

    async fn begin(&self, version: i32) -> Result<()> {
        let mut guard = self.open.lock().await;
        if guard.is_some() {
            return Err(StoreError::TransactionInProgress);
        }
        *guard = Some(OpenGeneration {
            txn: self.db.begin().await?,
            version,
            next_sequence: 0,
        });
        tracing::debug!(version, "Transaction started");
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let open = self
            .open
            .lock()
            .await
            .take()
            .ok_or(StoreError::NoTransaction)?;
        open.txn.commit().await?;
        tracing::debug!(version = open.version, "Transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let open = self
            .open
            .lock()
            .await
            .take()
            .ok_or(StoreError::NoTransaction)?;
        open.txn.rollback().await?;
        tracing::debug!(version = open.version, "Transaction rolled back");
        Ok(())
    }

    async fn set_active_version(&self, version: i32) -> Result<()> {
        let pointer = active_version::ActiveModel {
            id: Set(POINTER_ID),
            version: Set(version),
            updated_at: Set(Utc::now().fixed_offset()),
        };
        active_version::Entity::insert(pointer)
            .on_conflict(
                OnConflict::column(active_version::Column::Id)
                    .update_columns([
                        active_version::Column::Version,
                        active_version::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        tracing::info!(version, "Activated generation");
        Ok(())
    }

    async fn cleanup(&self, current_version: i32) -> Result<()> {
        // Only generations committed before cleanup started are candidates;
        // one still being written is not listed and survives its own commit.
        let active = query::active_version(&self.db).await?;
        let stale: Vec<i32> = query::versions(&self.db)
            .await?
            .into_iter()
            .filter(|v| *v != current_version && Some(*v) != active)
            .collect();
        if stale.is_empty() {
            tracing::debug!(current_version, "No stale generations");
            return Ok(());
        }

        let txn = self.db.begin().await?;
        let deleted = Self::delete_generations(&txn, &stale).await?;
        txn.commit().await?;

        tracing::info!(
            current_version,
            active_version = ?active,
            stale = ?stale,
            rows = deleted,
            "Removed stale generations"
        );
        Ok(())
    }
}
