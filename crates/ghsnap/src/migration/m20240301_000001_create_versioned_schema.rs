//! Initial migration: one `*_versioned` table per entity kind plus the
//! active generation pointer.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_repositories(manager).await?;
        self.create_issues(manager).await?;
        self.create_issue_comments(manager).await?;
        self.create_pull_requests(manager).await?;
        self.create_pull_request_comments(manager).await?;
        self.create_pull_request_reviews(manager).await?;
        self.create_pull_request_review_comments(manager).await?;
        self.create_organizations(manager).await?;
        self.create_users(manager).await?;
        self.create_active_version(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActiveVersion::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UsersVersioned::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrganizationsVersioned::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(PullRequestReviewCommentsVersioned::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(PullRequestReviewsVersioned::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PullRequestCommentsVersioned::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PullRequestsVersioned::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IssueCommentsVersioned::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IssuesVersioned::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RepositoriesVersioned::Table).to_owned())
            .await?;
        Ok(())
    }
}

// ─── Column helpers ──────────────────────────────────────────────────────────

fn uuid_pk<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().primary_key().to_owned()
}

fn string<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).string().not_null().to_owned()
}

fn string_null<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).string().null().to_owned()
}

fn text<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).text().not_null().to_owned()
}

fn text_null<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).text().null().to_owned()
}

fn int<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).integer().not_null().to_owned()
}

fn bigint<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).big_integer().not_null().to_owned()
}

fn bigint_null<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).big_integer().null().to_owned()
}

fn flag<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .boolean()
        .not_null()
        .default(false)
        .to_owned()
}

fn json_list<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .json()
        .not_null()
        .default(Expr::cust("'[]'"))
        .to_owned()
}

fn timestamp<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

fn timestamp_null<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .null()
        .to_owned()
}

/// Unique index on `(version, natural key...)` backing the upserts.
async fn unique_per_version<T, C>(
    manager: &SchemaManager<'_>,
    name: &str,
    table: T,
    cols: Vec<C>,
) -> Result<(), DbErr>
where
    T: IntoIden + 'static,
    C: IntoIden,
{
    let mut index = Index::create();
    index.name(name).table(table).col(Alias::new("version"));
    for col in cols {
        index.col(col);
    }
    manager.create_index(index.unique().to_owned()).await
}

impl Migration {
    async fn create_repositories(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        use RepositoriesVersioned as R;

        manager
            .create_table(
                Table::create()
                    .table(R::Table)
                    .if_not_exists()
                    .col(uuid_pk(R::Id))
                    .col(int(R::Version))
                    // Identity
                    .col(string(R::NodeId))
                    .col(bigint(R::DatabaseId))
                    .col(string(R::Owner))
                    .col(string(R::Name))
                    .col(string(R::NameWithOwner))
                    // Content
                    .col(text_null(R::Description))
                    .col(string(R::Url))
                    .col(text_null(R::HomepageUrl))
                    .col(string_null(R::PrimaryLanguage))
                    .col(string_null(R::DefaultBranch))
                    .col(json_list(R::Topics))
                    // Flags
                    .col(flag(R::IsArchived))
                    .col(flag(R::IsFork))
                    .col(flag(R::IsPrivate))
                    .col(flag(R::IsTemplate))
                    .col(flag(R::HasIssuesEnabled))
                    .col(flag(R::HasWikiEnabled))
                    // Statistics
                    .col(bigint(R::StargazerCount))
                    .col(bigint(R::ForkCount))
                    // Timestamps
                    .col(timestamp(R::CreatedAt))
                    .col(timestamp(R::UpdatedAt))
                    .col(timestamp_null(R::PushedAt))
                    .to_owned(),
            )
            .await?;

        unique_per_version(
            manager,
            "idx_repositories_versioned_key",
            R::Table,
            vec![R::Owner, R::Name],
        )
        .await
    }

    async fn create_issues(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        use IssuesVersioned as I;

        manager
            .create_table(
                Table::create()
                    .table(I::Table)
                    .if_not_exists()
                    .col(uuid_pk(I::Id))
                    .col(int(I::Version))
                    .col(string(I::NodeId))
                    .col(bigint(I::DatabaseId))
                    .col(string(I::RepositoryOwner))
                    .col(string(I::RepositoryName))
                    .col(bigint(I::Number))
                    .col(string(I::Title))
                    .col(text(I::Body))
                    .col(string(I::State))
                    .col(string(I::Author))
                    .col(string(I::Url))
                    .col(flag(I::Locked))
                    .col(json_list(I::Assignees))
                    .col(json_list(I::Labels))
                    .col(timestamp(I::CreatedAt))
                    .col(timestamp(I::UpdatedAt))
                    .col(timestamp_null(I::ClosedAt))
                    .to_owned(),
            )
            .await?;

        unique_per_version(
            manager,
            "idx_issues_versioned_key",
            I::Table,
            vec![I::RepositoryOwner, I::RepositoryName, I::Number],
        )
        .await
    }

    async fn create_issue_comments(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        use IssueCommentsVersioned as C;

        manager
            .create_table(
                Table::create()
                    .table(C::Table)
                    .if_not_exists()
                    .col(uuid_pk(C::Id))
                    .col(int(C::Version))
                    .col(string(C::NodeId))
                    .col(bigint(C::DatabaseId))
                    .col(string(C::RepositoryOwner))
                    .col(string(C::RepositoryName))
                    .col(bigint(C::IssueNumber))
                    .col(bigint(C::Sequence))
                    .col(string(C::Author))
                    .col(text(C::Body))
                    .col(string(C::Url))
                    .col(timestamp(C::CreatedAt))
                    .col(timestamp(C::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        unique_per_version(
            manager,
            "idx_issue_comments_versioned_key",
            C::Table,
            vec![C::NodeId],
        )
        .await
    }

    async fn create_pull_requests(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        use PullRequestsVersioned as P;

        manager
            .create_table(
                Table::create()
                    .table(P::Table)
                    .if_not_exists()
                    .col(uuid_pk(P::Id))
                    .col(int(P::Version))
                    // Identity
                    .col(string(P::NodeId))
                    .col(bigint(P::DatabaseId))
                    .col(string(P::RepositoryOwner))
                    .col(string(P::RepositoryName))
                    .col(bigint(P::Number))
                    // Content
                    .col(string(P::Title))
                    .col(text(P::Body))
                    .col(string(P::State))
                    .col(string(P::Author))
                    .col(string(P::Url))
                    .col(string(P::BaseRefName))
                    .col(string(P::HeadRefName))
                    .col(json_list(P::Assignees))
                    .col(json_list(P::Labels))
                    // Status
                    .col(flag(P::IsDraft))
                    .col(flag(P::Locked))
                    .col(flag(P::Merged))
                    .col(bigint(P::Additions))
                    .col(bigint(P::Deletions))
                    .col(bigint(P::ChangedFiles))
                    // Timestamps
                    .col(timestamp(P::CreatedAt))
                    .col(timestamp(P::UpdatedAt))
                    .col(timestamp_null(P::ClosedAt))
                    .col(timestamp_null(P::MergedAt))
                    .to_owned(),
            )
            .await?;

        unique_per_version(
            manager,
            "idx_pull_requests_versioned_key",
            P::Table,
            vec![P::RepositoryOwner, P::RepositoryName, P::Number],
        )
        .await
    }

    async fn create_pull_request_comments(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        use PullRequestCommentsVersioned as C;

        manager
            .create_table(
                Table::create()
                    .table(C::Table)
                    .if_not_exists()
                    .col(uuid_pk(C::Id))
                    .col(int(C::Version))
                    .col(string(C::NodeId))
                    .col(bigint(C::DatabaseId))
                    .col(string(C::RepositoryOwner))
                    .col(string(C::RepositoryName))
                    .col(bigint(C::PullRequestNumber))
                    .col(bigint(C::Sequence))
                    .col(string(C::Author))
                    .col(text(C::Body))
                    .col(string(C::Url))
                    .col(timestamp(C::CreatedAt))
                    .col(timestamp(C::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        unique_per_version(
            manager,
            "idx_pull_request_comments_versioned_key",
            C::Table,
            vec![C::NodeId],
        )
        .await
    }

    async fn create_pull_request_reviews(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        use PullRequestReviewsVersioned as R;

        manager
            .create_table(
                Table::create()
                    .table(R::Table)
                    .if_not_exists()
                    .col(uuid_pk(R::Id))
                    .col(int(R::Version))
                    .col(string(R::NodeId))
                    .col(bigint(R::DatabaseId))
                    .col(string(R::RepositoryOwner))
                    .col(string(R::RepositoryName))
                    .col(bigint(R::PullRequestNumber))
                    .col(bigint(R::Sequence))
                    .col(string(R::Author))
                    .col(text(R::Body))
                    .col(string(R::State))
                    .col(string(R::Url))
                    .col(timestamp(R::CreatedAt))
                    .col(timestamp_null(R::SubmittedAt))
                    .to_owned(),
            )
            .await?;

        unique_per_version(
            manager,
            "idx_pull_request_reviews_versioned_key",
            R::Table,
            vec![R::NodeId],
        )
        .await?;

        // Review comments resolve their parent by database id
        manager
            .create_index(
                Index::create()
                    .name("idx_pull_request_reviews_versioned_database_id")
                    .table(R::Table)
                    .col(R::Version)
                    .col(R::DatabaseId)
                    .to_owned(),
            )
            .await
    }

    async fn create_pull_request_review_comments(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        use PullRequestReviewCommentsVersioned as C;

        manager
            .create_table(
                Table::create()
                    .table(C::Table)
                    .if_not_exists()
                    .col(uuid_pk(C::Id))
                    .col(int(C::Version))
                    // Identity
                    .col(string(C::NodeId))
                    .col(bigint(C::DatabaseId))
                    .col(string(C::RepositoryOwner))
                    .col(string(C::RepositoryName))
                    .col(bigint(C::PullRequestNumber))
                    .col(bigint(C::PullRequestReviewId))
                    .col(bigint(C::Sequence))
                    // Content
                    .col(string(C::Author))
                    .col(text(C::Body))
                    .col(string(C::Path))
                    .col(bigint_null(C::Position))
                    .col(bigint_null(C::OriginalPosition))
                    .col(text(C::DiffHunk))
                    .col(string(C::Url))
                    // Timestamps
                    .col(timestamp(C::CreatedAt))
                    .col(timestamp(C::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        unique_per_version(
            manager,
            "idx_pull_request_review_comments_versioned_key",
            C::Table,
            vec![C::NodeId],
        )
        .await
    }

    async fn create_organizations(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        use OrganizationsVersioned as O;

        manager
            .create_table(
                Table::create()
                    .table(O::Table)
                    .if_not_exists()
                    .col(uuid_pk(O::Id))
                    .col(int(O::Version))
                    .col(string(O::NodeId))
                    .col(bigint(O::DatabaseId))
                    .col(string(O::Login))
                    .col(string_null(O::Name))
                    .col(text_null(O::Description))
                    .col(string_null(O::Email))
                    .col(string_null(O::Location))
                    .col(string(O::Url))
                    .col(timestamp(O::CreatedAt))
                    .col(timestamp(O::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        unique_per_version(
            manager,
            "idx_organizations_versioned_key",
            O::Table,
            vec![O::Login],
        )
        .await
    }

    async fn create_users(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        use UsersVersioned as U;

        manager
            .create_table(
                Table::create()
                    .table(U::Table)
                    .if_not_exists()
                    .col(uuid_pk(U::Id))
                    .col(int(U::Version))
                    .col(string(U::NodeId))
                    .col(bigint(U::DatabaseId))
                    .col(string(U::Login))
                    .col(string_null(U::Name))
                    .col(string(U::Email))
                    .col(string_null(U::Company))
                    .col(string_null(U::Location))
                    .col(text_null(U::Bio))
                    .col(string(U::Url))
                    .col(timestamp(U::CreatedAt))
                    .col(timestamp(U::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        unique_per_version(manager, "idx_users_versioned_key", U::Table, vec![U::Login]).await
    }

    async fn create_active_version(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ActiveVersion::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActiveVersion::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(int(ActiveVersion::Version))
                    .col(
                        ColumnDef::new(ActiveVersion::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum RepositoriesVersioned {
    Table,
    Id,
    Version,
    NodeId,
    DatabaseId,
    Owner,
    Name,
    NameWithOwner,
    Description,
    Url,
    HomepageUrl,
    PrimaryLanguage,
    DefaultBranch,
    Topics,
    IsArchived,
    IsFork,
    IsPrivate,
    IsTemplate,
    HasIssuesEnabled,
    HasWikiEnabled,
    StargazerCount,
    ForkCount,
    CreatedAt,
    UpdatedAt,
    PushedAt,
}

#[derive(DeriveIden)]
enum IssuesVersioned {
    Table,
    Id,
    Version,
    NodeId,
    DatabaseId,
    RepositoryOwner,
    RepositoryName,
    Number,
    Title,
    Body,
    State,
    Author,
    Url,
    Locked,
    Assignees,
    Labels,
    CreatedAt,
    UpdatedAt,
    ClosedAt,
}

#[derive(DeriveIden)]
enum IssueCommentsVersioned {
    Table,
    Id,
    Version,
    NodeId,
    DatabaseId,
    RepositoryOwner,
    RepositoryName,
    IssueNumber,
    Sequence,
    Author,
    Body,
    Url,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PullRequestsVersioned {
    Table,
    Id,
    Version,
    NodeId,
    DatabaseId,
    RepositoryOwner,
    RepositoryName,
    Number,
    Title,
    Body,
    State,
    Author,
    Url,
    BaseRefName,
    HeadRefName,
    Assignees,
    Labels,
    IsDraft,
    Locked,
    Merged,
    Additions,
    Deletions,
    ChangedFiles,
    CreatedAt,
    UpdatedAt,
    ClosedAt,
    MergedAt,
}

#[derive(DeriveIden)]
enum PullRequestCommentsVersioned {
    Table,
    Id,
    Version,
    NodeId,
    DatabaseId,
    RepositoryOwner,
    RepositoryName,
    PullRequestNumber,
    Sequence,
    Author,
    Body,
    Url,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PullRequestReviewsVersioned {
    Table,
    Id,
    Version,
    NodeId,
    DatabaseId,
    RepositoryOwner,
    RepositoryName,
    PullRequestNumber,
    Sequence,
    Author,
    Body,
    State,
    Url,
    CreatedAt,
    SubmittedAt,
}

#[derive(DeriveIden)]
enum PullRequestReviewCommentsVersioned {
    Table,
    Id,
    Version,
    NodeId,
    DatabaseId,
    RepositoryOwner,
    RepositoryName,
    PullRequestNumber,
    PullRequestReviewId,
    Sequence,
    Author,
    Body,
    Path,
    Position,
    OriginalPosition,
    DiffHunk,
    Url,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OrganizationsVersioned {
    Table,
    Id,
    Version,
    NodeId,
    DatabaseId,
    Login,
    Name,
    Description,
    Email,
    Location,
    Url,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum UsersVersioned {
    Table,
    Id,
    Version,
    NodeId,
    DatabaseId,
    Login,
    Name,
    Email,
    Company,
    Location,
    Bio,
    Url,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ActiveVersion {
    Table,
    Id,
    Version,
    UpdatedAt,
}
