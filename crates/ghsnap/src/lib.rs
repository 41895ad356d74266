//! ghsnap - versioned snapshots of GitHub metadata.
//!
//! This library walks a repository's (or an organization's) GraphQL graph
//! depth-first, draining every cursor-paginated connection, and hands each
//! resolved entity to a [`MetadataStore`]. Every download is tagged with a
//! generation number and written inside a single transaction, so readers of
//! the durable store only ever observe complete generations.
//!
//! # Features
//!
//! - `github` - Enables the reqwest-backed GitHub GraphQL client.
//! - `bitbucket` - Enables the Bitbucket Server pull request writer.
//! - `migrate` - Enables database migration support via [`connect_and_migrate`].
//! - `sqlite` / `postgres` - Database drivers for the durable store.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ghsnap::{DbStore, Downloader, GitHubClient, PageSizes, connect_and_migrate};
//!
//! let db = connect_and_migrate("sqlite://ghsnap.db?mode=rwc").await?;
//! let client = GitHubClient::new(&token, None)?;
//! let downloader = Downloader::new(Arc::new(client), DbStore::new(db), PageSizes::default());
//!
//! let version = 7;
//! downloader.download_repository("src-d", "go-git", version).await?;
//! downloader.set_current(version).await?;
//! downloader.cleanup(version).await?;
//! ```

pub mod bridge;
pub mod db;
pub mod download;
pub mod entity;
pub mod github;
pub mod http;
pub mod rate_limit;
pub mod retry;
pub mod source;
pub mod store;
pub mod walk;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use download::{
    DownloadError, DownloadProgress, Downloader, OrganizationStats, ProgressCallback,
    RepositoryStats,
};
pub use github::{GitHubClient, GitHubError};
pub use rate_limit::ApiRateLimiter;
pub use retry::RetryConfig;
pub use source::{ConnectionKind, GraphSource, PageRequest, PageSizes};
pub use store::{DbStore, MemStore, MetadataStore, StoreError, TraceStore};
pub use walk::Walker;
