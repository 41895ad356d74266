//! Traversal orchestration.
//!
//! A [`Downloader`] walks one repository (or one organization) depth-first and
//! hands every resolved entity to its [`MetadataStore`]. The visiting order is
//! fixed:
//!
//! - repository: topics, then the repository itself, then every issue, then
//!   every pull request;
//! - issue: assignees and labels (both drained), the issue, then its comments;
//! - pull request: assignees and labels, the pull request, its comments, then
//!   each review followed immediately by that review's comments;
//! - organization: the organization, then each member.
//!
//! A parent is therefore always saved before any of its children, and sibling
//! subtrees are never interleaved. Any error aborts the whole traversal and
//! rolls the store back.
//!
//! # Example
//!
//! ```ignore
//! let downloader = Downloader::new(source, store, PageSizes::default())
//!     .with_progress(callback);
//! let stats = downloader.download_repository("src-d", "go-git", 12).await?;
//! downloader.set_current(12).await?;
//! downloader.cleanup(12).await?;
//! ```

mod error;
mod organization;
mod progress;
mod repository;
mod types;

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;

pub use error::{DownloadError, Result};
pub use progress::{DownloadProgress, ProgressCallback, emit};
pub use types::{OrganizationStats, RepositoryStats};

use crate::github::GitHubError;
use crate::github::types::RateLimit;
use crate::source::{GraphSource, PageSizes};
use crate::store::MetadataStore;
use crate::walk::Walker;

pub struct Downloader<S> {
    source: Arc<dyn GraphSource>,
    store: S,
    sizes: PageSizes,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl<S: MetadataStore> Downloader<S> {
    /// Page sizes are clamped into the API's accepted range.
    pub fn new(source: Arc<dyn GraphSource>, store: S, sizes: PageSizes) -> Self {
        Self {
            source,
            store,
            sizes: sizes.clamped(),
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, callback: Arc<ProgressCallback>) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn page_sizes(&self) -> &PageSizes {
        &self.sizes
    }

    fn emit(&self, event: DownloadProgress) {
        emit(self.on_progress.as_deref(), event);
    }

    /// Download a repository as generation `version` inside one transaction.
    ///
    /// On failure the transaction is rolled back and the original error is
    /// returned; a failing rollback is only logged.
    pub async fn download_repository(
        &self,
        owner: &str,
        name: &str,
        version: i32,
    ) -> Result<RepositoryStats> {
        tracing::info!(owner, name, version, "Downloading repository");
        self.emit(DownloadProgress::RepositoryStarted {
            owner: owner.to_string(),
            name: name.to_string(),
            version,
        });

        let mut stats = RepositoryStats::new(owner, name, version);
        let result = self
            .in_transaction(version, self.walk_repository(owner, name, &mut stats))
            .await;

        match result {
            Ok(()) => {
                tracing::info!(
                    owner,
                    name,
                    version,
                    issues = stats.issues,
                    pull_requests = stats.pull_requests,
                    pages = stats.pages_fetched,
                    "Repository downloaded"
                );
                self.emit(DownloadProgress::RepositoryFinished {
                    owner: owner.to_string(),
                    name: name.to_string(),
                    version,
                    issues: stats.issues,
                    pull_requests: stats.pull_requests,
                });
                Ok(stats)
            }
            Err(err) => {
                self.emit(DownloadProgress::RepositoryFailed {
                    owner: owner.to_string(),
                    name: name.to_string(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Download an organization and its members as generation `version`.
    pub async fn download_organization(
        &self,
        login: &str,
        version: i32,
    ) -> Result<OrganizationStats> {
        tracing::info!(login, version, "Downloading organization");
        self.emit(DownloadProgress::OrganizationStarted {
            login: login.to_string(),
            version,
        });

        let mut stats = OrganizationStats::new(login, version);
        let result = self
            .in_transaction(version, self.walk_organization(login, &mut stats))
            .await;

        match result {
            Ok(()) => {
                tracing::info!(login, version, members = stats.members, "Organization downloaded");
                self.emit(DownloadProgress::OrganizationFinished {
                    login: login.to_string(),
                    version,
                    members: stats.members,
                });
                Ok(stats)
            }
            Err(err) => {
                self.emit(DownloadProgress::OrganizationFailed {
                    login: login.to_string(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Publish `version` as the generation readers see.
    pub async fn set_current(&self, version: i32) -> Result<()> {
        self.store
            .set_active_version(version)
            .await
            .map_err(|e| DownloadError::store(format!("active generation {version}"), e))?;
        self.emit(DownloadProgress::Activated { version });
        Ok(())
    }

    /// Remove every generation except `version` and the active one.
    pub async fn cleanup(&self, version: i32) -> Result<()> {
        self.store
            .cleanup(version)
            .await
            .map_err(|e| DownloadError::store(format!("cleanup around generation {version}"), e))?;
        self.emit(DownloadProgress::CleanedUp { version });
        Ok(())
    }

    pub async fn rate_remaining(&self) -> std::result::Result<RateLimit, GitHubError> {
        self.source.rate_remaining().await
    }

    /// Run `traversal` between `begin` and `commit`, rolling back on error.
    async fn in_transaction<F>(&self, version: i32, traversal: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        self.store
            .begin(version)
            .await
            .map_err(|e| DownloadError::store(format!("begin generation {version}"), e))?;

        if let Err(err) = traversal.await {
            tracing::warn!(version, error = %err, "Traversal failed, rolling back");
            if let Err(rollback) = self.store.rollback().await {
                tracing::error!(version, error = %rollback, "Rollback failed");
            }
            return Err(err);
        }

        self.store
            .commit()
            .await
            .map_err(|e| DownloadError::store(format!("commit generation {version}"), e))
    }

    fn walker<'a, T: DeserializeOwned>(
        &'a self,
        parent: &str,
        kind: crate::source::ConnectionKind,
        first: crate::github::types::Connection<T>,
    ) -> Walker<'a, T> {
        Walker::new(self.source.as_ref(), &self.sizes, parent, kind, first)
    }

    /// Next page of `walker`, reporting fetched follow-up pages.
    async fn next_page<T: DeserializeOwned>(
        &self,
        walker: &mut Walker<'_, T>,
    ) -> Result<Option<Vec<T>>> {
        let before = walker.fetches();
        let page = walker.next_page().await.map_err(|e| {
            DownloadError::fetch(format!("{} of {}", walker.kind(), walker.parent()), e)
        })?;

        if walker.fetches() > before
            && let Some(nodes) = &page
        {
            self.emit(DownloadProgress::PageFetched {
                connection: walker.kind().describe(),
                count: nodes.len(),
            });
        }
        Ok(page)
    }

    /// Drain a connection whose nodes are needed as a whole, such as the
    /// assignees attached to one save.
    async fn drain<T: DeserializeOwned>(
        &self,
        mut walker: Walker<'_, T>,
        pages: &mut usize,
    ) -> Result<Vec<T>> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page(&mut walker).await? {
            all.extend(page);
        }
        *pages += walker.fetches();
        Ok(all)
    }
}

impl<S> std::fmt::Debug for Downloader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("sizes", &self.sizes)
            .finish_non_exhaustive()
    }
}
