//! One-way migration of downloaded pull requests to another code host.
//!
//! The bridge reads a repository held in a [`MemStore`] and re-creates its
//! open pull requests through a [`PullRequestWriter`]: the pull request, then
//! its top-level comments, then one comment per review with that review's
//! comments attached as replies. It knows nothing about pagination or
//! generations.

#[cfg(feature = "bitbucket")]
pub mod bitbucket;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::download::{DownloadError, Downloader};
use crate::github::types::author_login;
use crate::http::HttpError;
use crate::source::{GraphSource, PageSizes};
use crate::store::{MemStore, PullRequestEntry, Repo};

#[cfg(feature = "bitbucket")]
pub use bitbucket::BitbucketClient;

/// Longest comment text sent to the target, marker included.
pub const MAX_COMMENT_CHARS: usize = 1000;

const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("HTTP error: {0}")]
    Transport(#[from] HttpError),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("Repository {0} is not in the downloaded snapshot")]
    RepositoryMissing(String),

    #[error(transparent)]
    Download(#[from] DownloadError),
}

/// Pull request to create on the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub description: String,
    /// Source branch name.
    pub from_branch: String,
    /// Target branch name.
    pub to_branch: String,
}

/// Write side of the target code host.
#[async_trait]
pub trait PullRequestWriter: Send + Sync {
    /// Create a pull request and return its id on the target.
    async fn create_pull_request(&self, pull_request: &NewPullRequest) -> Result<i64, BridgeError>;

    /// Create a comment, optionally as a reply to `parent`, and return its id.
    async fn create_comment(
        &self,
        pull_request_id: i64,
        text: &str,
        parent: Option<i64>,
    ) -> Result<i64, BridgeError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigratedPullRequest {
    pub number: i64,
    pub target_id: i64,
    pub comments: usize,
    pub reviews: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPullRequest {
    pub number: i64,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedPullRequest {
    pub number: i64,
    pub error: String,
}

/// Outcome of one repository migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub migrated: Vec<MigratedPullRequest>,
    /// Pull requests not in the `OPEN` state.
    pub skipped: Vec<SkippedPullRequest>,
    pub failed: Vec<FailedPullRequest>,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Cut `text` to [`MAX_COMMENT_CHARS`] characters, ending in `...` when cut.
pub fn truncate_comment(text: &str) -> String {
    if text.chars().count() <= MAX_COMMENT_CHARS {
        return text.to_string();
    }
    let keep = MAX_COMMENT_CHARS - TRUNCATION_MARKER.len();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

fn comment_text(author: &str, body: &str) -> String {
    truncate_comment(&format!("{author}: {body}"))
}

/// Download one repository into a fresh [`MemStore`].
///
/// The download runs as generation 0; the in-memory store ignores
/// generations anyway.
pub async fn fetch_into_memory(
    source: Arc<dyn GraphSource>,
    owner: &str,
    name: &str,
    sizes: PageSizes,
) -> Result<MemStore, BridgeError> {
    let downloader = Downloader::new(source, MemStore::new(), sizes);
    downloader.download_repository(owner, name, 0).await?;
    Ok(downloader.into_store())
}

/// Look up `owner/name` in a store filled by [`fetch_into_memory`].
pub fn downloaded_repository(
    store: &MemStore,
    owner: &str,
    name: &str,
) -> Result<Repo, BridgeError> {
    store
        .repository(owner, name)
        .ok_or_else(|| BridgeError::RepositoryMissing(format!("{owner}/{name}")))
}

/// Re-create every open pull request of `repo` through `writer`.
///
/// Pull requests are migrated in ascending number order. A failure on one
/// pull request is recorded and the next one is attempted.
pub async fn migrate_repository(repo: &Repo, writer: &dyn PullRequestWriter) -> MigrationReport {
    let mut report = MigrationReport::default();

    for (number, entry) in &repo.pull_requests {
        if !entry.pull_request.is_open() {
            tracing::debug!(number, state = %entry.pull_request.state, "Skipping pull request");
            report.skipped.push(SkippedPullRequest {
                number: *number,
                state: entry.pull_request.state.clone(),
            });
            continue;
        }

        match migrate_pull_request(entry, writer).await {
            Ok(migrated) => {
                tracing::info!(
                    number,
                    target_id = migrated.target_id,
                    comments = migrated.comments,
                    reviews = migrated.reviews,
                    "Migrated pull request"
                );
                report.migrated.push(migrated);
            }
            Err(err) => {
                tracing::error!(number, error = %err, "Failed to migrate pull request");
                report.failed.push(FailedPullRequest {
                    number: *number,
                    error: err.to_string(),
                });
            }
        }
    }

    report
}

async fn migrate_pull_request(
    entry: &PullRequestEntry,
    writer: &dyn PullRequestWriter,
) -> Result<MigratedPullRequest, BridgeError> {
    let pr = &entry.pull_request;
    let target_id = writer
        .create_pull_request(&NewPullRequest {
            title: pr.title.clone(),
            description: pr.body.clone(),
            from_branch: pr.head_ref_name.clone(),
            to_branch: pr.base_ref_name.clone(),
        })
        .await?;

    for comment in &entry.comments {
        writer
            .create_comment(
                target_id,
                &comment_text(author_login(&comment.author), &comment.body),
                None,
            )
            .await?;
    }

    for entry in entry.reviews.values() {
        let review = &entry.review;
        let heading = format!("{} ({})", author_login(&review.author), review.state);
        let review_id = writer
            .create_comment(target_id, &comment_text(&heading, &review.body), None)
            .await?;

        for comment in &entry.comments {
            let heading = format!("{} on {}", author_login(&comment.author), comment.path);
            writer
                .create_comment(
                    target_id,
                    &comment_text(&heading, &comment.body),
                    Some(review_id),
                )
                .await?;
        }
    }

    Ok(MigratedPullRequest {
        number: pr.number,
        target_id,
        comments: entry.comments.len(),
        reviews: entry.reviews.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::types::{
        Actor, IssueComment, PullRequestFields, PullRequestReviewComment, PullRequestReviewFields,
        RepositoryFields,
    };
    use crate::store::{MetadataStore, ReviewEntry};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Records calls and hands out increasing ids.
    #[derive(Default)]
    struct RecordingWriter {
        calls: Mutex<Vec<String>>,
        fail_title: Option<String>,
    }

    impl RecordingWriter {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn next_id(&self, call: String) -> i64 {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            calls.len() as i64
        }
    }

    #[async_trait]
    impl PullRequestWriter for RecordingWriter {
        async fn create_pull_request(&self, pr: &NewPullRequest) -> Result<i64, BridgeError> {
            if self.fail_title.as_deref() == Some(pr.title.as_str()) {
                return Err(BridgeError::Api {
                    status: 409,
                    message: "duplicate".into(),
                });
            }
            Ok(self.next_id(format!("pr {} {}->{}", pr.title, pr.from_branch, pr.to_branch)))
        }

        async fn create_comment(
            &self,
            pull_request_id: i64,
            text: &str,
            parent: Option<i64>,
        ) -> Result<i64, BridgeError> {
            Ok(self.next_id(format!("comment on {pull_request_id} parent={parent:?} {text}")))
        }
    }

    fn entry(number: i64, state: &str) -> PullRequestEntry {
        PullRequestEntry {
            pull_request: PullRequestFields {
                number,
                title: format!("PR {number}"),
                state: state.into(),
                head_ref_name: "feature".into(),
                base_ref_name: "master".into(),
                ..PullRequestFields::default()
            },
            assignees: Vec::new(),
            labels: Vec::new(),
            comments: Vec::new(),
            reviews: BTreeMap::new(),
        }
    }

    fn repo(entries: Vec<PullRequestEntry>) -> Repo {
        Repo {
            fields: RepositoryFields::default(),
            topics: Vec::new(),
            pull_requests: entries
                .into_iter()
                .map(|e| (e.pull_request.number, e))
                .collect(),
        }
    }

    #[test]
    fn truncate_keeps_short_text_and_cuts_long_text() {
        assert_eq!(truncate_comment("short"), "short");

        let long = "ü".repeat(MAX_COMMENT_CHARS + 10);
        let cut = truncate_comment(&long);
        assert_eq!(cut.chars().count(), MAX_COMMENT_CHARS);
        assert!(cut.ends_with("..."));

        let exact = "a".repeat(MAX_COMMENT_CHARS);
        assert_eq!(truncate_comment(&exact), exact);
    }

    #[tokio::test]
    async fn migrates_pull_request_then_comments_then_review_threads() {
        let mut open = entry(3, "OPEN");
        open.comments.push(IssueComment {
            author: Some(Actor::new("alice")),
            body: "first".into(),
            ..IssueComment::default()
        });
        open.reviews.insert(
            20,
            ReviewEntry {
                review: PullRequestReviewFields {
                    database_id: 20,
                    author: Some(Actor::new("bob")),
                    state: "CHANGES_REQUESTED".into(),
                    body: "needs work".into(),
                    ..PullRequestReviewFields::default()
                },
                comments: vec![PullRequestReviewComment {
                    author: None,
                    path: "main.go".into(),
                    body: "typo".into(),
                    ..PullRequestReviewComment::default()
                }],
            },
        );
        let writer = RecordingWriter::default();

        let report = migrate_repository(&repo(vec![open]), &writer).await;

        assert_eq!(
            writer.calls(),
            [
                "pr PR 3 feature->master",
                "comment on 1 parent=None alice: first",
                "comment on 1 parent=None bob (CHANGES_REQUESTED): needs work",
                "comment on 1 parent=Some(3) ghost on main.go: typo",
            ]
        );
        assert_eq!(
            report.migrated,
            [MigratedPullRequest {
                number: 3,
                target_id: 1,
                comments: 1,
                reviews: 1
            }]
        );
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn skips_closed_and_merged_pull_requests_but_reports_them() {
        let writer = RecordingWriter::default();
        let report = migrate_repository(
            &repo(vec![entry(1, "CLOSED"), entry(2, "OPEN"), entry(3, "MERGED")]),
            &writer,
        )
        .await;

        assert_eq!(writer.calls(), ["pr PR 2 feature->master"]);
        let skipped: Vec<(i64, &str)> = report
            .skipped
            .iter()
            .map(|s| (s.number, s.state.as_str()))
            .collect();
        assert_eq!(skipped, [(1, "CLOSED"), (3, "MERGED")]);
    }

    #[tokio::test]
    async fn failure_on_one_pull_request_does_not_stop_the_rest() {
        let writer = RecordingWriter {
            fail_title: Some("PR 1".into()),
            ..RecordingWriter::default()
        };

        let repo = repo(vec![entry(1, "OPEN"), entry(2, "OPEN")]);
        let report = migrate_repository(&repo, &writer).await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].number, 1);
        assert_eq!(report.migrated.len(), 1);
        assert_eq!(report.migrated[0].number, 2);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn downloaded_repository_reports_missing_repository() {
        let store = MemStore::new();
        store
            .save_repository(
                &RepositoryFields {
                    name: "go-git".into(),
                    owner: Actor::new("src-d"),
                    ..RepositoryFields::default()
                },
                &[],
            )
            .await
            .unwrap();

        assert!(downloaded_repository(&store, "src-d", "go-git").is_ok());
        let err = downloaded_repository(&store, "src-d", "gitbase").unwrap_err();
        assert!(matches!(err, BridgeError::RepositoryMissing(ref r) if r == "src-d/gitbase"));
    }

    #[tokio::test]
    async fn fetch_into_memory_downloads_pull_requests() {
        use crate::github::types::{Connection, PageInfo, PullRequest, Repository};
        use crate::source::FakeSource;

        let source = FakeSource::new().with_repository(Repository {
            fields: RepositoryFields {
                id: "R_1".into(),
                name: "go-git".into(),
                owner: Actor::new("src-d"),
                ..RepositoryFields::default()
            },
            pull_requests: Connection::new(
                vec![PullRequest {
                    fields: PullRequestFields {
                        id: "PR_5".into(),
                        number: 5,
                        state: "OPEN".into(),
                        ..PullRequestFields::default()
                    },
                    ..PullRequest::default()
                }],
                PageInfo::last(),
            ),
            ..Repository::default()
        });

        let store = fetch_into_memory(Arc::new(source), "src-d", "go-git", PageSizes::default())
            .await
            .unwrap();

        let repo = downloaded_repository(&store, "src-d", "go-git").unwrap();
        assert_eq!(repo.pull_requests.keys().copied().collect::<Vec<_>>(), [5]);
    }
}
