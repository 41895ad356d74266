//! End-to-end downloads from a scripted GraphQL source into SQLite.
//!
//! These tests require the `sqlite` and `migrate` features to be enabled.

#![cfg(all(feature = "sqlite", feature = "migrate"))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ghsnap::github::{
    Actor, Connection, GitHubError, Issue, IssueComment, IssueFields, Label, Organization,
    PageInfo, PullRequest, PullRequestFields, PullRequestReview, PullRequestReviewComment,
    PullRequestReviewFields, RateLimit, Repository, RepositoryFields,
};
use ghsnap::store::query;
use ghsnap::{
    ConnectionKind, DbStore, DownloadError, Downloader, GraphSource, PageRequest, PageSizes,
    StoreError, connect_and_migrate,
};
use serde_json::json;
use tokio::sync::Notify;

/// Any download should finish well within this on an in-memory database.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Parks the first follow-up fetch until released.
struct Pause {
    reached: Arc<Notify>,
    release: Arc<Notify>,
    used: AtomicBool,
}

/// Follow-up pages keyed by (parent, kind, cursor).
#[derive(Default)]
struct ScriptedSource {
    repository: Option<Repository>,
    pages: Mutex<HashMap<(String, ConnectionKind, String), serde_json::Value>>,
    pause: Option<Pause>,
}

impl ScriptedSource {
    fn page(
        self,
        parent: &str,
        kind: ConnectionKind,
        cursor: &str,
        page: serde_json::Value,
    ) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert((parent.to_string(), kind, cursor.to_string()), page);
        self
    }

    /// Signal `reached` on the first follow-up fetch, then wait for `release`.
    fn pausing_first_fetch(mut self, reached: Arc<Notify>, release: Arc<Notify>) -> Self {
        self.pause = Some(Pause {
            reached,
            release,
            used: AtomicBool::new(false),
        });
        self
    }
}

#[async_trait]
impl GraphSource for ScriptedSource {
    async fn repository(
        &self,
        owner: &str,
        name: &str,
        _sizes: &PageSizes,
    ) -> Result<Repository, GitHubError> {
        self.repository
            .clone()
            .ok_or_else(|| GitHubError::NotFound(format!("repository {owner}/{name}")))
    }

    async fn organization(
        &self,
        login: &str,
        _sizes: &PageSizes,
    ) -> Result<Organization, GitHubError> {
        Err(GitHubError::NotFound(format!("organization {login}")))
    }

    async fn fetch_page(
        &self,
        request: PageRequest<'_>,
    ) -> Result<Connection<serde_json::Value>, GitHubError> {
        if let Some(pause) = &self.pause
            && !pause.used.swap(true, Ordering::SeqCst)
        {
            pause.reached.notify_one();
            pause.release.notified().await;
        }
        let key = (
            request.parent.to_string(),
            request.kind,
            request.cursor.to_string(),
        );
        let page = self
            .pages
            .lock()
            .unwrap()
            .remove(&key)
            .ok_or_else(|| GitHubError::api(502, "bad gateway"))?;
        Ok(serde_json::from_value(page).expect("scripted page should decode"))
    }

    async fn rate_remaining(&self) -> Result<RateLimit, GitHubError> {
        Ok(RateLimit::default())
    }
}

fn comment(id: &str, database_id: i64, body: &str) -> IssueComment {
    IssueComment {
        id: id.to_string(),
        database_id,
        author: Some(Actor::new("carol")),
        body: body.to_string(),
        ..IssueComment::default()
    }
}

fn comment_page(id: &str, database_id: i64, body: &str, next: Option<&str>) -> serde_json::Value {
    json!({
        "nodes": [{
            "id": id,
            "databaseId": database_id,
            "author": { "login": "carol" },
            "body": body,
            "url": "",
            "createdAt": "2019-01-01T00:00:00Z",
            "updatedAt": "2019-01-01T00:00:00Z"
        }],
        "pageInfo": { "hasNextPage": next.is_some(), "endCursor": next }
    })
}

/// `src-d/go-git` with one issue whose comments span three pages and one
/// reviewed pull request. Comment database ids decrease in arrival order.
fn go_git() -> ScriptedSource {
    let repository = Repository {
        fields: RepositoryFields {
            id: "R_1".to_string(),
            name: "go-git".to_string(),
            name_with_owner: "src-d/go-git".to_string(),
            owner: Actor::new("src-d"),
            ..RepositoryFields::default()
        },
        issues: Connection::new(
            vec![Issue {
                fields: IssueFields {
                    id: "I_1".to_string(),
                    number: 1,
                    title: "Crash on clone".to_string(),
                    state: "OPEN".to_string(),
                    ..IssueFields::default()
                },
                labels: Connection::new(
                    vec![Label {
                        name: "bug".to_string(),
                    }],
                    PageInfo::last(),
                ),
                comments: Connection::new(
                    vec![comment("IC_1", 30, "c1")],
                    PageInfo::next("ic1"),
                ),
                ..Issue::default()
            }],
            PageInfo::last(),
        ),
        pull_requests: Connection::new(
            vec![PullRequest {
                fields: PullRequestFields {
                    id: "PR_41".to_string(),
                    number: 41,
                    title: "Fix crash".to_string(),
                    state: "OPEN".to_string(),
                    ..PullRequestFields::default()
                },
                reviews: Connection::new(
                    vec![PullRequestReview {
                        fields: PullRequestReviewFields {
                            id: "PRR_1".to_string(),
                            database_id: 900,
                            state: "COMMENTED".to_string(),
                            ..PullRequestReviewFields::default()
                        },
                        comments: Connection::new(
                            vec![PullRequestReviewComment {
                                id: "PRRC_1".to_string(),
                                path: "clone.go".to_string(),
                                ..PullRequestReviewComment::default()
                            }],
                            PageInfo::last(),
                        ),
                    }],
                    PageInfo::last(),
                ),
                ..PullRequest::default()
            }],
            PageInfo::last(),
        ),
        ..Repository::default()
    };

    ScriptedSource {
        repository: Some(repository),
        ..ScriptedSource::default()
    }
    .page(
        "I_1",
        ConnectionKind::IssueComments,
        "ic1",
        comment_page("IC_2", 20, "c2", Some("ic2")),
    )
    .page(
        "I_1",
        ConnectionKind::IssueComments,
        "ic2",
        comment_page("IC_3", 10, "c3", None),
    )
}

async fn setup_store() -> DbStore {
    let db = connect_and_migrate("sqlite::memory:")
        .await
        .expect("Failed to create test database");
    DbStore::new(db)
}

#[tokio::test]
async fn repository_download_is_committed_and_published() {
    let downloader =
        Downloader::new(Arc::new(go_git()), setup_store().await, PageSizes::default());

    let stats = tokio::time::timeout(
        DOWNLOAD_TIMEOUT,
        downloader.download_repository("src-d", "go-git", 1),
    )
    .await
    .expect("download should not hang")
    .unwrap();

    assert_eq!(stats.issues, 1);
    assert_eq!(stats.issue_comments, 3);
    assert_eq!(stats.pull_requests, 1);
    assert_eq!(stats.reviews, 1);
    assert_eq!(stats.review_comments, 1);
    assert_eq!(stats.pages_fetched, 2);

    downloader.set_current(1).await.unwrap();
    downloader.cleanup(1).await.unwrap();

    let snapshot = query::load_repository(downloader.store().connection(), "src-d", "go-git")
        .await
        .unwrap()
        .expect("active generation should hold the repository");
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.issues[0].labels, ["bug"]);
    let bodies: Vec<&str> = snapshot.issues[0]
        .comments
        .iter()
        .map(|c| c.body.as_str())
        .collect();
    assert_eq!(bodies, ["c1", "c2", "c3"]);
    assert_eq!(snapshot.pull_requests[0].reviews[0].comments[0].path, "clone.go");
}

#[tokio::test]
async fn failed_page_rolls_back_the_whole_generation() {
    // The second comment page is missing, so the source answers 502.
    let source = ScriptedSource {
        repository: go_git().repository,
        ..ScriptedSource::default()
    }
    .page(
        "I_1",
        ConnectionKind::IssueComments,
        "ic1",
        comment_page("IC_2", 20, "c2", Some("ic2")),
    );
    let downloader = Downloader::new(Arc::new(source), setup_store().await, PageSizes::default());

    let err = downloader
        .download_repository("src-d", "go-git", 1)
        .await
        .unwrap_err();

    assert!(err.is_fetch());
    assert!(matches!(err, DownloadError::Fetch { .. }));
    let db = downloader.store().connection();
    assert!(query::versions(db).await.unwrap().is_empty());
    assert_eq!(query::next_version(db).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_generation_does_not_disturb_the_active_one() {
    let store = setup_store().await;
    let first = Downloader::new(Arc::new(go_git()), store, PageSizes::default());
    first.download_repository("src-d", "go-git", 1).await.unwrap();
    first.set_current(1).await.unwrap();

    let broken = ScriptedSource {
        repository: go_git().repository,
        ..ScriptedSource::default()
    };
    let second = Downloader::new(Arc::new(broken), first.into_store(), PageSizes::default());
    assert!(second.download_repository("src-d", "go-git", 2).await.is_err());

    let db = second.store().connection();
    assert_eq!(query::versions(db).await.unwrap(), [1]);
    let snapshot = query::load_repository(db, "src-d", "go-git")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.issues[0].comments.len(), 3);
}

#[tokio::test]
async fn overlapping_download_cannot_retag_the_open_generation() {
    let reached = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let source = go_git().pausing_first_fetch(Arc::clone(&reached), Arc::clone(&release));
    let downloader = Downloader::new(Arc::new(source), setup_store().await, PageSizes::default());

    // The second download starts while the first is parked mid-traversal,
    // with its repository and issue already saved.
    let first = downloader.download_repository("src-d", "go-git", 1);
    let second = async {
        reached.notified().await;
        let result = downloader.download_repository("src-d", "go-git", 2).await;
        release.notify_one();
        result
    };
    let (first, second) = tokio::time::timeout(DOWNLOAD_TIMEOUT, async {
        tokio::join!(first, second)
    })
    .await
    .expect("downloads should not hang");

    assert_eq!(first.unwrap().issue_comments, 3);
    let err = second.unwrap_err();
    assert!(matches!(
        err,
        DownloadError::Store {
            source: StoreError::TransactionInProgress,
            ..
        }
    ));

    let db = downloader.store().connection();
    assert_eq!(query::versions(db).await.unwrap(), [1]);
    let snapshot = query::load_repository_at(db, 1, "src-d", "go-git")
        .await
        .unwrap()
        .expect("generation 1 should hold the whole repository");
    let bodies: Vec<&str> = snapshot.issues[0]
        .comments
        .iter()
        .map(|c| c.body.as_str())
        .collect();
    assert_eq!(bodies, ["c1", "c2", "c3"]);
    assert_eq!(snapshot.pull_requests[0].reviews.len(), 1);
}
