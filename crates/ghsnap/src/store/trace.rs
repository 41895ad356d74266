//! Diagnostic store for dry runs.
//!
//! Every save writes one indented line describing what was fetched; nothing is
//! kept. Lifecycle and generation calls do nothing.

use std::io::{self, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::MetadataStore;
use super::errors::Result;
use crate::github::types::{
    IssueComment, IssueFields, OrganizationFields, PullRequestFields, PullRequestReviewComment,
    PullRequestReviewFields, RepositoryFields, UserExtended, author_login,
};

const EXCERPT_CHARS: usize = 40;

/// First [`EXCERPT_CHARS`] characters of `body`, with `...` when cut.
pub(crate) fn excerpt(body: &str) -> String {
    if body.chars().count() <= EXCERPT_CHARS {
        return body.to_string();
    }
    match body.char_indices().nth(EXCERPT_CHARS - 1) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

fn timestamp(at: Option<&DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
}

pub struct TraceStore {
    out: Mutex<Box<dyn Write + Send>>,
}

impl TraceStore {
    /// Trace to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    fn line(&self, depth: usize, text: String) -> Result<()> {
        tracing::debug!(trace = %text, "Dry-run save");
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{:indent$}{text}", "", indent = depth * 2)?;
        Ok(())
    }
}

impl Default for TraceStore {
    fn default() -> Self {
        Self::stdout()
    }
}

impl std::fmt::Debug for TraceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl MetadataStore for TraceStore {
    async fn save_organization(&self, organization: &OrganizationFields) -> Result<()> {
        self.line(0, format!("organization {}", organization.login))
    }

    async fn save_user(&self, user: &UserExtended) -> Result<()> {
        self.line(1, format!("member {}", user.login))
    }

    async fn save_repository(
        &self,
        repository: &RepositoryFields,
        topics: &[String],
    ) -> Result<()> {
        self.line(
            0,
            format!(
                "repository {}/{} topics=[{}]",
                repository.owner.login,
                repository.name,
                topics.join(", ")
            ),
        )
    }

    async fn save_issue(
        &self,
        _owner: &str,
        _name: &str,
        issue: &IssueFields,
        assignees: &[String],
        labels: &[String],
    ) -> Result<()> {
        self.line(
            0,
            format!(
                "issue #{} {} assignees=[{}] labels=[{}]",
                issue.number,
                issue.title,
                assignees.join(", "),
                labels.join(", ")
            ),
        )
    }

    async fn save_issue_comment(
        &self,
        _owner: &str,
        _name: &str,
        _issue_number: i64,
        comment: &IssueComment,
    ) -> Result<()> {
        self.line(
            1,
            format!(
                "issue comment by {} at {}: {:?}",
                author_login(&comment.author),
                timestamp(Some(&comment.created_at)),
                excerpt(&comment.body)
            ),
        )
    }

    async fn save_pull_request(
        &self,
        _owner: &str,
        _name: &str,
        pull_request: &PullRequestFields,
        assignees: &[String],
        labels: &[String],
    ) -> Result<()> {
        self.line(
            0,
            format!(
                "pull request #{} {} [{}] assignees=[{}] labels=[{}]",
                pull_request.number,
                pull_request.title,
                pull_request.state,
                assignees.join(", "),
                labels.join(", ")
            ),
        )
    }

    async fn save_pull_request_comment(
        &self,
        _owner: &str,
        _name: &str,
        _pull_request_number: i64,
        comment: &IssueComment,
    ) -> Result<()> {
        self.line(
            1,
            format!(
                "comment by {} at {}: {:?}",
                author_login(&comment.author),
                timestamp(Some(&comment.created_at)),
                excerpt(&comment.body)
            ),
        )
    }

    async fn save_pull_request_review(
        &self,
        _owner: &str,
        _name: &str,
        _pull_request_number: i64,
        review: &PullRequestReviewFields,
    ) -> Result<()> {
        self.line(
            1,
            format!(
                "review {} by {} at {}: {:?}",
                review.state,
                author_login(&review.author),
                timestamp(review.submitted_at.as_ref()),
                excerpt(&review.body)
            ),
        )
    }

    async fn save_pull_request_review_comment(
        &self,
        _owner: &str,
        _name: &str,
        _pull_request_number: i64,
        _review_id: i64,
        comment: &PullRequestReviewComment,
    ) -> Result<()> {
        self.line(
            2,
            format!(
                "review comment by {} on {}: {:?}",
                author_login(&comment.author),
                comment.path,
                excerpt(&comment.body)
            ),
        )
    }

    async fn begin(&self, _version: i32) -> Result<()> {
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        Ok(())
    }

    async fn set_active_version(&self, _version: i32) -> Result<()> {
        Ok(())
    }

    async fn cleanup(&self, _current_version: i32) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::types::Actor;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn excerpt_cuts_long_bodies_on_char_boundaries() {
        assert_eq!(excerpt("short"), "short");
        let long = "é".repeat(50);
        let cut = excerpt(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), EXCERPT_CHARS - 1 + 3);
        assert_eq!(excerpt(&"x".repeat(EXCERPT_CHARS)), "x".repeat(EXCERPT_CHARS));
    }

    #[tokio::test]
    async fn writes_one_line_per_save() {
        let buffer = SharedBuffer::default();
        let store = TraceStore::new(buffer.clone());

        let repository = RepositoryFields {
            name: "go-git".into(),
            owner: Actor::new("src-d"),
            ..RepositoryFields::default()
        };
        store
            .save_repository(&repository, &["git".into(), "go".into()])
            .await
            .unwrap();
        store
            .save_pull_request(
                "src-d",
                "go-git",
                &PullRequestFields {
                    number: 42,
                    title: "Fix packfile".into(),
                    state: "OPEN".into(),
                    ..PullRequestFields::default()
                },
                &[],
                &["bug".into()],
            )
            .await
            .unwrap();
        store
            .save_pull_request_comment(
                "src-d",
                "go-git",
                42,
                &IssueComment {
                    author: None,
                    body: "lgtm".into(),
                    ..IssueComment::default()
                },
            )
            .await
            .unwrap();

        let lines: Vec<String> = buffer.contents().lines().map(String::from).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "repository src-d/go-git topics=[git, go]");
        assert_eq!(
            lines[1],
            "pull request #42 Fix packfile [OPEN] assignees=[] labels=[bug]"
        );
        assert!(lines[2].starts_with("  comment by ghost at "));
        assert!(lines[2].ends_with(": \"lgtm\""));
    }

    #[tokio::test]
    async fn lifecycle_calls_are_silent() {
        let buffer = SharedBuffer::default();
        let store = TraceStore::new(buffer.clone());

        store.begin(3).await.unwrap();
        store.set_active_version(3).await.unwrap();
        store.cleanup(3).await.unwrap();
        store.rollback().await.unwrap();
        store.commit().await.unwrap();

        assert!(buffer.contents().is_empty());
    }
}
