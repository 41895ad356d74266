//! Generic cursor pagination walker.
//!
//! A [`Walker`] starts from the first page embedded in the parent's own query
//! response and fetches follow-up pages one at a time, only when the caller
//! asks for the next page. The caller is expected to finish processing a page
//! before asking for the next one; nothing is fetched ahead.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::github::GitHubError;
use crate::github::types::{Connection, PageInfo};
use crate::source::{ConnectionKind, GraphSource, PageRequest, PageSizes};

/// Drains one connection of one parent, page by page.
///
/// ```ignore
/// let kind = ConnectionKind::IssueComments;
/// let mut comments = Walker::new(source, &sizes, &issue.id, kind, first_page);
/// while let Some(page) = comments.next_page().await? {
///     for comment in page {
///         store.save_issue_comment(owner, name, issue.number, &comment).await?;
///     }
/// }
/// ```
pub struct Walker<'a, T> {
    source: &'a dyn GraphSource,
    sizes: &'a PageSizes,
    parent: String,
    kind: ConnectionKind,
    pending: Option<Vec<T>>,
    page_info: PageInfo,
    last_cursor: Option<String>,
    fetches: usize,
    _node: PhantomData<fn() -> T>,
}

impl<'a, T: DeserializeOwned> Walker<'a, T> {
    /// Start a walk from the already-resolved first page.
    pub fn new(
        source: &'a dyn GraphSource,
        sizes: &'a PageSizes,
        parent: impl Into<String>,
        kind: ConnectionKind,
        first: Connection<T>,
    ) -> Self {
        Self {
            source,
            sizes,
            parent: parent.into(),
            kind,
            pending: Some(first.nodes),
            page_info: first.page_info,
            last_cursor: None,
            fetches: 0,
            _node: PhantomData,
        }
    }

    /// Number of follow-up pages fetched so far.
    pub fn fetches(&self) -> usize {
        self.fetches
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Return the next page of nodes, or `None` once the connection is drained.
    ///
    /// The first call returns the embedded first page without fetching.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>, GitHubError> {
        if let Some(nodes) = self.pending.take() {
            return Ok(Some(nodes));
        }
        if !self.page_info.has_next_page {
            return Ok(None);
        }

        let cursor = match self.page_info.end_cursor.as_deref() {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => {
                return Err(GitHubError::malformed(
                    self.kind.describe(),
                    "hasNextPage is set but endCursor is empty",
                ));
            }
        };
        if self.last_cursor.as_deref() == Some(cursor.as_str()) {
            return Err(GitHubError::malformed(
                self.kind.describe(),
                format!("cursor {cursor} did not advance"),
            ));
        }

        let page = self
            .source
            .fetch_page(PageRequest {
                parent: &self.parent,
                kind: self.kind,
                page_size: self.sizes.for_kind(self.kind),
                cursor: &cursor,
                sizes: self.sizes,
            })
            .await?;
        self.fetches += 1;

        let nodes = page
            .nodes
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?;

        tracing::trace!(
            connection = self.kind.describe(),
            parent = %self.parent,
            count = nodes.len(),
            has_next_page = page.page_info.has_next_page,
            "Fetched page"
        );

        self.page_info = page.page_info;
        self.last_cursor = Some(cursor);
        Ok(Some(nodes))
    }

    /// Drain the whole connection into one vector, in arrival order.
    #[cfg(test)]
    pub(crate) async fn collect(&mut self) -> Result<Vec<T>, GitHubError> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::types::{Actor, IssueComment};
    use crate::source::FakeSource;

    fn comment(id: &str) -> IssueComment {
        IssueComment {
            id: id.to_string(),
            body: format!("body of {id}"),
            ..IssueComment::default()
        }
    }

    fn ids(comments: &[IssueComment]) -> Vec<&str> {
        comments.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn last_first_page_needs_no_fetch() {
        let source = FakeSource::new();
        let sizes = PageSizes::default();
        let first = Connection::new(vec![comment("c1")], PageInfo::last());

        let mut walker = Walker::new(&source, &sizes, "I_1", ConnectionKind::IssueComments, first);

        assert_eq!(ids(&walker.next_page().await.unwrap().unwrap()), ["c1"]);
        assert!(walker.next_page().await.unwrap().is_none());
        assert_eq!(walker.fetches(), 0);
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn empty_first_page_yields_one_empty_page_and_stops() {
        let source = FakeSource::new();
        let sizes = PageSizes::default();

        let mut walker: Walker<'_, IssueComment> = Walker::new(
            &source,
            &sizes,
            "PR_42",
            ConnectionKind::PullRequestReviews,
            Connection::default(),
        );

        assert_eq!(walker.next_page().await.unwrap(), Some(Vec::new()));
        assert!(walker.next_page().await.unwrap().is_none());
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn follow_up_pages_use_previous_cursor_and_preserve_order() {
        let source = FakeSource::new().page(
            "I_1",
            ConnectionKind::IssueComments,
            "A",
            Connection::new(vec![comment("c3")], PageInfo::last()),
        );
        let sizes = PageSizes::default();
        let first = Connection::new(vec![comment("c1"), comment("c2")], PageInfo::next("A"));

        let mut walker = Walker::new(&source, &sizes, "I_1", ConnectionKind::IssueComments, first);

        let first_page = walker.next_page().await.unwrap().unwrap();
        assert_eq!(ids(&first_page), ["c1", "c2"]);
        // Nothing is fetched until the caller asks for the next page.
        assert!(source.requests().is_empty());

        let second_page = walker.next_page().await.unwrap().unwrap();
        assert_eq!(ids(&second_page), ["c3"]);
        assert!(walker.next_page().await.unwrap().is_none());

        let requests = source.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].cursor, "A");
        assert_eq!(requests[0].parent, "I_1");
        assert_eq!(requests[0].page_size, sizes.issue_comments);
        assert_eq!(walker.fetches(), 1);
    }

    #[tokio::test]
    async fn collect_concatenates_pages_of_varying_sizes() {
        let source = FakeSource::new()
            .page(
                "PR_7",
                ConnectionKind::PullRequestAssignees,
                "p1",
                Connection::new(
                    vec![Actor::new("c"), Actor::new("d"), Actor::new("e")],
                    PageInfo::next("p2"),
                ),
            )
            .page(
                "PR_7",
                ConnectionKind::PullRequestAssignees,
                "p2",
                Connection::new(vec![Actor::new("f")], PageInfo::last()),
            );
        let sizes = PageSizes::default();
        let first = Connection::new(vec![Actor::new("a"), Actor::new("b")], PageInfo::next("p1"));

        let mut walker = Walker::new(
            &source,
            &sizes,
            "PR_7",
            ConnectionKind::PullRequestAssignees,
            first,
        );
        let logins: Vec<String> = walker
            .collect()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.login)
            .collect();

        assert_eq!(logins, ["a", "b", "c", "d", "e", "f"]);
        assert_eq!(walker.fetches(), 2);
    }

    #[tokio::test]
    async fn missing_cursor_is_malformed() {
        let source = FakeSource::new();
        let sizes = PageSizes::default();
        let first = Connection::new(
            vec![comment("c1")],
            PageInfo {
                has_next_page: true,
                end_cursor: None,
            },
        );

        let mut walker = Walker::new(&source, &sizes, "I_1", ConnectionKind::IssueComments, first);
        walker.next_page().await.unwrap();

        let err = walker.next_page().await.expect_err("malformed");
        assert!(matches!(err, GitHubError::MalformedPage { .. }));
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn repeated_cursor_is_malformed() {
        let source = FakeSource::new().page(
            "I_1",
            ConnectionKind::IssueComments,
            "A",
            Connection::new(vec![comment("c2")], PageInfo::next("A")),
        );
        let sizes = PageSizes::default();
        let first = Connection::new(vec![comment("c1")], PageInfo::next("A"));

        let mut walker = Walker::new(&source, &sizes, "I_1", ConnectionKind::IssueComments, first);
        walker.next_page().await.unwrap();
        walker.next_page().await.unwrap();

        let err = walker.next_page().await.expect_err("stuck cursor");
        assert!(matches!(err, GitHubError::MalformedPage { .. }));
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn fetch_errors_abort_the_walk() {
        let source = FakeSource::new().failing_page("I_1", ConnectionKind::IssueComments, "A", 502);
        let sizes = PageSizes::default();
        let first = Connection::new(vec![comment("c1")], PageInfo::next("A"));

        let mut walker = Walker::new(&source, &sizes, "I_1", ConnectionKind::IssueComments, first);
        walker.next_page().await.unwrap();

        let err = walker.next_page().await.expect_err("fetch failure");
        assert!(matches!(err, GitHubError::Api { status: 502, .. }));
    }
}
