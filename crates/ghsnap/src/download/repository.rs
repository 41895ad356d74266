use super::{DownloadError, DownloadProgress, Downloader, RepositoryStats, Result};
use crate::github::types::{Issue, PullRequest, PullRequestReview, Repository};
use crate::source::ConnectionKind;
use crate::store::MetadataStore;

impl<S: MetadataStore> Downloader<S> {
    pub(super) async fn walk_repository(
        &self,
        owner: &str,
        name: &str,
        stats: &mut RepositoryStats,
    ) -> Result<()> {
        let Repository {
            fields,
            repository_topics,
            issues,
            pull_requests,
        } = self
            .source
            .repository(owner, name, &self.sizes)
            .await
            .map_err(|e| DownloadError::fetch(format!("repository {owner}/{name}"), e))?;

        // Children are keyed by the canonical names the API returned.
        let owner = fields.owner.login.clone();
        let name = fields.name.clone();

        let topics: Vec<String> = self
            .drain(
                self.walker(&fields.id, ConnectionKind::RepositoryTopics, repository_topics),
                &mut stats.pages_fetched,
            )
            .await?
            .into_iter()
            .map(|node| node.topic.name)
            .collect();

        self.store
            .save_repository(&fields, &topics)
            .await
            .map_err(|e| DownloadError::store(format!("repository {owner}/{name}"), e))?;
        stats.topics = topics.len();
        self.emit(DownloadProgress::RepositorySaved {
            owner: owner.clone(),
            name: name.clone(),
            topics: topics.len(),
        });

        let mut issue_pages = self.walker(&fields.id, ConnectionKind::Issues, issues);
        while let Some(page) = self.next_page(&mut issue_pages).await? {
            for issue in page {
                self.walk_issue(&owner, &name, issue, stats).await?;
            }
        }
        stats.pages_fetched += issue_pages.fetches();

        let mut pull_request_pages =
            self.walker(&fields.id, ConnectionKind::PullRequests, pull_requests);
        while let Some(page) = self.next_page(&mut pull_request_pages).await? {
            for pull_request in page {
                self.walk_pull_request(&owner, &name, pull_request, stats)
                    .await?;
            }
        }
        stats.pages_fetched += pull_request_pages.fetches();

        Ok(())
    }

    async fn walk_issue(
        &self,
        owner: &str,
        name: &str,
        issue: Issue,
        stats: &mut RepositoryStats,
    ) -> Result<()> {
        let Issue {
            fields,
            assignees,
            labels,
            comments,
        } = issue;
        let number = fields.number;

        let assignees: Vec<String> = self
            .drain(
                self.walker(&fields.id, ConnectionKind::IssueAssignees, assignees),
                &mut stats.pages_fetched,
            )
            .await?
            .into_iter()
            .map(|actor| actor.login)
            .collect();
        let labels: Vec<String> = self
            .drain(
                self.walker(&fields.id, ConnectionKind::IssueLabels, labels),
                &mut stats.pages_fetched,
            )
            .await?
            .into_iter()
            .map(|label| label.name)
            .collect();

        self.store
            .save_issue(owner, name, &fields, &assignees, &labels)
            .await
            .map_err(|e| DownloadError::store(format!("issue {owner}/{name}#{number}"), e))?;
        stats.issues += 1;

        let mut saved_comments = 0;
        let mut comment_pages = self.walker(&fields.id, ConnectionKind::IssueComments, comments);
        while let Some(page) = self.next_page(&mut comment_pages).await? {
            for comment in page {
                self.store
                    .save_issue_comment(owner, name, number, &comment)
                    .await
                    .map_err(|e| {
                        DownloadError::store(
                            format!("comment {} on issue {owner}/{name}#{number}", comment.id),
                            e,
                        )
                    })?;
                saved_comments += 1;
            }
        }
        stats.pages_fetched += comment_pages.fetches();
        stats.issue_comments += saved_comments;

        self.emit(DownloadProgress::IssueSaved {
            owner: owner.to_string(),
            name: name.to_string(),
            number,
            comments: saved_comments,
        });
        Ok(())
    }

    async fn walk_pull_request(
        &self,
        owner: &str,
        name: &str,
        pull_request: PullRequest,
        stats: &mut RepositoryStats,
    ) -> Result<()> {
        let PullRequest {
            fields,
            assignees,
            labels,
            comments,
            reviews,
        } = pull_request;
        let number = fields.number;

        let assignees: Vec<String> = self
            .drain(
                self.walker(&fields.id, ConnectionKind::PullRequestAssignees, assignees),
                &mut stats.pages_fetched,
            )
            .await?
            .into_iter()
            .map(|actor| actor.login)
            .collect();
        let labels: Vec<String> = self
            .drain(
                self.walker(&fields.id, ConnectionKind::PullRequestLabels, labels),
                &mut stats.pages_fetched,
            )
            .await?
            .into_iter()
            .map(|label| label.name)
            .collect();

        self.store
            .save_pull_request(owner, name, &fields, &assignees, &labels)
            .await
            .map_err(|e| {
                DownloadError::store(format!("pull request {owner}/{name}#{number}"), e)
            })?;
        stats.pull_requests += 1;

        let mut saved_comments = 0;
        let mut comment_pages =
            self.walker(&fields.id, ConnectionKind::PullRequestComments, comments);
        while let Some(page) = self.next_page(&mut comment_pages).await? {
            for comment in page {
                self.store
                    .save_pull_request_comment(owner, name, number, &comment)
                    .await
                    .map_err(|e| {
                        DownloadError::store(
                            format!(
                                "comment {} on pull request {owner}/{name}#{number}",
                                comment.id
                            ),
                            e,
                        )
                    })?;
                saved_comments += 1;
            }
        }
        stats.pages_fetched += comment_pages.fetches();
        stats.pull_request_comments += saved_comments;

        let mut saved_reviews = 0;
        let mut review_pages = self.walker(&fields.id, ConnectionKind::PullRequestReviews, reviews);
        while let Some(page) = self.next_page(&mut review_pages).await? {
            for review in page {
                self.walk_review(owner, name, number, review, stats).await?;
                saved_reviews += 1;
            }
        }
        stats.pages_fetched += review_pages.fetches();

        self.emit(DownloadProgress::PullRequestSaved {
            owner: owner.to_string(),
            name: name.to_string(),
            number,
            comments: saved_comments,
            reviews: saved_reviews,
        });
        Ok(())
    }

    async fn walk_review(
        &self,
        owner: &str,
        name: &str,
        number: i64,
        review: PullRequestReview,
        stats: &mut RepositoryStats,
    ) -> Result<()> {
        let PullRequestReview { fields, comments } = review;
        let review_id = fields.database_id;

        self.store
            .save_pull_request_review(owner, name, number, &fields)
            .await
            .map_err(|e| {
                DownloadError::store(
                    format!("review {review_id} on pull request {owner}/{name}#{number}"),
                    e,
                )
            })?;
        stats.reviews += 1;

        let mut comment_pages = self.walker(&fields.id, ConnectionKind::ReviewComments, comments);
        while let Some(page) = self.next_page(&mut comment_pages).await? {
            for comment in page {
                self.store
                    .save_pull_request_review_comment(owner, name, number, review_id, &comment)
                    .await
                    .map_err(|e| {
                        DownloadError::store(
                            format!(
                                "comment {} on review {review_id} of {owner}/{name}#{number}",
                                comment.id
                            ),
                            e,
                        )
                    })?;
                stats.review_comments += 1;
            }
        }
        stats.pages_fetched += comment_pages.fetches();
        Ok(())
    }
}
