//! Bitbucket Server REST client for the bridge.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{BridgeError, NewPullRequest, PullRequestWriter};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::rate_limit::ApiRateLimiter;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePullRequest<'a> {
    title: &'a str,
    description: &'a str,
    from_ref: RefSpec<'a>,
    to_ref: RefSpec<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reviewers: Vec<Reviewer<'a>>,
}

#[derive(Serialize)]
struct RefSpec<'a> {
    id: String,
    repository: RepositorySpec<'a>,
}

#[derive(Serialize)]
struct RepositorySpec<'a> {
    slug: &'a str,
    project: ProjectSpec<'a>,
}

#[derive(Serialize)]
struct ProjectSpec<'a> {
    key: &'a str,
}

#[derive(Serialize)]
struct Reviewer<'a> {
    user: ReviewerUser<'a>,
}

#[derive(Serialize)]
struct ReviewerUser<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct CreateComment<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<ParentRef>,
}

#[derive(Serialize)]
struct ParentRef {
    id: i64,
}

#[derive(Deserialize)]
struct Created {
    id: i64,
}

/// Writes pull requests and comments into one Bitbucket Server repository.
pub struct BitbucketClient {
    transport: Arc<dyn HttpTransport>,
    base: Url,
    token: String,
    project_key: String,
    slug: String,
    reviewer: Option<String>,
    rate_limiter: Option<ApiRateLimiter>,
}

impl BitbucketClient {
    /// Create a client for `host` using reqwest.
    pub fn new(
        host: &str,
        token: &str,
        project_key: &str,
        slug: &str,
    ) -> Result<Self, BridgeError> {
        use crate::http::reqwest_transport::ReqwestTransport;

        let transport = ReqwestTransport::with_timeout(Duration::from_secs(60))?;
        Self::new_with_transport(host, token, project_key, slug, Arc::new(transport))
    }

    pub fn new_with_transport(
        host: &str,
        token: &str,
        project_key: &str,
        slug: &str,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, BridgeError> {
        let base = Url::parse(host).map_err(|e| BridgeError::Url(format!("{host}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(BridgeError::Url(format!("{host}: not a base URL")));
        }
        Ok(Self {
            transport,
            base,
            token: token.to_string(),
            project_key: project_key.to_string(),
            slug: slug.to_string(),
            reviewer: None,
            rate_limiter: None,
        })
    }

    /// Request a review from `user` on every created pull request.
    #[must_use]
    pub fn with_reviewer(mut self, user: impl Into<String>) -> Self {
        self.reviewer = Some(user.into());
        self
    }

    /// Pace every write through `limiter`.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: ApiRateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn project_key(&self) -> &str {
        &self.project_key
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// `{base}/rest/api/1.0/projects/{key}/repos/{slug}/pull-requests/{tail..}`
    fn pull_requests_url(&self, tail: &[String]) -> Result<String, BridgeError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| BridgeError::Url(format!("{}: not a base URL", self.base)))?;
            segments.pop_if_empty().extend([
                "rest",
                "api",
                "1.0",
                "projects",
                self.project_key.as_str(),
                "repos",
                self.slug.as_str(),
                "pull-requests",
            ]);
            segments.extend(tail);
        }
        Ok(url.to_string())
    }

    fn ref_spec(&self, branch: &str) -> RefSpec<'_> {
        RefSpec {
            id: format!("refs/heads/{branch}"),
            repository: RepositorySpec {
                slug: &self.slug,
                project: ProjectSpec {
                    key: &self.project_key,
                },
            },
        }
    }

    async fn post<B: Serialize>(&self, url: String, body: &B) -> Result<i64, BridgeError> {
        let request = HttpRequest::post_json(url, &self.token, serde_json::to_vec(body)?);
        if let Some(limiter) = &self.rate_limiter {
            limiter.wait().await;
        }
        let response = self.transport.send(request).await?;
        let created: Created = serde_json::from_slice(&check(response)?.body)?;
        Ok(created.id)
    }
}

fn check(response: HttpResponse) -> Result<HttpResponse, BridgeError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(BridgeError::Api {
            status: response.status,
            message: response.body_text(),
        })
    }
}

#[async_trait]
impl PullRequestWriter for BitbucketClient {
    async fn create_pull_request(&self, pull_request: &NewPullRequest) -> Result<i64, BridgeError> {
        let body = CreatePullRequest {
            title: &pull_request.title,
            description: &pull_request.description,
            from_ref: self.ref_spec(&pull_request.from_branch),
            to_ref: self.ref_spec(&pull_request.to_branch),
            reviewers: self
                .reviewer
                .iter()
                .map(|name| Reviewer {
                    user: ReviewerUser { name },
                })
                .collect(),
        };
        let id = self.post(self.pull_requests_url(&[])?, &body).await?;
        tracing::debug!(id, title = %pull_request.title, "Created Bitbucket pull request");
        Ok(id)
    }

    async fn create_comment(
        &self,
        pull_request_id: i64,
        text: &str,
        parent: Option<i64>,
    ) -> Result<i64, BridgeError> {
        let url = self.pull_requests_url(&[pull_request_id.to_string(), "comments".to_string()])?;
        let body = CreateComment {
            text,
            parent: parent.map(|id| ParentRef { id }),
        };
        self.post(url, &body).await
    }
}

impl std::fmt::Debug for BitbucketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitbucketClient")
            .field("base", &self.base.as_str())
            .field("project_key", &self.project_key)
            .field("slug", &self.slug)
            .field("reviewer", &self.reviewer)
            .field("rate_limited", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}
