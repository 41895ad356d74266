//! GitHub GraphQL client implementing [`GraphSource`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::error::GitHubError;
use super::query;
use super::types::{Connection, Organization, RateLimit, Repository};
use crate::download::ProgressCallback;
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::rate_limit::ApiRateLimiter;
use crate::retry::{RetryConfig, with_retry};
use crate::source::{GraphSource, PageRequest, PageSizes};

/// Public GitHub GraphQL endpoint.
pub const GITHUB_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepositoryData {
    repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
struct OrganizationData {
    organization: Option<Organization>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitData {
    rate_limit: RateLimit,
}

/// GitHub v4 API client.
///
/// Every request is paced by the optional rate limiter and wrapped in
/// [`with_retry`], so callers only ever see definitive results.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    token: String,
    retry: RetryConfig,
    rate_limiter: Option<ApiRateLimiter>,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl GitHubClient {
    /// Create a client against the public endpoint using reqwest.
    #[cfg(feature = "github")]
    pub fn new(token: &str, rate_limiter: Option<ApiRateLimiter>) -> Result<Self, GitHubError> {
        use crate::http::reqwest_transport::ReqwestTransport;

        let transport = ReqwestTransport::with_timeout(std::time::Duration::from_secs(60))
            .map_err(|e| GitHubError::Config(e.to_string()))?;
        Ok(Self::new_with_transport(
            GITHUB_GRAPHQL_ENDPOINT,
            token,
            rate_limiter,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        endpoint: &str,
        token: &str,
        rate_limiter: Option<ApiRateLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
            retry: RetryConfig::default(),
            rate_limiter,
            on_progress: None,
        }
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Report retry backoffs through `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<ProgressCallback>) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }
    }

    /// Run a query with retries and decode its `data`.
    async fn graphql<T: DeserializeOwned>(
        &self,
        document: &str,
        variables: Value,
        label: &str,
    ) -> Result<T, GitHubError> {
        let body = json!({ "query": document, "variables": variables }).to_string();
        with_retry(
            &self.retry,
            || self.post_once(&body),
            GitHubError::is_retryable,
            label,
            self.on_progress.as_deref(),
        )
        .await
    }

    async fn post_once<T: DeserializeOwned>(&self, body: &str) -> Result<T, GitHubError> {
        self.wait_for_rate_limit().await;

        let request = HttpRequest::post_json(&self.endpoint, &self.token, body.as_bytes().to_vec());
        let response = self.transport.send(request).await?;
        decode_response(response)
    }
}

/// Map an HTTP response to data or a classified error.
fn decode_response<T: DeserializeOwned>(response: HttpResponse) -> Result<T, GitHubError> {
    if !response.is_success() {
        let message = response.body_text();
        let exhausted = response.header("x-ratelimit-remaining") == Some("0");
        let secondary =
            response.status == 403 && message.to_ascii_lowercase().contains("rate limit");
        if response.status == 429 || exhausted || secondary {
            return Err(GitHubError::RateLimited(message));
        }
        return Err(GitHubError::api(response.status, message));
    }

    let parsed: GraphQlResponse<T> = serde_json::from_slice(&response.body)?;
    if !parsed.errors.is_empty() {
        let message = parsed
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(match parsed.errors[0].kind.as_deref() {
            Some("RATE_LIMITED") => GitHubError::RateLimited(message),
            Some("NOT_FOUND") => GitHubError::NotFound(message),
            _ => GitHubError::GraphQl(message),
        });
    }

    parsed
        .data
        .ok_or_else(|| GitHubError::GraphQl("response carried no data".to_string()))
}

#[async_trait]
impl GraphSource for GitHubClient {
    async fn repository(
        &self,
        owner: &str,
        name: &str,
        sizes: &PageSizes,
    ) -> Result<Repository, GitHubError> {
        let data: RepositoryData = self
            .graphql(
                &query::repository_query(sizes),
                json!({ "owner": owner, "name": name }),
                "repository",
            )
            .await?;
        data.repository
            .ok_or_else(|| GitHubError::NotFound(format!("repository {owner}/{name}")))
    }

    async fn organization(
        &self,
        login: &str,
        sizes: &PageSizes,
    ) -> Result<Organization, GitHubError> {
        let data: OrganizationData = self
            .graphql(
                &query::organization_query(sizes),
                json!({ "login": login }),
                "organization",
            )
            .await?;
        data.organization
            .ok_or_else(|| GitHubError::NotFound(format!("organization {login}")))
    }

    async fn fetch_page(
        &self,
        request: PageRequest<'_>,
    ) -> Result<Connection<Value>, GitHubError> {
        let kind = request.kind;
        let document = query::page_query(kind, request.page_size, request.sizes);
        let (root, variables) = if kind.parent_is_login() {
            (
                "organization",
                json!({ "login": request.parent, "cursor": request.cursor }),
            )
        } else {
            (
                "node",
                json!({ "id": request.parent, "cursor": request.cursor }),
            )
        };

        let mut data: Value = self.graphql(&document, variables, kind.describe()).await?;
        let parent = data
            .get_mut(root)
            .map(Value::take)
            .filter(|v| !v.is_null())
            .ok_or_else(|| {
                GitHubError::NotFound(format!("{} {}", kind.parent_type(), request.parent))
            })?;
        let connection = parent
            .get(kind.field())
            .cloned()
            .ok_or_else(|| {
                GitHubError::malformed(kind.describe(), "connection missing from response")
            })?;

        Ok(serde_json::from_value(connection)?)
    }

    async fn rate_remaining(&self) -> Result<RateLimit, GitHubError> {
        let data: RateLimitData = self
            .graphql(query::RATE_LIMIT_QUERY, json!({}), "rate limit")
            .await?;
        Ok(data.rate_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, MockTransport};
    use crate::source::ConnectionKind;

    const ENDPOINT: &str = "https://github.example/graphql";

    fn client(transport: &MockTransport) -> GitHubClient {
        GitHubClient::new_with_transport(ENDPOINT, "t0k", None, Arc::new(transport.clone()))
            .with_retry_config(RetryConfig::disabled())
    }

    fn request_body(transport: &MockTransport, index: usize) -> Value {
        serde_json::from_slice(&transport.requests()[index].body).unwrap()
    }

    #[tokio::test]
    async fn repository_query_sends_owner_and_name_variables() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            ENDPOINT,
            json!({"data": {"repository": {
                "id": "R_1", "name": "go-git", "owner": {"login": "src-d"},
                "issues": {
                    "nodes": [{"number": 1, "title": "first"}],
                    "pageInfo": {"hasNextPage": true, "endCursor": "aXNz"}
                }
            }}}),
        );

        let repo = client(&transport)
            .repository("src-d", "go-git", &PageSizes::default())
            .await
            .expect("repository");

        assert_eq!(repo.fields.name, "go-git");
        assert_eq!(repo.issues.nodes[0].fields.title, "first");
        assert_eq!(repo.issues.page_info.end_cursor.as_deref(), Some("aXNz"));

        let body = request_body(&transport, 0);
        assert_eq!(body["variables"], json!({"owner": "src-d", "name": "go-git"}));
        assert!(body["query"].as_str().unwrap().contains("repository(owner: $owner"));
    }

    #[tokio::test]
    async fn null_repository_is_not_found() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            ENDPOINT,
            json!({"data": {"repository": null}, "errors": []}),
        );

        let err = client(&transport)
            .repository("src-d", "missing", &PageSizes::default())
            .await
            .expect_err("missing repository");
        assert!(matches!(err, GitHubError::NotFound(ref m) if m == "repository src-d/missing"));
    }

    #[tokio::test]
    async fn fetch_page_extracts_connection_from_node() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            ENDPOINT,
            json!({"data": {"node": {"comments": {
                "nodes": [{"id": "IC_3", "body": "third"}],
                "pageInfo": {"hasNextPage": false, "endCursor": "Qg"}
            }}}}),
        );

        let sizes = PageSizes::default();
        let page = client(&transport)
            .fetch_page(PageRequest {
                parent: "I_1",
                kind: ConnectionKind::IssueComments,
                page_size: 10,
                cursor: "QQ",
                sizes: &sizes,
            })
            .await
            .expect("page");

        assert_eq!(page.nodes.len(), 1);
        assert_eq!(page.nodes[0]["body"], "third");
        assert!(!page.page_info.has_next_page);

        let body = request_body(&transport, 0);
        assert_eq!(body["variables"], json!({"id": "I_1", "cursor": "QQ"}));
    }

    #[tokio::test]
    async fn member_pages_are_addressed_by_login() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            ENDPOINT,
            json!({"data": {"organization": {"membersWithRole": {
                "nodes": [{"login": "bzz"}],
                "pageInfo": {"hasNextPage": false}
            }}}}),
        );

        let sizes = PageSizes::default();
        let page = client(&transport)
            .fetch_page(PageRequest {
                parent: "src-d",
                kind: ConnectionKind::OrganizationMembers,
                page_size: 100,
                cursor: "Y3Vy",
                sizes: &sizes,
            })
            .await
            .expect("page");

        assert_eq!(page.nodes[0]["login"], "bzz");
        let body = request_body(&transport, 0);
        assert_eq!(body["variables"], json!({"login": "src-d", "cursor": "Y3Vy"}));
    }

    #[tokio::test]
    async fn graphql_rate_limited_error_is_classified_as_retryable() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            ENDPOINT,
            json!({"errors": [{"type": "RATE_LIMITED", "message": "API rate limit exceeded"}]}),
        );

        let err = client(&transport)
            .rate_remaining()
            .await
            .expect_err("rate limited");
        assert!(matches!(err, GitHubError::RateLimited(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn http_errors_carry_status() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            ENDPOINT,
            HttpResponse {
                status: 401,
                headers: Vec::new(),
                body: br#"{"message":"Bad credentials"}"#.to_vec(),
            },
        );

        let err = client(&transport)
            .rate_remaining()
            .await
            .expect_err("unauthorized");
        assert!(matches!(err, GitHubError::Api { status: 401, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn exhausted_rate_limit_header_maps_to_rate_limited() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            ENDPOINT,
            HttpResponse {
                status: 403,
                headers: vec![("X-RateLimit-Remaining".to_string(), "0".to_string())],
                body: b"forbidden".to_vec(),
            },
        );

        let err = client(&transport)
            .rate_remaining()
            .await
            .expect_err("rate limited");
        assert!(matches!(err, GitHubError::RateLimited(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_until_success() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            ENDPOINT,
            HttpResponse {
                status: 502,
                headers: Vec::new(),
                body: b"bad gateway".to_vec(),
            },
        );
        transport.push_json(
            HttpMethod::Post,
            ENDPOINT,
            json!({"data": {"rateLimit": {
                "limit": 5000,
                "remaining": 4999,
                "used": 1,
                "resetAt": "2024-01-01T00:00:00Z"
            }}}),
        );

        let client = GitHubClient::new_with_transport(
            ENDPOINT,
            "t0k",
            None,
            Arc::new(transport.clone()),
        )
        .with_retry_config(RetryConfig::new(
            std::time::Duration::from_millis(10),
            std::time::Duration::from_millis(10),
            3,
        ));

        let limit = client.rate_remaining().await.expect("retried");
        assert_eq!(limit.remaining, 4999);
        assert_eq!(transport.requests().len(), 2);
    }
}
