use async_trait::async_trait;
use thiserror::Error;

/// HTTP methods used by the GitHub and Bitbucket clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// HTTP headers represented as key/value pairs.
///
/// Header names are treated case-insensitively by [`header_get`].
pub type HttpHeaders = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Build a JSON `POST` carrying a bearer token.
    #[must_use]
    pub fn post_json(url: impl Into<String>, token: &str, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
                ("User-Agent".to_string(), "ghsnap".to_string()),
                ("Authorization".to_string(), format!("Bearer {token}")),
            ],
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body as lossy UTF-8, for error messages.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("no mock response registered for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

/// Transport boundary for all HTTP I/O.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Get the first header value matching `name` (case-insensitive).
#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(any(feature = "github", feature = "bitbucket"))]
pub mod reqwest_transport {
    use super::*;

    use std::time::Duration as StdDuration;

    /// A real HTTP transport backed by reqwest.
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }

        pub fn with_timeout(timeout: StdDuration) -> Result<Self, HttpError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| HttpError::Transport(e.to_string()))?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
            };

            let mut builder = self.client.request(method, &request.url);
            for (k, v) in request.headers {
                builder = builder.header(&k, &v);
            }
            if !request.body.is_empty() {
                builder = builder.body(request.body);
            }

            let resp = builder
                .send()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?;

            let status = resp.status().as_u16();
            let headers: HttpHeaders = resp
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        value.to_str().unwrap_or_default().to_string(),
                    )
                })
                .collect();

            let body = resp
                .bytes()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?
                .to_vec();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}

// ---------- Test-only mock transport ----------

#[cfg(test)]
use std::collections::{HashMap, VecDeque};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// In-memory mock transport.
///
/// Responses are queued per method + URL and handed out in FIFO order, which
/// is how GraphQL tests script a sequence of pages against one endpoint.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[cfg(test)]
#[derive(Default)]
struct MockTransportInner {
    routes: HashMap<(HttpMethod, String), VecDeque<HttpResponse>>,
    requests: Vec<HttpRequest>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        response: HttpResponse,
    ) {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner
            .routes
            .entry((method, url.into()))
            .or_default()
            .push_back(response);
    }

    /// Queue a `200 OK` JSON response.
    pub fn push_json(&self, method: HttpMethod, url: impl Into<String>, body: serde_json::Value) {
        self.push_response(
            method,
            url,
            HttpResponse {
                status: 200,
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body: body.to_string().into_bytes(),
            },
        );
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        let inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner.requests.clone()
    }
}

#[cfg(test)]
#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");

        let key = (request.method, request.url.clone());
        inner.requests.push(request);

        match inner.routes.get_mut(&key).and_then(|q| q.pop_front()) {
            Some(resp) => Ok(resp),
            None => Err(HttpError::NoMockResponse {
                method: key.0.as_str().to_string(),
                url: key.1,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_get_is_case_insensitive_and_returns_first_match() {
        let headers: HttpHeaders = vec![
            ("X-RateLimit-Remaining".to_string(), "0".to_string()),
            ("x-ratelimit-remaining".to_string(), "10".to_string()),
        ];
        assert_eq!(header_get(&headers, "x-ratelimit-remaining"), Some("0"));
        assert_eq!(header_get(&headers, "missing"), None);
    }

    #[test]
    fn post_json_sets_bearer_auth_and_content_type() {
        let req = HttpRequest::post_json("https://api.github.com/graphql", "t0k", b"{}".to_vec());
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(header_get(&req.headers, "authorization"), Some("Bearer t0k"));
        assert_eq!(
            header_get(&req.headers, "content-type"),
            Some("application/json")
        );
        assert_eq!(req.body, b"{}".to_vec());
    }

    #[test]
    fn response_success_range() {
        let mut resp = HttpResponse {
            status: 201,
            headers: Vec::new(),
            body: b"created".to_vec(),
        };
        assert!(resp.is_success());
        assert_eq!(resp.body_text(), "created");
        resp.status = 502;
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn mock_transport_replays_responses_in_fifo_order() {
        let transport = MockTransport::new();
        let url = "https://example.com/graphql";
        transport.push_json(HttpMethod::Post, url, serde_json::json!({"page": 1}));
        transport.push_json(HttpMethod::Post, url, serde_json::json!({"page": 2}));

        let req = HttpRequest::post_json(url, "t", Vec::new());
        let first = transport.send(req.clone()).await.expect("first");
        let second = transport.send(req.clone()).await.expect("second");
        assert_eq!(first.body_text(), r#"{"page":1}"#);
        assert_eq!(second.body_text(), r#"{"page":2}"#);
        assert_eq!(transport.requests().len(), 2);

        let err = transport.send(req).await.expect_err("queue drained");
        assert!(matches!(err, HttpError::NoMockResponse { .. }));
    }

    #[test]
    #[cfg(any(feature = "github", feature = "bitbucket"))]
    fn reqwest_transport_with_timeout_builds_client() {
        let transport =
            reqwest_transport::ReqwestTransport::with_timeout(std::time::Duration::from_secs(1))
                .expect("reqwest transport should build");
        let _ = transport;
    }

    #[tokio::test]
    #[cfg(any(feature = "github", feature = "bitbucket"))]
    async fn reqwest_transport_returns_transport_error_for_invalid_url() {
        let transport = reqwest_transport::ReqwestTransport::new(reqwest::Client::new());
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "not a url".to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        };

        let err = transport.send(req).await.expect_err("expected error");
        assert!(matches!(err, HttpError::Transport(_)));
    }
}
