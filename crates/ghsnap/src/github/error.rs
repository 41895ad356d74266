//! GitHub API error types.

use thiserror::Error;

use crate::http::HttpError;

/// Errors that can occur when talking to the GitHub GraphQL API.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// The request never produced a response.
    #[error("HTTP error: {0}")]
    Transport(#[from] HttpError),

    /// The response (or a page node) did not match the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-2xx HTTP status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The query executed but GraphQL reported errors.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Primary or secondary rate limit hit.
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Repository, organization or node does not exist (or is not visible).
    #[error("Not found: {0}")]
    NotFound(String),

    /// A page claimed more data but gave no usable cursor.
    #[error("Malformed page for {connection}: {reason}")]
    MalformedPage {
        connection: &'static str,
        reason: String,
    },

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GitHubError {
    /// Create an API error.
    #[inline]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a malformed page error.
    #[inline]
    pub fn malformed(connection: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedPage {
            connection,
            reason: reason.into(),
        }
    }

    /// Whether a retry may succeed: transport failures, rate limits and
    /// server-side errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(HttpError::Transport(_)) => true,
            Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// First line of an error message, for progress output.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(GitHubError::RateLimited("secondary".into()).is_retryable());
        assert!(GitHubError::api(502, "bad gateway").is_retryable());
        assert!(GitHubError::api(429, "slow down").is_retryable());
        assert!(GitHubError::Transport(HttpError::Transport("reset".into())).is_retryable());

        assert!(!GitHubError::api(401, "Bad credentials").is_retryable());
        assert!(!GitHubError::api(403, "Resource not accessible").is_retryable());
        assert!(!GitHubError::NotFound("src-d/nope".into()).is_retryable());
        assert!(!GitHubError::GraphQl("Field 'x' doesn't exist".into()).is_retryable());
        assert!(!GitHubError::malformed("issues", "missing cursor").is_retryable());
    }

    #[test]
    fn short_error_message_takes_first_line() {
        let err = GitHubError::GraphQl("first line\nsecond line".into());
        assert_eq!(short_error_message(&err), "GraphQL error: first line");
    }
}
