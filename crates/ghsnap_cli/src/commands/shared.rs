use std::sync::Arc;
use std::time::Duration;

use ghsnap::http::reqwest_transport::ReqwestTransport;
use ghsnap::{ApiRateLimiter, GitHubClient, ProgressCallback};

use crate::config::Config;

/// Split `owner/name`, rejecting anything else.
pub(crate) fn parse_repository(full_name: &str) -> Result<(String, String), String> {
    match full_name.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner.to_string(), name.to_string()))
        }
        _ => Err(format!("Expected a repository as owner/name, got '{full_name}'")),
    }
}

/// Build the GitHub client from config: endpoint, token, pacing and retries.
pub(crate) fn github_client(
    config: &Config,
    on_progress: Option<Arc<ProgressCallback>>,
) -> Result<GitHubClient, Box<dyn std::error::Error>> {
    let token = config.github_token().ok_or(
        "No GitHub token configured. Set GHSNAP_GITHUB_TOKEN or [github] token in config.toml.",
    )?;
    let transport = ReqwestTransport::with_timeout(Duration::from_secs(60))?;
    let limiter = ApiRateLimiter::new(config.github.requests_per_second);

    let mut client = GitHubClient::new_with_transport(
        &config.github.endpoint,
        &token,
        Some(limiter),
        Arc::new(transport),
    )
    .with_retry_config(config.retry_config());
    if let Some(callback) = on_progress {
        client = client.with_progress(callback);
    }
    Ok(client)
}
