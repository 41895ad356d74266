use ghsnap::DownloadProgress;

/// Logging reporter using tracing for structured output.
pub(crate) struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: DownloadProgress) {
        match event {
            DownloadProgress::RepositoryStarted {
                owner,
                name,
                version,
            } => {
                tracing::info!(
                    repo = %format!("{owner}/{name}"),
                    version,
                    "Downloading repository"
                );
            }

            DownloadProgress::RepositorySaved {
                owner,
                name,
                topics,
            } => {
                tracing::debug!(repo = %format!("{owner}/{name}"), topics, "Saved repository");
            }

            DownloadProgress::IssueSaved {
                owner,
                name,
                number,
                comments,
            } => {
                tracing::debug!(repo = %format!("{owner}/{name}"), number, comments, "Saved issue");
            }

            DownloadProgress::PullRequestSaved {
                owner,
                name,
                number,
                comments,
                reviews,
            } => {
                tracing::debug!(
                    repo = %format!("{owner}/{name}"),
                    number,
                    comments,
                    reviews,
                    "Saved pull request"
                );
            }

            DownloadProgress::PageFetched { connection, count } => {
                tracing::debug!(connection, count, "Fetched page");
            }

            DownloadProgress::RepositoryFinished {
                owner,
                name,
                version,
                issues,
                pull_requests,
            } => {
                tracing::info!(
                    repo = %format!("{owner}/{name}"),
                    version,
                    issues,
                    pull_requests,
                    "Repository committed"
                );
            }

            DownloadProgress::RepositoryFailed { owner, name, error } => {
                tracing::error!(
                    repo = %format!("{owner}/{name}"),
                    error = %error,
                    "Repository rolled back"
                );
            }

            DownloadProgress::OrganizationStarted { login, version } => {
                tracing::info!(login = %login, version, "Downloading organization");
            }

            DownloadProgress::MemberSaved { login } => {
                tracing::debug!(login = %login, "Saved member");
            }

            DownloadProgress::OrganizationFinished {
                login,
                version,
                members,
            } => {
                tracing::info!(login = %login, version, members, "Organization committed");
            }

            DownloadProgress::OrganizationFailed { login, error } => {
                tracing::error!(login = %login, error = %error, "Organization rolled back");
            }

            DownloadProgress::RetryBackoff {
                operation,
                retry_after_ms,
                attempt,
            } => {
                tracing::warn!(
                    operation = %operation,
                    retry_after_ms,
                    attempt,
                    "Request failed, backing off"
                );
            }

            DownloadProgress::Activated { version } => {
                tracing::info!(version, "Generation activated");
            }

            DownloadProgress::CleanedUp { version } => {
                tracing::info!(version, "Stale generations removed");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
