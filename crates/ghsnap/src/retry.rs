//! Resilient fetch: exponential backoff around a fallible async operation.
//!
//! The downloader never retries; it only ever sees a definitive success or a
//! definitive failure from the page source. Retrying transient failures is
//! this module's job, and the GitHub client wraps every request in
//! [`with_retry`].

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::download::{DownloadProgress, ProgressCallback};

/// Initial delay before the first retry.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;
/// Upper bound for a single backoff delay.
pub const MAX_BACKOFF_MS: u64 = 60_000;
/// Retries after the first attempt.
pub const MAX_RETRIES: usize = 5;

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: MAX_RETRIES,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    /// A configuration that gives up after the first failure.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, 0).with_jitter(false)
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Execute an operation, retrying errors that `is_retryable` accepts.
///
/// Each retry is logged at debug level and reported as
/// [`DownloadProgress::RetryBackoff`]. Errors that are not retryable, and the
/// last error once retries are exhausted, are returned unchanged.
///
/// # Example
///
/// ```ignore
/// let page = with_retry(
///     &RetryConfig::default(),
///     || async { client.post_once(&body).await },
///     GitHubError::is_retryable,
///     "issues page",
///     None,
/// )
/// .await?;
/// ```
pub async fn with_retry<T, E, F, Fut, IsRetryable>(
    config: &RetryConfig,
    mut operation: F,
    is_retryable: IsRetryable,
    label: &str,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    IsRetryable: Fn(&E) -> bool,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(config.backoff())
        .notify(|err, dur| {
            let current_attempt = attempt.load(Ordering::SeqCst);
            if let Some(cb) = on_progress {
                cb(DownloadProgress::RetryBackoff {
                    operation: label.to_string(),
                    retry_after_ms: dur.as_millis() as u64,
                    attempt: current_attempt,
                });
            }
            tracing::debug!(
                operation = label,
                attempt = current_attempt,
                delay = ?dur,
                error = %err,
                "Retrying after transient failure"
            );
        })
        .when(is_retryable)
        .await
}
