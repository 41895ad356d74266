//! Configuration file support for ghsnap.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `GHSNAP_`, e.g., `GHSNAP_GITHUB_TOKEN`)
//! 3. Config file (~/.config/ghsnap/config.toml or ./ghsnap.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/ghsnap/ghsnap.db` on Linux
//! (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/ghsnap/ghsnap.db"  # optional, this is the default
//!
//! [github]
//! token = "ghp_..."  # or use GHSNAP_GITHUB_TOKEN env var
//! endpoint = "https://api.github.com/graphql"
//! requests_per_second = 10
//!
//! [pages]
//! issues = 50
//! pull_requests = 50
//! issue_comments = 10
//! pr_reviews = 5
//! pr_review_comments = 5
//! assignees = 2
//! labels = 2
//! topics = 50
//! org_members = 100
//!
//! [retry]
//! min_delay_ms = 1000
//! max_delay_ms = 60000
//! max_retries = 5
//!
//! [bitbucket]
//! host = "https://bitbucket.example.com"
//! token = "..."  # or use GHSNAP_BITBUCKET_TOKEN env var
//! project_key = "SRCD"
//! reviewer = "jdoe"
//! ```
//!
//! Only single-word keys can be overridden from the environment, because `_`
//! is also the section separator: `GHSNAP_GITHUB_TOKEN` maps to
//! `github.token`, while `[pages] pull_requests` has to be set in a file.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use ghsnap::PageSizes;
use ghsnap::RetryConfig;
use ghsnap::github::GITHUB_GRAPHQL_ENDPOINT;
use ghsnap::rate_limit::GITHUB_DEFAULT_RPS;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub github: GitHubConfig,
    /// Page size per connection kind.
    pub pages: PageSizes,
    pub retry: RetrySettings,
    pub bitbucket: BitbucketConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    /// Defaults to `sqlite://~/.local/state/ghsnap/ghsnap.db` if not specified.
    pub url: Option<String>,
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token.
    /// Can also be set via GHSNAP_GITHUB_TOKEN environment variable.
    pub token: Option<String>,
    /// GraphQL endpoint, for GitHub Enterprise.
    pub endpoint: String,
    /// Proactive request pacing.
    pub requests_per_second: u32,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            endpoint: GITHUB_GRAPHQL_ENDPOINT.to_string(),
            requests_per_second: GITHUB_DEFAULT_RPS,
        }
    }
}

/// Backoff settings for transient GitHub failures.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_retries: usize,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            min_delay_ms: defaults.min_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            max_retries: defaults.max_retries,
        }
    }
}

/// Bitbucket Server target for the `bitbucket` command.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BitbucketConfig {
    /// Server base URL (e.g., "https://bitbucket.example.com").
    pub host: Option<String>,
    /// Personal access token.
    /// Can also be set via GHSNAP_BITBUCKET_TOKEN environment variable.
    pub token: Option<String>,
    /// Default project key.
    pub project_key: Option<String>,
    /// User asked to review every migrated pull request.
    pub reviewer: Option<String>,
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/ghsnap/config.toml)
    /// 3. Local config file (./ghsnap.toml)
    /// 4. Environment variables with GHSNAP_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = Self::default_config_path()
            && path.exists()
        {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let local_config = PathBuf::from("ghsnap.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./ghsnap.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., GHSNAP_DATABASE_URL -> database.url
        builder = builder.add_source(
            Environment::with_prefix("GHSNAP")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter lets SQLite create the file on first use.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("ghsnap.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    pub fn github_token(&self) -> Option<String> {
        self.github.token.clone()
    }

    /// Page sizes clamped into GitHub's accepted range.
    pub fn page_sizes(&self) -> PageSizes {
        self.pages.clamped()
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            Duration::from_millis(self.retry.min_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
            self.retry.max_retries,
        )
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ghsnap").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/ghsnap` or `~/.local/state/ghsnap`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ghsnap").map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(content: &str) -> Config {
        ConfigBuilder::builder()
            .add_source(config::File::from_str(content, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.database.url.is_none());
        assert!(config.github.token.is_none());
        assert_eq!(config.github.endpoint, "https://api.github.com/graphql");
        assert_eq!(config.github.requests_per_second, 10);
        assert_eq!(config.pages, PageSizes::default());
        assert_eq!(config.retry.max_retries, 5);
        assert!(config.bitbucket.host.is_none());
    }

    #[test]
    fn test_page_sizes_partial_override() {
        let config = from_toml(
            r#"
            [pages]
            issues = 100
            assignees = 0
        "#,
        );

        assert_eq!(config.pages.issues, 100);
        assert_eq!(config.pages.org_members, 100);
        assert_eq!(config.pages.issue_comments, 10);
        // Clamped on the way into the library.
        assert_eq!(config.page_sizes().assignees, 1);
    }

    #[test]
    fn test_full_config_parsing() {
        let config = from_toml(
            r#"
            [database]
            url = "sqlite:///tmp/test.db"

            [github]
            token = "ghp_test123"
            endpoint = "https://ghe.example.com/api/graphql"
            requests_per_second = 2

            [retry]
            min_delay_ms = 10
            max_delay_ms = 100
            max_retries = 1

            [bitbucket]
            host = "https://bitbucket.example.com"
            token = "bb"
            project_key = "SRCD"
            reviewer = "jdoe"
        "#,
        );

        assert_eq!(
            config.database_url(),
            Some("sqlite:///tmp/test.db".to_string())
        );
        assert_eq!(config.github_token(), Some("ghp_test123".to_string()));
        assert_eq!(config.github.endpoint, "https://ghe.example.com/api/graphql");
        assert_eq!(config.github.requests_per_second, 2);
        let retry = config.retry_config();
        assert_eq!(retry.min_delay, Duration::from_millis(10));
        assert_eq!(retry.max_delay, Duration::from_millis(100));
        assert_eq!(retry.max_retries, 1);
        assert_eq!(config.bitbucket.project_key.as_deref(), Some("SRCD"));
        assert_eq!(config.bitbucket.reviewer.as_deref(), Some("jdoe"));
    }

    #[test]
    fn test_database_url_defaults_to_state_dir() {
        let url = Config::default().database_url().unwrap();
        assert!(url.starts_with("sqlite://"));
        assert!(url.contains("ghsnap.db"));
        assert!(url.ends_with("?mode=rwc"));
    }

    #[test]
    fn test_config_unknown_fields_ignored() {
        let config = from_toml(
            r#"
            [github]
            token = "t"
            unknown_field = "should be ignored"
        "#,
        );
        assert_eq!(config.github.token.as_deref(), Some("t"));
    }

    #[test]
    fn test_config_invalid_toml() {
        let result = ConfigBuilder::builder()
            .add_source(config::File::from_str("[pages\nissues = 1", FileFormat::Toml))
            .build();
        assert!(result.is_err());
    }
}
