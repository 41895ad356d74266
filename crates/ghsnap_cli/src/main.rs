//! ghsnap CLI - versioned snapshots of GitHub metadata.

mod commands;
mod config;
#[cfg(feature = "github")]
mod progress;
#[cfg(feature = "github")]
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::limits::OutputFormat;

#[derive(Parser)]
#[command(name = "ghsnap")]
#[command(version)]
#[command(about = "Versioned snapshots of GitHub repository and organization metadata")]
#[command(
    long_about = "ghsnap downloads the full metadata graph of GitHub repositories (issues, \
pull requests, comments, reviews) and organizations (members) into a local database. \
Every run is written as a new generation inside one transaction; readers only see the \
generation that was explicitly activated."
)]
#[command(after_long_help = r#"EXAMPLES
    Download two repositories as the next generation and publish it:
        $ ghsnap repo src-d/go-git src-d/gitbase --activate --cleanup

    Print what would be stored, without touching the database:
        $ ghsnap repo src-d/go-git --dry-run

    Download an organization's members into generation 12:
        $ ghsnap org src-d --generation 12

    Show stored generations:
        $ ghsnap status

    Re-create open pull requests on Bitbucket Server:
        $ ghsnap bitbucket src-d/go-git --project-key SRCD

CONFIGURATION
    ghsnap reads configuration from:
      1. ~/.config/ghsnap/config.toml (or $XDG_CONFIG_HOME/ghsnap/config.toml)
      2. ./ghsnap.toml
      3. Environment variables (GHSNAP_* prefix, e.g., GHSNAP_GITHUB_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    GHSNAP_DATABASE_URL       Database connection string (default: ~/.local/state/ghsnap/ghsnap.db)
    GHSNAP_GITHUB_TOKEN       GitHub personal access token
    GHSNAP_GITHUB_ENDPOINT    GraphQL endpoint (default: https://api.github.com/graphql)
    GHSNAP_BITBUCKET_HOST     Bitbucket Server base URL
    GHSNAP_BITBUCKET_TOKEN    Bitbucket Server personal access token
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Download repositories as one generation
    #[cfg(feature = "github")]
    Repo {
        /// Repositories as owner/name - can specify multiple
        #[arg(required = true)]
        repositories: Vec<String>,

        #[command(flatten)]
        opts: DownloadOptions,
    },
    /// Download organizations and their members as one generation
    #[cfg(feature = "github")]
    Org {
        /// Organization login(s) - can specify multiple
        #[arg(required = true)]
        logins: Vec<String>,

        #[command(flatten)]
        opts: DownloadOptions,
    },
    /// Make a stored generation the one readers see
    Activate {
        /// Generation number
        generation: i32,
    },
    /// Delete every generation except the given one and the active one
    Cleanup {
        /// Generation number to keep
        generation: i32,
    },
    /// Show the active generation and row counts of every stored one
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Show the remaining GitHub GraphQL budget
    #[cfg(feature = "github")]
    Limits {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Re-create a repository's open pull requests on Bitbucket Server
    #[cfg(all(feature = "github", feature = "bitbucket"))]
    Bitbucket(BitbucketArgs),
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

/// Options shared by `repo` and `org`.
#[cfg(feature = "github")]
#[derive(Debug, Clone, clap::Args)]
struct DownloadOptions {
    /// Generation number to write; must be newer than every stored one
    /// (default: one past the latest stored)
    #[arg(short, long)]
    generation: Option<i32>,

    /// Print the traversal instead of storing it
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Activate the generation once every item downloaded
    #[arg(short, long)]
    activate: bool,

    /// Remove other generations (except the active one) once every item downloaded
    #[arg(short, long)]
    cleanup: bool,
}

#[cfg(all(feature = "github", feature = "bitbucket"))]
#[derive(Debug, Clone, clap::Args)]
struct BitbucketArgs {
    /// GitHub repository as owner/name
    repository: String,

    /// Bitbucket project key (default from config)
    #[arg(short = 'k', long)]
    project_key: Option<String>,

    /// Bitbucket repository slug (default: the GitHub repository name)
    #[arg(short, long)]
    slug: Option<String>,

    /// Reviewer for every created pull request (default from config)
    #[arg(short, long)]
    reviewer: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    #[cfg(feature = "github")]
    shutdown::setup_shutdown_handler();

    // Structured logging only when not attached to a terminal
    if !Term::stdout().is_term() {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("ghsnap=info,ghsnap_cli=info"));

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config = config::Config::load();
    let cli = Cli::parse();

    // Commands that don't need the database
    match &cli.command {
        Commands::Completions { shell } => {
            return commands::meta::handle_completions(*shell);
        }
        Commands::Man { output } => {
            return commands::meta::handle_man(output.clone());
        }
        #[cfg(feature = "github")]
        Commands::Limits { output } => {
            return commands::limits::handle_limits(*output, &config).await;
        }
        _ => {}
    }

    let database_url = config
        .database_url()
        .ok_or("Could not determine a database URL; set GHSNAP_DATABASE_URL")?;
    ensure_sqlite_directory(&database_url)?;

    match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        #[cfg(feature = "github")]
        Commands::Repo { repositories, opts } => {
            let targets = commands::download::Targets::repositories(&repositories)?;
            commands::download::handle_download(targets, opts, &config, &database_url).await?;
        }
        #[cfg(feature = "github")]
        Commands::Org { logins, opts } => {
            let targets = commands::download::Targets::Organizations(logins);
            commands::download::handle_download(targets, opts, &config, &database_url).await?;
        }
        Commands::Activate { generation } => {
            commands::generations::handle_activate(generation, &database_url).await?;
        }
        Commands::Cleanup { generation } => {
            commands::generations::handle_cleanup(generation, &database_url).await?;
        }
        Commands::Status { output } => {
            commands::generations::handle_status(output, &database_url).await?;
        }
        #[cfg(all(feature = "github", feature = "bitbucket"))]
        Commands::Bitbucket(args) => {
            commands::bitbucket::handle_bitbucket(args, &config).await?;
        }
        #[cfg(feature = "github")]
        Commands::Limits { .. } => {}
        Commands::Completions { .. } | Commands::Man { .. } => {}
    }

    Ok(())
}

/// Create the parent directory of a file-backed SQLite database.
fn ensure_sqlite_directory(database_url: &str) -> std::io::Result<()> {
    let Some(db_path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    // Strip query parameters (e.g., ?mode=rwc) before path operations
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    let db_path = std::path::Path::new(db_path);

    if db_path.is_relative() && !db_path.as_os_str().is_empty() {
        tracing::warn!(
            "Database path '{}' is relative - behavior depends on current directory.",
            db_path.display()
        );
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_sqlite_directory_ignores_other_schemes() {
        ensure_sqlite_directory("postgres://localhost/ghsnap").unwrap();
        ensure_sqlite_directory("sqlite::memory:").unwrap();
    }

    #[test]
    fn ensure_sqlite_directory_creates_parent() {
        let dir = std::env::temp_dir().join(format!("ghsnap-test-{}", std::process::id()));
        let url = format!("sqlite://{}/nested/ghsnap.db?mode=rwc", dir.display());

        ensure_sqlite_directory(&url).unwrap();

        assert!(dir.join("nested").is_dir());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(feature = "github")]
    #[test]
    fn repo_accepts_download_flags() {
        let cli = Cli::try_parse_from([
            "ghsnap",
            "repo",
            "src-d/go-git",
            "src-d/gitbase",
            "--generation",
            "4",
            "--activate",
        ])
        .unwrap();
        match cli.command {
            Commands::Repo { repositories, opts } => {
                assert_eq!(repositories, ["src-d/go-git", "src-d/gitbase"]);
                assert_eq!(opts.generation, Some(4));
                assert!(opts.activate);
                assert!(!opts.cleanup);
                assert!(!opts.dry_run);
            }
            _ => panic!("expected repo command"),
        }
    }

    #[test]
    fn activate_requires_a_generation() {
        assert!(Cli::try_parse_from(["ghsnap", "activate"]).is_err());
        assert!(Cli::try_parse_from(["ghsnap", "activate", "3"]).is_ok());
    }
}
