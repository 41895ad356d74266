//! `ghsnap repo` and `ghsnap org`.
//!
//! Every repository (or organization) named on the command line is its own
//! traversal and transaction, all tagged with the same generation. A failed
//! item is logged and the loop moves on; the command fails at the end if any
//! item did.

use std::sync::Arc;

use ghsnap::store::query;
use ghsnap::{DbStore, Downloader, GraphSource, MetadataStore, TraceStore, connect_and_migrate};

use crate::DownloadOptions;
use crate::commands::shared::{github_client, parse_repository};
use crate::config::Config;
use crate::progress::ProgressReporter;
use crate::shutdown::is_shutdown_requested;

/// What the command line asked to download.
pub(crate) enum Targets {
    Repositories(Vec<(String, String)>),
    Organizations(Vec<String>),
}

impl Targets {
    pub(crate) fn repositories(args: &[String]) -> Result<Self, String> {
        args.iter()
            .map(|arg| parse_repository(arg))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::Repositories)
    }

    fn len(&self) -> usize {
        match self {
            Self::Repositories(repos) => repos.len(),
            Self::Organizations(logins) => logins.len(),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Items not attempted because shutdown was requested.
    pub skipped: usize,
}

impl RunSummary {
    fn record(&mut self, ok: bool) {
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

pub(crate) async fn handle_download(
    targets: Targets,
    opts: DownloadOptions,
    config: &Config,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let reporter = Arc::new(ProgressReporter::new());
    let callback = reporter.as_callback();
    let client = github_client(config, Some(Arc::clone(&callback)))?;
    let source: Arc<dyn GraphSource> = Arc::new(client);
    let sizes = config.page_sizes();

    if opts.dry_run {
        if opts.activate || opts.cleanup {
            tracing::warn!("--activate and --cleanup are ignored with --dry-run");
        }
        let version = opts.generation.unwrap_or(0);
        let downloader = Downloader::new(source, TraceStore::stdout(), sizes);
        let summary = run(&downloader, &targets, version).await;
        return finish(&reporter, &summary, targets.len());
    }

    let db = connect_and_migrate(database_url).await?;
    let version = resolve_generation(opts.generation, query::latest_version(&db).await?)?;
    let downloader = Downloader::new(source, DbStore::new(db), sizes).with_progress(callback);
    let summary = run(&downloader, &targets, version).await;

    if summary.failed > 0 || summary.skipped > 0 {
        if opts.activate || opts.cleanup {
            reporter.println(&format!(
                "Generation {version} is incomplete; not activating or cleaning up."
            ));
        }
    } else {
        if opts.activate {
            downloader.set_current(version).await?;
        }
        if opts.cleanup {
            downloader.cleanup(version).await?;
        }
    }

    finish(&reporter, &summary, targets.len())
}

/// Pick the generation to write: the requested one, or one past `latest`.
///
/// A requested generation must be newer than every stored or active one, so
/// a download never mixes rows into a generation that already exists.
fn resolve_generation(requested: Option<i32>, latest: Option<i32>) -> Result<i32, String> {
    match (requested, latest) {
        (None, latest) => Ok(latest.map_or(1, |v| v + 1)),
        (Some(version), Some(latest)) if version <= latest => Err(format!(
            "Generation {version} is not newer than the latest generation {latest}; \
             omit --generation or pass one above {latest}"
        )),
        (Some(version), _) => Ok(version),
    }
}

/// Download every target as generation `version`.
async fn run<S: MetadataStore>(
    downloader: &Downloader<S>,
    targets: &Targets,
    version: i32,
) -> RunSummary {
    let mut summary = RunSummary::default();
    let total = targets.len();

    match targets {
        Targets::Repositories(repos) => {
            for (owner, name) in repos {
                if is_shutdown_requested() {
                    break;
                }
                let result = downloader.download_repository(owner, name, version).await;
                if let Err(e) = &result {
                    tracing::error!(
                        repo = %format!("{owner}/{name}"),
                        version,
                        error = %e,
                        "Download failed"
                    );
                }
                summary.record(result.is_ok());
            }
        }
        Targets::Organizations(logins) => {
            for login in logins {
                if is_shutdown_requested() {
                    break;
                }
                let result = downloader.download_organization(login, version).await;
                if let Err(e) = &result {
                    tracing::error!(login = %login, version, error = %e, "Download failed");
                }
                summary.record(result.is_ok());
            }
        }
    }

    summary.skipped = total - summary.succeeded - summary.failed;
    summary
}

fn finish(
    reporter: &ProgressReporter,
    summary: &RunSummary,
    total: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    reporter.finish();
    reporter.println(&format!(
        "{} of {total} downloaded, {} failed, {} skipped",
        summary.succeeded, summary.failed, summary.skipped
    ));
    if summary.failed > 0 || summary.skipped > 0 {
        let incomplete = summary.failed + summary.skipped;
        return Err(format!("{incomplete} of {total} downloads did not complete").into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repositories_parses_every_argument() {
        let targets =
            Targets::repositories(&["src-d/go-git".to_string(), "src-d/gitbase".to_string()])
                .unwrap();
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn repositories_rejects_a_malformed_argument() {
        assert!(Targets::repositories(&["src-d/go-git".to_string(), "oops".to_string()]).is_err());
    }

    #[test]
    fn resolve_generation_defaults_to_one_past_the_latest() {
        assert_eq!(resolve_generation(None, None), Ok(1));
        assert_eq!(resolve_generation(None, Some(4)), Ok(5));
    }

    #[test]
    fn resolve_generation_rejects_existing_generations() {
        assert_eq!(resolve_generation(Some(9), Some(4)), Ok(9));
        assert_eq!(resolve_generation(Some(3), None), Ok(3));

        let err = resolve_generation(Some(4), Some(4)).unwrap_err();
        assert!(err.contains("Generation 4 is not newer"), "{err}");
        assert!(resolve_generation(Some(2), Some(4)).is_err());
    }

    #[test]
    fn finish_fails_when_anything_did_not_complete() {
        let reporter = ProgressReporter::Logging(crate::progress::LoggingReporter::new());
        let ok = RunSummary {
            succeeded: 2,
            ..RunSummary::default()
        };
        assert!(finish(&reporter, &ok, 2).is_ok());

        let failed = RunSummary {
            succeeded: 1,
            failed: 1,
            skipped: 0,
        };
        assert!(finish(&reporter, &failed, 2).is_err());
    }
}
