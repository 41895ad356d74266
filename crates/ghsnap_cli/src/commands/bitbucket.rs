use std::sync::Arc;

use ghsnap::bridge::{self, BitbucketClient, MigrationReport};
use ghsnap::rate_limit::{ApiRateLimiter, BITBUCKET_DEFAULT_RPS};

use crate::BitbucketArgs;
use crate::commands::shared::{github_client, parse_repository};
use crate::config::Config;

pub(crate) async fn handle_bitbucket(
    args: BitbucketArgs,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let (owner, name) = parse_repository(&args.repository)?;
    let host = config
        .bitbucket
        .host
        .as_deref()
        .ok_or("No Bitbucket host configured. Set [bitbucket] host in config.toml.")?;
    let token = config.bitbucket.token.as_deref().ok_or(
        "No Bitbucket token configured. \
         Set GHSNAP_BITBUCKET_TOKEN or [bitbucket] token in config.toml.",
    )?;
    let project_key = args
        .project_key
        .as_deref()
        .or(config.bitbucket.project_key.as_deref())
        .ok_or(
            "No Bitbucket project key given. Pass --project-key or set [bitbucket] project_key.",
        )?;
    let slug = args.slug.as_deref().unwrap_or(&name);

    let mut writer = BitbucketClient::new(host, token, project_key, slug)?
        .with_rate_limiter(ApiRateLimiter::new(BITBUCKET_DEFAULT_RPS));
    if let Some(reviewer) = args.reviewer.as_deref().or(config.bitbucket.reviewer.as_deref()) {
        writer = writer.with_reviewer(reviewer);
    }

    println!("Downloading {owner}/{name}...");
    let source = github_client(config, None)?;
    let store =
        bridge::fetch_into_memory(Arc::new(source), &owner, &name, config.page_sizes()).await?;
    let repo = bridge::downloaded_repository(&store, &owner, &name)?;

    println!(
        "Migrating {} pull requests to {project_key}/{slug}...",
        repo.pull_requests.len()
    );
    let report = bridge::migrate_repository(&repo, &writer).await;
    print_report(&report);

    if report.is_success() {
        Ok(())
    } else {
        Err(format!("{} pull requests failed to migrate", report.failed.len()).into())
    }
}

#[derive(Debug, tabled::Tabled)]
struct ReportRow {
    #[tabled(rename = "PR")]
    number: i64,
    #[tabled(rename = "Outcome")]
    outcome: String,
}

fn report_rows(report: &MigrationReport) -> Vec<ReportRow> {
    let mut rows: Vec<ReportRow> = report
        .migrated
        .iter()
        .map(|m| ReportRow {
            number: m.number,
            outcome: format!(
                "migrated as #{} ({} comments, {} reviews)",
                m.target_id, m.comments, m.reviews
            ),
        })
        .chain(report.skipped.iter().map(|s| ReportRow {
            number: s.number,
            outcome: format!("skipped ({})", s.state.to_lowercase()),
        }))
        .chain(report.failed.iter().map(|f| ReportRow {
            number: f.number,
            outcome: format!("failed: {}", f.error),
        }))
        .collect();
    rows.sort_by_key(|row| row.number);
    rows
}

fn print_report(report: &MigrationReport) {
    let rows = report_rows(report);
    if rows.is_empty() {
        println!("No pull requests to migrate.");
        return;
    }
    let mut table = tabled::Table::new(rows);
    table.with(tabled::settings::Style::rounded());
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghsnap::bridge::{FailedPullRequest, MigratedPullRequest, SkippedPullRequest};

    #[test]
    fn report_rows_are_ordered_by_number() {
        let report = MigrationReport {
            migrated: vec![MigratedPullRequest {
                number: 5,
                target_id: 12,
                comments: 2,
                reviews: 1,
            }],
            skipped: vec![SkippedPullRequest {
                number: 1,
                state: "MERGED".into(),
            }],
            failed: vec![FailedPullRequest {
                number: 3,
                error: "API error (409): duplicate".into(),
            }],
        };

        let rows = report_rows(&report);
        let numbers: Vec<i64> = rows.iter().map(|r| r.number).collect();
        assert_eq!(numbers, [1, 3, 5]);
        assert_eq!(rows[0].outcome, "skipped (merged)");
        assert_eq!(rows[2].outcome, "migrated as #12 (2 comments, 1 reviews)");
    }

    #[tokio::test]
    async fn requires_bitbucket_host() {
        let args = BitbucketArgs {
            repository: "src-d/go-git".into(),
            project_key: Some("SRCD".into()),
            slug: None,
            reviewer: None,
        };
        let err = handle_bitbucket(args, &Config::default()).await.unwrap_err();
        assert!(err.to_string().contains("Bitbucket host"));
    }
}
