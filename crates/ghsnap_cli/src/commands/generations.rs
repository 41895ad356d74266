use ghsnap::store::query::{self, GenerationSummary};
use ghsnap::{DbStore, MetadataStore, connect_and_migrate};

use crate::commands::limits::OutputFormat;

pub(crate) async fn handle_activate(
    version: i32,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = connect_and_migrate(database_url).await?;
    if !query::versions(&db).await?.contains(&version) {
        return Err(format!("Generation {version} does not exist").into());
    }
    DbStore::new(db).set_active_version(version).await?;
    println!("Generation {version} is now active.");
    Ok(())
}

pub(crate) async fn handle_cleanup(
    version: i32,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = connect_and_migrate(database_url).await?;
    let active = query::active_version(&db).await?;
    DbStore::new(db).cleanup(version).await?;
    match active {
        Some(active) if active != version => {
            println!("Removed every generation except {version} and {active} (active).");
        }
        _ => println!("Removed every generation except {version}."),
    }
    Ok(())
}

pub(crate) async fn handle_status(
    output: OutputFormat,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = connect_and_migrate(database_url).await?;
    let summaries = query::generation_summaries(&db).await?;
    let active = query::active_version(&db).await?;

    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        OutputFormat::Table => {
            match active {
                Some(version) => println!("Active generation: {version}"),
                None => println!("No generation is active yet."),
            }
            if summaries.is_empty() {
                println!("No generations stored.");
            } else {
                let rows: Vec<GenerationRow> = summaries.iter().map(GenerationRow::from).collect();
                let mut table = tabled::Table::new(rows);
                table.with(tabled::settings::Style::rounded());
                println!("{table}");
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, tabled::Tabled)]
struct GenerationRow {
    #[tabled(rename = "Generation")]
    version: i32,
    #[tabled(rename = "Active")]
    active: &'static str,
    #[tabled(rename = "Repositories")]
    repositories: u64,
    #[tabled(rename = "Issues")]
    issues: u64,
    #[tabled(rename = "Pull Requests")]
    pull_requests: u64,
    #[tabled(rename = "Organizations")]
    organizations: u64,
    #[tabled(rename = "Users")]
    users: u64,
}

impl From<&GenerationSummary> for GenerationRow {
    fn from(summary: &GenerationSummary) -> Self {
        Self {
            version: summary.version,
            active: if summary.active { "*" } else { "" },
            repositories: summary.repositories,
            issues: summary.issues,
            pull_requests: summary.pull_requests,
            organizations: summary.organizations,
            users: summary.users,
        }
    }
}
