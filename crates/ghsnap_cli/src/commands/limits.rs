use clap::ValueEnum;
#[cfg(feature = "github")]
use ghsnap::GraphSource;
#[cfg(feature = "github")]
use ghsnap::github::RateLimit;

#[cfg(feature = "github")]
use crate::commands::shared::github_client;
#[cfg(feature = "github")]
use crate::config::Config;

/// Output format for tabular commands.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

#[cfg(feature = "github")]
pub(crate) async fn handle_limits(
    output: OutputFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = github_client(config, None)?;
    let limit = client.rate_remaining().await?;
    RateLimitDisplay::from_rate_limit(&limit).print(output)?;
    Ok(())
}

/// GraphQL budget for display.
#[cfg(feature = "github")]
#[derive(Debug, Clone, serde::Serialize, tabled::Tabled)]
pub(crate) struct RateLimitDisplay {
    #[tabled(rename = "Limit")]
    pub limit: String,
    #[tabled(rename = "Used")]
    pub used: String,
    #[tabled(rename = "Remaining")]
    pub remaining: String,
    #[tabled(rename = "Usage %")]
    pub usage_percent: String,
    #[tabled(rename = "Resets At")]
    pub reset_at: String,
    #[tabled(rename = "Resets In")]
    pub reset_in: String,
}

#[cfg(feature = "github")]
impl RateLimitDisplay {
    pub(crate) fn from_rate_limit(limit: &RateLimit) -> Self {
        let usage_percent = if limit.limit > 0 {
            (limit.used as f64 / limit.limit as f64) * 100.0
        } else {
            0.0
        };
        let reset_duration = limit.reset_at.signed_duration_since(chrono::Utc::now());
        let reset_in = if reset_duration.num_seconds() > 0 {
            format_duration(reset_duration)
        } else {
            "now".to_string()
        };

        Self {
            limit: limit.limit.to_string(),
            used: limit.used.to_string(),
            remaining: limit.remaining.to_string(),
            usage_percent: format!("{usage_percent:.1}%"),
            reset_at: limit.reset_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            reset_in,
        }
    }

    pub(crate) fn print(self, format: OutputFormat) -> Result<(), serde_json::Error> {
        match format {
            OutputFormat::Table => {
                let mut table = tabled::Table::new(vec![self]);
                table.with(tabled::settings::Style::rounded());
                println!("{table}");
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&self)?);
            }
        }
        Ok(())
    }
}

/// Format a duration in a human-readable way.
#[cfg(feature = "github")]
fn format_duration(duration: chrono::Duration) -> String {
    let total_secs = duration.num_seconds();
    if total_secs < 60 {
        format!("{total_secs}s")
    } else if total_secs < 3600 {
        let (mins, secs) = (total_secs / 60, total_secs % 60);
        if secs > 0 {
            format!("{mins}m {secs}s")
        } else {
            format!("{mins}m")
        }
    } else {
        let (hours, mins) = (total_secs / 3600, (total_secs % 3600) / 60);
        if mins > 0 {
            format!("{hours}h {mins}m")
        } else {
            format!("{hours}h")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(feature = "github")]
    use chrono::{Duration, Utc};

    #[test]
    fn output_format_default_is_table() {
        assert!(matches!(OutputFormat::default(), OutputFormat::Table));
    }

    #[cfg(feature = "github")]
    #[test]
    fn format_duration_handles_seconds_minutes_and_hours() {
        assert_eq!(format_duration(Duration::seconds(42)), "42s");
        assert_eq!(format_duration(Duration::seconds(120)), "2m");
        assert_eq!(format_duration(Duration::seconds(125)), "2m 5s");
        assert_eq!(format_duration(Duration::seconds(3600)), "1h");
        assert_eq!(format_duration(Duration::seconds(3900)), "1h 5m");
    }

    #[cfg(feature = "github")]
    #[test]
    fn display_formats_percent_and_reset() {
        let display = RateLimitDisplay::from_rate_limit(&RateLimit {
            limit: 5000,
            used: 1250,
            remaining: 3750,
            reset_at: Utc::now() + Duration::minutes(30),
        });

        assert_eq!(display.limit, "5000");
        assert_eq!(display.remaining, "3750");
        assert_eq!(display.usage_percent, "25.0%");
        assert!(display.reset_at.ends_with("UTC"));
        assert_ne!(display.reset_in, "now");
    }

    #[cfg(feature = "github")]
    #[test]
    fn display_reports_past_reset_as_now() {
        let display = RateLimitDisplay::from_rate_limit(&RateLimit {
            limit: 0,
            ..RateLimit::default()
        });
        assert_eq!(display.usage_percent, "0.0%");
        assert_eq!(display.reset_in, "now");
    }

    #[cfg(feature = "github")]
    #[test]
    fn print_supports_json_and_table() {
        let display = RateLimitDisplay::from_rate_limit(&RateLimit::default());
        display.clone().print(OutputFormat::Json).unwrap();
        display.print(OutputFormat::Table).unwrap();
    }
}
