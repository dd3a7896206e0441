use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "phiguard", version, about = "HIPAA audit trail engine")]
struct Cli {
    /// Path to the configuration file.
    #[arg(
        long,
        short,
        global = true,
        env = "PHIGUARD_CONFIG",
        default_value = "phiguard.yaml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API and run periodic retention sweeps.
    Serve,

    /// Run one retention sweep over the configured store and print the report.
    Sweep,

    /// Validate the configuration and print the classification registry.
    Check,

    /// Show the retention decision for a resource type and creation time.
    Evaluate {
        /// Resource type as named in the classification registry.
        #[arg(long = "resource-type")]
        resource_type: String,

        /// Creation time of the record (RFC 3339).
        #[arg(long = "created-at", conflicts_with = "age_days")]
        created_at: Option<DateTime<Utc>>,

        /// Age of the record in days, as an alternative to --created-at.
        #[arg(long = "age-days")]
        age_days: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Serve => commands::serve::run(&cli.config).await,
        Command::Sweep => commands::sweep::run(&cli.config).await,
        Command::Check => commands::check::run(&cli.config),
        Command::Evaluate {
            resource_type,
            created_at,
            age_days,
        } => commands::evaluate::run(&cli.config, &resource_type, created_at, age_days),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_rejects_both_time_arguments() {
        let result = Cli::try_parse_from([
            "phiguard",
            "evaluate",
            "--resource-type",
            "lab_reports",
            "--created-at",
            "2020-01-01T00:00:00Z",
            "--age-days",
            "10",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn evaluate_parses_created_at() {
        let cli = Cli::try_parse_from([
            "phiguard",
            "--config",
            "custom.yaml",
            "evaluate",
            "--resource-type",
            "lab_reports",
            "--created-at",
            "2020-01-01T00:00:00Z",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("custom.yaml"));
        match cli.cmd {
            Command::Evaluate {
                resource_type,
                created_at,
                age_days,
            } => {
                assert_eq!(resource_type, "lab_reports");
                assert!(created_at.is_some());
                assert!(age_days.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
