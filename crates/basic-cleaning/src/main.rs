use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use basic_cleaning_core::{
    run_cleaning, CleaningConfig, CleaningError, JobContext, RunTracker, StoreSettings,
    VersionedArtifactStore,
};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "A very basic data cleaning", long_about = None)]
struct Cli {
    /// Fully-qualified name for the input artifact
    #[arg(long = "input_artifact")]
    input_artifact: String,
    /// Name for the artifact
    #[arg(long = "output_artifact")]
    output_artifact: String,
    /// Type for the artifact
    #[arg(long = "output_type")]
    output_type: String,
    /// Description for the artifact
    #[arg(long = "output_description")]
    output_description: String,
    /// Minimum price for price column
    #[arg(long = "min_price", allow_negative_numbers = true)]
    min_price: f64,
    /// Maximum price for price column
    #[arg(long = "max_price", allow_negative_numbers = true)]
    max_price: f64,
}

impl Cli {
    fn into_config(self) -> Result<CleaningConfig, CleaningError> {
        CleaningConfig::new(
            &self.input_artifact,
            &self.output_artifact,
            &self.output_type,
            &self.output_description,
            self.min_price,
            self.max_price,
        )
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<CleaningError>() {
            Some(cleaning) => {
                error!(
                    stage = %cleaning.stage(),
                    kind = cleaning.kind(),
                    error = %cleaning,
                    "Basic cleaning failed"
                );
                ExitCode::from(cleaning.exit_code())
            }
            None => {
                error!(error = %format!("{err:#}"), "Basic cleaning failed");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.into_config()?;
    let settings = StoreSettings::from_env()?;

    let backend = settings
        .build_backend()
        .await
        .context("failed to configure artifact store")?;
    info!(backend = %backend.describe(), "Artifact store ready");

    let store = Arc::new(VersionedArtifactStore::new(
        Arc::clone(&backend),
        settings.download_dir.clone(),
    ));
    let tracker = RunTracker::new(backend);
    let ctx = JobContext::init(store, &tracker, &config).await;

    let report = run_cleaning(ctx, &config, &settings.output_file).await?;
    info!(
        run_id = %report.run_id,
        input = %report.input,
        artifact = %report.artifact.reference,
        deduplicated = report.artifact.deduplicated,
        input_rows = report.rows.input_rows,
        after_price_filter = report.rows.after_price_filter,
        output_rows = report.rows.after_geo_filter,
        "Basic cleaning finished"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_ARGS: [&str; 13] = [
        "basic-cleaning",
        "--input_artifact",
        "sample.csv:latest",
        "--output_artifact",
        "clean_sample.csv",
        "--output_type",
        "clean_sample",
        "--output_description",
        "Data with outliers and null values removed",
        "--min_price",
        "10",
        "--max_price",
        "350",
    ];

    #[test]
    fn parses_underscore_flags() {
        let cli = Cli::try_parse_from(FULL_ARGS).unwrap();
        assert_eq!(cli.input_artifact, "sample.csv:latest");
        assert_eq!(cli.min_price, 10.0);
        assert_eq!(cli.max_price, 350.0);

        let config = cli.into_config().unwrap();
        assert_eq!(config.output_artifact, "clean_sample.csv");
    }

    #[test]
    fn every_flag_is_required() {
        for skipped in (1..FULL_ARGS.len()).step_by(2) {
            let args: Vec<&str> = FULL_ARGS
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != skipped && *idx != skipped + 1)
                .map(|(_, arg)| *arg)
                .collect();
            assert!(
                Cli::try_parse_from(args).is_err(),
                "missing {} should be rejected",
                FULL_ARGS[skipped]
            );
        }
    }

    #[test]
    fn rejects_non_numeric_price() {
        let mut args = FULL_ARGS.to_vec();
        args[10] = "cheap";
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn accepts_negative_bounds() {
        let mut args = FULL_ARGS.to_vec();
        args[10] = "-5";
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.min_price, -5.0);
    }
}
