use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::artifacts::{ArtifactStore, PublishedArtifact};
use crate::config::CleaningConfig;
use crate::dataset;
use crate::error::{CleaningError, Result, Stage};
use crate::filters;
use crate::reference::ArtifactReference;
use crate::tracking::{RunHandle, RunTracker};

pub const JOB_TYPE: &str = "basic_cleaning";

/// Collaborators for one run, created at job start and consumed by
/// [`run_cleaning`].
pub struct JobContext {
    pub store: Arc<dyn ArtifactStore>,
    pub run: RunHandle,
}

impl JobContext {
    pub async fn init(
        store: Arc<dyn ArtifactStore>,
        tracker: &RunTracker,
        config: &CleaningConfig,
    ) -> Self {
        let run = tracker.start_run(JOB_TYPE, config).await;
        Self { store, run }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageCounts {
    pub input_rows: usize,
    pub after_price_filter: usize,
    pub after_geo_filter: usize,
}

#[derive(Debug, Clone)]
pub struct CleaningReport {
    pub run_id: Uuid,
    pub input: ArtifactReference,
    pub rows: StageCounts,
    pub output_path: PathBuf,
    pub artifact: PublishedArtifact,
}

/// Runs the cleaning steps in order and records the outcome on the run. The
/// first failing step aborts the job; nothing is published on failure.
pub async fn run_cleaning(
    ctx: JobContext,
    config: &CleaningConfig,
    output_file: &Path,
) -> Result<CleaningReport> {
    let JobContext { store, mut run } = ctx;

    match execute(store.as_ref(), &mut run, config, output_file).await {
        Ok(report) => {
            run.finish_success().await;
            Ok(report)
        }
        Err(err) => {
            run.finish_failure(&err).await;
            Err(err)
        }
    }
}

async fn execute(
    store: &dyn ArtifactStore,
    run: &mut RunHandle,
    config: &CleaningConfig,
    output_file: &Path,
) -> Result<CleaningReport> {
    info!(artifact = %config.input_artifact, "Downloading artifact");
    let resolved = store.resolve_and_download(&config.input_artifact).await?;
    run.use_artifact(&resolved.reference).await;

    info!(path = %resolved.local_path.display(), "Loading data");
    let df = dataset::load_dataset(&resolved.local_path)?;
    let input_rows = df.height();

    info!(
        min_price = config.min_price,
        max_price = config.max_price,
        "Dropping price outliers"
    );
    if config.min_price > config.max_price {
        warn!(
            min_price = config.min_price,
            max_price = config.max_price,
            "min_price exceeds max_price; no rows can pass the price filter"
        );
    }
    let df = filters::filter_price_range(df, config.min_price, config.max_price)
        .map_err(CleaningError::transform(Stage::PriceFilter))?;
    let after_price_filter = df.height();
    info!(before = input_rows, after = after_price_filter, "Price filter applied");

    info!("Converting last_review to date");
    let df = filters::normalize_last_review(df)
        .map_err(CleaningError::transform(Stage::DateNormalization))?;

    info!("Dropping rows outside the geolocation bounds");
    let mut df =
        filters::filter_geolocation(df).map_err(CleaningError::transform(Stage::GeoFilter))?;
    let after_geo_filter = df.height();
    info!(before = after_price_filter, after = after_geo_filter, "Geolocation filter applied");

    info!(path = %output_file.display(), "Saving data");
    dataset::write_dataset(&mut df, output_file)?;
    drop(df);

    info!(name = %config.output_artifact, "Creating artifact instance");
    let mut draft = store
        .create_artifact(
            &config.output_artifact,
            &config.output_type,
            &config.output_description,
        )
        .map_err(|err| match err {
            CleaningError::Argument(message) => CleaningError::PublishFailed {
                name: config.output_artifact.clone(),
                message,
            },
            other => other,
        })?;
    draft.attach_file(output_file)?;

    info!("Logging artifact");
    let artifact = store.publish(draft).await?;
    run.log_artifact(&artifact.reference).await;

    Ok(CleaningReport {
        run_id: run.run_id(),
        input: resolved.reference,
        rows: StageCounts {
            input_rows,
            after_price_filter,
            after_geo_filter,
        },
        output_path: output_file.to_path_buf(),
        artifact,
    })
}
