use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::backend::{BackendError, FsBackend, ObjectBackend};
use crate::error::{CleaningError, Result};
use crate::reference::ArtifactReference;

#[cfg(feature = "s3")]
use crate::backend::{S3Backend, S3Config};

pub const STORE_KIND_VAR: &str = "BASIC_CLEANING_STORE";
pub const STORE_DIR_VAR: &str = "BASIC_CLEANING_STORE_DIR";
pub const DOWNLOAD_DIR_VAR: &str = "BASIC_CLEANING_DOWNLOAD_DIR";
pub const OUTPUT_FILE_VAR: &str = "BASIC_CLEANING_OUTPUT_FILE";

pub const DEFAULT_STORE_DIR: &str = ".artifacts";
pub const DEFAULT_OUTPUT_FILE: &str = "clean_sample.csv";

/// Parameters of one cleaning run, fixed at startup.
#[derive(Debug, Clone, Serialize)]
pub struct CleaningConfig {
    pub input_artifact: ArtifactReference,
    pub output_artifact: String,
    pub output_type: String,
    pub output_description: String,
    pub min_price: f64,
    pub max_price: f64,
}

impl CleaningConfig {
    /// Validates raw CLI values. Inverted price bounds are accepted and simply
    /// filter out every row.
    pub fn new(
        input_artifact: &str,
        output_artifact: &str,
        output_type: &str,
        output_description: &str,
        min_price: f64,
        max_price: f64,
    ) -> Result<Self> {
        let input_artifact: ArtifactReference = input_artifact.parse()?;
        ArtifactReference::parse_unversioned(output_artifact)?;

        if output_type.trim().is_empty() {
            return Err(CleaningError::Argument("output_type cannot be empty".into()));
        }
        for (flag, value) in [("min_price", min_price), ("max_price", max_price)] {
            if !value.is_finite() {
                return Err(CleaningError::Argument(format!(
                    "{flag} must be a finite number, got {value}"
                )));
            }
        }

        Ok(Self {
            input_artifact,
            output_artifact: output_artifact.to_string(),
            output_type: output_type.to_string(),
            output_description: output_description.to_string(),
            min_price,
            max_price,
        })
    }
}

#[derive(Debug, Clone)]
pub enum StoreKind {
    Local { root: PathBuf },
    #[cfg(feature = "s3")]
    S3(S3Config),
}

/// Where artifacts live and where local files are written.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub kind: StoreKind,
    pub download_dir: PathBuf,
    pub output_file: PathBuf,
}

impl StoreSettings {
    pub fn local(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            download_dir: root.join("downloads"),
            kind: StoreKind::Local { root },
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let kind = match get(STORE_KIND_VAR).as_deref().unwrap_or("local") {
            "local" => StoreKind::Local {
                root: PathBuf::from(get(STORE_DIR_VAR).unwrap_or_else(|| DEFAULT_STORE_DIR.into())),
            },
            #[cfg(feature = "s3")]
            "s3" => StoreKind::S3(
                S3Config::from_lookup(&get).map_err(|err| CleaningError::Argument(err.to_string()))?,
            ),
            #[cfg(not(feature = "s3"))]
            "s3" => {
                return Err(CleaningError::Argument(
                    "s3 artifact store requested but this build lacks the `s3` feature".into(),
                ))
            }
            other => {
                return Err(CleaningError::Argument(format!(
                    "{STORE_KIND_VAR} must be 'local' or 's3', got '{other}'"
                )))
            }
        };

        let download_dir = match (get(DOWNLOAD_DIR_VAR), &kind) {
            (Some(dir), _) => PathBuf::from(dir),
            (None, StoreKind::Local { root }) => root.join("downloads"),
            #[cfg(feature = "s3")]
            (None, StoreKind::S3(_)) => PathBuf::from("artifacts-cache"),
        };

        let output_file =
            PathBuf::from(get(OUTPUT_FILE_VAR).unwrap_or_else(|| DEFAULT_OUTPUT_FILE.into()));

        Ok(Self {
            kind,
            download_dir,
            output_file,
        })
    }

    pub async fn build_backend(&self) -> std::result::Result<Arc<dyn ObjectBackend>, BackendError> {
        match &self.kind {
            StoreKind::Local { root } => Ok(Arc::new(FsBackend::new(root.clone()))),
            #[cfg(feature = "s3")]
            StoreKind::S3(config) => Ok(Arc::new(S3Backend::new(config.clone()).await?)),
        }
    }
}
