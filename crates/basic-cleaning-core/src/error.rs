// crates/basic-cleaning-core/src/error.rs

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Job stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Arguments,
    Resolve,
    Load,
    PriceFilter,
    DateNormalization,
    GeoFilter,
    Persist,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Arguments => "arguments",
            Stage::Resolve => "resolve",
            Stage::Load => "load",
            Stage::PriceFilter => "price_filter",
            Stage::DateNormalization => "date_normalization",
            Stage::GeoFilter => "geo_filter",
            Stage::Persist => "persist",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum CleaningError {
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("artifact '{reference}' not found")]
    ArtifactNotFound { reference: String },

    #[error("failed to download artifact '{reference}': {message}")]
    DownloadFailed { reference: String, message: String },

    #[error("failed to parse '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("{stage} failed: {source}")]
    Transform {
        stage: Stage,
        #[source]
        source: polars::error::PolarsError,
    },

    #[error("failed to write '{}': {message}", path.display())]
    Write { path: PathBuf, message: String },

    #[error("failed to publish artifact '{name}': {message}")]
    PublishFailed { name: String, message: String },
}

impl CleaningError {
    pub fn stage(&self) -> Stage {
        match self {
            CleaningError::Argument(_) => Stage::Arguments,
            CleaningError::ArtifactNotFound { .. } | CleaningError::DownloadFailed { .. } => {
                Stage::Resolve
            }
            CleaningError::Parse { .. } => Stage::Load,
            CleaningError::Transform { stage, .. } => *stage,
            CleaningError::Write { .. } => Stage::Persist,
            CleaningError::PublishFailed { .. } => Stage::Publish,
        }
    }

    /// Stable name of the failure kind, as reported in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CleaningError::Argument(_) => "ArgumentError",
            CleaningError::ArtifactNotFound { .. } => "ArtifactNotFound",
            CleaningError::DownloadFailed { .. } => "DownloadFailed",
            CleaningError::Parse { .. } => "ParseError",
            CleaningError::Transform { .. } => "TransformError",
            CleaningError::Write { .. } => "WriteError",
            CleaningError::PublishFailed { .. } => "PublishFailed",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            CleaningError::Argument(_) => 2,
            CleaningError::ArtifactNotFound { .. } => 3,
            CleaningError::DownloadFailed { .. } => 4,
            CleaningError::Parse { .. } => 5,
            CleaningError::PublishFailed { .. } => 6,
            CleaningError::Transform { .. } | CleaningError::Write { .. } => 1,
        }
    }

    pub(crate) fn transform(stage: Stage) -> impl FnOnce(polars::error::PolarsError) -> Self {
        move |source| CleaningError::Transform { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, CleaningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_failures_share_the_resolve_stage() {
        let missing = CleaningError::ArtifactNotFound {
            reference: "raw:latest".into(),
        };
        let transport = CleaningError::DownloadFailed {
            reference: "raw:v0".into(),
            message: "connection reset".into(),
        };

        assert_eq!(missing.stage(), Stage::Resolve);
        assert_eq!(transport.stage(), Stage::Resolve);
        assert_ne!(missing.exit_code(), transport.exit_code());
    }

    #[test]
    fn every_kind_exits_nonzero() {
        let errors = [
            CleaningError::Argument("min_price".into()),
            CleaningError::Parse {
                path: "sample.csv".into(),
                message: "bad quote".into(),
            },
            CleaningError::Write {
                path: "clean_sample.csv".into(),
                message: "disk full".into(),
            },
            CleaningError::PublishFailed {
                name: "clean_sample".into(),
                message: "type mismatch".into(),
            },
        ];

        for err in errors {
            assert_ne!(err.exit_code(), 0, "{} should fail the process", err.kind());
        }
    }
}
