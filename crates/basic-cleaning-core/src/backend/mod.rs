//! Key/value blob storage underneath the artifact registry and run tracker.

mod fs;
#[cfg(feature = "s3")]
mod s3;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use fs::FsBackend;
#[cfg(feature = "s3")]
pub use s3::{S3Backend, S3Config};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("sdk error: {0}")]
    Sdk(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }

    #[cfg_attr(not(feature = "s3"), allow(dead_code))]
    pub(crate) fn from_sdk(err: impl fmt::Display) -> Self {
        Self::Sdk(err.to_string())
    }
}

#[async_trait]
pub trait ObjectBackend: Send + Sync {
    async fn put_object(&self, key: &str, bytes: Bytes, content_type: &str)
        -> Result<(), BackendError>;
    async fn get_object(&self, key: &str) -> Result<Bytes, BackendError>;

    /// Short label for logs.
    fn describe(&self) -> String;
}
