//! Versioned artifact registry layered over an [`ObjectBackend`].
//!
//! Layout for an artifact with key prefix `p`:
//!
//! ```text
//! p/latest                  {"version": N}
//! p/vN/manifest.json        ArtifactManifest
//! p/vN/files/<file name>    attached file contents
//! ```
//!
//! A version exists once its manifest is written; the `latest` pointer moves
//! last, so a failed publish never becomes visible.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::{BackendError, ObjectBackend};
use crate::error::{CleaningError, Result};
use crate::reference::{ArtifactReference, VersionSelector};

pub const MANIFEST_FILE: &str = "manifest.json";
const LATEST_POINTER: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub size: u64,
    pub digest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub version: u32,
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub files: Vec<ManifestEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LatestPointer {
    version: u32,
}

/// An artifact being assembled for publication.
#[derive(Debug, Clone)]
pub struct ArtifactDraft {
    reference: ArtifactReference,
    artifact_type: String,
    description: String,
    files: Vec<PathBuf>,
}

impl ArtifactDraft {
    pub fn new(name: &str, artifact_type: &str, description: &str) -> Result<Self> {
        let reference = ArtifactReference::parse_unversioned(name)?;
        if artifact_type.trim().is_empty() {
            return Err(CleaningError::Argument(format!(
                "artifact '{name}' needs a non-empty type"
            )));
        }

        Ok(Self {
            reference,
            artifact_type: artifact_type.to_string(),
            description: description.to_string(),
            files: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.reference.name
    }

    pub fn artifact_type(&self) -> &str {
        &self.artifact_type
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn attach_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let publish_err = |message: String| CleaningError::PublishFailed {
            name: self.reference.name.clone(),
            message,
        };

        if !path.is_file() {
            return Err(publish_err(format!(
                "'{}' is not a regular file",
                path.display()
            )));
        }

        let file_name = attached_name(path).map_err(&publish_err)?;
        let duplicate = self
            .files
            .iter()
            .any(|existing| attached_name(existing).ok().as_deref() == Some(file_name.as_str()));
        if duplicate {
            return Err(publish_err(format!(
                "a file named '{file_name}' is already attached"
            )));
        }

        self.files.push(path.to_path_buf());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    /// Reference pinned to the concrete version that was resolved.
    pub reference: ArtifactReference,
    pub manifest: ArtifactManifest,
    pub local_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PublishedArtifact {
    pub reference: ArtifactReference,
    pub manifest: ArtifactManifest,
    /// True when content and description matched the latest version and no new
    /// version was written.
    pub deduplicated: bool,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn resolve_and_download(&self, reference: &ArtifactReference) -> Result<ResolvedArtifact>;

    fn create_artifact(
        &self,
        name: &str,
        artifact_type: &str,
        description: &str,
    ) -> Result<ArtifactDraft> {
        ArtifactDraft::new(name, artifact_type, description)
    }

    async fn publish(&self, draft: ArtifactDraft) -> Result<PublishedArtifact>;
}

#[derive(Clone)]
pub struct VersionedArtifactStore {
    backend: Arc<dyn ObjectBackend>,
    download_dir: PathBuf,
}

impl VersionedArtifactStore {
    pub fn new(backend: Arc<dyn ObjectBackend>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            download_dir: download_dir.into(),
        }
    }

    pub fn backend(&self) -> Arc<dyn ObjectBackend> {
        Arc::clone(&self.backend)
    }

    async fn read_latest_version(&self, prefix: &str) -> std::result::Result<Option<u32>, String> {
        match self.backend.get_object(&latest_key(prefix)).await {
            Ok(bytes) => serde_json::from_slice::<LatestPointer>(&bytes)
                .map(|pointer| Some(pointer.version))
                .map_err(|err| format!("corrupt version pointer: {err}")),
            Err(BackendError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.to_string()),
        }
    }

    async fn read_manifest(
        &self,
        prefix: &str,
        version: u32,
    ) -> std::result::Result<Option<ArtifactManifest>, String> {
        match self.backend.get_object(&manifest_key(prefix, version)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|err| format!("corrupt manifest for v{version}: {err}")),
            Err(BackendError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.to_string()),
        }
    }
}

#[async_trait]
impl ArtifactStore for VersionedArtifactStore {
    async fn resolve_and_download(&self, reference: &ArtifactReference) -> Result<ResolvedArtifact> {
        let prefix = reference.key_prefix();
        let not_found = || CleaningError::ArtifactNotFound {
            reference: reference.to_string(),
        };
        let download_failed = |message: String| CleaningError::DownloadFailed {
            reference: reference.to_string(),
            message,
        };

        let version = match reference.version {
            VersionSelector::Version(version) => version,
            VersionSelector::Latest => self
                .read_latest_version(&prefix)
                .await
                .map_err(download_failed)?
                .ok_or_else(not_found)?,
        };

        let manifest = self
            .read_manifest(&prefix, version)
            .await
            .map_err(download_failed)?
            .ok_or_else(not_found)?;

        let [entry] = manifest.files.as_slice() else {
            return Err(download_failed(format!(
                "expected exactly one file in v{version}, found {}",
                manifest.files.len()
            )));
        };

        let key = file_key(&prefix, version, &entry.name);
        debug!(key = %key, backend = %self.backend.describe(), "Fetching artifact file");
        let bytes = self
            .backend
            .get_object(&key)
            .await
            .map_err(|err| download_failed(err.to_string()))?;

        if bytes.len() as u64 != entry.size || digest(&bytes) != entry.digest {
            return Err(download_failed(format!(
                "content of '{}' does not match its manifest digest",
                entry.name
            )));
        }

        let target_dir = self.download_dir.join(format!("{prefix}-v{version}"));
        tokio::fs::create_dir_all(&target_dir)
            .await
            .map_err(|err| download_failed(err.to_string()))?;
        let local_path = target_dir.join(&entry.name);
        tokio::fs::write(&local_path, &bytes)
            .await
            .map_err(|err| download_failed(err.to_string()))?;

        let resolved = reference.with_version(version);
        info!(artifact = %resolved, path = %local_path.display(), "Downloaded artifact");

        Ok(ResolvedArtifact {
            reference: resolved,
            manifest,
            local_path,
        })
    }

    async fn publish(&self, draft: ArtifactDraft) -> Result<PublishedArtifact> {
        let name = draft.reference.name.clone();
        let publish_err = |message: String| CleaningError::PublishFailed {
            name: name.clone(),
            message,
        };

        if draft.files.is_empty() {
            return Err(publish_err("no files attached".into()));
        }

        let mut payloads = Vec::with_capacity(draft.files.len());
        for path in &draft.files {
            let file_name = attached_name(path).map_err(&publish_err)?;
            let contents = tokio::fs::read(path)
                .await
                .map_err(|err| publish_err(format!("failed to read '{}': {err}", path.display())))?;
            payloads.push((
                ManifestEntry {
                    name: file_name,
                    size: contents.len() as u64,
                    digest: digest(&contents),
                },
                Bytes::from(contents),
            ));
        }
        payloads.sort_by(|(a, _), (b, _)| a.name.cmp(&b.name));
        let entries: Vec<ManifestEntry> = payloads.iter().map(|(entry, _)| entry.clone()).collect();

        let prefix = draft.reference.key_prefix();
        let latest = self
            .read_latest_version(&prefix)
            .await
            .map_err(&publish_err)?;

        if let Some(latest_version) = latest {
            let existing = self
                .read_manifest(&prefix, latest_version)
                .await
                .map_err(&publish_err)?
                .ok_or_else(|| publish_err(format!("manifest for v{latest_version} is missing")))?;

            if existing.artifact_type != draft.artifact_type {
                return Err(publish_err(format!(
                    "artifact already exists with type '{}', refusing type '{}'",
                    existing.artifact_type, draft.artifact_type
                )));
            }

            if existing.files == entries && existing.description == draft.description {
                info!(
                    artifact = %draft.reference.with_version(latest_version),
                    "Content unchanged; reusing latest version"
                );
                return Ok(PublishedArtifact {
                    reference: draft.reference.with_version(latest_version),
                    manifest: existing,
                    deduplicated: true,
                });
            }
        }

        let version = latest.map_or(0, |v| v + 1);

        for (entry, bytes) in payloads {
            self.backend
                .put_object(
                    &file_key(&prefix, version, &entry.name),
                    bytes,
                    content_type_for(&entry.name),
                )
                .await
                .map_err(|err| publish_err(err.to_string()))?;
        }

        let manifest = ArtifactManifest {
            name: draft.reference.name.clone(),
            scope: draft.reference.scope.clone(),
            version,
            artifact_type: draft.artifact_type.clone(),
            description: draft.description.clone(),
            created_at: Utc::now(),
            files: entries,
        };
        let manifest_bytes =
            serde_json::to_vec_pretty(&manifest).map_err(|err| publish_err(err.to_string()))?;
        self.backend
            .put_object(
                &manifest_key(&prefix, version),
                Bytes::from(manifest_bytes),
                "application/json",
            )
            .await
            .map_err(|err| publish_err(err.to_string()))?;

        let pointer_bytes = serde_json::to_vec(&LatestPointer { version })
            .map_err(|err| publish_err(err.to_string()))?;
        self.backend
            .put_object(&latest_key(&prefix), Bytes::from(pointer_bytes), "application/json")
            .await
            .map_err(|err| publish_err(err.to_string()))?;

        let reference = draft.reference.with_version(version);
        info!(artifact = %reference, backend = %self.backend.describe(), "Published artifact");

        Ok(PublishedArtifact {
            reference,
            manifest,
            deduplicated: false,
        })
    }
}

pub fn digest(contents: &[u8]) -> String {
    blake3::hash(contents).to_hex().to_string()
}

fn attached_name(path: &Path) -> std::result::Result<String, String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| format!("'{}' has no usable file name", path.display()))
}

fn latest_key(prefix: &str) -> String {
    format!("{prefix}/{LATEST_POINTER}")
}

fn manifest_key(prefix: &str, version: u32) -> String {
    format!("{prefix}/v{version}/{MANIFEST_FILE}")
}

fn file_key(prefix: &str, version: u32, file_name: &str) -> String {
    format!("{prefix}/v{version}/files/{file_name}")
}

fn content_type_for(file_name: &str) -> &'static str {
    match Path::new(file_name).extension().and_then(|ext| ext.to_str()) {
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}
