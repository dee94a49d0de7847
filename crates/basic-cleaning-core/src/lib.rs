//! Download a listings dataset artifact, clean it, and publish the result as a
//! new artifact version.

pub mod artifacts;
pub mod backend;
pub mod config;
pub mod dataset;
pub mod error;
pub mod filters;
pub mod job;
pub mod reference;
pub mod tracking;

pub use artifacts::{ArtifactDraft, ArtifactStore, PublishedArtifact, VersionedArtifactStore};
pub use config::{CleaningConfig, StoreSettings};
pub use error::{CleaningError, Result, Stage};
pub use job::{run_cleaning, CleaningReport, JobContext};
pub use reference::ArtifactReference;
pub use tracking::{RunHandle, RunTracker};
