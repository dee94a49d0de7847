use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::CleaningError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    Latest,
    Version(u32),
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Latest => f.write_str("latest"),
            VersionSelector::Version(version) => write!(f, "v{version}"),
        }
    }
}

/// `[scope/]name[:version]`, where scope is a slash-separated prefix such as
/// `entity/project` and version is `latest` or `vN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReference {
    pub scope: Option<String>,
    pub name: String,
    pub version: VersionSelector,
}

impl ArtifactReference {
    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            scope: None,
            name: name.into(),
            version: VersionSelector::Latest,
        }
    }

    pub fn with_version(&self, version: u32) -> Self {
        Self {
            scope: self.scope.clone(),
            name: self.name.clone(),
            version: VersionSelector::Version(version),
        }
    }

    /// Backend key prefix shared by every version of this artifact.
    pub fn key_prefix(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{scope}/{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Parses an output artifact name; a version suffix is rejected because
    /// the store assigns versions on publish.
    pub fn parse_unversioned(raw: &str) -> Result<Self, CleaningError> {
        if raw.contains(':') {
            return Err(CleaningError::Argument(format!(
                "artifact name '{raw}' must not carry a version"
            )));
        }
        raw.parse()
    }
}

impl FromStr for ArtifactReference {
    type Err = CleaningError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CleaningError::Argument(
                "artifact reference cannot be empty".into(),
            ));
        }

        let (path, version) = match raw.rsplit_once(':') {
            Some((path, version)) => (path, parse_version(raw, version)?),
            None => (raw, VersionSelector::Latest),
        };

        let (scope, name) = match path.rsplit_once('/') {
            Some((scope, name)) => (Some(scope), name),
            None => (None, path),
        };

        validate_segment(raw, name)?;
        if let Some(scope) = scope {
            for segment in scope.split('/') {
                validate_segment(raw, segment)?;
            }
        }

        Ok(Self {
            scope: scope.map(str::to_string),
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key_prefix(), self.version)
    }
}

impl Serialize for ArtifactReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn parse_version(raw: &str, version: &str) -> Result<VersionSelector, CleaningError> {
    if version == "latest" {
        return Ok(VersionSelector::Latest);
    }

    version
        .strip_prefix('v')
        .and_then(|digits| digits.parse::<u32>().ok())
        .map(VersionSelector::Version)
        .ok_or_else(|| {
            CleaningError::Argument(format!(
                "artifact reference '{raw}' has unsupported version '{version}' (expected 'latest' or 'vN')"
            ))
        })
}

fn validate_segment(raw: &str, segment: &str) -> Result<(), CleaningError> {
    let valid = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if !valid {
        return Err(CleaningError::Argument(format!(
            "artifact reference '{raw}' has invalid segment '{segment}'"
        )));
    }
    if is_reserved(segment) {
        return Err(CleaningError::Argument(format!(
            "artifact reference '{raw}' uses reserved segment '{segment}'"
        )));
    }
    Ok(())
}

/// Segments that name the version pointer or a version directory in the
/// store layout.
fn is_reserved(segment: &str) -> bool {
    segment == "latest"
        || segment
            .strip_prefix('v')
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}
