//! Maven artifact coordinates and repository key parsing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinates of a single file in a Maven repository layout.
///
/// Parsed from keys of the form
/// `group/.../artifactId/version/artifactId-version[-classifier].extension`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactCoordinates {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl ArtifactCoordinates {
    /// Parse coordinates from a `/`-delimited storage key.
    pub fn parse(key: &str) -> crate::Result<Self> {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(crate::Error::InvalidPath("empty artifact path".to_string()));
        }

        let segments: Vec<&str> = key.split('/').collect();
        if segments.len() < 4 {
            return Err(crate::Error::InvalidPath(format!(
                "expected at least 4 path segments, got {}: {key}",
                segments.len()
            )));
        }
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(crate::Error::InvalidPath(format!(
                "blank path segment: {key}"
            )));
        }

        let n = segments.len();
        let file_name = segments[n - 1];
        let version = segments[n - 2];
        let artifact_id = segments[n - 3];
        let group_id = segments[..n - 3].join(".");

        let (classifier, extension) = split_file_name(file_name, artifact_id, version)?;

        Ok(Self {
            group_id,
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            classifier,
            extension,
        })
    }

    /// File name of this artifact inside its version directory.
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.artifact_id, self.version, classifier, self.extension
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.extension),
        }
    }

    /// Directory holding every version of this package (`group/.../artifactId`).
    pub fn package_dir(&self) -> String {
        format!("{}/{}", self.group_id.replace('.', "/"), self.artifact_id)
    }

    /// Directory holding the files of this version.
    pub fn version_dir(&self) -> String {
        format!("{}/{}", self.package_dir(), self.version)
    }

    /// Key of the package's version-index document.
    pub fn metadata_key(&self) -> String {
        format!("{}/{}", self.package_dir(), crate::METADATA_FILE_NAME)
    }

    /// Storage key of this artifact.
    pub fn to_key(&self) -> String {
        format!("{}/{}", self.version_dir(), self.file_name())
    }
}

impl fmt::Display for ArtifactCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        write!(f, "@{}", self.extension)
    }
}

/// Split a file name into classifier and extension.
///
/// Names that begin with `artifactId-version` are split after that prefix, so
/// artifact ids containing dashes keep working. Anything else falls back to
/// splitting the base name on `-`, where a third part is the classifier.
fn split_file_name(
    file_name: &str,
    artifact_id: &str,
    version: &str,
) -> crate::Result<(Option<String>, String)> {
    let stem = format!("{artifact_id}-{version}");
    if let Some(rest) = file_name.strip_prefix(&stem) {
        if let Some(extension) = rest.strip_prefix('.') {
            return Ok((None, non_blank_extension(extension, file_name)?));
        }
        if let Some(rest) = rest.strip_prefix('-') {
            let (classifier, extension) = rest.split_once('.').ok_or_else(|| {
                crate::Error::InvalidPath(format!("missing extension: {file_name}"))
            })?;
            if classifier.trim().is_empty() {
                return Err(crate::Error::InvalidPath(format!(
                    "blank classifier: {file_name}"
                )));
            }
            return Ok((
                Some(classifier.to_string()),
                non_blank_extension(extension, file_name)?,
            ));
        }
    }

    let (base, extension) = file_name
        .rsplit_once('.')
        .ok_or_else(|| crate::Error::InvalidPath(format!("missing extension: {file_name}")))?;
    let extension = non_blank_extension(extension, file_name)?;

    let parts: Vec<&str> = base.split('-').collect();
    if parts.len() == 3 {
        let classifier = parts[2];
        if classifier.trim().is_empty() {
            return Err(crate::Error::InvalidPath(format!(
                "blank classifier: {file_name}"
            )));
        }
        return Ok((Some(classifier.to_string()), extension));
    }
    Ok((None, extension))
}

fn non_blank_extension(extension: &str, file_name: &str) -> crate::Result<String> {
    if extension.trim().is_empty() {
        return Err(crate::Error::InvalidPath(format!(
            "missing extension: {file_name}"
        )));
    }
    Ok(extension.to_string())
}
