//! Core domain types and shared logic for the depot Maven repository.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Artifact coordinates parsed from repository keys
//! - Version ordering and `latest`/`release` selection
//! - The version-index document (`maven-metadata.xml`)
//! - Checksum algorithms and digests
//! - Configuration

pub mod checksum;
pub mod config;
pub mod coordinates;
pub mod error;
pub mod metadata;
pub mod version;

pub use checksum::{ChecksumAlgorithm, ChecksumSet, Digester, MultiDigester};
pub use coordinates::ArtifactCoordinates;
pub use error::{Error, Result};
pub use metadata::VersionIndex;

/// File name of a package's version-index document.
pub const METADATA_FILE_NAME: &str = "maven-metadata.xml";

/// Extensions of files that are verified as artifacts during upload validation.
pub const ARTIFACT_EXTENSIONS: [&str; 6] = ["pom", "jar", "war", "ear", "rar", "aar"];

/// Extensions routed as artifacts by the HTTP layer.
pub const ROUTED_EXTENSIONS: [&str; 7] = ["pom", "jar", "war", "ear", "rar", "aar", "xml"];

/// Top-level prefix of the staging area for version-index uploads.
pub const STAGING_PREFIX: &str = ".upload";

/// Whether `key` names a verifiable artifact.
pub fn is_artifact_key(key: &str) -> bool {
    has_extension(key, &ARTIFACT_EXTENSIONS)
}

/// Whether `key` matches the routed artifact pattern `.*\.(pom|jar|war|ear|rar|aar|xml)$`.
pub fn is_routed_artifact_key(key: &str) -> bool {
    has_extension(key, &ROUTED_EXTENSIONS)
}

/// Whether `key` names a version-index document.
pub fn is_metadata_key(key: &str) -> bool {
    key.rsplit('/').next() == Some(METADATA_FILE_NAME)
}

/// Whether `key` names a package-level version-index document.
///
/// The document must sit below at least a group and an artifact directory,
/// as in `group/artifact/maven-metadata.xml`.
pub fn is_package_metadata_key(key: &str) -> bool {
    let segments: Vec<&str> = key.trim_start_matches('/').split('/').collect();
    is_metadata_key(key)
        && segments.len() >= 3
        && segments[..segments.len() - 1]
            .iter()
            .all(|segment| !segment.trim().is_empty())
}

/// Staging key for a version-index document key.
pub fn staging_key(key: &str) -> String {
    format!("{STAGING_PREFIX}/{}", key.trim_start_matches('/'))
}

fn has_extension(key: &str, extensions: &[&str]) -> bool {
    let name = key.rsplit('/').next().unwrap_or(key);
    name.rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && extensions.contains(&ext))
}
