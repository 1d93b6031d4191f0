//! Checksum validation of a version before its metadata is published.

use crate::checksums::ChecksumEngine;
use crate::error::{MavenError, Result};
use crate::reconciler::{MetadataReconciler, package_dir};
use depot_core::is_artifact_key;
use depot_core::version::is_valid_version_dir;
use depot_storage::ObjectStore;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Decides whether the artifacts of an uploaded version are intact.
#[derive(Clone)]
pub struct UploadValidator {
    store: Arc<dyn ObjectStore>,
    checksums: ChecksumEngine,
    reconciler: MetadataReconciler,
}

impl UploadValidator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        checksums: ChecksumEngine,
        reconciler: MetadataReconciler,
    ) -> Self {
        Self {
            store,
            checksums,
            reconciler,
        }
    }

    /// Version named by the staged document, falling back to the target document.
    pub async fn resolve_version(&self, staging_key: &str, target_key: &str) -> Result<String> {
        for key in [staging_key, target_key] {
            if let Some(index) = self.reconciler.read_index(key).await? {
                let version = index.published_version()?;
                if !is_valid_version_dir(version) {
                    return Err(MavenError::InvalidMetadata(format!(
                        "version {version:?} in {key} does not name a version directory"
                    )));
                }
                return Ok(version.to_string());
            }
        }
        Err(MavenError::InvalidMetadata(format!(
            "no version-index document at {staging_key} or {target_key}"
        )))
    }

    /// Directory prefix (with trailing `/`) of the version under validation.
    pub async fn version_dir(&self, staging_key: &str, target_key: &str) -> Result<String> {
        let version = self.resolve_version(staging_key, target_key).await?;
        Ok(format!("{}{version}/", package_dir(target_key)))
    }

    /// Artifact keys directly inside `version_dir`.
    pub async fn list_artifacts(&self, version_dir: &str) -> Result<Vec<String>> {
        Ok(self
            .store
            .list(version_dir)
            .await?
            .into_iter()
            .filter(|key| {
                key.strip_prefix(version_dir)
                    .is_some_and(|name| !name.contains('/'))
                    && is_artifact_key(key)
            })
            .collect())
    }

    /// Whether every artifact of the version under validation matches its sidecars.
    ///
    /// Storage failures and missing metadata count as a failed validation.
    #[instrument(skip(self))]
    pub async fn validate(&self, staging_key: &str, target_key: &str) -> bool {
        match self.check(staging_key, target_key).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!(error = %e, "upload validation failed");
                false
            }
        }
    }

    async fn check(&self, staging_key: &str, target_key: &str) -> Result<bool> {
        let version_dir = self.version_dir(staging_key, target_key).await?;
        let artifacts = self.list_artifacts(&version_dir).await?;
        if artifacts.is_empty() {
            warn!(%version_dir, "no verifiable artifacts found");
            return Ok(false);
        }

        let mut valid = true;
        for artifact in &artifacts {
            let expected = self.checksums.read(artifact).await?;
            if expected.is_empty() {
                warn!(%artifact, "artifact has no checksum sidecars");
                valid = false;
                continue;
            }
            if !self.checksums.verify(artifact, &expected).await? {
                warn!(%artifact, "checksum verification failed");
                valid = false;
            }
        }

        debug!(%version_dir, artifacts = artifacts.len(), valid, "validation finished");
        Ok(valid)
    }
}
