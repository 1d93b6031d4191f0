//! Write path of a hosted repository.

use crate::checksums::ChecksumEngine;
use crate::error::{MavenError, Result};
use crate::reconciler::MetadataReconciler;
use crate::validator::UploadValidator;
use bytes::Bytes;
use depot_core::version::is_snapshot;
use depot_core::{
    ChecksumSet, VersionIndex, is_metadata_key, is_package_metadata_key, is_routed_artifact_key,
    staging_key,
};
use depot_storage::ObjectStore;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::pin::pin;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// What a `PUT` of a key does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutKind {
    /// Stored, then checksummed.
    Artifact,
    /// Staged, validated and reconciled into the package's version index.
    PackageMetadata,
    /// Stored as sent.
    File,
}

impl PutKind {
    pub fn classify(key: &str) -> Self {
        if is_metadata_key(key) {
            // Snapshot-level documents live inside a version directory.
            let parent = key
                .rsplit('/')
                .nth(1)
                .unwrap_or_default();
            if is_snapshot(parent) {
                Self::File
            } else {
                Self::PackageMetadata
            }
        } else if is_routed_artifact_key(key) {
            Self::Artifact
        } else {
            Self::File
        }
    }
}

/// Result of publishing a version-index document.
#[derive(Debug)]
pub enum PublishOutcome {
    /// The index was rebuilt and persisted.
    Accepted(VersionIndex),
    /// Validation failed; the staged document and the version's files were removed.
    Rejected {
        version_dir: Option<String>,
        removed: usize,
    },
}

/// Stores uploads and keeps version indexes and sidecars consistent with them.
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    checksums: ChecksumEngine,
    reconciler: MetadataReconciler,
    validator: UploadValidator,
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        let checksums = ChecksumEngine::new(store.clone());
        let reconciler = MetadataReconciler::new(store.clone(), checksums.clone());
        let validator = UploadValidator::new(store.clone(), checksums.clone(), reconciler.clone());
        Self {
            store,
            checksums,
            reconciler,
            validator,
        }
    }

    pub fn checksums(&self) -> &ChecksumEngine {
        &self.checksums
    }

    pub fn reconciler(&self) -> &MetadataReconciler {
        &self.reconciler
    }

    pub fn validator(&self) -> &UploadValidator {
        &self.validator
    }

    /// Stream `body` to `key`, committing only a complete body of at most `limit` bytes.
    pub async fn write_body<S, E>(&self, key: &str, body: S, limit: u64) -> Result<u64>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send,
        E: Display,
    {
        let mut body = pin!(body);
        let mut upload = self.store.put_stream(key).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let message = e.to_string();
                    let _ = upload.abort().await;
                    return Err(MavenError::Transfer(message));
                }
            };
            written += chunk.len() as u64;
            if written > limit {
                let _ = upload.abort().await;
                return Err(MavenError::TooLarge { limit });
            }
            if let Err(e) = upload.write(chunk).await {
                let _ = upload.abort().await;
                return Err(e.into());
            }
        }

        Ok(upload.finish().await?)
    }

    /// Store an artifact and generate its checksum sidecars.
    #[instrument(skip(self, body))]
    pub async fn publish_artifact<S, E>(&self, key: &str, body: S, limit: u64) -> Result<ChecksumSet>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send,
        E: Display,
    {
        let bytes = self.write_body(key, body, limit).await?;
        let checksums = self.checksums.generate(key).await?;
        info!(key, bytes, "artifact stored");
        Ok(checksums)
    }

    /// Store a file as sent.
    #[instrument(skip(self, body))]
    pub async fn publish_file<S, E>(&self, key: &str, body: S, limit: u64) -> Result<u64>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send,
        E: Display,
    {
        self.write_body(key, body, limit).await
    }

    /// Stage a version-index document, validate the version it names and reconcile.
    ///
    /// On success the target document is seeded from the staged copy when it
    /// does not exist yet. The staged copy is removed in every case.
    #[instrument(skip(self, body))]
    pub async fn publish_metadata<S, E>(
        &self,
        target_key: &str,
        body: S,
        limit: u64,
    ) -> Result<PublishOutcome>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send,
        E: Display,
    {
        if !is_package_metadata_key(target_key) {
            return Err(depot_core::Error::InvalidPath(format!(
                "version index must sit below a group and an artifact: {target_key}"
            ))
            .into());
        }

        let staged = staging_key(target_key);
        self.write_body(&staged, body, limit).await?;

        if !self.validator.validate(&staged, target_key).await {
            let (version_dir, removed) = self.discard(&staged, target_key).await;
            warn!(target_key, ?version_dir, removed, "upload rejected");
            return Ok(PublishOutcome::Rejected {
                version_dir,
                removed,
            });
        }

        let result = self.promote(&staged, target_key).await;
        self.remove_quietly(&staged).await;
        Ok(PublishOutcome::Accepted(result?))
    }

    async fn promote(&self, staged: &str, target_key: &str) -> Result<VersionIndex> {
        if !self.store.exists(target_key).await? {
            self.store.copy(staged, target_key).await?;
        }
        self.reconciler.update(target_key).await
    }

    /// Remove the staged document and every file of the version it names.
    async fn discard(&self, staged: &str, target_key: &str) -> (Option<String>, usize) {
        let version_dir = self.validator.version_dir(staged, target_key).await.ok();
        let mut removed = 0;

        if let Some(dir) = &version_dir {
            match self.store.list(dir).await {
                Ok(keys) if holds_nested_entries(dir, &keys) => {
                    // A version directory is a leaf; anything deeper is another package.
                    warn!(version_dir = %dir, "rejected version is not a leaf directory, keeping its files");
                }
                Ok(keys) => {
                    for key in keys {
                        if self.remove_quietly(&key).await {
                            removed += 1;
                        }
                    }
                }
                Err(e) => warn!(version_dir = %dir, error = %e, "could not list rejected version"),
            }
        }

        if self.remove_quietly(staged).await {
            removed += 1;
        }
        (version_dir, removed)
    }

    async fn remove_quietly(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(()) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                warn!(key, error = %e, "failed to remove object");
                false
            }
        }
    }
}

fn holds_nested_entries(dir: &str, keys: &[String]) -> bool {
    keys.iter().any(|key| {
        key.strip_prefix(dir)
            .is_some_and(|name| name.contains('/'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_classify() {
        assert_eq!(
            PutKind::classify("com/example/lib/1.0/lib-1.0.jar"),
            PutKind::Artifact
        );
        assert_eq!(
            PutKind::classify("com/example/lib/maven-metadata.xml"),
            PutKind::PackageMetadata
        );
        assert_eq!(
            PutKind::classify("com/example/lib/1.0-SNAPSHOT/maven-metadata.xml"),
            PutKind::File
        );
        assert_eq!(
            PutKind::classify("com/example/lib/1.0/lib-1.0.jar.sha1"),
            PutKind::File
        );
        assert_eq!(
            PutKind::classify("com/example/lib/maven-metadata.xml.md5"),
            PutKind::File
        );
    }

    #[tokio::test]
    async fn test_write_body_enforces_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(
            depot_storage::FilesystemBackend::new(dir.path())
                .await
                .unwrap(),
        );
        let publisher = Publisher::new(store.clone());

        let body = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from("12345")),
            Ok(Bytes::from("67890")),
        ]);
        let err = publisher.write_body("big", body, 8).await.unwrap_err();
        assert!(matches!(err, MavenError::TooLarge { limit: 8 }));
        assert!(!store.exists("big").await.unwrap());

        let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from("12345"))]);
        assert_eq!(publisher.write_body("small", body, 8).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_write_body_aborts_on_transfer_error() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(
            depot_storage::FilesystemBackend::new(dir.path())
                .await
                .unwrap(),
        );
        let publisher = Publisher::new(store.clone());

        let body = stream::iter(vec![
            Ok(Bytes::from("partial")),
            Err(std::io::Error::other("client hung up")),
        ]);
        let err = publisher.write_body("k", body, 1024).await.unwrap_err();
        assert!(matches!(err, MavenError::Transfer(_)));
        assert!(!store.exists("k").await.unwrap());
    }
}
