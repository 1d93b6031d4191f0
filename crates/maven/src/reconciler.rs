//! Rebuilds a package's version-index document from the store.

use crate::checksums::ChecksumEngine;
use crate::error::{MavenError, Result};
use depot_core::{METADATA_FILE_NAME, VersionIndex, staging_key};
use depot_storage::ObjectStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument};

/// Recomputes `maven-metadata.xml` after a version-index upload.
///
/// Concurrent updates of one package are not serialized; the later write
/// wins, and because every run rebuilds from the full listing a subsequent
/// update repairs any version a lost write dropped.
#[derive(Clone)]
pub struct MetadataReconciler {
    store: Arc<dyn ObjectStore>,
    checksums: ChecksumEngine,
}

impl MetadataReconciler {
    pub fn new(store: Arc<dyn ObjectStore>, checksums: ChecksumEngine) -> Self {
        Self { store, checksums }
    }

    /// Rebuild and persist the document at `package_key`, then regenerate its checksums.
    ///
    /// The document must already exist. The version being promoted is read
    /// from the staged copy of the document and is always included.
    #[instrument(skip(self))]
    pub async fn update(&self, package_key: &str) -> Result<VersionIndex> {
        let existing = self.read_index(package_key).await?.ok_or_else(|| {
            MavenError::InvalidMetadata(format!("no version-index document at {package_key}"))
        })?;

        let mut versions = self.list_versions(package_key).await?;

        let staged_key = staging_key(package_key);
        let staged = self.read_index(&staged_key).await?.ok_or_else(|| {
            MavenError::InvalidMetadata(format!("no staged version-index document at {staged_key}"))
        })?;
        versions.insert(staged.published_version()?.to_string());

        let index = existing.reconcile(versions);
        self.store
            .put(package_key, index.to_xml()?.into())
            .await?;
        self.checksums.generate(package_key).await?;

        info!(
            package_key,
            versions = index.versions.len(),
            latest = index.latest.as_deref().unwrap_or(""),
            release = index.release.as_deref().unwrap_or(""),
            "version index reconciled"
        );
        Ok(index)
    }

    /// Version directory names found under the package directory of `package_key`.
    pub async fn list_versions(&self, package_key: &str) -> Result<BTreeSet<String>> {
        let package_dir = package_dir(package_key);
        let keys = self.store.list(&package_dir).await?;

        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(&package_dir))
            .filter_map(|rest| rest.split_once('/'))
            .map(|(first, _)| first)
            .filter(|name| !name.is_empty() && !name.starts_with(METADATA_FILE_NAME))
            .map(str::to_string)
            .collect())
    }

    /// Parse the document at `key`, or `None` when it does not exist.
    pub async fn read_index(&self, key: &str) -> Result<Option<VersionIndex>> {
        match self.store.get(key).await {
            Ok(data) => {
                let xml = String::from_utf8_lossy(&data);
                Ok(Some(VersionIndex::parse(&xml)?))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Directory prefix (with trailing `/`) holding a package's versions.
pub(crate) fn package_dir(package_key: &str) -> String {
    match package_key.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use depot_storage::FilesystemBackend;

    const PACKAGE_KEY: &str = "com/example/lib/maven-metadata.xml";

    fn document(versions: &[&str], release: Option<&str>) -> String {
        let mut index = VersionIndex::new("com.example", "lib");
        index.versions = versions.iter().map(|v| v.to_string()).collect();
        index.release = release.map(str::to_string);
        index.to_xml().unwrap()
    }

    async fn setup() -> (tempfile::TempDir, Arc<dyn ObjectStore>, MetadataReconciler) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> =
            Arc::new(FilesystemBackend::new(dir.path()).await.unwrap());
        let reconciler = MetadataReconciler::new(store.clone(), ChecksumEngine::new(store.clone()));
        (dir, store, reconciler)
    }

    #[tokio::test]
    async fn test_update_unions_listing_and_staged_version() {
        let (_dir, store, reconciler) = setup().await;
        for version in ["0.15", "0.11.1", "0.20.1", "0.18"] {
            store
                .put(
                    &format!("com/example/lib/{version}/lib-{version}.jar"),
                    Bytes::from("x"),
                )
                .await
                .unwrap();
        }
        store
            .put(PACKAGE_KEY, document(&["0.15"], Some("0.15")).into())
            .await
            .unwrap();
        store
            .put(&staging_key(PACKAGE_KEY), document(&[], Some("0.20.2")).into())
            .await
            .unwrap();

        let index = reconciler.update(PACKAGE_KEY).await.unwrap();
        assert_eq!(index.versions.len(), 5);
        assert_eq!(index.latest.as_deref(), Some("0.20.2"));
        assert_eq!(index.release.as_deref(), Some("0.20.2"));
        assert!(index.last_updated.is_some());

        let persisted = VersionIndex::parse(
            &String::from_utf8(store.get(PACKAGE_KEY).await.unwrap().to_vec()).unwrap(),
        )
        .unwrap();
        assert_eq!(persisted.versions, index.versions);
        assert!(store.exists(&format!("{PACKAGE_KEY}.sha512")).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_drops_versions_missing_from_storage() {
        let (_dir, store, reconciler) = setup().await;
        store
            .put("com/example/lib/2.0/lib-2.0.jar", Bytes::from("x"))
            .await
            .unwrap();
        store
            .put(PACKAGE_KEY, document(&["1.0", "1.5", "2.0"], Some("2.0")).into())
            .await
            .unwrap();
        store
            .put(&staging_key(PACKAGE_KEY), document(&[], Some("2.0")).into())
            .await
            .unwrap();

        let index = reconciler.update(PACKAGE_KEY).await.unwrap();
        assert_eq!(index.versions.len(), 1);
        assert!(index.versions.contains("2.0"));
    }

    #[tokio::test]
    async fn test_update_requires_existing_document() {
        let (_dir, store, reconciler) = setup().await;
        store
            .put(&staging_key(PACKAGE_KEY), document(&[], Some("1.0")).into())
            .await
            .unwrap();

        let err = reconciler.update(PACKAGE_KEY).await.unwrap_err();
        assert!(matches!(err, MavenError::InvalidMetadata(_)));
    }

    #[tokio::test]
    async fn test_update_requires_published_tag() {
        let (_dir, store, reconciler) = setup().await;
        store
            .put(PACKAGE_KEY, document(&["1.0"], Some("1.0")).into())
            .await
            .unwrap();
        store
            .put(&staging_key(PACKAGE_KEY), document(&["1.1"], None).into())
            .await
            .unwrap();

        let err = reconciler.update(PACKAGE_KEY).await.unwrap_err();
        assert!(matches!(
            err,
            MavenError::Core(depot_core::Error::InvalidMetadata(_))
        ));
    }

    #[tokio::test]
    async fn test_list_versions_skips_metadata_files() {
        let (_dir, store, reconciler) = setup().await;
        for key in [
            "com/example/lib/1.0/lib-1.0.jar",
            "com/example/lib/1.0/lib-1.0.pom",
            "com/example/lib/1.1-SNAPSHOT/maven-metadata.xml",
            "com/example/lib/maven-metadata.xml",
            "com/example/lib/maven-metadata.xml.sha1",
            "com/example/library/9.9/library-9.9.jar",
        ] {
            store.put(key, Bytes::from("x")).await.unwrap();
        }

        let versions = reconciler.list_versions(PACKAGE_KEY).await.unwrap();
        assert_eq!(
            versions.into_iter().collect::<Vec<_>>(),
            vec!["1.0".to_string(), "1.1-SNAPSHOT".to_string()]
        );
    }
}
