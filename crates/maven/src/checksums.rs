//! Checksum sidecar generation, listing and verification.

use crate::error::Result;
use depot_core::{ChecksumAlgorithm, ChecksumSet, MultiDigester};
use depot_storage::ObjectStore;
use futures::StreamExt;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Maintains `<key>.<algorithm>` sidecars next to stored blobs.
#[derive(Clone)]
pub struct ChecksumEngine {
    store: Arc<dyn ObjectStore>,
}

impl ChecksumEngine {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Compute every supported digest of the blob at `key` and write its sidecars.
    ///
    /// The four algorithms run concurrently; the first failure fails the call.
    #[instrument(skip(self))]
    pub async fn generate(&self, key: &str) -> Result<ChecksumSet> {
        let digests = try_join_all(
            ChecksumAlgorithm::ALL
                .into_iter()
                .map(|algorithm| self.generate_one(key, algorithm)),
        )
        .await?;

        debug!(key, "checksum sidecars written");
        Ok(digests.into_iter().collect())
    }

    async fn generate_one(
        &self,
        key: &str,
        algorithm: ChecksumAlgorithm,
    ) -> Result<(ChecksumAlgorithm, String)> {
        let mut digester = algorithm.digester();
        let mut stream = self.store.get_stream(key).await?;
        while let Some(chunk) = stream.next().await {
            digester.update(&chunk?);
        }
        let digest = digester.finalize_hex();

        self.store
            .put(&algorithm.sidecar_key(key), digest.clone().into())
            .await?;
        Ok((algorithm, digest))
    }

    /// Read the sidecars stored for `key`.
    ///
    /// Sidecars with unsupported suffixes are ignored. Surrounding whitespace
    /// (the trailing newline `sha1sum`-style tools write) is not part of the
    /// digest; the rest is compared exactly by [`Self::verify`].
    #[instrument(skip(self))]
    pub async fn read(&self, key: &str) -> Result<ChecksumSet> {
        let mut set = ChecksumSet::new();
        for candidate in self.store.list(&format!("{key}.")).await? {
            let Some(algorithm) = ChecksumAlgorithm::from_sidecar_key(key, &candidate) else {
                continue;
            };
            let content = self.store.get(&candidate).await?;
            let digest = String::from_utf8_lossy(&content).trim().to_string();
            set.insert(algorithm, digest);
        }
        Ok(set)
    }

    /// Recompute the digests in `expected` over the current content of `key`.
    ///
    /// Returns true only when every digest matches exactly. An empty set is
    /// trivially satisfied.
    #[instrument(skip(self, expected))]
    pub async fn verify(&self, key: &str, expected: &ChecksumSet) -> Result<bool> {
        if expected.is_empty() {
            return Ok(true);
        }

        let mut digester = MultiDigester::new(expected.algorithms());
        let mut stream = self.store.get_stream(key).await?;
        while let Some(chunk) = stream.next().await {
            digester.update(&chunk?);
        }
        let actual = digester.finalize();

        let mut matched = true;
        for (algorithm, digest) in expected.iter() {
            if actual.get(algorithm) != Some(digest) {
                debug!(key, %algorithm, "checksum mismatch");
                matched = false;
            }
        }
        Ok(matched)
    }
}
