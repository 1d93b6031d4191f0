//! Checksum algorithms, incremental digests and checksum sets.

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Supported checksum algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl ChecksumAlgorithm {
    /// Every supported algorithm.
    pub const ALL: [ChecksumAlgorithm; 4] = [Self::Md5, Self::Sha1, Self::Sha256, Self::Sha512];

    /// Lowercase name, also used as the sidecar suffix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Name used in `X-Checksum-*` response headers.
    pub fn header_name(&self) -> &'static str {
        match self {
            Self::Md5 => "x-checksum-md5",
            Self::Sha1 => "x-checksum-sha1",
            Self::Sha256 => "x-checksum-sha256",
            Self::Sha512 => "x-checksum-sha512",
        }
    }

    /// Sidecar key holding this algorithm's digest of `artifact_key`.
    pub fn sidecar_key(&self, artifact_key: &str) -> String {
        format!("{artifact_key}.{}", self.as_str())
    }

    /// Recover the algorithm from a sidecar key of `artifact_key`.
    ///
    /// Returns `None` for keys that are not sidecars of that artifact or that
    /// carry an unsupported suffix.
    pub fn from_sidecar_key(artifact_key: &str, key: &str) -> Option<Self> {
        key.strip_prefix(artifact_key)
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(|suffix| suffix.parse().ok())
    }

    /// Start an incremental digest.
    pub fn digester(&self) -> Digester {
        match self {
            Self::Md5 => Digester::Md5(md5::Context::new()),
            Self::Sha1 => Digester::Sha1(Sha1::new()),
            Self::Sha256 => Digester::Sha256(Sha256::new()),
            Self::Sha512 => Digester::Sha512(Sha512::new()),
        }
    }

    /// Digest `data` in one shot, as lowercase hex.
    pub fn compute(&self, data: &[u8]) -> String {
        let mut digester = self.digester();
        digester.update(data);
        digester.finalize_hex()
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(crate::Error::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Incremental digest for one algorithm.
pub enum Digester {
    Md5(md5::Context),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Digester {
    /// Update the digest with data.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(ctx) => ctx.consume(data),
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    /// Finalize and return the digest as lowercase hex.
    pub fn finalize_hex(self) -> String {
        match self {
            Self::Md5(ctx) => hex::encode(ctx.compute().0),
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Digests for several algorithms fed from a single pass over the content.
pub struct MultiDigester(Vec<(ChecksumAlgorithm, Digester)>);

impl MultiDigester {
    pub fn new(algorithms: impl IntoIterator<Item = ChecksumAlgorithm>) -> Self {
        Self(
            algorithms
                .into_iter()
                .map(|alg| (alg, alg.digester()))
                .collect(),
        )
    }

    pub fn update(&mut self, data: &[u8]) {
        for (_, digester) in &mut self.0 {
            digester.update(data);
        }
    }

    pub fn finalize(self) -> ChecksumSet {
        self.0
            .into_iter()
            .map(|(alg, digester)| (alg, digester.finalize_hex()))
            .collect()
    }
}

/// Mapping from algorithm to lowercase hex digest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumSet(BTreeMap<ChecksumAlgorithm, String>);

impl ChecksumSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, algorithm: ChecksumAlgorithm, digest: impl Into<String>) {
        self.0.insert(algorithm, digest.into());
    }

    pub fn get(&self, algorithm: ChecksumAlgorithm) -> Option<&str> {
        self.0.get(&algorithm).map(String::as_str)
    }

    pub fn algorithms(&self) -> impl Iterator<Item = ChecksumAlgorithm> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChecksumAlgorithm, &str)> {
        self.0.iter().map(|(alg, digest)| (*alg, digest.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(ChecksumAlgorithm, String)> for ChecksumSet {
    fn from_iter<T: IntoIterator<Item = (ChecksumAlgorithm, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
