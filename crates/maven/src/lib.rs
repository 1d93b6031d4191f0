//! Repository engines for depot.
//!
//! - [`ChecksumEngine`]: checksum sidecars for stored blobs
//! - [`MetadataReconciler`]: full rebuilds of a package's version index
//! - [`UploadValidator`]: checksum validation of an uploaded version
//! - [`Publisher`]: the hosted write path tying the three together
//! - [`CachingProxy`]: read-through cache over a [`RemoteSource`]

pub mod checksums;
pub mod error;
pub mod proxy;
pub mod publish;
pub mod reconciler;
pub mod remote;
pub mod validator;

pub use checksums::ChecksumEngine;
pub use error::{MavenError, Result};
pub use proxy::{CacheFill, CacheOutcome, CachingProxy, Loaded};
pub use publish::{PublishOutcome, Publisher, PutKind};
pub use reconciler::MetadataReconciler;
pub use remote::{BodyStream, HttpRemote, RemoteObject, RemoteSource};
pub use validator::UploadValidator;
