//! Repository request dispatch.
//!
//! Every path outside the fixed API routes is a repository key. `GET` and
//! `HEAD` read it from the local store or, in proxy mode, through the caching
//! proxy. `PUT` stores it, with artifacts checksummed and package-level
//! version indexes validated and reconciled.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use depot_core::{ArtifactCoordinates, ChecksumAlgorithm, ChecksumSet};
use depot_core::{is_artifact_key, is_routed_artifact_key};
use depot_maven::{CacheFill, CacheOutcome, MavenError, PublishOutcome, PutKind};
use futures::StreamExt;
use tracing::{debug, info, warn};

/// Fallback handler for repository paths.
pub async fn dispatch(State(state): State<AppState>, req: Request) -> ApiResult<Response> {
    let method = req.method().clone();
    let _timer = metrics::REQUEST_DURATION
        .with_label_values(&[method.as_str()])
        .start_timer();

    if !matches!(method, Method::GET | Method::HEAD | Method::PUT) {
        return Err(ApiError::MethodNotAllowed(method.to_string()));
    }

    let key = repository_key(req.uri().path())?;
    match method {
        Method::PUT => put(&state, &key, req).await,
        Method::HEAD => get(&state, &key, true).await,
        _ => get(&state, &key, false).await,
    }
}

/// Turn a request path into a store key.
///
/// Dot-prefixed top-level directories are internal (the staging area) and
/// artifact paths must carry valid coordinates.
fn repository_key(path: &str) -> ApiResult<String> {
    let key = path.trim_start_matches('/');
    if key.is_empty() || key.ends_with('/') {
        return Err(ApiError::NotFound(path.to_string()));
    }
    if key.starts_with('.') {
        return Err(ApiError::InvalidPath(format!("reserved path: {path}")));
    }
    if key.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(ApiError::InvalidPath(format!("relative segment in {path}")));
    }
    if is_artifact_key(key) {
        ArtifactCoordinates::parse(key)?;
    }
    Ok(key.to_string())
}

async fn get(state: &AppState, key: &str, head_only: bool) -> ApiResult<Response> {
    if state.is_proxy() {
        proxy_get(state, key, head_only).await
    } else {
        local_get(state, key, head_only).await
    }
}

async fn local_get(state: &AppState, key: &str, head_only: bool) -> ApiResult<Response> {
    let meta = match state.storage.head(key).await {
        Ok(meta) => meta,
        Err(e) if e.is_not_found() => return Err(ApiError::NotFound(key.to_string())),
        Err(e) => return Err(e.into()),
    };

    let mut headers = content_headers(key)?;
    headers.insert(CONTENT_LENGTH, HeaderValue::from(meta.size));
    if is_routed_artifact_key(key) {
        let checksums = state.publisher.checksums().read(key).await?;
        insert_checksums(&mut headers, &checksums);
    }

    if head_only {
        return Ok((StatusCode::OK, headers).into_response());
    }

    let stream = match state.storage.get_stream(key).await {
        Ok(stream) => stream,
        // Deleted between head and open.
        Err(e) if e.is_not_found() => return Err(ApiError::NotFound(key.to_string())),
        Err(e) => return Err(e.into()),
    };
    Ok((StatusCode::OK, headers, Body::from_stream(stream)).into_response())
}

async fn proxy_get(state: &AppState, key: &str, head_only: bool) -> ApiResult<Response> {
    let remote = state
        .remote
        .as_ref()
        .ok_or_else(|| ApiError::NotFound(key.to_string()))?;
    let mut headers = content_headers(key)?;

    if head_only {
        let (hit, size) = state
            .proxy
            .stat(key, || remote.head(key))
            .await
            .map_err(|e| engine_error(e, key))?;
        debug!(key, hit, ?size, "proxy head");
        if hit && is_routed_artifact_key(key) {
            let checksums = state.publisher.checksums().read(key).await?;
            insert_checksums(&mut headers, &checksums);
        }
        if let Some(size) = size {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
        }
        return Ok((StatusCode::OK, headers).into_response());
    }

    let loaded = state
        .proxy
        .load(key, || remote.fetch(key))
        .await
        .map_err(|e| engine_error(e, key))?;

    if loaded.hit {
        metrics::PROXY_HITS.inc();
        if is_routed_artifact_key(key) {
            let checksums = state.publisher.checksums().read(key).await?;
            insert_checksums(&mut headers, &checksums);
        }
    } else {
        metrics::PROXY_MISSES.inc();
    }

    if let Some(size) = loaded.size {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
    }
    if let Some(fill) = loaded.cache_fill {
        tokio::spawn(record_fill(fill));
    }

    Ok((StatusCode::OK, headers, Body::from_stream(loaded.body)).into_response())
}

async fn record_fill(fill: CacheFill) {
    let key = fill.key().to_string();
    match fill.wait().await {
        CacheOutcome::Committed { bytes } => {
            debug!(key = %key, bytes, "cache fill committed");
            metrics::record_cache_fill("committed");
        }
        CacheOutcome::Aborted => {
            warn!(key = %key, "cache fill aborted");
            metrics::record_cache_fill("aborted");
        }
    }
}

async fn put(state: &AppState, key: &str, req: Request) -> ApiResult<Response> {
    if state.is_proxy() {
        return Err(ApiError::MethodNotAllowed(
            "PUT on a proxy repository".to_string(),
        ));
    }

    let limit = state.config.server.max_upload_bytes;
    if declared_length(req.headers()).is_some_and(|length| length > limit) {
        return Err(ApiError::PayloadTooLarge { limit });
    }

    let body = req.into_body().into_data_stream().inspect(|chunk| {
        if let Ok(chunk) = chunk {
            metrics::BYTES_UPLOADED.inc_by(chunk.len() as u64);
        }
    });
    let publisher = &state.publisher;

    match PutKind::classify(key) {
        PutKind::Artifact => {
            let checksums = publisher.publish_artifact(key, body, limit).await?;
            metrics::ARTIFACTS_UPLOADED.inc();

            let mut headers = HeaderMap::new();
            insert_checksums(&mut headers, &checksums);
            Ok((StatusCode::CREATED, headers).into_response())
        }
        PutKind::PackageMetadata => match publisher.publish_metadata(key, body, limit).await? {
            PublishOutcome::Accepted(index) => {
                metrics::RECONCILIATIONS.inc();
                info!(
                    key,
                    versions = index.versions.len(),
                    latest = ?index.latest,
                    "version index published"
                );
                Ok(StatusCode::CREATED.into_response())
            }
            PublishOutcome::Rejected {
                version_dir,
                removed,
            } => {
                metrics::UPLOADS_REJECTED.inc();
                let message = match version_dir {
                    Some(dir) => format!("checksum validation failed for {dir}, removed {removed} files"),
                    None => format!("uploaded version could not be resolved, removed {removed} files"),
                };
                Err(ApiError::ValidationFailed(message))
            }
        },
        PutKind::File => {
            publisher.publish_file(key, body, limit).await?;
            Ok(StatusCode::CREATED.into_response())
        }
    }
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

/// Engine errors for a key that does not exist locally or upstream become 404.
fn engine_error(err: MavenError, key: &str) -> ApiError {
    if err.is_not_found() {
        ApiError::NotFound(key.to_string())
    } else {
        err.into()
    }
}

fn content_headers(key: &str) -> ApiResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type(key)));

    if is_routed_artifact_key(key) {
        let name = file_name(key);
        let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{name}\""))
            .map_err(|_| ApiError::InvalidPath(format!("unrepresentable file name: {name}")))?;
        headers.insert(CONTENT_DISPOSITION, disposition);
    }
    Ok(headers)
}

/// One `X-Checksum-*` header per digest, plus the sha1 digest as `ETag`.
fn insert_checksums(headers: &mut HeaderMap, checksums: &ChecksumSet) {
    for (algorithm, digest) in checksums.iter() {
        let Ok(value) = HeaderValue::from_str(digest) else {
            warn!(%algorithm, "skipping checksum that is not a valid header value");
            continue;
        };
        if algorithm == ChecksumAlgorithm::Sha1 {
            headers.insert(ETAG, value.clone());
        }
        headers.insert(HeaderName::from_static(algorithm.header_name()), value);
    }
}

fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

fn content_type(key: &str) -> &'static str {
    let extension = file_name(key)
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or_default();
    match extension {
        "jar" | "war" | "ear" | "rar" => "application/java-archive",
        "pom" => "application/x-maven-pom+xml",
        "xml" => "application/xml",
        "aar" | "zip" => "application/zip",
        "json" | "module" => "application/json",
        "gz" | "tgz" => "application/gzip",
        "md5" | "sha1" | "sha256" | "sha512" | "asc" | "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_key() {
        assert_eq!(
            repository_key("/com/example/lib/1.0/lib-1.0.jar").unwrap(),
            "com/example/lib/1.0/lib-1.0.jar"
        );
        assert_eq!(
            repository_key("/com/example/lib/maven-metadata.xml").unwrap(),
            "com/example/lib/maven-metadata.xml"
        );
        assert!(matches!(
            repository_key("/.upload/com/example/lib/maven-metadata.xml"),
            Err(ApiError::InvalidPath(_))
        ));
        assert!(matches!(
            repository_key("/com/../etc/passwd"),
            Err(ApiError::InvalidPath(_))
        ));
        assert!(matches!(
            repository_key("/lib-1.0.jar"),
            Err(ApiError::InvalidPath(_))
        ));
        assert!(matches!(repository_key("/"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("a/b/1.0/b-1.0.jar"), "application/java-archive");
        assert_eq!(content_type("a/b/1.0/b-1.0.pom"), "application/x-maven-pom+xml");
        assert_eq!(content_type("a/b/maven-metadata.xml"), "application/xml");
        assert_eq!(content_type("a/b/1.0/b-1.0.jar.sha1"), "text/plain");
        assert_eq!(content_type("a/b/1.0/README"), "application/octet-stream");
    }

    #[test]
    fn test_checksum_headers() {
        let checksums: ChecksumSet = [
            (ChecksumAlgorithm::Md5, "abc".to_string()),
            (ChecksumAlgorithm::Sha1, "def".to_string()),
        ]
        .into_iter()
        .collect();

        let mut headers = HeaderMap::new();
        insert_checksums(&mut headers, &checksums);
        assert_eq!(headers.get("x-checksum-md5").unwrap(), "abc");
        assert_eq!(headers.get("x-checksum-sha1").unwrap(), "def");
        assert_eq!(headers.get(ETAG).unwrap(), "def");
        assert!(headers.get("x-checksum-sha256").is_none());
    }
}
