//! Server test utilities.

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::Bytes;
use depot_core::config::{AppConfig, RepositoryConfig, StorageConfig};
use depot_server::{AppState, create_router};
use depot_storage::{FilesystemBackend, ObjectStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

/// A response reduced to what the tests look at.
#[allow(dead_code)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[allow(dead_code)]
impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a hosted repository over temporary storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a caching proxy in front of `remote_url`.
    pub async fn proxy(remote_url: &str) -> Self {
        let remote_url = remote_url.to_string();
        Self::with_config(move |config| {
            config.repository = RepositoryConfig::Proxy {
                remote_url,
                connect_timeout_secs: Some(5),
                request_timeout_secs: Some(30),
                username: None,
                password: None,
            };
        })
        .await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let storage_path = temp_dir.path().join("storage");
        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Filesystem { path: storage_path };
        modifier(&mut config);
        config.validate().expect("invalid test configuration");

        let state = AppState::from_config(config, storage).expect("Failed to build state");
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    pub fn storage(&self) -> Arc<dyn ObjectStore> {
        self.state.storage.clone()
    }

    pub async fn request(&self, method: &str, uri: &str, body: Option<Bytes>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(body) = &body {
            builder = builder.header("content-length", body.len());
        }
        let request = builder
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request("GET", uri, None).await
    }

    pub async fn head(&self, uri: &str) -> TestResponse {
        self.request("HEAD", uri, None).await
    }

    pub async fn put(&self, uri: &str, body: impl Into<Bytes>) -> TestResponse {
        self.request("PUT", uri, Some(body.into())).await
    }

    /// Poll the store until `key` exists, for cache fills running in the background.
    pub async fn wait_for_key(&self, key: &str) -> bool {
        for _ in 0..100 {
            if self.state.storage.exists(key).await.unwrap() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}
