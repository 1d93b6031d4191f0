//! Remote origin for proxy repositories.

use crate::error::{MavenError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::config::RepositoryConfig;
use futures::{Stream, StreamExt};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Method, StatusCode, Url};
use std::pin::Pin;
use tracing::{debug, instrument};

/// A boxed stream of body chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A body fetched from the origin.
pub struct RemoteObject {
    pub body: BodyStream,
    /// Size announced by the origin, if any.
    pub size: Option<u64>,
}

/// Origin a proxy repository mirrors.
#[async_trait]
pub trait RemoteSource: Send + Sync + 'static {
    /// Open a streaming read of `key`. A missing object is [`MavenError::NotFound`].
    async fn fetch(&self, key: &str) -> Result<RemoteObject>;

    /// Size of `key` without transferring the body.
    async fn head(&self, key: &str) -> Result<Option<u64>>;
}

/// [`RemoteSource`] backed by a Maven repository reachable over HTTP.
#[derive(Clone)]
pub struct HttpRemote {
    http: reqwest::Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
}

impl HttpRemote {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    fn with_client(base_url: &str, http: reqwest::Client) -> Result<Self> {
        // A trailing slash keeps the last path segment when joining keys.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| MavenError::Upstream(format!("invalid remote URL {base_url}: {e}")))?;
        Ok(Self {
            http,
            base_url,
            username: None,
            password: None,
        })
    }

    /// Build the remote for a proxy repository; `None` in local mode.
    pub fn from_config(config: &RepositoryConfig) -> Result<Option<Self>> {
        let RepositoryConfig::Proxy {
            remote_url,
            username,
            password,
            ..
        } = config
        else {
            return Ok(None);
        };

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| MavenError::Upstream(format!("failed to build HTTP client: {e}")))?;

        let mut remote = Self::with_client(remote_url, http)?;
        remote.username = username.clone();
        remote.password = password.clone();
        Ok(Some(remote))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, key: &str) -> Result<Url> {
        self.base_url
            .join(key.trim_start_matches('/'))
            .map_err(|e| MavenError::Upstream(format!("invalid remote key {key}: {e}")))
    }

    async fn send(&self, method: Method, key: &str) -> Result<reqwest::Response> {
        let mut request = self.http.request(method, self.url(key)?);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }
        let response = request
            .send()
            .await
            .map_err(|e| MavenError::Upstream(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(MavenError::NotFound(key.to_string())),
            status if !status.is_success() => Err(MavenError::Upstream(format!(
                "origin returned {status} for {key}"
            ))),
            _ => Ok(response),
        }
    }
}

fn announced_size(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

#[async_trait]
impl RemoteSource for HttpRemote {
    #[instrument(skip(self), fields(remote = %self.base_url))]
    async fn fetch(&self, key: &str) -> Result<RemoteObject> {
        let response = self.send(Method::GET, key).await?;
        let size = announced_size(&response);
        debug!(key, ?size, "origin fetch started");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| MavenError::Upstream(e.to_string())));
        Ok(RemoteObject {
            body: Box::pin(body),
            size,
        })
    }

    #[instrument(skip(self), fields(remote = %self.base_url))]
    async fn head(&self, key: &str) -> Result<Option<u64>> {
        let response = self.send(Method::HEAD, key).await?;
        Ok(announced_size(&response))
    }
}
