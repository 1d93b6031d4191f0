//! Application state shared across handlers.

use depot_core::config::AppConfig;
use depot_maven::{CachingProxy, HttpRemote, MavenError, Publisher, RemoteSource};
use depot_storage::ObjectStore;
use std::sync::Arc;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Hosted write path.
    pub publisher: Publisher,
    /// Read-through cache over `remote`.
    pub proxy: CachingProxy,
    /// Origin of a proxy repository; `None` in local mode.
    pub remote: Option<Arc<dyn RemoteSource>>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        remote: Option<Arc<dyn RemoteSource>>,
    ) -> Self {
        if config.repository.is_proxy() && remote.is_none() {
            tracing::warn!("Proxy mode configured without a remote; every miss will be a 404");
        }

        Self {
            publisher: Publisher::new(storage.clone()),
            proxy: CachingProxy::new(storage.clone()),
            config: Arc::new(config),
            storage,
            remote,
        }
    }

    /// Build the state from configuration, creating the HTTP remote in proxy mode.
    pub fn from_config(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
    ) -> Result<Self, MavenError> {
        let remote = HttpRemote::from_config(&config.repository)?
            .map(|remote| Arc::new(remote) as Arc<dyn RemoteSource>);
        Ok(Self::new(config, storage, remote))
    }

    /// Whether reads go through the caching proxy.
    pub fn is_proxy(&self) -> bool {
        self.config.repository.is_proxy()
    }
}
