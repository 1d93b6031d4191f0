pub mod stores;
pub mod upstream;

use depot_storage::{FilesystemBackend, ObjectStore};
use std::net::TcpListener;
use std::sync::Arc;
use tempfile::TempDir;

#[allow(unused_imports)]
pub use stores::GatedStore;
#[allow(unused_imports)]
pub use upstream::{DropFlag, chunked_upstream, collect_body, endless_upstream};

/// A filesystem store rooted in a fresh temp directory.
#[allow(dead_code)]
pub async fn temp_store() -> (TempDir, Arc<dyn ObjectStore>) {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(FilesystemBackend::new(dir.path()).await.unwrap());
    (dir, store)
}

#[allow(dead_code)]
pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}
