use async_trait::async_trait;
use bytes::Bytes;
use depot_storage::{
    ByteStream, ObjectMeta, ObjectStore, StorageError, StorageResult, StreamingUpload,
};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Store whose streaming writes wait on a gate, or fail outright.
///
/// Everything else is delegated to the wrapped store.
pub struct GatedStore {
    inner: Arc<dyn ObjectStore>,
    gate: Arc<Semaphore>,
    fail_writes: bool,
}

#[allow(dead_code)]
impl GatedStore {
    /// Streaming writes block until [`GatedStore::open`] is called.
    pub fn closed(inner: Arc<dyn ObjectStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            gate: Arc::new(Semaphore::new(0)),
            fail_writes: false,
        })
    }

    /// Streaming writes fail on the first chunk.
    pub fn failing(inner: Arc<dyn ObjectStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            gate: Arc::new(Semaphore::new(Semaphore::MAX_PERMITS)),
            fail_writes: true,
        })
    }

    pub fn open(&self) {
        self.gate.add_permits(1 << 20);
    }
}

#[async_trait]
impl ObjectStore for GatedStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        self.inner.get_stream(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner.put(key, data).await
    }

    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        let inner = self.inner.put_stream(key).await?;
        Ok(Box::new(GatedUpload {
            inner,
            gate: self.gate.clone(),
            fail_writes: self.fail_writes,
        }))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        self.inner.copy(from, to).await
    }

    fn backend_name(&self) -> &'static str {
        "gated"
    }
}

struct GatedUpload {
    inner: Box<dyn StreamingUpload>,
    gate: Arc<Semaphore>,
    fail_writes: bool,
}

#[async_trait]
impl StreamingUpload for GatedUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        if self.fail_writes {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e.to_string())))?;
        self.inner.write(data).await
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        self.inner.finish().await
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.inner.abort().await
    }
}
