//! Read-through cache in front of a remote origin.
//!
//! On a miss the origin body is teed: one producer task reads upstream and
//! forwards every chunk both to the caller (bounded channel) and to a cache
//! writer task (unbounded channel), so a slow cache never delays the caller.
//! The cache write is committed only after upstream reports end of stream.
//! Dropping the caller's stream cancels the producer, which drops the
//! upstream body and leaves the cache write uncommitted.

use crate::error::{MavenError, Result};
use crate::remote::{BodyStream, RemoteObject};
use bytes::Bytes;
use depot_storage::ObjectStore;
use futures::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Chunks buffered between the producer and the caller.
const DEFAULT_CALLER_BUFFER: usize = 16;

/// Result of [`CachingProxy::load`].
pub struct Loaded {
    /// Whether the body came from the cache.
    pub hit: bool,
    pub body: BodyStream,
    /// Body size, when known up front.
    pub size: Option<u64>,
    /// Cache branch of the tee; `None` on a hit.
    pub cache_fill: Option<CacheFill>,
}

/// How a cache fill ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheOutcome {
    /// The full body was written and published at the key.
    Committed { bytes: u64 },
    /// Nothing was published.
    Aborted,
}

/// Handle on the cache writer of one miss.
pub struct CacheFill {
    key: String,
    handle: JoinHandle<CacheOutcome>,
}

impl CacheFill {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait for the cache writer to finish.
    pub async fn wait(self) -> CacheOutcome {
        self.handle.await.unwrap_or(CacheOutcome::Aborted)
    }
}

enum CacheMsg {
    Chunk(Bytes),
    Commit,
}

/// Serves keys from the cache store, filling it from the origin on a miss.
///
/// Concurrent misses for one key each fetch from the origin independently.
#[derive(Clone)]
pub struct CachingProxy {
    cache: Arc<dyn ObjectStore>,
    caller_buffer: usize,
}

impl CachingProxy {
    pub fn new(cache: Arc<dyn ObjectStore>) -> Self {
        Self {
            cache,
            caller_buffer: DEFAULT_CALLER_BUFFER,
        }
    }

    /// Set how many chunks may queue for the caller before the producer waits.
    pub fn with_caller_buffer(mut self, chunks: usize) -> Self {
        self.caller_buffer = chunks.max(1);
        self
    }

    /// Serve `key` from cache, or from `remote_fetch` while caching it.
    ///
    /// `remote_fetch` is only invoked on a miss.
    #[instrument(skip(self, remote_fetch))]
    pub async fn load<F, Fut>(&self, key: &str, remote_fetch: F) -> Result<Loaded>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RemoteObject>>,
    {
        if self.cache.exists(key).await? {
            let size = self.cache.size(key).await?;
            let body = self
                .cache
                .get_stream(key)
                .await?
                .map(|chunk| chunk.map_err(MavenError::from));
            debug!(key, size, "cache hit");
            return Ok(Loaded {
                hit: true,
                body: Box::pin(body),
                size: Some(size),
                cache_fill: None,
            });
        }

        debug!(key, "cache miss");
        let remote = remote_fetch().await?;
        let (body, cache_fill) = self.tee(key, remote.body);
        Ok(Loaded {
            hit: false,
            body,
            size: remote.size,
            cache_fill: Some(cache_fill),
        })
    }

    /// Size of `key`, asking `remote_head` only when it is not cached.
    ///
    /// Returns whether the size came from the cache.
    pub async fn stat<F, Fut>(&self, key: &str, remote_head: F) -> Result<(bool, Option<u64>)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<u64>>>,
    {
        if self.cache.exists(key).await? {
            return Ok((true, Some(self.cache.size(key).await?)));
        }
        Ok((false, remote_head().await?))
    }

    fn tee(&self, key: &str, upstream: BodyStream) -> (BodyStream, CacheFill) {
        let cancel = CancellationToken::new();
        let (caller_tx, caller_rx) = mpsc::channel(self.caller_buffer);
        let (cache_tx, cache_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(fill_cache(self.cache.clone(), key.to_string(), cache_rx));
        tokio::spawn(pump(
            key.to_string(),
            upstream,
            caller_tx,
            cache_tx,
            cancel.clone(),
        ));

        let body = TeeStream {
            rx: caller_rx,
            cancel,
        };
        (
            Box::pin(body),
            CacheFill {
                key: key.to_string(),
                handle,
            },
        )
    }
}

/// Producer half of the tee.
async fn pump(
    key: String,
    mut upstream: BodyStream,
    caller_tx: mpsc::Sender<Result<Bytes>>,
    cache_tx: mpsc::UnboundedSender<CacheMsg>,
    cancel: CancellationToken,
) {
    let mut forwarded: u64 = 0;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(%key, forwarded, "caller cancelled, dropping upstream");
                break;
            }
            next = upstream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                forwarded += chunk.len() as u64;
                // The writer may have given up already; the caller still gets the bytes.
                let _ = cache_tx.send(CacheMsg::Chunk(chunk.clone()));
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => false,
                    sent = caller_tx.send(Ok(chunk)) => sent.is_ok(),
                };
                if !sent {
                    debug!(%key, forwarded, "caller went away, dropping upstream");
                    break;
                }
            }
            Some(Err(e)) => {
                warn!(%key, forwarded, error = %e, "upstream failed mid-stream");
                let _ = caller_tx.send(Err(e)).await;
                break;
            }
            None => {
                let _ = cache_tx.send(CacheMsg::Commit);
                break;
            }
        }
    }

    // Upstream goes first so the origin sees the cancel before anyone else.
    drop(upstream);
    drop(cache_tx);
    drop(caller_tx);
}

/// Consumer half of the tee that persists the body.
async fn fill_cache(
    cache: Arc<dyn ObjectStore>,
    key: String,
    mut rx: mpsc::UnboundedReceiver<CacheMsg>,
) -> CacheOutcome {
    let mut upload = match cache.put_stream(&key).await {
        Ok(upload) => upload,
        Err(e) => {
            warn!(%key, error = %e, "could not open cache write");
            return CacheOutcome::Aborted;
        }
    };

    while let Some(msg) = rx.recv().await {
        match msg {
            CacheMsg::Chunk(chunk) => {
                if let Err(e) = upload.write(chunk).await {
                    warn!(%key, error = %e, "cache write failed");
                    let _ = upload.abort().await;
                    return CacheOutcome::Aborted;
                }
            }
            CacheMsg::Commit => {
                return match upload.finish().await {
                    Ok(bytes) => {
                        debug!(%key, bytes, "cache fill committed");
                        CacheOutcome::Committed { bytes }
                    }
                    Err(e) => {
                        warn!(%key, error = %e, "cache commit failed");
                        CacheOutcome::Aborted
                    }
                };
            }
        }
    }

    debug!(%key, "cache fill abandoned");
    let _ = upload.abort().await;
    CacheOutcome::Aborted
}

/// Caller half of the tee. Dropping it cancels the producer.
struct TeeStream {
    rx: mpsc::Receiver<Result<Bytes>>,
    cancel: CancellationToken,
}

impl Stream for TeeStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for TeeStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
