use bytes::Bytes;
use depot_maven::{BodyStream, MavenError, RemoteObject};
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::Duration;

/// Set when the upstream stream owning it is dropped.
#[derive(Clone, Default)]
pub struct DropFlag(Arc<AtomicBool>);

impl DropFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Poll until the flag is set or `timeout` elapses.
    #[allow(dead_code)]
    pub async fn wait(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.is_set() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.is_set()
    }
}

struct Guard(DropFlag);

impl Drop for Guard {
    fn drop(&mut self) {
        (self.0).0.store(true, Ordering::SeqCst);
    }
}

/// An origin body that never ends on its own.
#[allow(dead_code)]
pub fn endless_upstream(flag: DropFlag) -> RemoteObject {
    let body = async_stream::stream! {
        let _guard = Guard(flag);
        loop {
            yield Ok::<_, MavenError>(Bytes::from(vec![b'x'; 1024]));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    RemoteObject {
        body: Box::pin(body),
        size: None,
    }
}

/// An origin body made of `chunks`, optionally failing after them.
#[allow(dead_code)]
pub fn chunked_upstream(chunks: Vec<Bytes>, fail_at_end: bool) -> RemoteObject {
    let size = chunks.iter().map(|c| c.len() as u64).sum();
    let body = async_stream::stream! {
        for chunk in chunks {
            yield Ok(chunk);
            tokio::task::yield_now().await;
        }
        if fail_at_end {
            yield Err(MavenError::Upstream("connection reset by origin".to_string()));
        }
    };
    RemoteObject {
        body: Box::pin(body),
        size: Some(size),
    }
}

/// Drain a body, returning the bytes read before any error.
#[allow(dead_code)]
pub async fn collect_body(mut body: BodyStream) -> (Vec<u8>, Option<MavenError>) {
    let mut out = Vec::new();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(chunk) => out.extend_from_slice(&chunk),
            Err(e) => return (out, Some(e)),
        }
    }
    (out, None)
}
