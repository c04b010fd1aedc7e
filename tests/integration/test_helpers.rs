//! Shared helpers for integration tests.
//!
//! Servers bind `127.0.0.1:0` so tests never collide on a port. Every
//! spawned server stops when its guard is dropped.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use workboard::cache::LocalCache;
use workboard::server::{serve_listener, ServerStore};
use workboard::sync::{ConnectivityProber, SyncClient};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Companion server on an ephemeral port over a temporary data directory.
pub struct TestServer {
    pub base_url: String,
    pub store: Arc<ServerStore>,
    ct: CancellationToken,
    _dir: TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}

pub async fn spawn_server() -> TestServer {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(ServerStore::open(dir.path()).expect("open store"));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let base_url = format!("http://{}", listener.local_addr().expect("addr"));

    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    let server_store = Arc::clone(&store);
    tokio::spawn(async move {
        let _ = serve_listener(listener, server_store, server_ct).await;
    });

    TestServer {
        base_url,
        store,
        ct,
        _dir: dir,
    }
}

/// Stand-in remote authority built from an arbitrary router.
pub struct MockServer {
    pub base_url: String,
    ct: CancellationToken,
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}

pub async fn spawn_mock(router: Router) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let base_url = format!("http://{}", listener.local_addr().expect("addr"));
    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router)
            .with_graceful_shutdown(async move { server_ct.cancelled().await })
            .await;
    });
    MockServer { base_url, ct }
}

/// URL of a port nothing is listening on.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}

pub fn memory_cache() -> Arc<LocalCache> {
    Arc::new(LocalCache::in_memory(1024 * 1024))
}

pub fn client(base_url: &str, cache: Arc<LocalCache>) -> SyncClient {
    SyncClient::new(base_url, cache, Some(TIMEOUT)).expect("client")
}

pub fn prober(base_url: &str) -> ConnectivityProber {
    ConnectivityProber::new(base_url, Some(TIMEOUT)).expect("prober")
}
