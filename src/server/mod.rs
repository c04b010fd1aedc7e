//! Companion server: the remote authority the sync client talks to.
//!
//! A small axum application over [`ServerStore`]. Cross-origin requests are
//! allowed so a browser build of the board can reach it directly.

pub mod backup;
pub mod handlers;
pub mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::GlobalConfig;
use crate::{AppError, Result};

pub use store::ServerStore;

/// State shared by every request handler.
#[derive(Clone)]
pub struct ServerState {
    /// Backing data files.
    pub store: Arc<ServerStore>,
}

/// Build the application router.
#[must_use]
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/sync", post(handlers::sync))
        .route("/api/load", get(handlers::load))
        .route(
            "/api/tasks",
            get(handlers::get_tasks).post(handlers::replace_tasks),
        )
        .route(
            "/api/discoveries",
            get(handlers::get_discoveries).post(handlers::replace_discoveries),
        )
        .route("/api/backup", post(handlers::backup))
        .route("/api/stats", get(handlers::stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the server on `127.0.0.1:<server.http_port>` until `ct` is cancelled.
///
/// Also runs the backup schedule for the lifetime of the server.
///
/// # Errors
///
/// Returns `AppError::Io` if the data directory cannot be initialised and
/// `AppError::Config` if the port cannot be bound.
pub async fn serve(config: &GlobalConfig, ct: CancellationToken) -> Result<()> {
    let store = Arc::new(ServerStore::open(&config.data_dir)?);
    let bind = SocketAddr::from(([127, 0, 0, 1], config.server.http_port));
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind server on {bind}: {err}")))?;

    let backups = backup::spawn_backup_schedule(
        Arc::clone(&store),
        config.server.backup_retention_days,
        config.backup_interval(),
        ct.clone(),
    );

    let served = serve_listener(listener, store, ct.clone()).await;
    ct.cancel();
    let _ = backups.await;
    served
}

/// Serve on an already-bound listener until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Io` if the server loop fails.
pub async fn serve_listener(
    listener: TcpListener,
    store: Arc<ServerStore>,
    ct: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    let app = router(ServerState { store });

    info!(%addr, "starting workboard server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            ct.cancelled().await;
        })
        .await
        .map_err(|err| AppError::Io(format!("server error: {err}")))?;

    info!("workboard server shut down");
    Ok(())
}
