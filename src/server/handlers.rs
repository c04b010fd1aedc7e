//! Request handlers for the companion server routes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Local;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use super::backup::create_backup;
use super::ServerState;
use crate::cache::keys;
use crate::models::BoardStats;
use crate::AppError;

/// Error reply carrying its own status code and JSON body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    /// `400` with `{ "error": message }`.
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: json!({ "error": message.into() }),
        }
    }

    /// `500` with `{ "status": "error", "message": message }`.
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({ "status": "error", "message": message.into() }),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        error!(%err, "request failed");
        Self::internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult = std::result::Result<Json<Value>, ApiError>;

/// Run file-system work for a request off the async runtime.
async fn blocking<T, F>(f: F) -> std::result::Result<T, ApiError>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| ApiError::internal(format!("store task panicked: {err}")))?
        .map_err(ApiError::from)
}

async fn current_stats(state: &ServerState) -> std::result::Result<BoardStats, ApiError> {
    let store = Arc::clone(&state.store);
    blocking(move || {
        Ok(BoardStats::from_collections(
            &store.read_tasks(),
            &store.read_discoveries(),
        ))
    })
    .await
}

/// `GET /` (and `HEAD /`): liveness, stats and endpoint list.
pub async fn index(State(state): State<ServerState>) -> ApiResult {
    let stats = current_stats(&state).await?;
    Ok(Json(json!({
        "status": "running",
        "message": "workboard tasks & discoveries server",
        "stats": {
            "total_tasks": stats.total_tasks,
            "completed_tasks": stats.completed_tasks,
            "pending_tasks": stats.pending_tasks(),
            "total_discoveries": stats.total_discoveries,
            "last_updated": Local::now().to_rfc3339(),
        },
        "endpoints": {
            "sync": "/api/sync",
            "load": "/api/load",
            "tasks": "/api/tasks",
            "discoveries": "/api/discoveries",
            "backup": "/api/backup",
            "stats": "/api/stats",
        },
    })))
}

/// `POST /api/sync`: replace both collections with the pushed snapshot.
///
/// Each field may be an array or a JSON-encoded string of one; a missing
/// field counts as empty.
pub async fn sync(State(state): State<ServerState>, body: Bytes) -> ApiResult {
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|err| ApiError::internal(format!("sync failed: invalid body: {err}")))?;
    let tasks = collection_field(&payload, "tasks")
        .map_err(|err| ApiError::internal(format!("sync failed: {err}")))?;
    let discoveries = collection_field(&payload, "discoveries")
        .map_err(|err| ApiError::internal(format!("sync failed: {err}")))?;

    let store = Arc::clone(&state.store);
    let (tasks, discoveries) = blocking(move || {
        let tasks = store.write_tasks(&tasks)?;
        let discoveries = store.write_discoveries(&discoveries)?;
        Ok((tasks, discoveries))
    })
    .await?;
    info!(
        tasks = tasks.len(),
        discoveries = discoveries.len(),
        "snapshot synced"
    );

    Ok(Json(json!({
        "status": "success",
        "message": "sync succeeded",
        "synced": { "tasks": tasks.len(), "discoveries": discoveries.len() },
    })))
}

/// Extract `field` as a list of records.
fn collection_field(payload: &Value, field: &str) -> crate::Result<Vec<Value>> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::String(raw)) if raw.trim().is_empty() => Ok(Vec::new()),
        Some(Value::String(raw)) => serde_json::from_str(raw)
            .map_err(|err| AppError::InvalidInput(format!("{field} is not a json array: {err}"))),
        Some(_) => Err(AppError::InvalidInput(format!("{field} must be an array"))),
    }
}

/// `GET /api/load`: both collections in local-storage form and decoded.
pub async fn load(State(state): State<ServerState>) -> ApiResult {
    let store = Arc::clone(&state.store);
    let (tasks, discoveries) =
        blocking(move || Ok((store.read_tasks(), store.read_discoveries()))).await?;

    let mut data = Map::new();
    data.insert(
        keys::TASKS.to_owned(),
        Value::String(serde_json::to_string(&tasks).map_err(AppError::from)?),
    );
    data.insert(
        keys::DISCOVERIES.to_owned(),
        Value::String(serde_json::to_string(&discoveries).map_err(AppError::from)?),
    );

    Ok(Json(json!({
        "status": "success",
        "data": data,
        "parsed": { "tasks": tasks, "discoveries": discoveries },
    })))
}

/// `GET /api/tasks`.
pub async fn get_tasks(State(state): State<ServerState>) -> ApiResult {
    let store = Arc::clone(&state.store);
    let tasks = blocking(move || Ok(store.read_tasks())).await?;
    Ok(Json(json!(tasks)))
}

/// `POST /api/tasks`: replace the task collection.
pub async fn replace_tasks(State(state): State<ServerState>, body: Bytes) -> ApiResult {
    let entries = array_body(&body)?;
    let store = Arc::clone(&state.store);
    let stored = blocking(move || store.write_tasks(&entries)).await?;
    Ok(Json(json!({ "status": "success", "count": stored.len() })))
}

/// `GET /api/discoveries`.
pub async fn get_discoveries(State(state): State<ServerState>) -> ApiResult {
    let store = Arc::clone(&state.store);
    let discoveries = blocking(move || Ok(store.read_discoveries())).await?;
    Ok(Json(json!(discoveries)))
}

/// `POST /api/discoveries`: replace the discovery collection.
pub async fn replace_discoveries(State(state): State<ServerState>, body: Bytes) -> ApiResult {
    let entries = array_body(&body)?;
    let store = Arc::clone(&state.store);
    let stored = blocking(move || store.write_discoveries(&entries)).await?;
    Ok(Json(json!({ "status": "success", "count": stored.len() })))
}

fn array_body(body: &Bytes) -> std::result::Result<Vec<Value>, ApiError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err(ApiError::bad_request("expected a json array")),
        Err(err) => Err(ApiError::bad_request(format!("invalid json: {err}"))),
    }
}

/// `POST /api/backup`: write a backup file.
pub async fn backup(State(state): State<ServerState>) -> ApiResult {
    let store = Arc::clone(&state.store);
    let filename = blocking(move || create_backup(&store)).await?;
    Ok(Json(json!({ "status": "success", "filename": filename })))
}

/// `GET /api/stats`.
pub async fn stats(State(state): State<ServerState>) -> ApiResult {
    let stats = current_stats(&state).await?;
    Ok(Json(json!({
        "total_tasks": stats.total_tasks,
        "completed_tasks": stats.completed_tasks,
        "pending_tasks": stats.pending_tasks(),
        "total_discoveries": stats.total_discoveries,
        "last_updated": Local::now().to_rfc3339(),
    })))
}
