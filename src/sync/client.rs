//! HTTP client for the remote authority's sync endpoints.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use super::generation::Generations;
use super::SyncOutcome;
use crate::cache::{keys, LocalCache};
use crate::config::GlobalConfig;
use crate::migration::{load_discoveries, load_tasks};
use crate::models::discovery::DISCOVERIES_VERSION;
use crate::models::snapshot::{LoadResponse, SyncResponse};
use crate::models::task::TASKS_VERSION;
use crate::models::{BackupReceipt, Snapshot, SyncedCounts};
use crate::{AppError, Result};

/// Raw values fetched by a load, validated but not yet stored.
struct FetchedSnapshot {
    raw_tasks: String,
    raw_discoveries: String,
    parsed: Snapshot,
}

/// Push/pull client bound to one local cache and one remote authority.
///
/// Calls are independent attempts: no retry, no deduplication, and concurrent
/// pushes are allowed. Callers that must not overlap manual triggers keep
/// their own busy flag (see [`super::SyncController`]).
pub struct SyncClient {
    http: reqwest::Client,
    base_url: String,
    cache: Arc<LocalCache>,
    pushes: Generations,
    pulls: Generations,
}

impl SyncClient {
    /// Build a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        cache: Arc<LocalCache>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            cache,
            pushes: Generations::new(),
            pulls: Generations::new(),
        })
    }

    /// Build a client from the global configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be constructed.
    pub fn from_config(config: &GlobalConfig, cache: Arc<LocalCache>) -> Result<Self> {
        Self::new(config.server_url.clone(), cache, config.request_timeout())
    }

    /// Base URL of the remote authority.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The cache this client mirrors.
    #[must_use]
    pub fn cache(&self) -> &Arc<LocalCache> {
        &self.cache
    }

    /// Both collections as currently held by the local cache.
    #[must_use]
    pub fn local_snapshot(&self) -> Snapshot {
        Snapshot {
            tasks: load_tasks(&self.cache),
            discoveries: load_discoveries(&self.cache),
        }
    }

    /// Send the local collections to `POST /api/sync`.
    ///
    /// Never mutates the local cache.
    pub async fn push(&self) -> SyncOutcome<SyncedCounts> {
        let generation = self.pushes.issue();
        let snapshot = self.local_snapshot();
        match self.try_push(&snapshot).await {
            Ok(counts) => {
                info!(
                    generation,
                    tasks = counts.tasks,
                    discoveries = counts.discoveries,
                    "push succeeded"
                );
                SyncOutcome::succeeded(
                    generation,
                    format!(
                        "sync succeeded: {} tasks, {} discoveries",
                        counts.tasks, counts.discoveries
                    ),
                    counts,
                )
            }
            Err(err) => {
                warn!(generation, %err, "push failed");
                SyncOutcome::failed(generation, format!("sync failed: {err}"))
            }
        }
    }

    /// Fetch `GET /api/load` and overwrite both collections with it.
    ///
    /// The replace happens only when the whole payload validates and this
    /// pull is still the latest one issued; otherwise the cache is untouched.
    /// Each stored key is announced through [`LocalCache::notify`].
    pub async fn pull(&self) -> SyncOutcome<Snapshot> {
        let generation = self.pulls.issue();
        let fetched = match self.try_fetch_snapshot().await {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(generation, %err, "pull failed");
                return SyncOutcome::failed(generation, format!("load failed: {err}"));
            }
        };

        if !self.pulls.is_latest(generation) {
            info!(
                generation,
                latest = self.pulls.latest(),
                "discarding superseded pull"
            );
            return SyncOutcome::failed(
                generation,
                "load failed: superseded by a newer load request",
            );
        }

        self.apply_snapshot(generation, fetched)
    }

    /// Ask the remote authority to write a backup file.
    pub async fn backup(&self) -> SyncOutcome<BackupReceipt> {
        let request = self.http.post(self.url("/api/backup"));
        match fetch_json::<BackupReceipt>(request).await {
            Ok(receipt) => {
                info!(filename = %receipt.filename, "backup created");
                SyncOutcome::succeeded(
                    0,
                    format!("backup created: {}", receipt.filename),
                    receipt,
                )
            }
            Err(err) => {
                warn!(%err, "backup failed");
                SyncOutcome::failed(0, format!("backup failed: {err}"))
            }
        }
    }

    /// Fetch the remote authority's statistics document.
    pub async fn stats(&self) -> SyncOutcome<Value> {
        let request = self.http.get(self.url("/api/stats"));
        match fetch_json::<Value>(request).await {
            Ok(stats) => SyncOutcome::succeeded(0, "stats fetched", stats),
            Err(err) => {
                warn!(%err, "stats request failed");
                SyncOutcome::failed(0, format!("stats failed: {err}"))
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn try_push(&self, snapshot: &Snapshot) -> Result<SyncedCounts> {
        let request = self.http.post(self.url("/api/sync")).json(snapshot);
        let body: SyncResponse = fetch_json(request).await?;
        Ok(body.synced)
    }

    async fn try_fetch_snapshot(&self) -> Result<FetchedSnapshot> {
        let request = self.http.get(self.url("/api/load"));
        let body: LoadResponse = fetch_json(request).await?;

        if body.status != "success" {
            return Err(AppError::Protocol(
                body.message
                    .unwrap_or_else(|| format!("server reported status {:?}", body.status)),
            ));
        }

        let mut data = body
            .data
            .ok_or_else(|| AppError::Decode("response has no data".into()))?;
        let raw_tasks = take_array(&mut data, keys::TASKS)?;
        let raw_discoveries = take_array(&mut data, keys::DISCOVERIES)?;
        let parsed = body
            .parsed
            .ok_or_else(|| AppError::Decode("response has no parsed snapshot".into()))?;

        Ok(FetchedSnapshot {
            raw_tasks,
            raw_discoveries,
            parsed,
        })
    }

    fn apply_snapshot(&self, generation: u64, fetched: FetchedSnapshot) -> SyncOutcome<Snapshot> {
        let outcome = self.cache.write_raw_collections(&[
            (keys::TASKS, &fetched.raw_tasks, TASKS_VERSION),
            (keys::DISCOVERIES, &fetched.raw_discoveries, DISCOVERIES_VERSION),
        ]);
        if !outcome.is_written() {
            warn!(generation, ?outcome, "pulled data could not be stored");
            return SyncOutcome::failed(
                generation,
                format!("load failed: could not store pulled data locally ({outcome:?})"),
            );
        }
        self.cache.notify(keys::TASKS, Some(fetched.raw_tasks));
        self.cache.notify(keys::DISCOVERIES, Some(fetched.raw_discoveries));

        let parsed = fetched.parsed;
        info!(
            generation,
            tasks = parsed.tasks.len(),
            discoveries = parsed.discoveries.len(),
            "pull applied"
        );
        SyncOutcome::succeeded(
            generation,
            format!(
                "load succeeded: {} tasks, {} discoveries",
                parsed.tasks.len(),
                parsed.discoveries.len()
            ),
            parsed,
        )
    }
}

/// Build the shared `reqwest` client, honouring an optional timeout.
///
/// # Errors
///
/// Returns `AppError::Config` if the TLS backend cannot be initialised.
pub fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))
}

/// Send `request`, require a 2xx status, and decode the JSON body.
async fn fetch_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Protocol(format!("server responded with {status}")));
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|err| AppError::Decode(format!("invalid response body: {err}")))
}

/// Remove `key` from `data`, requiring a JSON-encoded array.
fn take_array(data: &mut HashMap<String, String>, key: &str) -> Result<String> {
    let raw = data
        .remove(key)
        .ok_or_else(|| AppError::Decode(format!("response data lacks {key}")))?;
    serde_json::from_str::<Vec<Value>>(&raw)
        .map_err(|err| AppError::Decode(format!("{key} is not a json array: {err}")))?;
    Ok(raw)
}
