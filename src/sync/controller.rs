//! Automatic and manual sync orchestration.
//!
//! The controller owns no timers itself: [`SyncController::start`] registers
//! the probe and auto-sync intervals in the caller's [`TimerScope`], so the
//! caller's cleanup path releases them.
//!
//! Auto-sync cycles `Idle -> Syncing -> Idle` every interval. A failed attempt
//! goes straight back to `Idle`; it is logged and never retried early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use super::client::SyncClient;
use super::prober::ConnectivityProber;
use super::timers::TimerScope;
use super::SyncOutcome;
use crate::config::GlobalConfig;
use crate::models::SyncedCounts;
use crate::Result;

/// Why a manual sync did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The last probe found the remote authority unreachable.
    Offline,
    /// Another manual sync is still in flight.
    Busy,
}

/// Result of a manual sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualSync {
    /// The request was suppressed before any network call.
    Skipped(SkipReason),
    /// A push ran to completion.
    Completed(SyncOutcome<SyncedCounts>),
}

#[derive(Debug, Default)]
struct LastSynced {
    generation: u64,
    at: Option<DateTime<Local>>,
}

/// Session-only sync state shown next to the manual sync control.
#[derive(Debug, Default)]
pub struct SyncStatus {
    connected: AtomicBool,
    busy: AtomicBool,
    last_synced: Mutex<LastSynced>,
}

impl SyncStatus {
    /// Whether the most recent probe succeeded.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Record a probe result.
    pub fn set_connected(&self, connected: bool) {
        let previous = self.connected.swap(connected, Ordering::SeqCst);
        if previous != connected {
            info!(connected, "connectivity changed");
        }
    }

    /// Whether a manual sync is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Time of the newest successful push this session.
    #[must_use]
    pub fn last_synced(&self) -> Option<DateTime<Local>> {
        self.lock_last().at
    }

    /// `HH:MM synced`, or `--:--` before the first success.
    #[must_use]
    pub fn last_synced_label(&self) -> String {
        self.last_synced().map_or_else(
            || "--:--".to_owned(),
            |at| format!("{} synced", at.format("%H:%M")),
        )
    }

    /// Record a successful push of `generation` completed at `at`.
    ///
    /// Completions older than one already recorded are ignored, so a slow
    /// push cannot roll the timestamp back. Returns whether it was recorded.
    pub fn record_success(&self, generation: u64, at: DateTime<Local>) -> bool {
        let mut last = self.lock_last();
        if generation < last.generation {
            debug!(generation, newest = last.generation, "ignoring stale push completion");
            return false;
        }
        last.generation = generation;
        last.at = Some(at);
        true
    }

    fn try_begin(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard { flag: &self.busy })
    }

    fn lock_last(&self) -> std::sync::MutexGuard<'_, LastSynced> {
        self.last_synced
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Clears the busy flag on every exit path.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Drives connectivity probing, periodic pushes and manual pushes.
#[derive(Clone)]
pub struct SyncController {
    client: Arc<SyncClient>,
    prober: Arc<ConnectivityProber>,
    status: Arc<SyncStatus>,
    probe_interval: Duration,
    auto_sync_interval: Duration,
}

impl SyncController {
    /// Assemble a controller from its parts.
    #[must_use]
    pub fn new(
        client: Arc<SyncClient>,
        prober: Arc<ConnectivityProber>,
        probe_interval: Duration,
        auto_sync_interval: Duration,
    ) -> Self {
        Self {
            client,
            prober,
            status: Arc::new(SyncStatus::default()),
            probe_interval,
            auto_sync_interval,
        }
    }

    /// Build client, prober and controller from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if an HTTP client cannot be constructed.
    pub fn from_config(config: &GlobalConfig, client: Arc<SyncClient>) -> Result<Self> {
        let prober = ConnectivityProber::new(client.base_url(), config.request_timeout())?;
        Ok(Self::new(
            client,
            Arc::new(prober),
            config.probe_interval(),
            config.auto_sync_interval(),
        ))
    }

    /// Shared status view.
    #[must_use]
    pub fn status(&self) -> &Arc<SyncStatus> {
        &self.status
    }

    /// Register the probe and auto-sync timers in `scope`.
    ///
    /// Both run once immediately, then on their intervals.
    pub fn start(&self, scope: &mut TimerScope) {
        let prober = Arc::clone(&self.prober);
        let status = Arc::clone(&self.status);
        scope.spawn_interval("connectivity-probe", self.probe_interval, move || {
            let prober = Arc::clone(&prober);
            let status = Arc::clone(&status);
            async move {
                status.set_connected(prober.probe().await);
            }
        });

        let controller = self.clone();
        scope.spawn_interval("auto-sync", self.auto_sync_interval, move || {
            let controller = controller.clone();
            async move {
                controller.auto_sync_once().await;
            }
        });
    }

    /// Probe now and record the result.
    pub async fn probe_now(&self) -> bool {
        let connected = self.prober.probe().await;
        self.status.set_connected(connected);
        connected
    }

    /// One auto-sync attempt. Attempts regardless of connectivity.
    pub async fn auto_sync_once(&self) -> SyncOutcome<SyncedCounts> {
        let outcome = self.client.push().await;
        if outcome.success {
            self.status.record_success(outcome.generation, Local::now());
            info!(message = %outcome.message, "auto-sync succeeded");
        } else {
            warn!(message = %outcome.message, "auto-sync failed");
        }
        outcome
    }

    /// Push on user request, unless offline or already syncing.
    pub async fn manual_sync(&self) -> ManualSync {
        if !self.status.is_connected() {
            return ManualSync::Skipped(SkipReason::Offline);
        }
        let Some(_busy) = self.status.try_begin() else {
            return ManualSync::Skipped(SkipReason::Busy);
        };

        let outcome = self.client.push().await;
        if outcome.success {
            self.status.record_success(outcome.generation, Local::now());
        }
        ManualSync::Completed(outcome)
    }
}
