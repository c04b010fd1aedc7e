//! Owned periodic timers with guaranteed release.
//!
//! A [`TimerGuard`] owns one background interval task and cancels it when
//! dropped. A [`TimerScope`] is the context object a component keeps for
//! every timer it creates; [`TimerScope::release_all`] is the single cleanup
//! path for teardown, visibility loss and shutdown alike.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

/// Handle to a running interval task. Cancels the task on drop.
pub struct TimerGuard {
    name: String,
    cancel: CancellationToken,
    join_handle: Option<JoinHandle<()>>,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl TimerGuard {
    /// Run `tick` immediately and then every `period` until cancelled.
    ///
    /// A tick still in flight when the guard is cancelled is dropped.
    /// Missed ticks are delayed rather than bursted.
    pub fn spawn_interval<F, Fut>(
        name: impl Into<String>,
        period: Duration,
        cancel: CancellationToken,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let task_cancel = cancel.clone();
        let span_name = name.clone();
        let join_handle = tokio::spawn(
            async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        () = task_cancel.cancelled() => break,
                        _ = interval.tick() => {
                            tokio::select! {
                                () = task_cancel.cancelled() => break,
                                () = tick() => {}
                            }
                        }
                    }
                }
                debug!("timer released");
            }
            .instrument(info_span!("timer", name = %span_name)),
        );

        Self {
            name,
            cancel,
            join_handle: Some(join_handle),
        }
    }

    /// Timer label used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the timer. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the timer task is still scheduled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .join_handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel the timer and wait for its task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}

/// Owner of every timer one component creates.
///
/// Timers are children of the scope's token, so cancelling a parent token
/// passed to [`TimerScope::with_parent`] also stops them.
pub struct TimerScope {
    token: CancellationToken,
    timers: Vec<TimerGuard>,
}

impl Default for TimerScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl TimerScope {
    /// Standalone scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            timers: Vec::new(),
        }
    }

    /// Scope released automatically when `parent` is cancelled.
    #[must_use]
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            timers: Vec::new(),
        }
    }

    /// Register a periodic task owned by this scope.
    pub fn spawn_interval<F, Fut>(&mut self, name: impl Into<String>, period: Duration, tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let guard = TimerGuard::spawn_interval(name, period, self.token.child_token(), tick);
        self.timers.push(guard);
    }

    /// Number of timers currently owned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether the scope owns no timers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Names of the timers still active.
    #[must_use]
    pub fn active(&self) -> Vec<&str> {
        self.timers
            .iter()
            .filter(|t| t.is_active())
            .map(TimerGuard::name)
            .collect()
    }

    /// Stop and forget every timer. The scope stays usable for new timers.
    pub fn release_all(&mut self) {
        for timer in self.timers.drain(..) {
            timer.cancel();
        }
    }

    /// Stop every timer and wait for their tasks to exit.
    pub async fn shutdown(mut self) {
        for timer in std::mem::take(&mut self.timers) {
            timer.shutdown().await;
        }
    }
}
