//! Unit tests for owned interval timers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use workboard::sync::{TimerGuard, TimerScope};

const PERIOD: Duration = Duration::from_millis(20);

fn counting_tick(counter: &Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<()> + Send {
    let counter = Arc::clone(counter);
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready(())
    }
}

#[tokio::test]
async fn first_tick_fires_immediately() {
    let counter = Arc::new(AtomicUsize::new(0));
    let guard = TimerGuard::spawn_interval(
        "immediate",
        Duration::from_secs(3600),
        CancellationToken::new(),
        counting_tick(&counter),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(guard.is_active());
    guard.shutdown().await;
}

#[tokio::test]
async fn dropping_a_guard_stops_its_task() {
    let counter = Arc::new(AtomicUsize::new(0));
    let guard = TimerGuard::spawn_interval(
        "dropped",
        PERIOD,
        CancellationToken::new(),
        counting_tick(&counter),
    );
    tokio::time::sleep(PERIOD * 3).await;
    drop(guard);
    tokio::time::sleep(PERIOD).await;

    let after_drop = counter.load(Ordering::SeqCst);
    tokio::time::sleep(PERIOD * 5).await;
    assert_eq!(counter.load(Ordering::SeqCst), after_drop);
}

#[tokio::test]
async fn release_all_stops_every_timer_in_scope() {
    let a = Arc::new(AtomicUsize::new(0));
    let b = Arc::new(AtomicUsize::new(0));
    let mut scope = TimerScope::new();
    scope.spawn_interval("a", PERIOD, counting_tick(&a));
    scope.spawn_interval("b", PERIOD, counting_tick(&b));
    assert_eq!(scope.len(), 2);

    tokio::time::sleep(PERIOD * 2).await;
    let mut active = scope.active();
    active.sort_unstable();
    assert_eq!(active, ["a", "b"]);

    scope.release_all();
    assert!(scope.is_empty());
    tokio::time::sleep(PERIOD).await;

    let (a_stop, b_stop) = (a.load(Ordering::SeqCst), b.load(Ordering::SeqCst));
    tokio::time::sleep(PERIOD * 5).await;
    assert_eq!(a.load(Ordering::SeqCst), a_stop);
    assert_eq!(b.load(Ordering::SeqCst), b_stop);
}

#[tokio::test]
async fn scope_stays_usable_after_release() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut scope = TimerScope::new();
    scope.spawn_interval("first", PERIOD, counting_tick(&counter));
    scope.release_all();

    scope.spawn_interval("second", PERIOD, counting_tick(&counter));
    tokio::time::sleep(PERIOD * 2).await;
    assert_eq!(scope.active(), ["second"]);
    scope.shutdown().await;
}

#[tokio::test]
async fn cancelling_parent_token_releases_scope() {
    let parent = CancellationToken::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let mut scope = TimerScope::with_parent(&parent);
    scope.spawn_interval("child", PERIOD, counting_tick(&counter));
    tokio::time::sleep(PERIOD * 2).await;

    parent.cancel();
    tokio::time::sleep(PERIOD).await;
    assert!(scope.active().is_empty());

    let stopped = counter.load(Ordering::SeqCst);
    tokio::time::sleep(PERIOD * 5).await;
    assert_eq!(counter.load(Ordering::SeqCst), stopped);
}

#[tokio::test]
async fn dropping_scope_stops_timers() {
    let counter = Arc::new(AtomicUsize::new(0));
    {
        let mut scope = TimerScope::new();
        scope.spawn_interval("scoped", PERIOD, counting_tick(&counter));
        tokio::time::sleep(PERIOD * 2).await;
    }
    tokio::time::sleep(PERIOD).await;
    let stopped = counter.load(Ordering::SeqCst);
    tokio::time::sleep(PERIOD * 5).await;
    assert_eq!(counter.load(Ordering::SeqCst), stopped);
}

#[tokio::test]
async fn in_flight_tick_is_abandoned_on_cancel() {
    let finished = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&finished);
    let guard = TimerGuard::spawn_interval("slow", PERIOD, CancellationToken::new(), move || {
        let observed = Arc::clone(&observed);
        async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            observed.fetch_add(1, Ordering::SeqCst);
        }
    });
    tokio::time::sleep(PERIOD).await;
    tokio::time::timeout(Duration::from_secs(2), guard.shutdown())
        .await
        .expect("shutdown does not wait for the tick");
    assert_eq!(finished.load(Ordering::SeqCst), 0);
}
