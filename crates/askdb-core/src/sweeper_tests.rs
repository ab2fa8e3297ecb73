//! Unit tests for the periodic sweep task.

use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn sweep_closure_runs_periodically() {
    let count = Arc::new(AtomicUsize::new(0));
    let handle = SweeperHandle::spawn("test", Duration::from_millis(5), {
        let count = count.clone();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            1
        }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.shutdown().await;

    assert!(count.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn shutdown_before_first_tick_returns_promptly() {
    let handle = SweeperHandle::spawn("idle", Duration::from_secs(3600), || 0);
    // Must not wait out the hour-long period.
    tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
        .await
        .expect("shutdown within timeout");
}

#[tokio::test]
async fn sweep_stops_after_shutdown() {
    let count = Arc::new(AtomicUsize::new(0));
    let handle = SweeperHandle::spawn("test", Duration::from_millis(5), {
        let count = count.clone();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            0
        }
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    handle.shutdown().await;
    let after_shutdown = count.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(count.load(Ordering::SeqCst), after_shutdown);
}
