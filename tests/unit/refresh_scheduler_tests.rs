//! Debounced refresh scheduling: coalescing, cancellation and failure handling.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pattern_jam::orchestrator::refresh_scheduler::RefreshScheduler;
use pattern_jam::AppError;

type Job = Pin<Box<dyn Future<Output = pattern_jam::Result<()>> + Send>>;

/// Job that bumps `counter` when it actually runs, not when it is built.
fn counting_job(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> Job {
    let counter = Arc::clone(counter);
    move || -> Job {
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[tokio::test]
async fn rapid_schedules_run_once() {
    let scheduler = RefreshScheduler::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let mut armed = 0;
    for _ in 0..10 {
        let counter = Arc::clone(&runs);
        let accepted = scheduler
            .schedule("s1", Duration::from_millis(30), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        if accepted {
            armed += 1;
        }
    }
    assert_eq!(armed, 1);
    assert!(scheduler.is_pending("s1").await);

    scheduler.flush().await;

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(!scheduler.is_pending("s1").await);
}

#[tokio::test]
async fn sessions_are_scheduled_independently() {
    let scheduler = RefreshScheduler::new();
    let runs = Arc::new(AtomicUsize::new(0));

    assert!(scheduler.schedule("a", Duration::from_millis(10), counting_job(&runs)).await);
    assert!(scheduler.schedule("b", Duration::from_millis(10), counting_job(&runs)).await);
    assert_eq!(scheduler.pending_count().await, 2);

    scheduler.flush().await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.pending_count().await, 0);
}

#[tokio::test]
async fn cancel_prevents_the_run() {
    let scheduler = RefreshScheduler::new();
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);

    scheduler
        .schedule("s1", Duration::from_millis(50), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
    assert!(scheduler.cancel("s1").await);
    assert!(!scheduler.cancel("s1").await);

    scheduler.flush().await;
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failing_job_clears_marker() {
    let scheduler = RefreshScheduler::new();

    scheduler
        .schedule("s1", Duration::from_millis(5), || async {
            Err(AppError::Db("boom".into()))
        })
        .await;
    scheduler.flush().await;

    assert!(!scheduler.is_pending("s1").await);

    let runs = Arc::new(AtomicUsize::new(0));
    assert!(scheduler.schedule("s1", Duration::from_millis(5), counting_job(&runs)).await);
    scheduler.flush().await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn schedule_during_run_arms_a_new_cycle() {
    let scheduler = RefreshScheduler::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let rearmed = Arc::new(AtomicUsize::new(0));

    let inner = Arc::clone(&scheduler);
    let inner_runs = Arc::clone(&runs);
    let inner_rearmed = Arc::clone(&rearmed);
    scheduler
        .schedule("s1", Duration::from_millis(5), move || async move {
            let accepted = inner
                .schedule("s1", Duration::from_millis(5), counting_job(&inner_runs))
                .await;
            if accepted {
                inner_rearmed.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        })
        .await;

    scheduler.flush().await;
    assert_eq!(rearmed.load(Ordering::SeqCst), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn shutdown_disarms_everything() {
    let scheduler = RefreshScheduler::new();
    let runs = Arc::new(AtomicUsize::new(0));
    scheduler.schedule("a", Duration::from_secs(30), counting_job(&runs)).await;
    scheduler.schedule("b", Duration::from_secs(30), counting_job(&runs)).await;

    tokio::time::timeout(Duration::from_secs(5), scheduler.shutdown())
        .await
        .expect("shutdown should not wait for timers");

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.pending_count().await, 0);
}
