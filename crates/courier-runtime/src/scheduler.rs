//! The bounded worker pool.
//!
//! [`WorkerPool::run`] pulls updates off the source channel and dispatches
//! each one on its own task, holding a semaphore permit for the task's
//! lifetime so that at most `workers` updates are in flight. When the
//! receive side would exceed the limit it waits for a permit, which in turn
//! applies backpressure to the source through the bounded channel.
//!
//! Shutdown happens when `cancel` fires or the source closes its sender.
//! No new update is started after that; in-flight tasks get
//! `drain_timeout` to finish. Tasks still running after the deadline are
//! counted as abandoned and left detached; they see the same cancellation
//! token through their handler context.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use courier_core::Update;
use courier_framework::{BoxError, DispatchError, DispatchReport};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::{Service, ServiceExt};
use tracing::{debug, error, info, trace, warn};

use crate::config::DEFAULT_WORKERS;

/// Counters for one [`WorkerPool::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Updates taken off the channel.
    pub received: u64,
    /// Dispatches that returned a report.
    pub completed: u64,
    /// Dispatches that returned an error.
    pub failed: u64,
    /// Updates received but never started, plus tasks cut off by the drain
    /// deadline.
    pub abandoned: u64,
    /// Whether every started task finished before the deadline.
    pub drained: bool,
}

#[derive(Default)]
struct Outcomes {
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Dispatches updates with at most `workers` in flight.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    drain_timeout: Duration,
}

impl WorkerPool {
    /// Zero `workers` means [`DEFAULT_WORKERS`].
    pub fn new(workers: usize, drain_timeout: Duration) -> Self {
        let workers = if workers == 0 { DEFAULT_WORKERS } else { workers };
        Self {
            workers,
            drain_timeout,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Runs until `cancel` fires or `updates` closes, then drains.
    ///
    /// `service` is cloned per update, so any tower stack over a
    /// [`courier_framework::DispatchService`] works.
    pub async fn run<S>(
        &self,
        service: S,
        mut updates: mpsc::Receiver<Update>,
        cancel: CancellationToken,
    ) -> PoolStats
    where
        S: Service<Update, Response = DispatchReport> + Clone + Send + 'static,
        S::Error: Into<BoxError>,
        S::Future: Send,
    {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let tracker = TaskTracker::new();
        let outcomes = Arc::new(Outcomes::default());
        let mut stats = PoolStats::default();

        info!(workers = self.workers, "Worker pool started");

        loop {
            let update = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Worker pool cancelled");
                    break;
                }
                next = updates.recv() => match next {
                    Some(update) => update,
                    None => {
                        debug!("Update source closed");
                        break;
                    }
                },
            };
            stats.received += 1;

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Worker pool cancelled while waiting for a worker");
                    stats.abandoned += 1;
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        stats.abandoned += 1;
                        break;
                    }
                },
            };

            let service = service.clone();
            let outcomes = Arc::clone(&outcomes);
            tracker.spawn(async move {
                let _permit = permit;
                match service.oneshot(update).await {
                    Ok(report) => {
                        outcomes.completed.fetch_add(1, Ordering::Relaxed);
                        trace!(
                            update_id = ?report.update_id,
                            kind = %report.kind,
                            invoked = report.invoked,
                            "Update dispatched"
                        );
                    }
                    Err(err) => {
                        outcomes.failed.fetch_add(1, Ordering::Relaxed);
                        log_failure(err.into());
                    }
                }
            });
        }

        tracker.close();
        let in_flight = tracker.len();
        stats.drained = if in_flight == 0 {
            true
        } else {
            info!(in_flight, timeout = ?self.drain_timeout, "Draining in-flight updates");
            tokio::time::timeout(self.drain_timeout, tracker.wait())
                .await
                .is_ok()
        };
        if !stats.drained {
            let remaining = tracker.len();
            warn!(remaining, "Drain timeout elapsed, abandoning in-flight updates");
            stats.abandoned += remaining as u64;
        }

        stats.completed = outcomes.completed.load(Ordering::Relaxed);
        stats.failed = outcomes.failed.load(Ordering::Relaxed);
        info!(
            received = stats.received,
            completed = stats.completed,
            failed = stats.failed,
            abandoned = stats.abandoned,
            "Worker pool stopped"
        );
        stats
    }
}

fn log_failure(err: BoxError) {
    match err.downcast_ref::<DispatchError>() {
        Some(dispatch @ DispatchError::Classify(_)) => {
            warn!(error = %dispatch, "Dropping update");
        }
        Some(dispatch) => {
            error!(kind = ?dispatch.kind(), error = %dispatch, "Handler failed");
        }
        None => error!(error = %err, "Dispatch failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::testing::MockTransport;
    use courier_core::{Bot, Object};
    use courier_framework::matchers::{always, has_text};
    use courier_framework::{Context, Dispatcher, Flow, HandlerResult};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn bot() -> Bot {
        Bot::new(Arc::new(MockTransport::new()))
    }

    fn message(id: i64, text: &str) -> Update {
        Object::new()
            .with("update_id", id)
            .with("message", Object::new().with("text", text))
    }

    async fn feed(updates: Vec<Update>) -> mpsc::Receiver<Update> {
        let (tx, rx) = mpsc::channel(updates.len().max(1));
        for update in updates {
            tx.send(update).await.unwrap();
        }
        rx
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_workers() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let dispatcher = {
            let (active, peak) = (Arc::clone(&active), Arc::clone(&peak));
            Dispatcher::builder()
                .on_message(always(), move |_ctx: Arc<Context>| {
                    let (active, peak) = (Arc::clone(&active), Arc::clone(&peak));
                    async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        HandlerResult::Ok(Flow::Continue)
                    }
                })
                .build()
        };

        let cancel = CancellationToken::new();
        let rx = feed((0..12).map(|i| message(i, "x")).collect()).await;
        let stats = WorkerPool::new(3, Duration::from_secs(5))
            .run(dispatcher.into_service(bot(), cancel.clone()), rx, cancel)
            .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
        assert_eq!(stats.received, 12);
        assert_eq!(stats.completed, 12);
        assert!(stats.drained);
    }

    #[tokio::test]
    async fn test_cancel_stops_starting_new_updates() {
        let started = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = {
            let (started, calls) = (Arc::clone(&started), Arc::clone(&calls));
            Dispatcher::builder()
                .on_message(always(), move |_ctx: Arc<Context>| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    started.notify_one();
                    async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        HandlerResult::Ok(Flow::Continue)
                    }
                })
                .build()
        };

        let cancel = CancellationToken::new();
        let rx = feed(vec![message(1, "a"), message(2, "b"), message(3, "c")]).await;
        let pool = WorkerPool::new(1, Duration::from_secs(5));
        let service = dispatcher.into_service(bot(), cancel.clone());
        let run = tokio::spawn({
            let cancel = cancel.clone();
            async move { pool.run(service, rx, cancel).await }
        });

        started.notified().await;
        cancel.cancel();
        let stats = run.await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.completed, 1);
        assert!(stats.drained);
    }

    #[tokio::test]
    async fn test_drain_timeout_abandons_slow_handlers() {
        let dispatcher = Dispatcher::builder()
            .on_message(always(), |_ctx: Arc<Context>| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                HandlerResult::Ok(Flow::Continue)
            })
            .build();

        let cancel = CancellationToken::new();
        let rx = feed(vec![message(1, "slow")]).await;
        let stats = WorkerPool::new(2, Duration::from_millis(50))
            .run(dispatcher.into_service(bot(), cancel.clone()), rx, cancel)
            .await;

        assert!(!stats.drained);
        assert_eq!(stats.abandoned, 1);
        assert_eq!(stats.completed, 0);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_pool() {
        let dispatcher = Dispatcher::builder()
            .on_message(has_text(), |ctx: Arc<Context>| async move {
                if ctx.text() == Some("fail") {
                    HandlerResult::Err("boom".into())
                } else {
                    HandlerResult::Ok(Flow::Stop)
                }
            })
            .build();

        let cancel = CancellationToken::new();
        let rx = feed(vec![
            message(1, "fail"),
            Object::new().with("update_id", 2),
            message(3, "ok"),
        ])
        .await;
        let stats = WorkerPool::new(0, Duration::from_secs(1))
            .run(dispatcher.into_service(bot(), cancel.clone()), rx, cancel)
            .await;

        assert_eq!(
            stats,
            PoolStats {
                received: 3,
                completed: 1,
                failed: 2,
                abandoned: 0,
                drained: true,
            }
        );
    }

    #[test]
    fn test_zero_workers_uses_default() {
        let pool = WorkerPool::new(0, Duration::from_secs(1));
        assert_eq!(pool.workers(), DEFAULT_WORKERS);
    }
}
