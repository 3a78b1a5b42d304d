//! Bounded background task queue.
//!
//! Request handlers hand non-critical side effects (view history, credit
//! persistence, notifications) to a [`TaskQueue`] instead of spawning them
//! directly. The queue holds at most `capacity` pending jobs and runs at most
//! `workers` of them at once. Submission never blocks the request: when the
//! queue is full the job is rejected, logged and counted.
//!
//! Job outcomes are never surfaced to a caller. They are logged and counted
//! in [`TaskStats`].

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify, Semaphore};
use tracing::{debug, error, warn};

type Job = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

struct Task {
    name: &'static str,
    job: Job,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("task queue is full")]
    Full,

    #[error("task queue is closed")]
    Closed,
}

/// Point-in-time counters of a [`TaskQueue`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rejected: u64,
}

#[derive(Default)]
struct Shared {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    /// Accepted jobs that have not finished yet.
    pending: AtomicUsize,
    idle: Notify,
}

impl Shared {
    fn finish(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Handle to the queue. Cheap to clone; all clones feed the same dispatcher.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<Task>,
    shared: Arc<Shared>,
}

impl TaskQueue {
    /// Start a queue and its dispatcher on the current tokio runtime.
    ///
    /// `workers` and `capacity` are raised to 1 if given as 0.
    pub fn new(workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let shared = Arc::new(Shared::default());
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));

        tokio::spawn(dispatch(rx, semaphore, Arc::clone(&shared)));

        Self { tx, shared }
    }

    /// Enqueue `job` without waiting. `name` identifies it in logs.
    pub fn submit<F, E>(&self, name: &'static str, job: F) -> Result<(), QueueError>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display,
    {
        let job: Job = Box::pin(async move { job.await.map_err(|e| e.to_string()) });

        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        match self.tx.try_send(Task { name, job }) {
            Ok(()) => {
                self.shared.submitted.fetch_add(1, Ordering::Relaxed);
                debug!(task = name, "task queued");
                Ok(())
            }
            Err(e) => {
                self.shared.rejected.fetch_add(1, Ordering::Relaxed);
                self.shared.finish();
                let err = match e {
                    mpsc::error::TrySendError::Full(_) => QueueError::Full,
                    mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
                };
                warn!(task = name, "task rejected: {err}");
                Err(err)
            }
        }
    }

    pub fn stats(&self) -> TaskStats {
        TaskStats {
            submitted: self.shared.submitted.load(Ordering::Relaxed),
            succeeded: self.shared.succeeded.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            rejected: self.shared.rejected.load(Ordering::Relaxed),
        }
    }

    /// Resolves once every accepted job has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

async fn dispatch(mut rx: mpsc::Receiver<Task>, semaphore: Arc<Semaphore>, shared: Arc<Shared>) {
    while let Some(Task { name, job }) = rx.recv().await {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            let _permit = permit;
            // Run in its own task so a panicking job is still accounted for.
            match tokio::spawn(job).await {
                Ok(Ok(())) => {
                    shared.succeeded.fetch_add(1, Ordering::Relaxed);
                    debug!(task = name, "task finished");
                }
                Ok(Err(e)) => {
                    shared.failed.fetch_add(1, Ordering::Relaxed);
                    error!(task = name, "task failed: {e}");
                }
                Err(e) => {
                    shared.failed.fetch_add(1, Ordering::Relaxed);
                    error!(task = name, "task aborted: {e}");
                }
            }
            shared.finish();
        });
    }
    debug!("task dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn runs_jobs_and_counts_outcomes() {
        let q = TaskQueue::new(4, 16);
        q.submit("ok", async { Ok::<(), String>(()) }).unwrap();
        q.submit("ok", async { Ok::<(), String>(()) }).unwrap();
        q.submit("bad", async { Err::<(), _>("boom") }).unwrap();

        q.wait_idle().await;
        assert_eq!(
            q.stats(),
            TaskStats { submitted: 3, succeeded: 2, failed: 1, rejected: 0 }
        );
    }

    #[tokio::test]
    async fn panicking_job_counts_as_failed() {
        let q = TaskQueue::new(1, 4);
        q.submit("panics", async {
            if true {
                panic!("job exploded");
            }
            Ok::<(), String>(())
        })
        .unwrap();

        q.wait_idle().await;
        assert_eq!(q.stats().failed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_is_bounded_by_workers() {
        let q = TaskQueue::new(2, 32);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            q.submit("sleepy", async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<(), String>(())
            })
            .unwrap();
        }

        q.wait_idle().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(q.stats().succeeded, 10);
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let q = TaskQueue::new(1, 1);
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        q.submit("blocker", async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok::<(), String>(())
        })
        .unwrap();
        started_rx.await.unwrap();

        // One job may wait in the dispatcher for a permit and one in the channel.
        let results: Vec<_> = (0..3)
            .map(|_| q.submit("filler", async { Ok::<(), String>(()) }))
            .collect();
        assert!(results.contains(&Err(QueueError::Full)));
        assert!(q.stats().rejected >= 1);

        release_tx.send(()).unwrap();
        q.wait_idle().await;
        let stats = q.stats();
        assert_eq!(stats.succeeded, stats.submitted);
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_when_empty() {
        let q = TaskQueue::new(1, 1);
        tokio::time::timeout(Duration::from_secs(1), q.wait_idle())
            .await
            .unwrap();
    }
}
