//! Fixed-size worker pool pulling job ids from the queue.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::{FetchqConfig, MAX_CONCURRENT_DOWNLOADS};
use crate::job_db::JobId;

use super::execute::{join_error_message, JobExecutor};
use super::queue::JobQueue;
use super::recovery::reconcile;

/// How long a worker waits on the queue before re-checking the shutdown flag.
const QUEUE_POLL: Duration = Duration::from_secs(1);

/// Owns the queue and the workers.
///
/// `start` reconciles the store, requeues unfinished jobs, then spawns the
/// workers. `stop` lets running jobs finish until the grace period runs out
/// and abandons the rest: the executor is halted so nothing more is recorded
/// for them, and their jobs stay `running` until the next `start` resets them.
pub struct DownloadManager {
    executor: Arc<JobExecutor>,
    queue: JobQueue,
    workers: usize,
    grace: Duration,
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl DownloadManager {
    pub fn new(cfg: &FetchqConfig, executor: JobExecutor) -> Self {
        Self {
            executor: Arc::new(executor),
            queue: JobQueue::new(),
            workers: cfg.max_concurrent_downloads.clamp(1, MAX_CONCURRENT_DOWNLOADS),
            grace: Duration::from_secs(cfg.shutdown_grace_secs),
            shutdown: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Recover, requeue, and launch the workers. Returns the requeued ids.
    /// Calling it on a running manager does nothing.
    pub async fn start(&mut self) -> Result<Vec<JobId>> {
        if self.is_running() {
            return Ok(Vec::new());
        }
        self.shutdown.store(false, Ordering::SeqCst);
        self.executor.set_halted(false);

        let recovered = reconcile(self.executor.db()).await?;
        for job_id in &recovered {
            self.queue.enqueue(job_id.clone());
        }

        for worker in 0..self.workers {
            self.handles.push(tokio::spawn(worker_loop(
                worker,
                self.queue.clone(),
                Arc::clone(&self.executor),
                Arc::clone(&self.shutdown),
            )));
        }
        tracing::info!("download manager started with {} workers", self.workers);
        Ok(recovered)
    }

    pub fn enqueue(&self, job_id: impl Into<JobId>) {
        self.queue.enqueue(job_id);
    }

    /// Signal shutdown and wait for workers up to the grace period. Returns
    /// the number of workers that had to be abandoned.
    pub async fn stop(&mut self) -> usize {
        if !self.is_running() {
            return 0;
        }
        self.shutdown.store(true, Ordering::SeqCst);
        let deadline = tokio::time::Instant::now() + self.grace;

        let mut overdue = Vec::new();
        for mut handle in self.handles.drain(..) {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("worker ended abnormally: {e}"),
                Err(_) => overdue.push(handle),
            }
        }

        // Halt before aborting so a run racing the abort records nothing.
        let abandoned = overdue.len();
        if abandoned > 0 {
            self.executor.set_halted(true);
        }
        for handle in overdue {
            handle.abort();
            // Dropping the worker drops its JoinSet, which aborts the job task.
            let _ = handle.await;
        }
        if abandoned > 0 {
            tracing::warn!(
                "abandoned {abandoned} in-flight job(s) after {}s; they will be reset on next start",
                self.grace.as_secs()
            );
        }

        if let Some(service) = self.executor.transcoder() {
            if tokio::time::timeout_at(deadline, service.shutdown()).await.is_err() {
                tracing::warn!("transcoding still running at shutdown deadline");
            }
        }
        tracing::info!("download manager stopped");
        abandoned
    }
}

/// One worker: pull an id, run it to completion, repeat until shutdown.
/// A failing or panicking job never ends the loop.
async fn worker_loop(
    worker: usize,
    queue: JobQueue,
    executor: Arc<JobExecutor>,
    shutdown: Arc<AtomicBool>,
) {
    tracing::debug!(worker, "worker started");
    while !shutdown.load(Ordering::SeqCst) {
        let Some(job_id) = queue.next(QUEUE_POLL).await else {
            continue;
        };

        // A failed claim means this worker never owned the job: leave its
        // status alone and try again later.
        let job = match executor.claim(&job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(worker, job_id = %job_id, "could not claim job, requeueing: {e:#}");
                tokio::time::sleep(QUEUE_POLL).await;
                queue.enqueue(job_id);
                continue;
            }
        };
        tracing::debug!(worker, job_id = %job_id, "processing job");

        // Own task so a panic surfaces as a JoinError instead of killing the
        // worker; held in a JoinSet so aborting the worker aborts the job too.
        let mut running = JoinSet::new();
        running.spawn({
            let executor = Arc::clone(&executor);
            async move { executor.run(job).await }
        });
        let fault = match running.join_next().await {
            Some(Ok(Ok(()))) | None => None,
            Some(Ok(Err(e))) => Some(format!("{e:#}")),
            Some(Err(join)) => Some(join_error_message(join)),
        };

        if let Some(message) = fault {
            tracing::error!(worker, job_id = %job_id, "job failed with unexpected error: {message}");
            if let Err(e) = executor.fail(&job_id, &message).await {
                tracing::error!(worker, job_id = %job_id, "could not record failure: {e:#}");
            }
        }
    }
    tracing::debug!(worker, "worker stopped");
}
