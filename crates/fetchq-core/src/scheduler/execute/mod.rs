//! Execute one job: claim, download, finalize, record the outcome, notify.

mod finish;
mod progress_worker;

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::downloader::{Downloader, ProgressSample};
use crate::job_db::{ClaimOutcome, JobDb, JobOutcome, JobRecord};
use crate::notify::NotificationBridge;
use crate::scheduler::progress::ProgressTracker;
use crate::storage::DownloadRoot;
use crate::transcode::TranscodeService;

use finish::finish_after_download;
use progress_worker::run_progress_loop;

/// Drives a single job from dequeue to a terminal status.
///
/// Cheap to share: workers hold it in an `Arc`, `claim` every id they pull
/// and `run` the jobs they won.
///
/// Once halted, no run records an outcome or sends a message: an abandoned
/// download may still be finishing on the blocking pool, but its result is
/// dropped and the job stays `running` for recovery.
pub struct JobExecutor {
    db: JobDb,
    root: DownloadRoot,
    downloader: Arc<dyn Downloader>,
    bridge: NotificationBridge,
    tracker: Arc<ProgressTracker>,
    transcoder: Option<TranscodeService>,
    halted: Arc<AtomicBool>,
}

impl JobExecutor {
    pub fn new(
        db: JobDb,
        root: DownloadRoot,
        downloader: Arc<dyn Downloader>,
        bridge: NotificationBridge,
        notify_step: f64,
    ) -> Self {
        Self {
            db,
            root,
            downloader,
            bridge,
            tracker: Arc::new(ProgressTracker::new(notify_step)),
            transcoder: None,
            halted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Hand completed manifests to `service` for background MP4 conversion.
    pub fn with_transcoder(mut self, service: TranscodeService) -> Self {
        self.transcoder = Some(service);
        self
    }

    pub fn db(&self) -> &JobDb {
        &self.db
    }

    pub fn transcoder(&self) -> Option<&TranscodeService> {
        self.transcoder.as_ref()
    }

    pub(crate) fn set_halted(&self, halted: bool) {
        self.halted.store(halted, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Claim then run. Convenience for callers that own the whole job.
    pub async fn execute(&self, job_id: &str) -> Result<()> {
        match self.claim(job_id).await? {
            Some(job) => self.run(job).await,
            None => Ok(()),
        }
    }

    /// Move the job from `pending` to `running`. `None` means another run
    /// owns it or it is gone; the caller must not touch it then.
    pub async fn claim(&self, job_id: &str) -> Result<Option<JobRecord>> {
        match self.db.claim_pending(job_id).await? {
            ClaimOutcome::Claimed(job) => Ok(Some(job)),
            ClaimOutcome::Missing => {
                tracing::debug!(job_id, "job disappeared before execution");
                Ok(None)
            }
            ClaimOutcome::NotPending(status) => {
                tracing::debug!(job_id, %status, "job not pending, skipping duplicate");
                Ok(None)
            }
        }
    }

    /// Run a claimed job. Returns `Ok` for every job outcome, including
    /// download failures; `Err` only for store faults, which the worker
    /// converts into a failed status.
    pub async fn run(&self, job: JobRecord) -> Result<()> {
        let result = self.run_claimed(&job).await;
        self.tracker.forget(&job.id);
        result
    }

    async fn run_claimed(&self, job: &JobRecord) -> Result<()> {
        let job_id = job.id.as_str();
        tracing::info!(job_id, url = %job.source_url, "job started");

        if self.bridge.notify_started(job).await {
            self.tracker.begin(job_id);
        }

        let (progress_tx, progress_rx) = mpsc::unbounded_channel::<f64>();
        // Dropped with this future, so an aborted run stops reporting too.
        let mut progress_task = JoinSet::new();
        progress_task.spawn(run_progress_loop(
            progress_rx,
            self.db.clone(),
            self.bridge.clone(),
            Arc::clone(&self.tracker),
            job.id.clone(),
            job.notification_chat_id.is_some(),
        ));

        let result = self.download(job, progress_tx).await;

        // Sender is gone with the blocking task; drain what it sent.
        if let Some(Err(e)) = progress_task.join_next().await {
            tracing::warn!(job_id, "progress task ended abnormally: {e}");
        }
        if self.is_halted() {
            tracing::warn!(job_id, "shutdown abandoned the job; outcome not recorded");
            return Ok(());
        }

        match result {
            Ok(outcome) => match self.db.mark_completed(job_id, &outcome).await? {
                Some(done) => {
                    tracing::info!(
                        job_id,
                        output_dir = %outcome.output_dir,
                        files = outcome.file_manifest.len(),
                        "job completed"
                    );
                    self.bridge.notify_success(&done).await;
                    if let Some(service) = &self.transcoder {
                        service.schedule_manifest(job_id, &done.file_manifest);
                    }
                }
                None => tracing::warn!(job_id, "job no longer running; completion not recorded"),
            },
            Err(message) => {
                tracing::warn!(job_id, "download failed: {message}");
                self.fail(job_id, &message).await?;
            }
        }
        Ok(())
    }

    /// Fetch and finalize on the blocking pool. Errors come back as the text
    /// to store on the job.
    async fn download(
        &self,
        job: &JobRecord,
        progress_tx: mpsc::UnboundedSender<f64>,
    ) -> std::result::Result<JobOutcome, String> {
        let root = self.root.clone();
        let downloader = Arc::clone(&self.downloader);
        let job_id = job.id.clone();
        let url = job.source_url.clone();
        let halted = Arc::clone(&self.halted);

        let task = tokio::task::spawn_blocking(move || -> Result<JobOutcome> {
            let working_dir = root.prepare_job_dir(&job_id)?;
            let hook = move |sample: ProgressSample| {
                if let Some(percent) = sample.percent() {
                    let _ = progress_tx.send(percent);
                }
            };
            let fetched = downloader.fetch(&url, &working_dir, &hook)?;
            if halted.load(Ordering::SeqCst) {
                bail!("abandoned at shutdown");
            }
            finish_after_download(&root, &job_id, &working_dir, fetched)
        });

        match task.await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(join) => Err(join_error_message(join)),
        }
    }

    /// Record a failure and send the failure message. Only the first terminal
    /// transition counts: a job that already finished is left alone, and
    /// nothing is recorded once the executor is halted.
    pub async fn fail(&self, job_id: &str, error: &str) -> Result<()> {
        if self.is_halted() {
            tracing::debug!(job_id, "halted; failure not recorded: {error}");
            return Ok(());
        }
        if let Some(failed) = self.db.mark_failed(job_id, error).await? {
            self.bridge.notify_failure(&failed, error).await;
        }
        Ok(())
    }
}

/// Error text for a task that panicked or was cancelled.
pub(crate) fn join_error_message(err: tokio::task::JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        if let Some(s) = payload.downcast_ref::<&str>() {
            return (*s).to_string();
        }
        if let Some(s) = payload.downcast_ref::<String>() {
            return s.clone();
        }
        return "job panicked".to_string();
    }
    "job task cancelled".to_string()
}
