//! `fetchq run` – run the worker pool until Ctrl-C.

use anyhow::Result;
use fetchq_core::config::FetchqConfig;
use fetchq_core::downloader::YtDlpDownloader;
use fetchq_core::job_db::{JobDb, JobId, JobStatus};
use fetchq_core::notify::{NotificationBridge, Notifier, TelegramNotifier};
use fetchq_core::scheduler::{DownloadManager, JobExecutor};
use fetchq_core::storage::DownloadRoot;
use fetchq_core::transcode::{FfmpegTranscoder, TranscodeService};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// How often the store is checked for jobs added by `fetchq add`.
const PENDING_SWEEP_INTERVAL: Duration = Duration::from_secs(2);

pub async fn run_workers(db: JobDb, cfg: FetchqConfig) -> Result<()> {
    let root = DownloadRoot::open(&cfg.download_root)?;
    tracing::info!(path = %root.path().display(), "download root ready");

    let notifier: Option<Arc<dyn Notifier>> = match cfg.bot_token() {
        Some(token) => Some(Arc::new(TelegramNotifier::new(token))),
        None => {
            tracing::info!("telegram notifications disabled (no bot token)");
            None
        }
    };
    let bridge = NotificationBridge::new(
        notifier,
        db.clone(),
        cfg.telegram.base_external_url.clone(),
    );

    let mut executor = JobExecutor::new(
        db.clone(),
        root.clone(),
        Arc::new(YtDlpDownloader::new(cfg.yt_dlp_program.clone())),
        bridge,
        cfg.notifier_min_percent_step,
    );
    if cfg.transcode_to_mp4 {
        let transcoder = Arc::new(FfmpegTranscoder::new(cfg.ffmpeg_program.clone()));
        executor = executor.with_transcoder(TranscodeService::new(
            root.clone(),
            db.clone(),
            transcoder,
            cfg.transcode_workers,
        ));
    }

    let mut manager = DownloadManager::new(&cfg, executor);
    let recovered = manager.start().await?;
    if !recovered.is_empty() {
        println!("Requeued {} unfinished job(s)", recovered.len());
    }
    let mut queued: HashSet<JobId> = recovered.into_iter().collect();
    println!(
        "fetchq running with {} worker(s); press Ctrl-C to stop",
        cfg.max_concurrent_downloads
    );

    let mut sweep = tokio::time::interval(PENDING_SWEEP_INTERVAL);
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    tracing::warn!("ctrl-c handler failed: {e}");
                }
                break;
            }
            _ = sweep.tick() => {
                match db.list_by_status(&[JobStatus::Pending]).await {
                    Ok(jobs) => {
                        let pending: HashSet<JobId> = jobs.into_iter().map(|j| j.id).collect();
                        // Ids that left `pending` were picked up; forget them.
                        queued.retain(|id| pending.contains(id));
                        for id in pending {
                            if queued.insert(id.clone()) {
                                manager.enqueue(id);
                            }
                        }
                    }
                    Err(e) => tracing::warn!("pending sweep failed: {e:#}"),
                }
            }
        }
    }

    println!("Stopping (waiting up to {}s for running jobs)...", cfg.shutdown_grace_secs);
    let abandoned = manager.stop().await;
    if abandoned > 0 {
        println!("{abandoned} download(s) interrupted; they restart on the next run");
    }
    Ok(())
}
