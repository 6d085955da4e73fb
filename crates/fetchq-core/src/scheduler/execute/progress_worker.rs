//! Async side of the progress channel: persist and notify.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::job_db::{JobDb, JobId};
use crate::notify::NotificationBridge;
use crate::scheduler::progress::ProgressTracker;

/// Drain percentages sent from the blocking download thread. Ends when the
/// sender is dropped; spawn with `tokio::spawn` and await before recording
/// the job's terminal status.
pub(super) async fn run_progress_loop(
    mut progress_rx: mpsc::UnboundedReceiver<f64>,
    db: JobDb,
    bridge: NotificationBridge,
    tracker: Arc<ProgressTracker>,
    job_id: JobId,
    chat_bound: bool,
) {
    while let Some(percent) = progress_rx.recv().await {
        tracker
            .update(&db, &bridge, &job_id, chat_bound, percent)
            .await;
    }
}
