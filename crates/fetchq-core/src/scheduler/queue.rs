//! In-memory FIFO of job ids shared by all workers.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use crate::job_db::JobId;

/// Unbounded, non-deduplicating queue. Not persisted: recovery rebuilds it
/// from the job store on startup.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<JobId>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<JobId>>>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    pub fn enqueue(&self, job_id: impl Into<JobId>) {
        let job_id = job_id.into();
        tracing::debug!(job_id = %job_id, "job queued");
        // The receiver lives as long as any clone of the queue.
        let _ = self.tx.send(job_id);
    }

    /// Next id, or `None` if nothing arrived within `wait`.
    pub async fn next(&self, wait: Duration) -> Option<JobId> {
        tokio::time::timeout(wait, async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        })
        .await
        .ok()
        .flatten()
    }
}
