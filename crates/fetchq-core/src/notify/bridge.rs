//! Job events → channel messages.

use std::sync::Arc;

use super::Notifier;
use crate::job_db::{JobDb, JobRecord};

pub fn started_text(source_url: &str) -> String {
    format!("Queued download: {source_url}")
}

pub fn progress_text(percent: f64, job: &JobRecord) -> String {
    format!(
        "Download update ({:.0}%): {}",
        percent,
        job.title.as_deref().unwrap_or(&job.source_url)
    )
}

/// Success text; the files link is only added when the job has an output dir.
pub fn success_text(job: &JobRecord, base_external_url: Option<&str>) -> String {
    let mut text = format!(
        "✅ Download complete: {}",
        job.title.as_deref().unwrap_or(&job.source_url)
    );
    if let Some(dir) = job.output_dir.as_deref() {
        let base = base_external_url.unwrap_or("").trim_end_matches('/');
        text.push_str(&format!("\nFiles: {base}/downloads/{dir}"));
    }
    text
}

pub fn failure_text(source_url: &str, error: &str) -> String {
    format!("❌ Download failed: {source_url}\n{error}")
}

/// Best-effort delivery of job lifecycle messages.
///
/// Disabled (every call a no-op) when no notifier is configured. Jobs
/// without a bound chat never produce messages. The first message sent for
/// a job stores its id; later messages edit that message instead.
#[derive(Clone)]
pub struct NotificationBridge {
    notifier: Option<Arc<dyn Notifier>>,
    db: JobDb,
    base_external_url: Option<String>,
}

impl NotificationBridge {
    pub fn new(
        notifier: Option<Arc<dyn Notifier>>,
        db: JobDb,
        base_external_url: Option<String>,
    ) -> Self {
        Self {
            notifier,
            db,
            base_external_url,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.notifier.is_some()
    }

    /// Send the "started" message. Returns true if a send was attempted.
    pub async fn notify_started(&self, job: &JobRecord) -> bool {
        let (Some(notifier), Some(chat_id)) = (&self.notifier, job.notification_chat_id) else {
            return false;
        };
        match notifier.send_message(chat_id, &started_text(&job.source_url)).await {
            Ok(Some(message_id)) => self.store_message_id(&job.id, message_id).await,
            Ok(None) => {}
            Err(e) => tracing::warn!(job_id = %job.id, "started notification failed: {e}"),
        }
        true
    }

    /// Progress message. The record is re-read so a message id stored by an
    /// earlier send is reused.
    pub async fn notify_progress(&self, job_id: &str, percent: f64) {
        if self.notifier.is_none() {
            return;
        }
        let job = match self.db.get_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(job_id, "progress notification skipped: {e:#}");
                return;
            }
        };
        let text = progress_text(percent, &job);
        self.deliver(&job, &text).await;
    }

    pub async fn notify_success(&self, job: &JobRecord) {
        let text = success_text(job, self.base_external_url.as_deref());
        self.deliver(job, &text).await;
    }

    pub async fn notify_failure(&self, job: &JobRecord, error: &str) {
        let text = failure_text(&job.source_url, error);
        self.deliver(job, &text).await;
    }

    /// Edit the job's message if it has one, else send a new one.
    async fn deliver(&self, job: &JobRecord, text: &str) {
        let (Some(notifier), Some(chat_id)) = (&self.notifier, job.notification_chat_id) else {
            return;
        };
        match job.notification_message_id {
            Some(message_id) => {
                if let Err(e) = notifier.edit_message(chat_id, message_id, text).await {
                    tracing::warn!(job_id = %job.id, "notification edit failed: {e}");
                }
            }
            None => match notifier.send_message(chat_id, text).await {
                Ok(Some(message_id)) => self.store_message_id(&job.id, message_id).await,
                Ok(None) => {}
                Err(e) => tracing::warn!(job_id = %job.id, "notification send failed: {e}"),
            },
        }
    }

    async fn store_message_id(&self, job_id: &str, message_id: i64) {
        if let Err(e) = self.db.set_message_id(job_id, message_id).await {
            tracing::warn!(job_id, "could not store notification message id: {e:#}");
        }
    }
}
