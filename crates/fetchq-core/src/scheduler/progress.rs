//! Throttled progress notifications.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::job_db::{clamp_progress, JobDb};
use crate::notify::NotificationBridge;

/// Per-job checkpoint: the last percentage a notification was sent for.
///
/// A job without a checkpoint is eligible on its first report. `begin`
/// seeds the checkpoint at 0 once the "started" message went out.
#[derive(Debug)]
pub struct ProgressTracker {
    step: f64,
    checkpoints: Mutex<HashMap<String, f64>>,
}

impl ProgressTracker {
    pub fn new(step: f64) -> Self {
        Self {
            step,
            checkpoints: Mutex::new(HashMap::new()),
        }
    }

    pub fn begin(&self, job_id: &str) {
        self.checkpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id.to_string(), 0.0);
    }

    /// True when `percent` is at least one step above the checkpoint; the
    /// checkpoint then moves to `percent`. Lower values never move it back.
    pub fn should_notify(&self, job_id: &str, percent: f64) -> bool {
        let mut checkpoints = self
            .checkpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let last = checkpoints
            .get(job_id)
            .copied()
            .unwrap_or(f64::NEG_INFINITY);
        if percent - last >= self.step {
            checkpoints.insert(job_id.to_string(), percent);
            true
        } else {
            false
        }
    }

    pub fn forget(&self, job_id: &str) {
        self.checkpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job_id);
    }

    /// Persist a progress report and push a notification when due.
    pub async fn update(
        &self,
        db: &JobDb,
        bridge: &NotificationBridge,
        job_id: &str,
        chat_bound: bool,
        percent: f64,
    ) {
        if percent.is_nan() {
            return;
        }
        let percent = clamp_progress(percent);
        if let Err(e) = db.set_progress(job_id, percent).await {
            tracing::warn!(job_id, "progress update failed: {e:#}");
        }
        if chat_bound && bridge.is_enabled() && self.should_notify(job_id, percent) {
            bridge.notify_progress(job_id, percent).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttles_after_started_seed() {
        let t = ProgressTracker::new(10.0);
        t.begin("j");
        let fired: Vec<f64> = [0.0, 3.0, 11.0, 11.0, 25.0]
            .into_iter()
            .filter(|p| t.should_notify("j", *p))
            .collect();
        assert_eq!(fired, vec![11.0, 25.0]);
    }

    #[test]
    fn first_report_eligible_without_seed() {
        let t = ProgressTracker::new(10.0);
        assert!(t.should_notify("j", 0.0));
        assert!(!t.should_notify("j", 5.0));
    }

    #[test]
    fn lower_values_do_not_reset_checkpoint() {
        let t = ProgressTracker::new(10.0);
        t.begin("j");
        assert!(t.should_notify("j", 50.0));
        assert!(!t.should_notify("j", 20.0));
        assert!(!t.should_notify("j", 55.0));
        assert!(t.should_notify("j", 60.0));
    }

    #[test]
    fn forget_drops_checkpoint() {
        let t = ProgressTracker::new(10.0);
        t.begin("j");
        assert!(!t.should_notify("j", 5.0));
        t.forget("j");
        assert!(t.should_notify("j", 5.0));
    }

    #[tokio::test]
    async fn update_persists_clamped_progress_without_notifier() {
        use crate::job_db::db::open_memory;
        use crate::job_db::NewJob;

        let db = open_memory().await.unwrap();
        let job = db
            .create_job(&NewJob {
                source_url: "https://a.example/1".to_string(),
                notification_chat_id: None,
            })
            .await
            .unwrap();
        db.claim_pending(&job.id).await.unwrap();
        let bridge = NotificationBridge::new(None, db.clone(), None);
        let t = ProgressTracker::new(10.0);

        t.update(&db, &bridge, &job.id, false, 140.0).await;
        assert_eq!(db.get_job(&job.id).await.unwrap().unwrap().progress, 100.0);
        t.update(&db, &bridge, &job.id, false, f64::NAN).await;
        assert_eq!(db.get_job(&job.id).await.unwrap().unwrap().progress, 100.0);
    }
}
