//! Startup reconciliation of the job store.

use anyhow::Result;

use crate::job_db::{JobDb, JobId};

/// Reset jobs orphaned in `running` back to `pending` (clearing partial
/// results) and return every unfinished job id, oldest first, for requeueing.
/// Must run before any worker starts.
pub async fn reconcile(db: &JobDb) -> Result<Vec<JobId>> {
    let ids = db.recover_incomplete_jobs().await?;
    if ids.is_empty() {
        tracing::debug!("no incomplete jobs to recover");
    } else {
        tracing::info!("requeued {} incomplete job(s)", ids.len());
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_db::db::open_memory;
    use crate::job_db::{JobStatus, NewJob};

    #[tokio::test]
    async fn reconcile_returns_pending_and_reset_running() {
        let db = open_memory().await.unwrap();
        let new = |url: &str| NewJob {
            source_url: url.to_string(),
            notification_chat_id: None,
        };
        let a = db.create_job(&new("https://a.example/1")).await.unwrap();
        let b = db.create_job(&new("https://a.example/2")).await.unwrap();
        db.claim_pending(&b.id).await.unwrap();
        db.set_progress(&b.id, 60.0).await.unwrap();
        let c = db.create_job(&new("https://a.example/3")).await.unwrap();
        db.claim_pending(&c.id).await.unwrap();
        db.mark_failed(&c.id, "boom").await.unwrap();

        let ids = reconcile(&db).await.unwrap();
        assert_eq!(ids, vec![a.id.clone(), b.id.clone()]);
        let b = db.get_job(&b.id).await.unwrap().unwrap();
        assert_eq!(b.status, JobStatus::Pending);
        assert_eq!(b.progress, 0.0);

        // Idempotent: a second pass finds the same work, nothing running.
        assert_eq!(reconcile(&db).await.unwrap().len(), 2);
    }
}
