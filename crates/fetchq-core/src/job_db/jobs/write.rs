//! Job write operations: create, claim, progress, terminal states, recovery, flags, delete.

use anyhow::{Context, Result};
use sqlx::Row;

use super::super::db::{clamp_progress, unix_timestamp, JobDb};
use super::super::types::{
    ClaimOutcome, DeleteOutcome, FlagsUpdate, JobId, JobOutcome, JobRecord, JobStatus, NewJob,
};
use super::read::fetch_job;

fn manifest_json(manifest: &[String]) -> Result<String> {
    serde_json::to_string(manifest).context("encode file_manifest")
}

impl JobDb {
    /// Insert a new pending job and return the stored record.
    pub async fn create_job(&self, new_job: &NewJob) -> Result<JobRecord> {
        let id: JobId = uuid::Uuid::new_v4().simple().to_string();
        let now = unix_timestamp();

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, source_url, status, progress, file_manifest,
                notification_chat_id, watched, starred, created_at, updated_at
            ) VALUES (?1, ?2, ?3, 0, '[]', ?4, 0, 0, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(&new_job.source_url)
        .bind(JobStatus::Pending.as_str())
        .bind(new_job.notification_chat_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        fetch_job(&self.pool, &id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("job {} missing right after insert", id))
    }

    /// Atomically move a pending job to running with progress 0.
    ///
    /// This is the executor's idempotency guard: a second claim of the same id
    /// (duplicate enqueue) sees `NotPending` and must not run the job again.
    /// The status check and the transition are one guarded `UPDATE`, so two
    /// workers racing on the same id can never both win.
    pub async fn claim_pending(&self, id: &str) -> Result<ClaimOutcome> {
        let now = unix_timestamp();
        let mut tx = self.begin_write().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'running',
                progress = 0,
                updated_at = ?1
            WHERE id = ?2 AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        let outcome = match fetch_job(&mut *tx, id).await? {
            Some(job) if claimed => ClaimOutcome::Claimed(job),
            Some(job) => ClaimOutcome::NotPending(job.status),
            None => ClaimOutcome::Missing,
        };
        tx.commit().await?;
        Ok(outcome)
    }

    /// Store the current progress of a running job (clamped into `[0, 100]`).
    /// Returns false if the job is gone or no longer running.
    pub async fn set_progress(&self, id: &str, percent: f64) -> Result<bool> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET progress = ?1,
                updated_at = ?2
            WHERE id = ?3 AND status = 'running'
            "#,
        )
        .bind(clamp_progress(percent))
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Remember the notification message to edit for later updates.
    pub async fn set_message_id(&self, id: &str, message_id: i64) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE jobs
            SET notification_message_id = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(message_id)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a successful run of a running job. Returns the updated record, or
    /// None if the job was deleted meanwhile or is not running.
    pub async fn mark_completed(&self, id: &str, outcome: &JobOutcome) -> Result<Option<JobRecord>> {
        let now = unix_timestamp();
        let manifest = manifest_json(&outcome.file_manifest)?;
        let mut tx = self.begin_write().await?;

        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed',
                progress = 100,
                title = ?1,
                output_dir = ?2,
                metadata_path = ?3,
                description_path = ?4,
                file_manifest = ?5,
                error = NULL,
                updated_at = ?6
            WHERE id = ?7 AND status = 'running'
            "#,
        )
        .bind(&outcome.title)
        .bind(&outcome.output_dir)
        .bind(&outcome.metadata_path)
        .bind(&outcome.description_path)
        .bind(manifest)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if r.rows_affected() == 0 {
            tx.commit().await?;
            return Ok(None);
        }

        let job = fetch_job(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(job)
    }

    /// Record a failed run of a running job with its error text. Pending jobs
    /// were never claimed and terminal jobs keep their status; None is
    /// returned in those cases and when the job is gone.
    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<Option<JobRecord>> {
        let now = unix_timestamp();
        let mut tx = self.begin_write().await?;

        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed',
                error = ?1,
                updated_at = ?2
            WHERE id = ?3 AND status = 'running'
            "#,
        )
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if r.rows_affected() == 0 {
            tx.commit().await?;
            return Ok(None);
        }

        let job = fetch_job(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(job)
    }

    /// Swap one manifest entry for another (e.g. after transcoding `a.webm` -> `a.mp4`).
    /// The rest of the manifest keeps its order; `new` is appended if not already present.
    pub async fn replace_manifest_entry(&self, id: &str, old: &str, new: &str) -> Result<bool> {
        let now = unix_timestamp();
        let mut tx = self.begin_write().await?;

        let Some(job) = fetch_job(&mut *tx, id).await? else {
            tx.commit().await?;
            return Ok(false);
        };
        let mut manifest: Vec<String> = job
            .file_manifest
            .into_iter()
            .filter(|entry| entry != old)
            .collect();
        if !manifest.iter().any(|entry| entry == new) {
            manifest.push(new.to_string());
        }

        sqlx::query(
            r#"
            UPDATE jobs
            SET file_manifest = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(manifest_json(&manifest)?)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Startup reconciliation: reset every `running` job to `pending` (clearing
    /// progress, output paths, manifest, and error, since partial artifacts are
    /// unreliable) and return the ids of all unfinished jobs, oldest first.
    pub async fn recover_incomplete_jobs(&self) -> Result<Vec<JobId>> {
        let now = unix_timestamp();
        let mut tx = self.begin_write().await?;

        let rows = sqlx::query(
            r#"
            SELECT id FROM jobs
            WHERE status IN ('pending', 'running')
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;
        let ids: Vec<JobId> = rows.iter().map(|row| row.get("id")).collect();

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending',
                progress = 0,
                output_dir = NULL,
                metadata_path = NULL,
                description_path = NULL,
                file_manifest = '[]',
                error = NULL,
                updated_at = ?1
            WHERE status = 'running'
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ids)
    }

    /// Update watched/starred. Starring also marks the job watched; unstarring
    /// leaves watched alone unless it is given explicitly.
    pub async fn set_flags(&self, id: &str, update: FlagsUpdate) -> Result<Option<JobRecord>> {
        let now = unix_timestamp();
        let mut tx = self.begin_write().await?;

        let Some(job) = fetch_job(&mut *tx, id).await? else {
            tx.commit().await?;
            return Ok(None);
        };

        let (watched, starred) = match update.starred {
            Some(true) => (true, true),
            Some(false) => (update.watched.unwrap_or(job.watched), false),
            None => (update.watched.unwrap_or(job.watched), job.starred),
        };

        sqlx::query(
            r#"
            UPDATE jobs
            SET watched = ?1,
                starred = ?2,
                updated_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(watched)
        .bind(starred)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let job = fetch_job(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(job)
    }

    /// Permanently remove a completed or failed job row.
    ///
    /// File cleanup is handled separately by higher layers (see `storage`).
    pub async fn delete_finished_job(&self, id: &str) -> Result<DeleteOutcome> {
        let mut tx = self.begin_write().await?;

        let Some(job) = fetch_job(&mut *tx, id).await? else {
            tx.commit().await?;
            return Ok(DeleteOutcome::NotFound);
        };
        if !job.status.is_finished() {
            tx.commit().await?;
            return Ok(DeleteOutcome::Active(job.status));
        }

        sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(DeleteOutcome::Deleted(job))
    }
}
