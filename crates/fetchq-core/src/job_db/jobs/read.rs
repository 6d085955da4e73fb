//! Job read operations: get, find, list.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};

use super::super::db::JobDb;
use super::super::types::{JobFilter, JobRecord, JobStatus};

pub(crate) const JOB_COLUMNS: &str = r#"
    id, source_url, status, progress, title, output_dir, metadata_path,
    description_path, file_manifest, error, notification_chat_id,
    notification_message_id, watched, starred, created_at, updated_at
"#;

pub(crate) fn job_from_row(row: &SqliteRow) -> Result<JobRecord> {
    let status: String = row.get("status");
    let manifest_json: String = row.get("file_manifest");
    let file_manifest: Vec<String> = if manifest_json.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&manifest_json).context("decode file_manifest")?
    };

    Ok(JobRecord {
        id: row.get("id"),
        source_url: row.get("source_url"),
        status: JobStatus::from_db(&status),
        progress: row.get("progress"),
        title: row.get("title"),
        output_dir: row.get("output_dir"),
        metadata_path: row.get("metadata_path"),
        description_path: row.get("description_path"),
        file_manifest,
        error: row.get("error"),
        notification_chat_id: row.get("notification_chat_id"),
        notification_message_id: row.get("notification_message_id"),
        watched: row.get("watched"),
        starred: row.get("starred"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Fetch one job through any executor (pool or open transaction).
pub(crate) async fn fetch_job<'e, E>(executor: E, id: &str) -> Result<Option<JobRecord>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(job_from_row).transpose()
}

impl JobDb {
    /// Fetch a single job, or None if it does not exist.
    pub async fn get_job(&self, id: &str) -> Result<Option<JobRecord>> {
        fetch_job(&self.pool, id).await
    }

    /// First job created for exactly this source URL (duplicate detection).
    pub async fn find_by_url(&self, source_url: &str) -> Result<Option<JobRecord>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE source_url = ?1 ORDER BY created_at ASC, rowid ASC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(source_url)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    /// List jobs matching `filter`, newest first.
    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<JobRecord>> {
        let mut conditions = Vec::new();
        if filter.status.is_some() {
            conditions.push("status = ?");
        }
        if filter.watched.is_some() {
            conditions.push("watched = ?");
        }
        if filter.starred.is_some() {
            conditions.push("starred = ?");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs {where_clause} ORDER BY created_at DESC, rowid DESC"
        );

        let mut query = sqlx::query(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(watched) = filter.watched {
            query = query.bind(watched);
        }
        if let Some(starred) = filter.starred {
            query = query.bind(starred);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(job_from_row).collect()
    }

    /// List jobs whose status is in `statuses`, oldest first (submission order).
    pub async fn list_by_status(&self, statuses: &[JobStatus]) -> Result<Vec<JobRecord>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status IN ({placeholders}) ORDER BY created_at ASC, rowid ASC"
        );
        let mut query = sqlx::query(&sql);
        for status in statuses {
            query = query.bind(status.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(job_from_row).collect()
    }
}
