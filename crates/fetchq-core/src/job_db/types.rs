//! Types used by the job database.

use std::fmt;
use std::str::FromStr;

/// Job identifier (UUID v4, 32 lowercase hex characters).
pub type JobId = String;

/// Job lifecycle state stored as a string in the database.
///
/// Normal execution only moves forward (`Pending -> Running -> Completed|Failed`);
/// startup recovery is the only path from `Running` back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Decode a stored value. Unknown strings are treated as `Failed` so a
    /// corrupt row is never picked up again by recovery.
    pub fn from_db(s: &str) -> Self {
        s.parse().unwrap_or(JobStatus::Failed)
    }

    /// Completed or failed: the job will not run again on its own.
    pub fn is_finished(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Full job record.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: JobId,
    pub source_url: String,
    pub status: JobStatus,
    /// Always within `[0, 100]`.
    pub progress: f64,
    pub title: Option<String>,
    /// Relative to the download root.
    pub output_dir: Option<String>,
    pub metadata_path: Option<String>,
    pub description_path: Option<String>,
    pub file_manifest: Vec<String>,
    /// Present iff `status == Failed`.
    pub error: Option<String>,
    pub notification_chat_id: Option<i64>,
    pub notification_message_id: Option<i64>,
    pub watched: bool,
    pub starred: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for creating a job.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub source_url: String,
    pub notification_chat_id: Option<i64>,
}

/// Artifacts recorded when a job completes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobOutcome {
    pub title: Option<String>,
    pub output_dir: String,
    pub metadata_path: Option<String>,
    pub description_path: Option<String>,
    pub file_manifest: Vec<String>,
}

/// Optional filters for listing jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub watched: Option<bool>,
    pub starred: Option<bool>,
}

/// Watched/starred update. Starring implies watched.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagsUpdate {
    pub watched: Option<bool>,
    pub starred: Option<bool>,
}

/// Result of trying to move a job from `Pending` to `Running`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed(JobRecord),
    /// Row no longer exists (deleted concurrently).
    Missing,
    /// Row exists but was not pending (already claimed or finished).
    NotPending(JobStatus),
}

/// Result of deleting a job.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted(JobRecord),
    NotFound,
    /// Pending or running jobs cannot be deleted.
    Active(JobStatus),
}
