//! `fetchq files <id>` – print a job's manifest.

use anyhow::{anyhow, Result};
use fetchq_core::job_db::JobDb;

pub async fn run_files(db: &JobDb, id: &str) -> Result<()> {
    let job = db
        .get_job(id)
        .await?
        .ok_or_else(|| anyhow!("job {id} not found"))?;
    if job.file_manifest.is_empty() {
        println!("No files recorded for job {id} ({}).", job.status);
        return Ok(());
    }
    for path in &job.file_manifest {
        println!("{path}");
    }
    Ok(())
}
