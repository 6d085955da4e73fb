//! `fetchq remove <id>` – delete a finished job and its files.

use anyhow::{anyhow, bail, Result};
use fetchq_core::config::FetchqConfig;
use fetchq_core::job_db::{DeleteOutcome, JobDb};
use fetchq_core::storage::DownloadRoot;

/// Only completed or failed jobs can be removed. Files are deleted first,
/// through the download root so nothing outside it is touched.
pub async fn run_remove(db: &JobDb, cfg: &FetchqConfig, id: &str) -> Result<()> {
    let job = db
        .get_job(id)
        .await?
        .ok_or_else(|| anyhow!("job {id} not found"))?;
    if !job.status.is_finished() {
        bail!(
            "job {id} is {}; only completed or failed jobs can be removed",
            job.status
        );
    }

    let root = DownloadRoot::open(&cfg.download_root)?;
    root.remove_job_artifacts(&job)?;

    match db.delete_finished_job(id).await? {
        DeleteOutcome::Deleted(_) => println!("Removed job {id}"),
        DeleteOutcome::NotFound => bail!("job {id} not found"),
        DeleteOutcome::Active(status) => bail!("job {id} became {status}; not removed"),
    }
    Ok(())
}
