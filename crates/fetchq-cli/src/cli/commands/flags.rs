//! `fetchq flags <id>` – update watched/starred.

use anyhow::{anyhow, bail, Result};
use fetchq_core::job_db::{FlagsUpdate, JobDb};

pub async fn run_flags(
    db: &JobDb,
    id: &str,
    watched: Option<bool>,
    starred: Option<bool>,
) -> Result<()> {
    if watched.is_none() && starred.is_none() {
        bail!("nothing to change: pass --watched and/or --starred");
    }
    let job = db
        .set_flags(id, FlagsUpdate { watched, starred })
        .await?
        .ok_or_else(|| anyhow!("job {id} not found"))?;
    println!(
        "Job {}: watched={} starred={}",
        job.id, job.watched, job.starred
    );
    Ok(())
}
