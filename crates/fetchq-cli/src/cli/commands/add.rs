//! `fetchq add <url>` – queue a new download.

use anyhow::{bail, Result};
use fetchq_core::config::FetchqConfig;
use fetchq_core::job_db::{JobDb, NewJob};
use fetchq_core::url_policy::is_url_allowed;

pub async fn run_add(
    db: &JobDb,
    cfg: &FetchqConfig,
    url: &str,
    chat_id: Option<i64>,
) -> Result<()> {
    let url = url.trim();
    if url.is_empty() {
        bail!("URL must not be empty");
    }
    if !is_url_allowed(url, &cfg.allowed_source_domains) {
        bail!("URL domain is not allowed by configuration: {url}");
    }
    if let Some(existing) = db.find_by_url(url).await? {
        bail!(
            "job {} already exists for this URL ({})",
            existing.id,
            existing.status
        );
    }

    let job = db
        .create_job(&NewJob {
            source_url: url.to_string(),
            notification_chat_id: chat_id,
        })
        .await?;
    println!("Added job {} for URL: {url}", job.id);
    Ok(())
}
