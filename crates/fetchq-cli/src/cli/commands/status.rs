//! `fetchq status` – list jobs.

use anyhow::Result;
use fetchq_core::job_db::{JobDb, JobFilter, JobRecord, JobStatus};

fn flags_column(job: &JobRecord) -> String {
    let mut flags = String::new();
    if job.watched {
        flags.push('W');
    }
    if job.starred {
        flags.push('*');
    }
    if flags.is_empty() {
        flags.push('-');
    }
    flags
}

pub async fn run_status(
    db: &JobDb,
    status: Option<JobStatus>,
    watched: Option<bool>,
    starred: Option<bool>,
) -> Result<()> {
    let jobs = db
        .list_jobs(&JobFilter {
            status,
            watched,
            starred,
        })
        .await?;
    if jobs.is_empty() {
        println!("No jobs in database.");
        return Ok(());
    }

    println!(
        "{:<32} {:<10} {:>6} {:<5} {}",
        "ID", "STATUS", "PROG", "FLAGS", "TITLE / URL"
    );
    for j in jobs {
        println!(
            "{:<32} {:<10} {:>5.1}% {:<5} {}",
            j.id,
            j.status.as_str(),
            j.progress,
            flags_column(&j),
            j.title.as_deref().unwrap_or(&j.source_url)
        );
        if let Some(err) = &j.error {
            println!("{:<32} error: {}", "", err.lines().next().unwrap_or(""));
        }
    }
    Ok(())
}
