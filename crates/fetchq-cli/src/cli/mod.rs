//! CLI for the fetchq download queue.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fetchq_core::config::{self, FetchqConfig};
use fetchq_core::job_db::{JobDb, JobStatus};

use commands::{run_add, run_files, run_flags, run_remove, run_status, run_workers};

/// Top-level CLI for the fetchq download queue.
#[derive(Debug, Parser)]
#[command(name = "fetchq")]
#[command(about = "fetchq: media download queue with crash recovery", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a new download.
    Add {
        /// Source page or media URL.
        url: String,
        /// Telegram chat to notify about this job.
        #[arg(long, value_name = "ID", allow_negative_numbers = true)]
        chat_id: Option<i64>,
    },

    /// Run the worker pool until Ctrl-C.
    Run,

    /// List jobs, newest first.
    Status {
        /// Only jobs in this state (pending, running, completed, failed).
        #[arg(long)]
        status: Option<JobStatus>,
        #[arg(long, value_name = "BOOL")]
        watched: Option<bool>,
        #[arg(long, value_name = "BOOL")]
        starred: Option<bool>,
    },

    /// Print the files produced by a job.
    Files {
        /// Job identifier.
        id: String,
    },

    /// Set the watched/starred flags of a job. Starring also marks it watched.
    Flags {
        /// Job identifier.
        id: String,
        #[arg(long, value_name = "BOOL")]
        watched: Option<bool>,
        #[arg(long, value_name = "BOOL")]
        starred: Option<bool>,
    },

    /// Remove a finished job and delete its files.
    Remove {
        /// Job identifier.
        id: String,
    },
}

async fn open_db(cfg: &FetchqConfig) -> Result<JobDb> {
    match &cfg.database_path {
        Some(path) => JobDb::open_at(path).await,
        None => JobDb::open_default().await,
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let db = open_db(&cfg).await?;

        match cli.command {
            CliCommand::Add { url, chat_id } => run_add(&db, &cfg, &url, chat_id).await?,
            CliCommand::Run => run_workers(db, cfg).await?,
            CliCommand::Status {
                status,
                watched,
                starred,
            } => run_status(&db, status, watched, starred).await?,
            CliCommand::Files { id } => run_files(&db, &id).await?,
            CliCommand::Flags {
                id,
                watched,
                starred,
            } => run_flags(&db, &id, watched, starred).await?,
            CliCommand::Remove { id } => run_remove(&db, &cfg, &id).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
