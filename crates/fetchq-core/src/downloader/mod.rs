//! Downloader capability.
//!
//! A `Downloader` fetches one source URL into a working directory, reporting
//! byte progress through a callback, and returns the raw metadata tree. It is
//! blocking: the scheduler always calls it from `spawn_blocking`.

mod ytdlp;

use std::path::Path;

use crate::metadata::MetaValue;

pub use ytdlp::YtDlpDownloader;

/// One progress report from the downloader.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressSample {
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<u64>,
}

impl ProgressSample {
    /// Percentage in `[0, 100]`, or `None` when nothing was downloaded yet
    /// or the total is unknown. Exact totals win over estimates.
    pub fn percent(&self) -> Option<f64> {
        if self.downloaded_bytes == 0 {
            return None;
        }
        let total = self
            .total_bytes
            .filter(|t| *t > 0)
            .or(self.total_bytes_estimate.filter(|t| *t > 0))?;
        let pct = self.downloaded_bytes as f64 / total as f64 * 100.0;
        Some(pct.clamp(0.0, 100.0))
    }
}

/// What a successful fetch hands back.
#[derive(Debug, Clone)]
pub struct FetchOutput {
    pub title: Option<String>,
    pub metadata: MetaValue,
    pub description: Option<String>,
}

/// Downloader failure. The message ends up verbatim in the job's `error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DownloadError {
    pub message: String,
}

impl DownloadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Progress callback handed to `Downloader::fetch`. Called from the blocking thread.
pub type ProgressHook<'a> = &'a (dyn Fn(ProgressSample) + Send + Sync);

pub trait Downloader: Send + Sync {
    /// Fetch `url` into `working_dir` (which exists and is empty).
    fn fetch(
        &self,
        url: &str,
        working_dir: &Path,
        progress: ProgressHook<'_>,
    ) -> Result<FetchOutput, DownloadError>;
}
