//! Background MP4 transcoding of finished downloads.
//!
//! `TranscodeService::schedule_manifest` is fire-and-forget: each eligible
//! manifest entry becomes a task bounded by a semaphore. A successful
//! conversion deletes the source file and swaps the manifest entry; a
//! failure only logs and removes the partial output.

use std::collections::HashSet;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::job_db::JobDb;
use crate::storage::DownloadRoot;

/// Extensions (lowercase, with dot) that get converted to `.mp4`.
pub const VIDEO_EXTENSIONS: &[&str] = &[".webm", ".mkv", ".mov", ".avi", ".flv", ".ts", ".m4v"];

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("could not start transcoder: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("transcoder failed: {stderr}")]
    Failed { stderr: String },
}

/// Blocking conversion of one file. Called on the blocking pool.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, source: &Path, destination: &Path) -> Result<(), TranscodeError>;
}

/// `ffmpeg -y -i <src> -c:v libx264 -c:a aac -movflags +faststart <dst>`.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: String,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, source: &Path, destination: &Path) -> Result<(), TranscodeError> {
        let output = Command::new(&self.program)
            .arg("-y")
            .arg("-i")
            .arg(source)
            .args(["-c:v", "libx264", "-c:a", "aac", "-movflags", "+faststart"])
            .arg(destination)
            .stdin(Stdio::null())
            .output()
            .map_err(TranscodeError::Spawn)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(TranscodeError::Failed {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// True if the entry's extension is one of `VIDEO_EXTENSIONS` (any case).
pub fn needs_transcode(relative_path: &str) -> bool {
    Path::new(relative_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.as_str()))
}

struct Inner {
    root: DownloadRoot,
    db: JobDb,
    transcoder: Arc<dyn Transcoder>,
    permits: Arc<Semaphore>,
    in_flight: Mutex<HashSet<String>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Bounded background transcoding pool, independent of the download workers.
#[derive(Clone)]
pub struct TranscodeService {
    inner: Arc<Inner>,
}

impl TranscodeService {
    pub fn new(
        root: DownloadRoot,
        db: JobDb,
        transcoder: Arc<dyn Transcoder>,
        workers: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                root,
                db,
                transcoder,
                permits: Arc::new(Semaphore::new(workers.max(1))),
                in_flight: Mutex::new(HashSet::new()),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Queue every eligible entry. Entries already being converted are skipped.
    /// Must be called from within the tokio runtime.
    pub fn schedule_manifest(&self, job_id: &str, manifest: &[String]) {
        for entry in manifest {
            let relative = entry.trim();
            if relative.is_empty() || !needs_transcode(relative) {
                continue;
            }
            if !self.inner.claim(relative) {
                tracing::debug!(job_id, path = relative, "transcode already in flight");
                continue;
            }

            let inner = Arc::clone(&self.inner);
            let job_id = job_id.to_string();
            let relative = relative.to_string();
            let handle = tokio::spawn(async move {
                if let Ok(_permit) = Arc::clone(&inner.permits).acquire_owned().await {
                    inner.transcode_entry(&job_id, &relative).await;
                }
                inner.release(&relative);
            });

            let mut tasks = self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            tasks.retain(|t| !t.is_finished());
            tasks.push(handle);
        }
    }

    /// Number of entries queued or converting.
    pub fn in_flight(&self) -> usize {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Wait for every scheduled conversion to finish.
    pub async fn shutdown(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut guard = self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("transcode task ended abnormally: {e}");
            }
        }
    }
}

impl Inner {
    fn claim(&self, relative: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(relative.to_string())
    }

    fn release(&self, relative: &str) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(relative);
    }

    async fn transcode_entry(&self, job_id: &str, relative: &str) {
        let source = match self.root.resolve(relative) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(job_id, "refusing to transcode: {e}");
                return;
            }
        };
        if !source.is_file() {
            tracing::warn!(job_id, path = %source.display(), "source missing for transcode");
            return;
        }
        let destination = source.with_extension("mp4");
        let new_relative = match self.root.relative(&destination) {
            Ok(rel) => rel,
            Err(e) => {
                tracing::warn!(job_id, "refusing to transcode: {e}");
                return;
            }
        };

        let result = {
            let transcoder = Arc::clone(&self.transcoder);
            let source = source.clone();
            let destination = destination.clone();
            tokio::task::spawn_blocking(move || transcoder.transcode(&source, &destination)).await
        };
        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(e) => Some(format!("transcode task: {e}")),
        };
        if let Some(message) = failure {
            tracing::error!(job_id, path = %source.display(), "transcode failed: {message}");
            if let Err(e) = tokio::fs::remove_file(&destination).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %destination.display(), "could not remove partial output: {e}");
                }
            }
            return;
        }

        if let Err(e) = tokio::fs::remove_file(&source).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %source.display(), "could not remove transcode source: {e}");
            }
        }
        match self
            .db
            .replace_manifest_entry(job_id, relative, &new_relative)
            .await
        {
            Ok(true) => tracing::info!(job_id, "transcoded {relative} -> {new_relative}"),
            Ok(false) => tracing::debug!(job_id, "job gone before manifest update"),
            Err(e) => tracing::warn!(job_id, "manifest update after transcode failed: {e:#}"),
        }
    }
}
