//! Shared fixtures for integration tests: fake downloader, recording
//! notifier, fake transcoder, and a fresh store + root per test.

#![allow(dead_code)]

use async_trait::async_trait;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fetchq_core::downloader::{DownloadError, Downloader, FetchOutput, ProgressHook, ProgressSample};
use fetchq_core::job_db::{JobDb, JobRecord, JobStatus};
use fetchq_core::metadata::MetaValue;
use fetchq_core::notify::{NotificationError, Notifier};
use fetchq_core::storage::DownloadRoot;
use fetchq_core::transcode::{TranscodeError, Transcoder};
use tempfile::TempDir;

pub struct Env {
    pub db: JobDb,
    pub root: DownloadRoot,
    _state: TempDir,
    _downloads: TempDir,
}

pub async fn env() -> Env {
    let state = tempfile::tempdir().unwrap();
    let downloads = tempfile::tempdir().unwrap();
    let db = JobDb::open_at(state.path().join("jobs.db")).await.unwrap();
    let root = DownloadRoot::open(downloads.path()).unwrap();
    Env {
        db,
        root,
        _state: state,
        _downloads: downloads,
    }
}

/// What the fake downloader does for every fetch.
#[derive(Default)]
pub struct FakeDownloader {
    pub title: Option<String>,
    /// Percentages reported through the hook, in order.
    pub percents: Vec<u64>,
    pub fail_with: Option<String>,
    pub panic_with: Option<String>,
    /// When set, fetch blocks until the flag turns true.
    pub hold: Option<Arc<AtomicBool>>,
    pub calls: AtomicUsize,
}

impl FakeDownloader {
    pub fn titled(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Downloader for FakeDownloader {
    fn fetch(
        &self,
        url: &str,
        working_dir: &Path,
        progress: ProgressHook<'_>,
    ) -> Result<FetchOutput, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hold) = &self.hold {
            while !hold.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(20));
            }
        }
        if let Some(message) = &self.panic_with {
            panic!("{}", message);
        }
        for pct in &self.percents {
            progress(ProgressSample {
                downloaded_bytes: *pct,
                total_bytes: Some(100),
                total_bytes_estimate: None,
            });
        }
        if let Some(message) = &self.fail_with {
            return Err(DownloadError::new(message.clone()));
        }

        fs::write(working_dir.join("clip_x1.webm"), b"video").unwrap();
        let json = serde_json::json!({
            "title": self.title,
            "webpage_url": url,
            "description": "A description",
            "thumbnails": [
                {"id": "0", "url": "https://img.example/0.jpg"},
                {"id": "0", "url": "https://img.example/0.jpg"},
                {"id": "1", "url": "https://img.example/1.jpg"}
            ]
        });
        let metadata = MetaValue::from(json);
        Ok(FetchOutput {
            title: self.title.clone(),
            description: metadata.text_field("description").map(str::to_string),
            metadata,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Send { chat_id: i64, text: String },
    Edit { chat_id: i64, message_id: i64, text: String },
}

impl Sent {
    pub fn text(&self) -> &str {
        match self {
            Sent::Send { text, .. } | Sent::Edit { text, .. } => text,
        }
    }
}

/// Records every call; `send_message` hands out message id 100.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.text().to_string())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
    ) -> Result<Option<i64>, NotificationError> {
        self.sent.lock().unwrap().push(Sent::Send {
            chat_id,
            text: text.to_string(),
        });
        Ok(Some(100))
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(Sent::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Copies the source to the destination.
pub struct CopyTranscoder;

impl Transcoder for CopyTranscoder {
    fn transcode(&self, source: &Path, destination: &Path) -> Result<(), TranscodeError> {
        fs::copy(source, destination).map_err(TranscodeError::Spawn)?;
        Ok(())
    }
}

/// Poll until `job_id` reaches `status` (or panic after `timeout`).
pub async fn wait_for_status(
    db: &JobDb,
    job_id: &str,
    status: JobStatus,
    timeout: Duration,
) -> JobRecord {
    let started = Instant::now();
    loop {
        let job = db.get_job(job_id).await.unwrap().expect("job exists");
        if job.status == status {
            return job;
        }
        assert!(
            started.elapsed() < timeout,
            "job {job_id} stuck in {} waiting for {status}",
            job.status
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
