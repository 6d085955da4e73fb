//! `yt-dlp` subprocess downloader.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use super::{DownloadError, Downloader, FetchOutput, ProgressHook, ProgressSample};
use crate::metadata::MetaValue;

/// Marker at the start of every progress line we ask yt-dlp to print.
const PROGRESS_PREFIX: &str = "fetchq-progress";

/// Output template relative to the working directory.
const OUTPUT_TEMPLATE: &str = "%(title).200B_%(id)s.%(ext)s";

/// Runs the configured `yt-dlp` executable once per fetch.
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    program: String,
}

impl YtDlpDownloader {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(url: &str, working_dir: &Path) -> Vec<String> {
        let template = format!(
            "download:{PROGRESS_PREFIX} %(progress.downloaded_bytes)s \
             %(progress.total_bytes)s %(progress.total_bytes_estimate)s"
        );
        vec![
            "--paths".to_string(),
            working_dir.to_string_lossy().into_owned(),
            "--output".to_string(),
            OUTPUT_TEMPLATE.to_string(),
            "--write-description".to_string(),
            "--write-subs".to_string(),
            "--write-auto-subs".to_string(),
            "--write-all-thumbnails".to_string(),
            "--dump-single-json".to_string(),
            "--no-simulate".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            template,
            "--no-color".to_string(),
            "--".to_string(),
            url.to_string(),
        ]
    }
}

impl Downloader for YtDlpDownloader {
    fn fetch(
        &self,
        url: &str,
        working_dir: &Path,
        progress: ProgressHook<'_>,
    ) -> Result<FetchOutput, DownloadError> {
        tracing::debug!(program = %self.program, url, "starting yt-dlp");
        let mut child = Command::new(&self.program)
            .args(Self::args(url, working_dir))
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DownloadError::new(format!("{} not found", self.program))
                } else {
                    DownloadError::new(format!("{} could not start: {e}", self.program))
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::new("yt-dlp stdout pipe missing"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::new("yt-dlp stderr pipe missing"))?;

        // Progress may arrive on either stream; stderr also carries the error text.
        let (json_doc, stderr_lines) = thread::scope(|scope| {
            let stderr_handle = scope.spawn(|| {
                let mut lines = Vec::new();
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    match parse_progress_line(&line) {
                        Some(sample) => progress(sample),
                        None => lines.push(line),
                    }
                }
                lines
            });

            let mut json_doc = None;
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if let Some(sample) = parse_progress_line(&line) {
                    progress(sample);
                } else if line.trim_start().starts_with('{') {
                    json_doc = Some(line);
                }
            }
            (json_doc, stderr_handle.join().unwrap_or_default())
        });

        let status = child
            .wait()
            .map_err(|e| DownloadError::new(format!("{} failed while running: {e}", self.program)))?;
        if !status.success() {
            let text = stderr_lines.join("\n");
            let text = text.trim();
            return Err(DownloadError::new(if text.is_empty() {
                "unknown error".to_string()
            } else {
                text.to_string()
            }));
        }

        let json_doc = json_doc.ok_or_else(|| DownloadError::new("yt-dlp produced no metadata"))?;
        let metadata = MetaValue::from_json_str(&json_doc)
            .map_err(|e| DownloadError::new(format!("invalid yt-dlp metadata: {e}")))?;
        Ok(FetchOutput {
            title: metadata.text_field("title").map(str::to_string),
            description: metadata.text_field("description").map(str::to_string),
            metadata,
        })
    }
}

/// Parse one `fetchq-progress <downloaded> <total> <estimate>` line.
/// yt-dlp prints `NA` for unknown fields and floats for estimates.
fn parse_progress_line(line: &str) -> Option<ProgressSample> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.split_whitespace().map(parse_byte_count);
    let downloaded_bytes = fields.next()?.unwrap_or(0);
    let total_bytes = fields.next().flatten();
    let total_bytes_estimate = fields.next().flatten();
    Some(ProgressSample {
        downloaded_bytes,
        total_bytes,
        total_bytes_estimate,
    })
}

fn parse_byte_count(field: &str) -> Option<u64> {
    let value: f64 = field.parse().ok()?;
    (value.is_finite() && value >= 0.0).then(|| value as u64)
}
