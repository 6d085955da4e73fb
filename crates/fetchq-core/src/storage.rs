//! Download-root filesystem access.
//!
//! Every path handed to the filesystem is built from a root-relative string
//! through `DownloadRoot::resolve`, which refuses anything that would land
//! outside the root (absolute paths, `..` escapes, symlinks pointing out).
//! Also writes the per-job metadata files, lists manifests, and removes a
//! finished job's artifacts.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::job_db::JobRecord;
use crate::metadata::{self, MetaValue};

/// Metadata file written into every finished job directory.
pub const METADATA_FILENAME: &str = "metadata.json";
/// Description file, written only when the downloader returned one.
pub const DESCRIPTION_FILENAME: &str = "description.txt";

/// A relative path that cannot be used under the download root.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathEscape {
    #[error("empty path")]
    Empty,
    #[error("absolute path not allowed: {0}")]
    Absolute(String),
    #[error("path escapes download root: {0}")]
    OutsideRoot(String),
}

/// Canonical download root. All job artifacts live beneath it.
#[derive(Debug, Clone)]
pub struct DownloadRoot {
    root: PathBuf,
}

impl DownloadRoot {
    /// Create the root directory if needed and canonicalize it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path)
            .with_context(|| format!("create download root: {}", path.display()))?;
        let root = path
            .canonicalize()
            .with_context(|| format!("canonicalize download root: {}", path.display()))?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a root-relative path. The result is strictly below the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, PathEscape> {
        let relative = relative.trim();
        if relative.is_empty() {
            return Err(PathEscape::Empty);
        }

        let mut out = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => {
                    out.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(PathEscape::OutsideRoot(relative.to_string()));
                    }
                    out.pop();
                    depth -= 1;
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PathEscape::Absolute(relative.to_string()));
                }
            }
        }
        if depth == 0 {
            return Err(PathEscape::Empty);
        }

        // Existing paths may be symlinks; check where they really point.
        if let Ok(real) = out.canonicalize() {
            if !real.starts_with(&self.root) || real == self.root {
                return Err(PathEscape::OutsideRoot(relative.to_string()));
            }
        }
        Ok(out)
    }

    /// Express an absolute path below the root as a `/`-separated relative string.
    pub fn relative(&self, path: &Path) -> Result<String, PathEscape> {
        let rel = path
            .strip_prefix(&self.root)
            .map_err(|_| PathEscape::OutsideRoot(path.display().to_string()))?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| match c {
                Component::Normal(part) => Ok(part.to_string_lossy().into_owned()),
                _ => Err(PathEscape::OutsideRoot(path.display().to_string())),
            })
            .collect::<Result<_, _>>()?;
        if parts.is_empty() {
            return Err(PathEscape::Empty);
        }
        Ok(parts.join("/"))
    }

    /// Fresh, empty working directory for a job (named by its id).
    /// Leftovers from an earlier interrupted run are removed.
    pub fn prepare_job_dir(&self, job_id: &str) -> Result<PathBuf> {
        let dir = self.resolve(job_id)?;
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("remove stale job dir: {}", dir.display()))?;
        }
        fs::create_dir_all(&dir).with_context(|| format!("create job dir: {}", dir.display()))?;
        Ok(dir)
    }

    /// Every regular file under `dir`, relative to the root, sorted.
    pub fn list_manifest(&self, dir: &Path) -> Result<Vec<String>> {
        let mut files = Vec::new();
        collect_files(dir, &mut files)
            .with_context(|| format!("list files under {}", dir.display()))?;
        let mut manifest = files
            .iter()
            .map(|path| self.relative(path))
            .collect::<Result<Vec<_>, _>>()?;
        manifest.sort();
        Ok(manifest)
    }

    /// Delete a finished job's output directory and any manifest files outside it.
    /// Paths that fail resolution are skipped with a warning.
    pub fn remove_job_artifacts(&self, job: &JobRecord) -> Result<()> {
        let output_prefix = job
            .output_dir
            .as_deref()
            .map(|dir| format!("{}/", dir.trim_end_matches(['/', '\\'])));

        if let Some(output_dir) = job.output_dir.as_deref() {
            match self.resolve(output_dir) {
                Ok(dir) => ignore_not_found(fs::remove_dir_all(&dir))
                    .with_context(|| format!("remove {}", dir.display()))?,
                Err(e) => tracing::warn!(job_id = %job.id, "refusing to delete output dir: {e}"),
            }
        }

        for entry in &job.file_manifest {
            if entry.trim().is_empty() {
                continue;
            }
            if let Some(prefix) = &output_prefix {
                if entry.starts_with(prefix.as_str()) {
                    continue;
                }
            }
            match self.resolve(entry) {
                Ok(file) => ignore_not_found(fs::remove_file(&file))
                    .with_context(|| format!("remove {}", file.display()))?,
                Err(e) => tracing::warn!(job_id = %job.id, "refusing to delete file: {e}"),
            }
        }
        Ok(())
    }
}

fn ignore_not_found(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), out)?;
        } else if file_type.is_file() {
            out.push(entry.path());
        }
    }
    Ok(())
}

/// Write `metadata.json` and, when non-empty, `description.txt` into `dir`.
/// A stale description file is removed. Returns whether a description was written.
pub fn write_metadata_files(
    dir: &Path,
    meta: &MetaValue,
    description: Option<&str>,
) -> Result<bool> {
    let json = metadata::to_pretty_json(meta).context("serialize metadata")?;
    fs::write(dir.join(METADATA_FILENAME), json).context("write metadata.json")?;

    let description_path = dir.join(DESCRIPTION_FILENAME);
    match description.filter(|d| !d.is_empty()) {
        Some(text) => {
            fs::write(&description_path, text).context("write description.txt")?;
            Ok(true)
        }
        None => {
            ignore_not_found(fs::remove_file(&description_path))
                .context("remove stale description.txt")?;
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_db::JobStatus;
    use tempfile::tempdir;

    fn finished_job(output_dir: Option<&str>, manifest: &[&str]) -> JobRecord {
        JobRecord {
            id: "job1".to_string(),
            source_url: "https://example.com".to_string(),
            status: JobStatus::Completed,
            progress: 100.0,
            title: None,
            output_dir: output_dir.map(str::to_string),
            metadata_path: None,
            description_path: None,
            file_manifest: manifest.iter().map(|s| s.to_string()).collect(),
            error: None,
            notification_chat_id: None,
            notification_message_id: None,
            watched: false,
            starred: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn resolve_accepts_nested_relative_paths() {
        let tmp = tempdir().unwrap();
        let root = DownloadRoot::open(tmp.path().join("dl")).unwrap();
        let p = root.resolve("a/b/../c.mp4").unwrap();
        assert_eq!(p, root.path().join("a").join("c.mp4"));
        assert_eq!(root.relative(&p).unwrap(), "a/c.mp4");
    }

    #[test]
    fn resolve_rejects_escapes() {
        let tmp = tempdir().unwrap();
        let root = DownloadRoot::open(tmp.path().join("dl")).unwrap();
        assert_eq!(
            root.resolve("../secret"),
            Err(PathEscape::OutsideRoot("../secret".to_string()))
        );
        assert_eq!(
            root.resolve("a/../../x"),
            Err(PathEscape::OutsideRoot("a/../../x".to_string()))
        );
        assert!(matches!(root.resolve("/etc/passwd"), Err(PathEscape::Absolute(_))));
        assert_eq!(root.resolve("  "), Err(PathEscape::Empty));
        assert_eq!(root.resolve("a/.."), Err(PathEscape::Empty));
        assert_eq!(root.resolve("."), Err(PathEscape::Empty));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_rejects_symlink_out_of_root() {
        let tmp = tempdir().unwrap();
        let outside = tmp.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        let root = DownloadRoot::open(tmp.path().join("dl")).unwrap();
        std::os::unix::fs::symlink(&outside, root.path().join("link")).unwrap();
        assert!(matches!(root.resolve("link"), Err(PathEscape::OutsideRoot(_))));
    }

    #[test]
    fn relative_rejects_paths_outside_root() {
        let tmp = tempdir().unwrap();
        let root = DownloadRoot::open(tmp.path().join("dl")).unwrap();
        assert!(root.relative(tmp.path()).is_err());
        assert_eq!(root.relative(root.path()), Err(PathEscape::Empty));
    }

    #[test]
    fn manifest_lists_files_recursively_sorted() {
        let tmp = tempdir().unwrap();
        let root = DownloadRoot::open(tmp.path()).unwrap();
        let dir = root.prepare_job_dir("job").unwrap();
        fs::create_dir_all(dir.join("subs")).unwrap();
        fs::write(dir.join("video.webm"), b"v").unwrap();
        fs::write(dir.join("subs/en.vtt"), b"s").unwrap();
        fs::write(dir.join("metadata.json"), b"{}").unwrap();
        assert_eq!(
            root.list_manifest(&dir).unwrap(),
            vec!["job/metadata.json", "job/subs/en.vtt", "job/video.webm"]
        );
    }

    #[test]
    fn prepare_job_dir_clears_leftovers() {
        let tmp = tempdir().unwrap();
        let root = DownloadRoot::open(tmp.path()).unwrap();
        let dir = root.prepare_job_dir("job").unwrap();
        fs::write(dir.join("partial.part"), b"x").unwrap();
        let dir = root.prepare_job_dir("job").unwrap();
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
        assert!(root.prepare_job_dir("../job").is_err());
    }

    #[test]
    fn metadata_files_written_and_stale_description_removed() {
        let tmp = tempdir().unwrap();
        let meta = MetaValue::from_json_str(r#"{"title":"x"}"#).unwrap();

        assert!(write_metadata_files(tmp.path(), &meta, Some("hello")).unwrap());
        assert_eq!(
            fs::read_to_string(tmp.path().join(DESCRIPTION_FILENAME)).unwrap(),
            "hello"
        );

        assert!(!write_metadata_files(tmp.path(), &meta, Some("")).unwrap());
        assert!(!tmp.path().join(DESCRIPTION_FILENAME).exists());
        let written = fs::read_to_string(tmp.path().join(METADATA_FILENAME)).unwrap();
        assert!(written.contains("\"title\": \"x\""));
    }

    #[test]
    fn remove_job_artifacts_deletes_dir_and_stray_files() {
        let tmp = tempdir().unwrap();
        let root = DownloadRoot::open(tmp.path().join("dl")).unwrap();
        let dir = root.prepare_job_dir("Title").unwrap();
        fs::write(dir.join("a.mp4"), b"a").unwrap();
        fs::write(root.path().join("stray.mp4"), b"s").unwrap();
        fs::write(tmp.path().join("victim.txt"), b"keep").unwrap();

        let job = finished_job(
            Some("Title"),
            &["Title/a.mp4", "stray.mp4", "../victim.txt", "missing.mp4"],
        );
        root.remove_job_artifacts(&job).unwrap();

        assert!(!dir.exists());
        assert!(!root.path().join("stray.mp4").exists());
        assert!(tmp.path().join("victim.txt").exists());
    }
}
