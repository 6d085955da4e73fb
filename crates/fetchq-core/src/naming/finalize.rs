//! Rename a job's working directory to a collision-free, human-readable name.

use std::io;
use std::path::{Path, PathBuf};

use super::sanitize::sanitize_directory_name;

/// Candidates tried before giving up and keeping the job-id directory.
pub const MAX_RENAME_ATTEMPTS: usize = 20;

/// Length of the job-id prefix used to disambiguate colliding names.
const ID_PREFIX_CHARS: usize = 6;

/// Name tried on the given attempt: `base`, then `base-<id6>`, then `base-<id6>-N` (N from 1).
pub fn candidate_name(base: &str, job_id: &str, attempt: usize) -> String {
    let id_prefix: String = job_id.chars().take(ID_PREFIX_CHARS).collect();
    match attempt {
        0 => base.to_string(),
        1 => format!("{base}-{id_prefix}"),
        n => format!("{base}-{id_prefix}-{}", n - 1),
    }
}

/// Renames `directory` after `title` and returns the directory's final path.
///
/// Never fails: an empty/unusable title, an exhausted candidate list, or a
/// rename error all keep the original directory (the latter two log a warning).
pub fn finalize_directory(directory: &Path, title: Option<&str>, job_id: &str) -> PathBuf {
    let Some(base) = title.and_then(sanitize_directory_name) else {
        return directory.to_path_buf();
    };
    let Some(parent) = directory.parent() else {
        return directory.to_path_buf();
    };

    for attempt in 0..MAX_RENAME_ATTEMPTS {
        let candidate = parent.join(candidate_name(&base, job_id, attempt));
        if candidate == directory {
            return directory.to_path_buf();
        }
        if candidate.exists() {
            continue;
        }
        match std::fs::rename(directory, &candidate) {
            Ok(()) => {
                tracing::info!(
                    job_id,
                    "renamed download directory {} -> {}",
                    directory.display(),
                    candidate.display()
                );
                return candidate;
            }
            // Lost a race with another finalizer; try the next name.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                tracing::warn!(
                    job_id,
                    error = %e,
                    "failed to rename download directory {} -> {}",
                    directory.display(),
                    candidate.display()
                );
                return directory.to_path_buf();
            }
        }
    }

    tracing::warn!(
        job_id,
        "no free directory name for {} after {} attempts",
        directory.display(),
        MAX_RENAME_ATTEMPTS
    );
    directory.to_path_buf()
}
