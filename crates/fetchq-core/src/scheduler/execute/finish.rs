//! Post-download phase: normalize metadata, write files, rename, list.

use anyhow::Result;
use std::path::Path;

use crate::downloader::FetchOutput;
use crate::job_db::JobOutcome;
use crate::metadata::dedupe_thumbnails;
use crate::naming::finalize_directory;
use crate::storage::{self, DownloadRoot, DESCRIPTION_FILENAME, METADATA_FILENAME};

/// Turn a finished fetch in `working_dir` into the job's outcome. Runs on
/// the blocking pool. The manifest is listed after the rename so it holds
/// final paths.
pub(super) fn finish_after_download(
    root: &DownloadRoot,
    job_id: &str,
    working_dir: &Path,
    fetched: FetchOutput,
) -> Result<JobOutcome> {
    let FetchOutput {
        title,
        mut metadata,
        description,
    } = fetched;

    let removed = dedupe_thumbnails(&mut metadata);
    if removed > 0 {
        tracing::debug!(job_id, removed, "dropped duplicate thumbnails");
    }
    let has_description =
        storage::write_metadata_files(working_dir, &metadata, description.as_deref())?;

    let final_dir = finalize_directory(working_dir, title.as_deref(), job_id);
    let output_dir = root.relative(&final_dir)?;
    let file_manifest = root.list_manifest(&final_dir)?;

    let metadata_path = existing_relative(root, &final_dir.join(METADATA_FILENAME));
    let description_path = if has_description {
        existing_relative(root, &final_dir.join(DESCRIPTION_FILENAME))
    } else {
        None
    };

    Ok(JobOutcome {
        title,
        output_dir,
        metadata_path,
        description_path,
        file_manifest,
    })
}

fn existing_relative(root: &DownloadRoot, path: &Path) -> Option<String> {
    if path.is_file() {
        root.relative(path).ok()
    } else {
        None
    }
}
