//! Human-readable output directory names.
//!
//! Titles are sanitized into filesystem-safe names, then the job's working
//! directory (named by job id) is renamed to the first free candidate.

mod finalize;
mod sanitize;

pub use finalize::{candidate_name, finalize_directory, MAX_RENAME_ATTEMPTS};
pub use sanitize::{sanitize_directory_name, MAX_NAME_CHARS};
