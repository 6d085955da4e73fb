//! Job CRUD on `JobDb`, split by read and write paths.

mod read;
mod write;

pub(crate) use read::fetch_job;
