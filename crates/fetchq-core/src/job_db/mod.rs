//! Persistent job store (SQLite via sqlx).
//!
//! Owns the job records: status, progress, output paths, manifest, and the
//! notification binding. Every read-modify-write runs inside a transaction.

pub mod db;
mod jobs;
pub mod types;

pub use db::*;
pub use types::*;

#[cfg(test)]
mod tests;
