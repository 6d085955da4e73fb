pub mod config;
pub mod downloader;
pub mod job_db;
pub mod logging;
pub mod metadata;
pub mod naming;
pub mod notify;
pub mod scheduler;
pub mod storage;
pub mod transcode;
pub mod url_policy;
