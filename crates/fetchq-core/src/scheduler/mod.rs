//! Job scheduler.
//!
//! Jobs flow: queue → worker → executor (claim, download on the blocking
//! pool, finalize, record outcome, notify). Recovery runs once before the
//! workers start.

mod execute;
mod pool;
mod progress;
mod queue;
mod recovery;

pub use execute::JobExecutor;
pub use pool::DownloadManager;
pub use progress::ProgressTracker;
pub use queue::JobQueue;
pub use recovery::reconcile;
