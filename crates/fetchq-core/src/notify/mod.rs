//! Notification channel and the bridge that feeds it job events.
//!
//! `Notifier` is the wire-level seam (send a message, edit a message).
//! `NotificationBridge` turns job lifecycle events into message texts and
//! delivers them best-effort: every error is logged and swallowed.

mod bridge;
mod telegram;

use async_trait::async_trait;

pub use bridge::{failure_text, progress_text, started_text, success_text, NotificationBridge};
pub use telegram::TelegramNotifier;

/// Failure talking to the notification channel. Never fails a job.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification request failed: {0}")]
    Http(String),
    #[error("notification endpoint returned HTTP {0}")]
    Status(u32),
    #[error("could not decode notification response: {0}")]
    Decode(String),
    #[error("notification rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a new message; returns its id when the channel reports one.
    async fn send_message(&self, chat_id: i64, text: &str)
        -> Result<Option<i64>, NotificationError>;

    /// Replace the text of an earlier message. "Not found" or "not modified"
    /// conditions are not errors.
    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), NotificationError>;
}
