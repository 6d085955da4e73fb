//! Telegram Bot API notifier (libcurl, run on the blocking pool).

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use super::{NotificationError, Notifier};

const API_BASE: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    bot_token: String,
    api_base: String,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: API_BASE.to_string(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    async fn call(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<(u32, Vec<u8>), NotificationError> {
        let url = self.method_url(method);
        let body = payload.to_string();
        tokio::task::spawn_blocking(move || post_json(&url, body.as_bytes()))
            .await
            .map_err(|e| NotificationError::Http(format!("request task: {e}")))?
    }
}

/// POST a JSON body. Returns status code and response body.
fn post_json(url: &str, body: &[u8]) -> Result<(u32, Vec<u8>), NotificationError> {
    let http = |e: curl::Error| NotificationError::Http(e.to_string());
    let mut response = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(http)?;
    easy.post(true).map_err(http)?;
    easy.post_fields_copy(body).map_err(http)?;
    easy.connect_timeout(Duration::from_secs(15)).map_err(http)?;
    easy.timeout(Duration::from_secs(30)).map_err(http)?;
    let mut list = curl::easy::List::new();
    list.append("Content-Type: application/json").map_err(http)?;
    easy.http_headers(list).map_err(http)?;

    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                response.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(http)?;
        transfer.perform().map_err(http)?;
    }

    let code = easy.response_code().map_err(http)?;
    Ok((code, response))
}

/// Extract `result.message_id` from a successful `sendMessage` response.
fn parse_send_response(body: &[u8]) -> Result<Option<i64>, NotificationError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| NotificationError::Decode(e.to_string()))?;
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let description = value
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("no description");
        return Err(NotificationError::Rejected(description.to_string()));
    }
    Ok(value
        .get("result")
        .and_then(|r| r.get("message_id"))
        .and_then(|id| id.as_i64()))
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
    ) -> Result<Option<i64>, NotificationError> {
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        let (code, body) = self.call("sendMessage", payload).await?;
        if !(200..300).contains(&code) {
            return Err(NotificationError::Status(code));
        }
        parse_send_response(&body)
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), NotificationError> {
        let payload = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        let (code, _) = self.call("editMessageText", payload).await?;
        match code {
            // Message already has this text, or it can no longer be edited.
            400 => {
                tracing::debug!(chat_id, message_id, "telegram edit ignored (HTTP 400)");
                Ok(())
            }
            200..=299 => Ok(()),
            other => Err(NotificationError::Status(other)),
        }
    }
}
