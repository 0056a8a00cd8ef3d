//! Telegram channel: long-polls the Bot API for updates and sends messages.
//!
//! Text and contact messages are only forwarded from the configured source
//! groups; everything else is dropped here, before the pipeline sees it.
//! Commands are accepted from any chat.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::channels::{
    CommandInvocation, InboundStream, InboundUpdate, OutgoingPayload, ParseMode, Transport,
};
use crate::commands::AdminCommand;
use crate::error::ChannelError;
use crate::pipeline::types::{
    Destination, IncomingMessage, MessageMeta, MessagePayload, Sender, SourceChat,
};

/// Long-poll timeout passed to `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll before trying again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Telegram channel: connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: Arc<SecretString>,
    source_chats: Arc<Vec<i64>>,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, source_chats: Vec<i64>) -> Self {
        Self {
            bot_token: Arc::new(bot_token),
            source_chats: Arc::new(source_chats),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: ParseMode,
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if parse_mode == ParseMode::Html {
            body["parse_mode"] = serde_json::Value::String("HTML".into());
        }

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let result: ApiResponse<serde_json::Value> =
            resp.json().await.map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("invalid sendMessage response ({status}): {e}"),
            })?;

        if !status.is_success() || !result.ok {
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!(
                    "sendMessage returned {status}: {}",
                    result.description.unwrap_or_default()
                ),
            });
        }

        Ok(())
    }

    /// Start long-polling. Updates are delivered on the returned stream
    /// until it is dropped.
    pub async fn start(&self) -> Result<InboundStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bot_token = Arc::clone(&self.bot_token);
        let source_chats = Arc::clone(&self.source_chats);
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for updates...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message"]
                });

                let resp = match client
                    .post(api_url(&bot_token, "getUpdates"))
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                let data: ApiResponse<Vec<Update>> = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                if !data.ok {
                    tracing::warn!(
                        description = data.description.as_deref().unwrap_or(""),
                        "Telegram getUpdates rejected"
                    );
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    continue;
                }

                for update in data.result.unwrap_or_default() {
                    // Advance offset past this update
                    offset = offset.max(update.update_id + 1);

                    let Some(message) = update.message else {
                        continue;
                    };
                    let Some(inbound) = to_inbound(message, &source_chats) else {
                        continue;
                    };

                    if tx.send(inbound).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|update| (update, rx))
        });

        Ok(Box::pin(stream))
    }

    pub async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }
}

// ── Transport implementation ────────────────────────────────────────

#[async_trait]
impl Transport for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(
        &self,
        destination: &Destination,
        payload: &OutgoingPayload,
    ) -> Result<(), ChannelError> {
        self.send_message(destination.as_str(), &payload.text, payload.parse_mode)
            .await
    }
}

// ── Bot API types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    from: Option<TgUser>,
    chat: TgChat,
    date: i64,
    text: Option<String>,
    contact: Option<TgContact>,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgContact {
    phone_number: String,
}

// ── Helpers ─────────────────────────────────────────────────────────

fn api_url(bot_token: &SecretString, method: &str) -> String {
    format!(
        "https://api.telegram.org/bot{}/{method}",
        bot_token.expose_secret()
    )
}

/// Convert a Bot API message into an inbound update, applying the source
/// chat allow-list to text and contact messages.
/// Bot commands start with `/` immediately followed by a name character.
/// Text such as `/ Chilonzordan taksi` is an ordinary message.
fn is_command(text: &str) -> bool {
    text.strip_prefix('/')
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn to_inbound(message: TgMessage, source_chats: &[i64]) -> Option<InboundUpdate> {
    // Channel posts and service messages carry no sender.
    let from = message.from?;

    if let Some(text) = message.text.as_deref().filter(|t| is_command(t)) {
        let Some(command) = AdminCommand::parse(text) else {
            tracing::debug!(chat_id = message.chat.id, "Ignoring unknown command");
            return None;
        };
        return Some(InboundUpdate::Command(CommandInvocation {
            chat_id: message.chat.id,
            user_id: from.id,
            command,
        }));
    }

    if !source_chats.contains(&message.chat.id) {
        tracing::debug!(chat_id = message.chat.id, "Ignoring message from unmonitored chat");
        return None;
    }

    let payload = match (message.text, message.contact) {
        (_, Some(contact)) => MessagePayload::Contact {
            phone_number: contact.phone_number,
        },
        (Some(text), None) => MessagePayload::Text { text },
        (None, None) => return None,
    };

    Some(InboundUpdate::Message(IncomingMessage {
        meta: MessageMeta {
            sender: Sender {
                id: from.id,
                username: from.username,
            },
            chat: SourceChat {
                id: message.chat.id,
                title: message.chat.title,
            },
            message_id: message.message_id,
            sent_at: DateTime::<Utc>::from_timestamp(message.date, 0).unwrap_or_else(Utc::now),
        },
        payload,
    }))
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SOURCE: i64 = -1001234567890;

    fn token(raw: &str) -> SecretString {
        SecretString::from(raw.to_string())
    }

    fn parse_message(json: serde_json::Value) -> TgMessage {
        serde_json::from_value(json).unwrap()
    }

    fn text_message(chat_id: i64, text: &str) -> TgMessage {
        parse_message(serde_json::json!({
            "message_id": 55,
            "from": {"id": 42, "is_bot": false, "first_name": "Ali", "username": "ali_uz"},
            "chat": {"id": chat_id, "type": "supergroup", "title": "Toshkent Taksi"},
            "date": 1_772_350_200,
            "text": text
        }))
    }

    #[test]
    fn telegram_channel_name() {
        let ch = TelegramChannel::new(token("fake-token"), vec![]);
        assert_eq!(ch.name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        let ch = TelegramChannel::new(token("123:ABC"), vec![]);
        assert_eq!(
            ch.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    #[test]
    fn text_from_source_chat_becomes_message() {
        let msg = match to_inbound(text_message(SOURCE, "taksi kerak"), &[SOURCE]) {
            Some(InboundUpdate::Message(msg)) => msg,
            other => panic!("expected message, got {other:?}"),
        };
        assert_eq!(
            msg.payload,
            MessagePayload::Text {
                text: "taksi kerak".into()
            }
        );
        assert_eq!(msg.meta.message_id, 55);
        assert_eq!(msg.meta.sender.username.as_deref(), Some("ali_uz"));
        assert_eq!(msg.meta.chat.title.as_deref(), Some("Toshkent Taksi"));
        assert_eq!(
            msg.meta.sent_at,
            Utc.timestamp_opt(1_772_350_200, 0).unwrap()
        );
    }

    #[test]
    fn text_from_other_chat_is_dropped() {
        assert!(to_inbound(text_message(-42, "taksi kerak"), &[SOURCE]).is_none());
    }

    #[test]
    fn command_accepted_from_any_chat() {
        let update = to_inbound(text_message(777, "/kalitlar"), &[SOURCE]).unwrap();
        assert_eq!(
            update,
            InboundUpdate::Command(CommandInvocation {
                chat_id: 777,
                user_id: 42,
                command: AdminCommand::ListKeywords,
            })
        );
    }

    #[test]
    fn unknown_command_is_not_classified() {
        assert!(to_inbound(text_message(SOURCE, "/help taksi"), &[SOURCE]).is_none());
    }

    #[test]
    fn slash_without_command_name_is_classified() {
        let msg = match to_inbound(text_message(SOURCE, "/ Chilonzordan taksi"), &[SOURCE]) {
            Some(InboundUpdate::Message(msg)) => msg,
            other => panic!("expected message, got {other:?}"),
        };
        assert_eq!(
            msg.payload,
            MessagePayload::Text {
                text: "/ Chilonzordan taksi".into()
            }
        );
    }

    #[test]
    fn slash_text_still_needs_a_source_chat() {
        assert!(to_inbound(text_message(-42, "/ Chilonzordan taksi"), &[SOURCE]).is_none());
        assert!(to_inbound(text_message(-42, "//taksi"), &[SOURCE]).is_none());
    }

    #[test]
    fn command_shape() {
        assert!(is_command("/kalitlar"));
        assert!(is_command("/start@taxi_bot"));
        assert!(is_command("/_x"));
        assert!(!is_command("/"));
        assert!(!is_command("/ taksi"));
        assert!(!is_command("//taksi"));
        assert!(!is_command("taksi /kalitlar"));
    }

    #[test]
    fn contact_becomes_contact_payload() {
        let message = parse_message(serde_json::json!({
            "message_id": 56,
            "from": {"id": 42, "is_bot": false, "first_name": "Ali"},
            "chat": {"id": SOURCE, "type": "supergroup"},
            "date": 1_772_350_200,
            "contact": {"phone_number": "+998901234567", "first_name": "Ali"}
        }));
        let Some(InboundUpdate::Message(msg)) = to_inbound(message, &[SOURCE]) else {
            panic!("expected message");
        };
        assert_eq!(
            msg.payload,
            MessagePayload::Contact {
                phone_number: "+998901234567".into()
            }
        );
        assert_eq!(msg.meta.sender.username, None);
        assert_eq!(msg.meta.chat.title, None);
    }

    #[test]
    fn message_without_sender_is_dropped() {
        let message = parse_message(serde_json::json!({
            "message_id": 57,
            "chat": {"id": SOURCE, "type": "channel"},
            "date": 1_772_350_200,
            "text": "taksi"
        }));
        assert!(to_inbound(message, &[SOURCE]).is_none());
    }

    #[test]
    fn media_without_text_is_dropped() {
        let message = parse_message(serde_json::json!({
            "message_id": 58,
            "from": {"id": 42, "is_bot": false, "first_name": "Ali"},
            "chat": {"id": SOURCE, "type": "supergroup"},
            "date": 1_772_350_200,
            "photo": []
        }));
        assert!(to_inbound(message, &[SOURCE]).is_none());
    }

    #[test]
    fn api_response_parses_errors() {
        let resp: ApiResponse<serde_json::Value> = serde_json::from_str(
            r#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#,
        )
        .unwrap();
        assert!(!resp.ok);
        assert!(resp.result.is_none());
        assert_eq!(resp.description.as_deref(), Some("Bad Request: chat not found"));
    }

    #[test]
    fn get_updates_response_parses() {
        let resp: ApiResponse<Vec<Update>> = serde_json::from_value(serde_json::json!({
            "ok": true,
            "result": [
                {"update_id": 9, "message": {
                    "message_id": 1,
                    "from": {"id": 1, "is_bot": false, "first_name": "A"},
                    "chat": {"id": SOURCE, "type": "supergroup"},
                    "date": 0,
                    "text": "salom"
                }},
                {"update_id": 10, "edited_message": {}}
            ]
        }))
        .unwrap();
        let updates = resp.result.unwrap();
        assert_eq!(updates.len(), 2);
        assert!(updates[0].message.is_some());
        assert!(updates[1].message.is_none());
    }

    // ── Network error tests (expected to fail with no server) ───────

    #[tokio::test]
    async fn telegram_send_with_fake_token_fails() {
        let ch = TelegramChannel::new(token("fake-token"), vec![]);
        let result = ch
            .send(&Destination::new("123456"), &OutgoingPayload::plain("hi"))
            .await;
        assert!(matches!(result, Err(ChannelError::SendFailed { .. })));
    }
}
