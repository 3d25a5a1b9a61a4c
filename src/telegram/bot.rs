//! Bot HTTP API adapter (teloxide).
//!
//! Long-polls `getUpdates` for inbound messages and reuses the same update
//! feed (plus `getChat`/`getFile`) to build the chat-sync listing.
//!
//! On connection loss the listener retries with exponential back-off:
//! 1 s → 2 s → 4 s → … → max 60 s.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{ChatFullInfo, Message, UpdateKind};
use tokio::sync::mpsc;

use super::{ChatSummary, MonitorEvent, TelegramError};

const POLL_TIMEOUT_SECS: u32 = 30;

// ─── BotAdapter ──────────────────────────────────────────────────────────────

pub struct BotAdapter {
    bot: Bot,
}

impl BotAdapter {
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }

    /// Validate the token with `getMe`; returns the bot's display name.
    pub async fn validate(&self) -> Result<String, TelegramError> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| TelegramError::InvalidCredentials(format!("getMe failed: {e}")))?;
        Ok(me.full_name())
    }

    /// Compute exponential back-off for reconnection attempts:
    /// `min(2^attempt, 60)` seconds.
    pub fn reconnect_backoff(attempt: u32) -> Duration {
        let secs = (1u64 << attempt.min(63)).min(60);
        Duration::from_secs(secs)
    }

    // ── Chat sync ────────────────────────────────────────────────────────────

    /// Build a deduplicated chat listing: the persisted targets first, then
    /// every chat visible in the pending update feed.
    pub async fn list_chats(&self, seed: &[String]) -> Result<Vec<ChatSummary>, TelegramError> {
        let mut ids: Vec<i64> = Vec::new();
        for target in seed {
            if let Ok(id) = target.parse::<i64>() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }

        // Peek at unconsumed updates without acknowledging them (offset stays
        // untouched so the monitor loop still sees them).
        let updates = self
            .bot
            .get_updates()
            .timeout(0)
            .await
            .map_err(|e| TelegramError::Transport(format!("getUpdates failed: {e}")))?;
        for update in &updates {
            if let Some(chat) = update.chat() {
                if !ids.contains(&chat.id.0) {
                    ids.push(chat.id.0);
                }
            }
        }

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match self.bot.get_chat(ChatId(id)).await {
                Ok(info) => out.push(self.summarize(id, &info).await),
                // Chats the bot was removed from still appear in targets;
                // keep the row with the bare id so the UI can show it.
                Err(e) => {
                    log::warn!("bot: getChat({id}) failed: {e}");
                    out.push(ChatSummary {
                        id: id.to_string(),
                        title: id.to_string(),
                        kind: "unknown".to_owned(),
                        photo: None,
                        source: "bot".to_owned(),
                    });
                }
            }
        }
        Ok(out)
    }

    async fn summarize(&self, id: i64, info: &ChatFullInfo) -> ChatSummary {
        let title = info
            .title()
            .map(str::to_owned)
            .or_else(|| info.username().map(str::to_owned))
            .unwrap_or_else(|| id.to_string());

        let kind = if info.is_private() {
            "private"
        } else if info.is_channel() {
            "channel"
        } else {
            "group"
        };

        // Resolve the small chat photo to a file path; best-effort.
        let photo = match &info.photo {
            Some(p) => self
                .bot
                .get_file(p.small_file_id.clone())
                .await
                .map(|f| f.path)
                .ok(),
            None => None,
        };

        ChatSummary {
            id: id.to_string(),
            title,
            kind: kind.to_owned(),
            photo,
            source: "bot".to_owned(),
        }
    }

    // ── Event loop ───────────────────────────────────────────────────────────

    /// Long-poll for messages, forwarding matching ones on `tx`.
    ///
    /// `targets` is a list of chat-id strings; an empty list means every chat
    /// the bot can see. Runs until the receiver is dropped.
    pub async fn listen(
        &self,
        targets: Vec<String>,
        tx: mpsc::Sender<MonitorEvent>,
    ) -> Result<(), TelegramError> {
        let mut attempt = 0u32;
        // Offset acknowledges processed updates; must be last_id + 1.
        let mut offset: i32 = 0;

        loop {
            let result = self
                .bot
                .get_updates()
                .offset(offset)
                .timeout(POLL_TIMEOUT_SECS)
                .await;

            match result {
                Ok(updates) => {
                    attempt = 0;
                    for update in updates {
                        offset = (update.id.0 as i32).saturating_add(1);

                        let (UpdateKind::Message(ref msg) | UpdateKind::ChannelPost(ref msg)) =
                            update.kind
                        else {
                            continue;
                        };

                        let chat_id = msg.chat.id.0.to_string();
                        if !targets.is_empty() && !targets.contains(&chat_id) {
                            continue;
                        }

                        let Some(event) = extract_event(msg) else {
                            continue;
                        };
                        if tx.send(event).await.is_err() {
                            // Receiver gone: the monitor stopped.
                            return Ok(());
                        }
                    }
                }
                Err(e) => {
                    if tx.is_closed() {
                        return Ok(());
                    }
                    log::warn!("bot: polling error (attempt {attempt}): {e}");
                    let backoff = Self::reconnect_backoff(attempt);
                    attempt = attempt.saturating_add(1);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Reduce a Telegram message to a [`MonitorEvent`]; `None` for non-text.
fn extract_event(msg: &Message) -> Option<MonitorEvent> {
    let text = msg.text()?.to_owned();

    let sender = msg
        .from
        .as_ref()
        .map(|u| u.full_name())
        .or_else(|| msg.sender_chat.as_ref().and_then(|c| c.title().map(str::to_owned)))
        .unwrap_or_else(|| "unknown".to_owned());

    let chat = msg
        .chat
        .title()
        .map(str::to_owned)
        .or_else(|| msg.chat.username().map(str::to_owned))
        .unwrap_or_else(|| msg.chat.id.0.to_string());

    Some(MonitorEvent {
        text,
        sender,
        chat,
        chat_id: Some(msg.chat.id.0.to_string()),
        message_id: Some(i64::from(msg.id.0)),
        message_ts: Some(msg.date.timestamp() as f64),
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_starts_at_1s() {
        assert_eq!(BotAdapter::reconnect_backoff(0), Duration::from_secs(1));
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(BotAdapter::reconnect_backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn backoff_caps_at_60s() {
        assert_eq!(BotAdapter::reconnect_backoff(6), Duration::from_secs(60));
        assert_eq!(BotAdapter::reconnect_backoff(40), Duration::from_secs(60));
    }
}
