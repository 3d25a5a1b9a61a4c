//! Telegram integration.
//!
//! Two adapters over the same event surface:
//! - [`bot`] — the Bot HTTP API via long-polling (teloxide);
//! - [`user`] — a full user account over MTProto (grammers).
//!
//! Both emit [`MonitorEvent`]s into an mpsc channel the ingestion runtime
//! drains; neither knows anything about classification or storage.

pub mod bot;
pub mod pending;
pub mod user;

use serde::Serialize;

// ─── MonitorEvent ────────────────────────────────────────────────────────────

/// One inbound message, already reduced to the fields the pipeline needs.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorEvent {
    pub text: String,
    /// Sender display name (or id when no name is available).
    pub sender: String,
    /// Chat title/display.
    pub chat: String,
    pub chat_id: Option<String>,
    pub message_id: Option<i64>,
    /// Seconds epoch from the transport, when it provides one.
    pub message_ts: Option<f64>,
}

// ─── ChatSummary ─────────────────────────────────────────────────────────────

/// One row of the chat-sync listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    /// `private`, `group` or `channel`.
    pub kind: String,
    /// Transport-relative photo path, when one could be resolved.
    pub photo: Option<String>,
    /// Which adapter produced the row: `bot` or `user`.
    pub source: String,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("telegram request failed: {0}")]
    Transport(String),

    #[error("session is not authorized")]
    Unauthorized,

    #[error("session belongs to a bot account")]
    BotSession,

    /// MTProto refused a method that only works for bot accounts the other
    /// way around — the signal for the chat-sync bot-path fallback.
    #[error("method not available to this account type")]
    BotMethodInvalid,
}

impl TelegramError {
    pub fn is_bot_method_invalid(&self) -> bool {
        matches!(self, TelegramError::BotMethodInvalid)
    }
}
