//! The message store.

use std::{
    collections::BTreeMap,
    path::Path,
    sync::Mutex,
};

use rusqlite::{Connection, params};
use serde::Serialize;

use super::StoreError;
use crate::engine::THREAT_TYPES;

/// File name of the message database inside the data directory.
pub const MESSAGES_FILE: &str = "messages.sqlite3";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    telegram_message_id INTEGER NULL,
    telegram_chat_id    TEXT NULL,
    message_ts          INTEGER NOT NULL,
    received_ts         INTEGER NOT NULL,
    chat                TEXT NOT NULL,
    sender              TEXT NOT NULL,
    text                TEXT NOT NULL,
    type                TEXT NOT NULL,
    score               REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_received_ts ON messages(received_ts DESC);
CREATE INDEX IF NOT EXISTS idx_messages_type ON messages(type);
";

// ─── Row types ───────────────────────────────────────────────────────────────

/// A message about to be inserted.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub telegram_message_id: Option<i64>,
    pub telegram_chat_id: Option<String>,
    /// Seconds epoch; non-finite or negative values fall back to now.
    pub message_ts: Option<f64>,
    pub chat: String,
    pub sender: String,
    pub text: String,
    pub kind: String,
    pub score: f64,
}

/// A persisted row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: i64,
    pub telegram_message_id: Option<i64>,
    pub telegram_chat_id: Option<String>,
    /// Seconds epoch.
    pub message_ts: i64,
    /// Milliseconds epoch at insert time; canonical recency key.
    pub received_ts: i64,
    pub chat: String,
    pub sender: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub score: f64,
}

// ─── MessageStore ────────────────────────────────────────────────────────────

pub struct MessageStore {
    conn: Mutex<Connection>,
}

impl MessageStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Init(format!("creating {}: {e}", parent.display())))?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        // journal_mode reports the resulting mode back; discard it.
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert one classified message; returns the new row id.
    pub fn store(&self, msg: &NewMessage) -> Result<i64, StoreError> {
        let message_ts = coerce_message_ts(msg.message_ts);
        let received_ts = chrono::Utc::now().timestamp_millis();
        let score = if msg.score.is_finite() {
            msg.score.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO messages
                (telegram_message_id, telegram_chat_id, message_ts, received_ts,
                 chat, sender, text, type, score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                msg.telegram_message_id,
                msg.telegram_chat_id,
                message_ts,
                received_ts,
                msg.chat,
                msg.sender,
                msg.text,
                msg.kind,
                score,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The most recent rows, newest first. `limit` is clamped into 1..=1000.
    pub fn read_recent(&self, limit: i64) -> Result<Vec<StoredMessage>, StoreError> {
        let limit = limit.clamp(1, 1000);
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT id, telegram_message_id, telegram_chat_id, message_ts, received_ts,
                    chat, sender, text, type, score
             FROM messages
             ORDER BY received_ts DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], |row| {
            Ok(StoredMessage {
                id: row.get(0)?,
                telegram_message_id: row.get(1)?,
                telegram_chat_id: row.get(2)?,
                message_ts: row.get(3)?,
                received_ts: row.get(4)?,
                chat: row.get(5)?,
                sender: row.get(6)?,
                text: row.get(7)?,
                kind: row.get(8)?,
                score: row.get(9)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Counts grouped by verdict; every verdict key is present, zero when
    /// nothing was stored under it.
    pub fn read_stats(&self) -> Result<BTreeMap<String, i64>, StoreError> {
        let mut stats: BTreeMap<String, i64> =
            THREAT_TYPES.iter().map(|t| ((*t).to_owned(), 0)).collect();

        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare("SELECT type, COUNT(*) FROM messages GROUP BY type")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (kind, count) = row?;
            stats.insert(kind, count);
        }
        Ok(stats)
    }
}

fn coerce_message_ts(ts: Option<f64>) -> i64 {
    match ts {
        Some(v) if v.is_finite() && v >= 0.0 => v.trunc() as i64,
        _ => chrono::Utc::now().timestamp(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MessageStore {
        MessageStore::open_in_memory().unwrap()
    }

    fn msg(text: &str, kind: &str, score: f64) -> NewMessage {
        NewMessage {
            telegram_message_id: Some(100),
            telegram_chat_id: Some("-100500".to_owned()),
            message_ts: Some(1_700_000_000.0),
            chat: "test chat".to_owned(),
            sender: "tester".to_owned(),
            text: text.to_owned(),
            kind: kind.to_owned(),
            score,
        }
    }

    // ── store / read_recent ──────────────────────────────────────────────────

    #[test]
    fn stored_row_round_trips() {
        let s = store();
        let id = s.store(&msg("привет", "safe", 0.93)).unwrap();
        let rows = s.read_recent(10).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.id, id);
        assert_eq!(row.telegram_message_id, Some(100));
        assert_eq!(row.telegram_chat_id.as_deref(), Some("-100500"));
        assert_eq!(row.message_ts, 1_700_000_000);
        assert_eq!(row.chat, "test chat");
        assert_eq!(row.sender, "tester");
        assert_eq!(row.text, "привет");
        assert_eq!(row.kind, "safe");
        assert_eq!(row.score, 0.93);
        assert!(row.received_ts > 0);
    }

    #[test]
    fn read_recent_returns_newest_first() {
        let s = store();
        for i in 0..5 {
            s.store(&msg(&format!("m{i}"), "safe", 0.5)).unwrap();
        }
        let rows = s.read_recent(3).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].text, "m4");
        assert_eq!(rows[1].text, "m3");
        assert_eq!(rows[2].text, "m2");
        assert!(rows[0].received_ts >= rows[1].received_ts);
    }

    #[test]
    fn read_recent_clamps_limit() {
        let s = store();
        for i in 0..3 {
            s.store(&msg(&format!("m{i}"), "safe", 0.5)).unwrap();
        }
        assert_eq!(s.read_recent(0).unwrap().len(), 1);
        assert_eq!(s.read_recent(-5).unwrap().len(), 1);
        assert_eq!(s.read_recent(100_000).unwrap().len(), 3);
    }

    #[test]
    fn score_is_clamped_to_unit_interval() {
        let s = store();
        s.store(&msg("a", "scam", 3.5)).unwrap();
        s.store(&msg("b", "scam", -1.0)).unwrap();
        s.store(&msg("c", "scam", f64::NAN)).unwrap();
        let rows = s.read_recent(3).unwrap();
        assert_eq!(rows[0].score, 0.0);
        assert_eq!(rows[1].score, 0.0);
        assert_eq!(rows[2].score, 1.0);
    }

    #[test]
    fn message_ts_defaults_to_now_when_missing_or_bogus() {
        let s = store();
        let before = chrono::Utc::now().timestamp();
        let mut m = msg("x", "safe", 0.5);
        m.message_ts = None;
        s.store(&m).unwrap();
        m.message_ts = Some(f64::NAN);
        s.store(&m).unwrap();
        m.message_ts = Some(-5.0);
        s.store(&m).unwrap();
        for row in s.read_recent(3).unwrap() {
            assert!(row.message_ts >= before);
        }
    }

    #[test]
    fn nullable_telegram_ids_stay_null() {
        let s = store();
        let mut m = msg("x", "safe", 0.5);
        m.telegram_message_id = None;
        m.telegram_chat_id = None;
        s.store(&m).unwrap();
        let row = &s.read_recent(1).unwrap()[0];
        assert_eq!(row.telegram_message_id, None);
        assert_eq!(row.telegram_chat_id, None);
    }

    // ── read_stats ───────────────────────────────────────────────────────────

    #[test]
    fn stats_carry_all_seven_categories() {
        let s = store();
        let stats = s.read_stats().unwrap();
        assert_eq!(stats.len(), 7);
        for t in THREAT_TYPES {
            assert_eq!(stats[t], 0, "{t}");
        }
    }

    #[test]
    fn stats_count_by_type() {
        let s = store();
        s.store(&msg("a", "scam", 0.9)).unwrap();
        s.store(&msg("b", "scam", 0.8)).unwrap();
        s.store(&msg("c", "drugs", 0.95)).unwrap();
        let stats = s.read_stats().unwrap();
        assert_eq!(stats["scam"], 2);
        assert_eq!(stats["drugs"], 1);
        assert_eq!(stats["safe"], 0);
    }

    #[test]
    fn serialized_row_uses_wire_field_names() {
        let s = store();
        s.store(&msg("x", "threat", 0.8)).unwrap();
        let row = &s.read_recent(1).unwrap()[0];
        let json = serde_json::to_value(row).unwrap();
        assert_eq!(json["type"], "threat");
        assert!(json.get("telegramChatId").is_some());
        assert!(json.get("receivedTs").is_some());
    }
}
