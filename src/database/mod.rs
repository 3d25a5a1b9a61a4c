//! SQLite persistence.
//!
//! One append-only `messages` table holding every classified message. The
//! database opens with WAL journaling and `synchronous=NORMAL`; the
//! ingestion event handler is the sole steady-state writer.

pub mod messages;

pub use messages::{MessageStore, NewMessage, StoredMessage};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database initialization error: {0}")]
    Init(String),
}
