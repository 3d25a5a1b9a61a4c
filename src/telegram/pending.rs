//! Pending session registry.
//!
//! User-account login is a two-step flow: "request code" connects a live
//! MTProto client and sends a login code, "complete" consumes it. Between
//! the two steps the live client is parked here, keyed by request id, with a
//! 15-minute TTL. Expired entries are swept on every access; dropping an
//! entry drops its client, which closes the connection.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use grammers_client::Client;
use grammers_client::types::LoginToken;
use uuid::Uuid;

/// How long a pending login stays claimable.
pub const PENDING_TTL: Duration = Duration::from_secs(15 * 60);

// ─── PendingAuth ─────────────────────────────────────────────────────────────

/// One in-flight user-account login.
pub struct PendingAuth {
    pub client: Client,
    pub login_token: LoginToken,
    pub api_id: i32,
    pub api_hash: String,
    pub phone_number: String,
}

// ─── PendingRegistry ─────────────────────────────────────────────────────────

/// TTL-bounded map of in-flight flows. Generic so tests can exercise the
/// lifecycle without a live Telegram client.
pub struct PendingRegistry<T> {
    entries: Mutex<HashMap<String, (T, Instant)>>,
    ttl: Duration,
}

pub type PendingAuthRegistry = PendingRegistry<PendingAuth>;

impl<T> PendingRegistry<T> {
    pub fn new() -> Self {
        Self::with_ttl(PENDING_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Park `value` under a fresh request id; returns the id.
    pub fn insert(&self, value: T) -> String {
        let id = Uuid::new_v4().to_string();
        self.insert_with_id(id.clone(), value);
        id
    }

    /// Park `value` under a caller-provided id (used to re-register an entry
    /// after a 2FA-required bounce without changing the id the UI holds).
    pub fn insert_with_id(&self, id: String, value: T) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Self::sweep(&mut entries, self.ttl);
        entries.insert(id, (value, Instant::now()));
    }

    /// Claim and remove the entry for `id`.
    pub fn take(&self, id: &str) -> Option<T> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Self::sweep(&mut entries, self.ttl);
        entries.remove(id).map(|(v, _)| v)
    }

    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Self::sweep(&mut entries, self.ttl);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sweep(entries: &mut HashMap<String, (T, Instant)>, ttl: Duration) {
        let before = entries.len();
        entries.retain(|_, (_, created)| created.elapsed() < ttl);
        let evicted = before - entries.len();
        if evicted > 0 {
            log::info!("pending-auth: evicted {evicted} expired entr{}", if evicted == 1 { "y" } else { "ies" });
        }
    }
}

impl<T> Default for PendingRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_take_round_trips() {
        let reg: PendingRegistry<String> = PendingRegistry::new();
        let id = reg.insert("flow".to_owned());
        assert_eq!(reg.take(&id).as_deref(), Some("flow"));
        // Consumed: a second take finds nothing.
        assert!(reg.take(&id).is_none());
    }

    #[test]
    fn unknown_id_yields_none() {
        let reg: PendingRegistry<String> = PendingRegistry::new();
        assert!(reg.take("nope").is_none());
    }

    #[test]
    fn reregister_keeps_the_same_id() {
        let reg: PendingRegistry<String> = PendingRegistry::new();
        let id = reg.insert("first".to_owned());
        let value = reg.take(&id).unwrap();
        reg.insert_with_id(id.clone(), value);
        assert_eq!(reg.take(&id).as_deref(), Some("first"));
    }

    #[test]
    fn expired_entries_are_swept_on_access() {
        let reg: PendingRegistry<String> = PendingRegistry::with_ttl(Duration::from_millis(0));
        let id = reg.insert("gone".to_owned());
        assert!(reg.take(&id).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn live_entries_survive_the_sweep() {
        let reg: PendingRegistry<String> = PendingRegistry::with_ttl(Duration::from_secs(60));
        let id = reg.insert("alive".to_owned());
        let _other = reg.insert("also alive".to_owned());
        assert_eq!(reg.len(), 2);
        assert!(reg.take(&id).is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn ids_are_unique() {
        let reg: PendingRegistry<u32> = PendingRegistry::new();
        let a = reg.insert(1);
        let b = reg.insert(2);
        assert_ne!(a, b);
    }
}
