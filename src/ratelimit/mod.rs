//! Request throttling.
//!
//! A sliding window with a cooldown, keyed per action × actor. Windows admit
//! at most `max` requests; overflowing a window arms a cooldown during which
//! everything is denied. Expired entries are garbage-collected lazily on
//! access.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

// ─── Policies ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RatePolicy {
    pub action: &'static str,
    pub window_ms: u64,
    pub max: u32,
    pub cooldown_ms: u64,
    pub message: &'static str,
}

const MIN: u64 = 60_000;
const SEC: u64 = 1_000;

/// Per-action policy table.
pub const POLICIES: &[RatePolicy] = &[
    RatePolicy {
        action: "login",
        window_ms: 10 * MIN,
        max: 10,
        cooldown_ms: 5 * MIN,
        message: "Too many login attempts, try again later.",
    },
    RatePolicy {
        action: "settings_get",
        window_ms: 60 * SEC,
        max: 60,
        cooldown_ms: 10 * SEC,
        message: "Settings are being requested too often.",
    },
    RatePolicy {
        action: "settings_save",
        window_ms: 60 * SEC,
        max: 6,
        cooldown_ms: 20 * SEC,
        message: "Settings are being saved too often.",
    },
    RatePolicy {
        action: "session_request_code",
        window_ms: 10 * MIN,
        max: 2,
        cooldown_ms: 15 * MIN,
        message: "Too many login-code requests; Telegram rate limits these aggressively.",
    },
    RatePolicy {
        action: "session_complete",
        window_ms: 5 * MIN,
        max: 8,
        cooldown_ms: 60 * SEC,
        message: "Too many sign-in attempts.",
    },
    RatePolicy {
        action: "chat_sync",
        window_ms: 2 * MIN,
        max: 2,
        cooldown_ms: 90 * SEC,
        message: "Chat list was synced moments ago, wait before retrying.",
    },
    RatePolicy {
        action: "engine_control",
        window_ms: 60 * SEC,
        max: 6,
        cooldown_ms: 30 * SEC,
        message: "Engine is being started/stopped too often.",
    },
    RatePolicy {
        action: "engine_test",
        window_ms: 60 * SEC,
        max: 8,
        cooldown_ms: 30 * SEC,
        message: "Self-test is being run too often.",
    },
    RatePolicy {
        action: "status",
        window_ms: 60 * SEC,
        max: 180,
        cooldown_ms: 10 * SEC,
        message: "Status is being polled too often.",
    },
    RatePolicy {
        action: "messages",
        window_ms: 60 * SEC,
        max: 180,
        cooldown_ms: 10 * SEC,
        message: "Message feed is being polled too often.",
    },
    RatePolicy {
        action: "stats",
        window_ms: 60 * SEC,
        max: 180,
        cooldown_ms: 10 * SEC,
        message: "Stats are being polled too often.",
    },
];

pub fn policy_for(action: &str) -> Option<&'static RatePolicy> {
    POLICIES.iter().find(|p| p.action == action)
}

// ─── Decision ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied { retry_after_ms: u64 },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

// ─── RateLimiter ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Entry {
    window_start: u64,
    count: u32,
    blocked_until: u64,
    /// When this entry stops mattering; GC key. Policies differ per action,
    /// so the horizon is stored per entry rather than derived at scan time.
    expires_at: u64,
}

impl Entry {
    fn fresh(now: u64, policy: &RatePolicy) -> Self {
        Self {
            window_start: now,
            count: 1,
            blocked_until: 0,
            expires_at: now + policy.window_ms,
        }
    }
}

#[derive(Default)]
pub struct RateLimiter {
    entries: Mutex<HashMap<String, Entry>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge one request against `policy` for `actor_key`.
    pub fn consume(&self, policy: &RatePolicy, actor_key: &str) -> Decision {
        self.consume_at(policy, actor_key, now_ms())
    }

    /// Time-injectable core, used directly by tests.
    pub fn consume_at(&self, policy: &RatePolicy, actor_key: &str, now: u64) -> Decision {
        let key = format!("{}|{}", policy.action, actor_key);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        // Lazy GC: drop entries past their own horizon.
        entries.retain(|_, e| e.expires_at > now);

        let Some(entry) = entries.get_mut(&key) else {
            entries.insert(key, Entry::fresh(now, policy));
            return Decision::Allowed;
        };

        if entry.blocked_until > now {
            return Decision::Denied {
                retry_after_ms: entry.blocked_until - now,
            };
        }

        if now.saturating_sub(entry.window_start) >= policy.window_ms {
            *entry = Entry::fresh(now, policy);
            return Decision::Allowed;
        }

        if entry.count >= policy.max {
            entry.blocked_until = now + policy.cooldown_ms;
            entry.expires_at = entry.expires_at.max(entry.blocked_until);
            return Decision::Denied {
                retry_after_ms: policy.cooldown_ms,
            };
        }

        entry.count += 1;
        Decision::Allowed
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
