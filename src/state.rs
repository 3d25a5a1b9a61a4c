//! Process-root-owned shared state.
//!
//! Everything handlers touch lives here, passed by `Arc` — no ambient
//! module-level mutability anywhere in the crate.

use std::sync::Arc;

use crate::config::SettingsStore;
use crate::database::MessageStore;
use crate::engine::AnalysisEngine;
use crate::gateway::auth::{Accounts, SessionStore};
use crate::monitor::MonitorRuntime;
use crate::ratelimit::RateLimiter;
use crate::telegram::pending::PendingAuthRegistry;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<SettingsStore>,
    pub store: Arc<MessageStore>,
    pub engine: Arc<AnalysisEngine>,
    pub monitor: Arc<MonitorRuntime>,
    pub limiter: Arc<RateLimiter>,
    pub sessions: Arc<SessionStore>,
    pub pending: Arc<PendingAuthRegistry>,
    pub accounts: Arc<Accounts>,
    /// Enables the `Secure` cookie flag (`CHATWARDEN_ENV=production`).
    pub production: bool,
}

impl AppState {
    /// Whether the process runs with the production flag set.
    pub fn production_from_env() -> bool {
        std::env::var("CHATWARDEN_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false)
    }
}
