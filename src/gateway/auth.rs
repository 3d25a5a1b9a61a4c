//! Accounts, cookie sessions, and the request-context middleware.
//!
//! Two built-in accounts (`admin`, `viewer`) with passwords taken from the
//! environment (development fallbacks baked in). Sessions are in-memory,
//! keyed by UUID, carried in an `httpOnly` cookie, and expire after one day.
//!
//! The middleware resolves the session cookie and the peer address into a
//! [`RequestContext`] extension; handlers enforce authentication, role, and
//! rate limits from there.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Mutex,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::error::ApiError;
use crate::ratelimit::{Decision, policy_for};
use crate::state::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "cw_session";

/// Session lifetime: one day.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// ─── Roles & accounts ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Viewer => "viewer",
        }
    }
}

/// The two built-in accounts, stored as SHA-256 password digests.
pub struct Accounts {
    admin_digest: [u8; 32],
    viewer_digest: [u8; 32],
}

fn digest(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

impl Accounts {
    pub fn new(admin_password: &str, viewer_password: &str) -> Self {
        Self {
            admin_digest: digest(admin_password),
            viewer_digest: digest(viewer_password),
        }
    }

    /// Passwords from `CHATWARDEN_ADMIN_PASSWORD` / `CHATWARDEN_VIEWER_PASSWORD`;
    /// the fallbacks exist for local development only.
    pub fn from_env() -> Self {
        let admin = std::env::var("CHATWARDEN_ADMIN_PASSWORD")
            .unwrap_or_else(|_| "chatwarden-admin".to_owned());
        let viewer = std::env::var("CHATWARDEN_VIEWER_PASSWORD")
            .unwrap_or_else(|_| "chatwarden-viewer".to_owned());
        Self::new(&admin, &viewer)
    }

    pub fn verify(&self, username: &str, password: &str) -> Option<Role> {
        let expected = match username {
            "admin" => &self.admin_digest,
            "viewer" => &self.viewer_digest,
            _ => return None,
        };
        (digest(password) == *expected).then_some(match username {
            "admin" => Role::Admin,
            _ => Role::Viewer,
        })
    }
}

// ─── Session store ───────────────────────────────────────────────────────────

struct SessionData {
    username: String,
    role: Role,
    created_at: Instant,
}

/// In-memory session map, swept on access.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionData>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, username: &str, role: Role) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, s| s.created_at.elapsed() < SESSION_TTL);
        sessions.insert(
            id.clone(),
            SessionData {
                username: username.to_owned(),
                role,
                created_at: Instant::now(),
            },
        );
        id
    }

    pub fn resolve(&self, id: &str) -> Option<(String, Role)> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, s| s.created_at.elapsed() < SESSION_TTL);
        sessions.get(id).map(|s| (s.username.clone(), s.role))
    }

    pub fn destroy(&self, id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .is_some()
    }
}

// ─── Cookies ─────────────────────────────────────────────────────────────────

/// `Set-Cookie` value establishing a session.
pub fn session_cookie(session_id: &str, production: bool) -> String {
    let secure = if production { "; Secure" } else { "" };
    format!(
        "{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{secure}",
        SESSION_TTL.as_secs()
    )
}

/// `Set-Cookie` value clearing the session.
pub fn clear_cookie(production: bool) -> String {
    let secure = if production { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{secure}")
}

/// Extract the session id from a `Cookie` header.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_owned())
    })
}

// ─── Request context ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
    pub role: Role,
    pub session_id: String,
}

/// Resolved per-request identity: who is calling, and the actor key their
/// rate-limit entries hang off.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: Option<CurrentUser>,
    pub actor_key: String,
}

impl RequestContext {
    pub fn build(user: Option<CurrentUser>, remote: Option<SocketAddr>) -> Self {
        let remote = remote.map(|a| a.ip().to_string()).unwrap_or_default();
        let actor_key = match &user {
            Some(u) => format!("{}|{}|{remote}", u.username, u.session_id),
            None => format!("anonymous||{remote}"),
        };
        Self { user, actor_key }
    }

    /// Any authenticated user, or 401.
    pub fn require_user(&self) -> Result<&CurrentUser, ApiError> {
        self.user.as_ref().ok_or(ApiError::AuthRequired)
    }

    /// Admin role, or 401/403.
    pub fn require_admin(&self) -> Result<&CurrentUser, ApiError> {
        let user = self.require_user()?;
        if user.role == Role::Admin {
            Ok(user)
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

/// Charge one request against the named action's policy for this caller.
/// Denials perform no side effects beyond arming the limiter's cooldown.
pub fn enforce_rate_limit(
    state: &AppState,
    ctx: &RequestContext,
    action: &str,
) -> Result<(), ApiError> {
    let Some(policy) = policy_for(action) else {
        return Ok(());
    };
    match state.limiter.consume(policy, &ctx.actor_key) {
        Decision::Allowed => Ok(()),
        Decision::Denied { retry_after_ms } => Err(ApiError::RateLimited {
            action: policy.action,
            retry_after_ms,
            message: policy.message,
        }),
    }
}

/// Middleware: resolve session cookie + peer address into a
/// [`RequestContext`] extension for every `/api` request.
pub async fn context_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);

    let user = session_id_from_headers(request.headers()).and_then(|sid| {
        state
            .sessions
            .resolve(&sid)
            .map(|(username, role)| CurrentUser {
                username,
                role,
                session_id: sid,
            })
    });

    request.extensions_mut().insert(RequestContext::build(user, remote));
    next.run(request).await
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    // ── Accounts ─────────────────────────────────────────────────────────────

    #[test]
    fn verify_accepts_matching_passwords() {
        let accounts = Accounts::new("s3cret", "v1ewer");
        assert_eq!(accounts.verify("admin", "s3cret"), Some(Role::Admin));
        assert_eq!(accounts.verify("viewer", "v1ewer"), Some(Role::Viewer));
    }

    #[test]
    fn verify_rejects_wrong_password_and_unknown_user() {
        let accounts = Accounts::new("s3cret", "v1ewer");
        assert_eq!(accounts.verify("admin", "wrong"), None);
        assert_eq!(accounts.verify("root", "s3cret"), None);
    }

    // ── Sessions ─────────────────────────────────────────────────────────────

    #[test]
    fn session_round_trip() {
        let store = SessionStore::new();
        let id = store.create("admin", Role::Admin);
        assert_eq!(store.resolve(&id), Some(("admin".to_owned(), Role::Admin)));
        assert!(store.destroy(&id));
        assert_eq!(store.resolve(&id), None);
    }

    #[test]
    fn destroying_twice_reports_false() {
        let store = SessionStore::new();
        let id = store.create("viewer", Role::Viewer);
        assert!(store.destroy(&id));
        assert!(!store.destroy(&id));
    }

    // ── Cookies ──────────────────────────────────────────────────────────────

    #[test]
    fn session_cookie_is_http_only_lax() {
        let value = session_cookie("abc", false);
        assert!(value.contains("cw_session=abc"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=86400"));
        assert!(!value.contains("Secure"));
    }

    #[test]
    fn production_cookie_is_secure() {
        assert!(session_cookie("abc", true).contains("Secure"));
        assert!(clear_cookie(true).contains("Secure"));
    }

    #[test]
    fn clear_cookie_zeroes_max_age() {
        assert!(clear_cookie(false).contains("Max-Age=0"));
    }

    #[test]
    fn cookie_parsing_handles_multiple_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            "theme=dark; cw_session=deadbeef; lang=ru".parse().unwrap(),
        );
        assert_eq!(session_id_from_headers(&headers).as_deref(), Some("deadbeef"));
    }

    #[test]
    fn missing_cookie_yields_none() {
        let headers = HeaderMap::new();
        assert_eq!(session_id_from_headers(&headers), None);
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "other=1".parse().unwrap());
        assert_eq!(session_id_from_headers(&headers), None);
    }

    // ── Request context ──────────────────────────────────────────────────────

    #[test]
    fn anonymous_actor_key() {
        let ctx = RequestContext::build(None, Some("10.0.0.5:4242".parse().unwrap()));
        assert_eq!(ctx.actor_key, "anonymous||10.0.0.5");
        assert!(ctx.require_user().is_err());
    }

    #[test]
    fn authenticated_actor_key_includes_session() {
        let user = CurrentUser {
            username: "admin".into(),
            role: Role::Admin,
            session_id: "sid".into(),
        };
        let ctx = RequestContext::build(Some(user), Some("10.0.0.5:4242".parse().unwrap()));
        assert_eq!(ctx.actor_key, "admin|sid|10.0.0.5");
        assert!(ctx.require_admin().is_ok());
    }

    #[test]
    fn viewer_cannot_pass_admin_check() {
        let user = CurrentUser {
            username: "viewer".into(),
            role: Role::Viewer,
            session_id: "sid".into(),
        };
        let ctx = RequestContext::build(Some(user), None);
        assert!(ctx.require_user().is_ok());
        assert!(matches!(ctx.require_admin(), Err(ApiError::Forbidden)));
    }
}
