//! User-account adapter (grammers / MTProto).
//!
//! Sessions are carried around as base64 strings so they fit in the settings
//! document. The login-code flow hands a live [`Client`] to the pending
//! registry between "request code" and "complete"; 2FA surfaces as a typed
//! outcome instead of an error-string probe.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use grammers_client::types::{Chat, LoginToken};
use grammers_client::{Client, Config, InitParams, SignInError, Update};
use grammers_session::Session;
use tokio::sync::mpsc;

use super::{ChatSummary, MonitorEvent, TelegramError};

// ─── Session strings ─────────────────────────────────────────────────────────

/// Serialize the client's current session as a base64 string.
pub fn export_session(client: &Client) -> String {
    BASE64.encode(client.session().save())
}

fn load_session(session_string: &str) -> Result<Session, TelegramError> {
    if session_string.trim().is_empty() {
        return Ok(Session::new());
    }
    let bytes = BASE64
        .decode(session_string.trim())
        .map_err(|e| TelegramError::InvalidCredentials(format!("bad session string: {e}")))?;
    Session::load(&bytes)
        .map_err(|e| TelegramError::InvalidCredentials(format!("bad session string: {e}")))
}

// ─── Connecting ──────────────────────────────────────────────────────────────

async fn connect(api_id: i32, api_hash: &str, session: Session) -> Result<Client, TelegramError> {
    Client::connect(Config {
        session,
        api_id,
        api_hash: api_hash.to_owned(),
        params: InitParams::default(),
    })
    .await
    .map_err(|e| TelegramError::Transport(format!("connect failed: {e}")))
}

/// Connect with a fresh in-memory session (login-code flow).
pub async fn connect_fresh(api_id: i32, api_hash: &str) -> Result<Client, TelegramError> {
    connect(api_id, api_hash, Session::new()).await
}

/// Connect with a saved session string for monitoring.
///
/// Refuses sessions that are not authorized or that belong to a bot account.
/// Returns the client plus the re-exported session string when connecting
/// rewrote it (the caller persists the new one).
pub async fn connect_for_monitoring(
    api_id: i32,
    api_hash: &str,
    session_string: &str,
) -> Result<(Client, Option<String>), TelegramError> {
    let client = connect(api_id, api_hash, load_session(session_string)?).await?;

    let authorized = client
        .is_authorized()
        .await
        .map_err(|e| TelegramError::Transport(format!("authorization check failed: {e}")))?;
    if !authorized {
        return Err(TelegramError::Unauthorized);
    }

    let me = client
        .get_me()
        .await
        .map_err(|e| TelegramError::Transport(format!("getMe failed: {e}")))?;
    if me.is_bot() {
        return Err(TelegramError::BotSession);
    }

    let exported = export_session(&client);
    let changed = (exported != session_string.trim()).then_some(exported);
    Ok((client, changed))
}

// ─── Login-code flow ─────────────────────────────────────────────────────────

/// Ask Telegram to send a login code to `phone`.
pub async fn request_login_code(
    client: &Client,
    phone: &str,
) -> Result<LoginToken, TelegramError> {
    client
        .request_login_code(phone)
        .await
        .map_err(|e| TelegramError::Transport(format!("sendCode failed: {e}")))
}

/// Outcome of a sign-in attempt.
pub enum SignInOutcome {
    /// Fully signed in; carries the exported session string.
    Authorized { session_string: String },
    /// The account has 2FA enabled and no password was supplied.
    PasswordRequired,
}

/// Complete the login with the received code and, for 2FA accounts, the
/// cloud password.
pub async fn complete_sign_in(
    client: &Client,
    token: &LoginToken,
    code: &str,
    password: Option<&str>,
) -> Result<SignInOutcome, TelegramError> {
    match client.sign_in(token, code).await {
        Ok(_user) => Ok(SignInOutcome::Authorized {
            session_string: export_session(client),
        }),
        Err(SignInError::PasswordRequired(password_token)) => match password {
            None => Ok(SignInOutcome::PasswordRequired),
            Some(password) => {
                client
                    .check_password(password_token, password)
                    .await
                    .map_err(|e| {
                        TelegramError::InvalidCredentials(format!("password sign-in failed: {e}"))
                    })?;
                Ok(SignInOutcome::Authorized {
                    session_string: export_session(client),
                })
            }
        },
        Err(e) => Err(TelegramError::InvalidCredentials(format!(
            "sign-in failed: {e}"
        ))),
    }
}

// ─── Chat listing ────────────────────────────────────────────────────────────

fn chat_kind(chat: &Chat) -> &'static str {
    match chat {
        Chat::User(_) => "private",
        Chat::Group(_) => "group",
        Chat::Channel(_) => "channel",
    }
}

fn classify_rpc_error(e: impl std::fmt::Display) -> TelegramError {
    let text = e.to_string();
    if text.contains("BOT_METHOD_INVALID") {
        TelegramError::BotMethodInvalid
    } else {
        TelegramError::Transport(text)
    }
}

/// Enumerate every dialog of the account.
pub async fn list_dialogs(client: &Client) -> Result<Vec<ChatSummary>, TelegramError> {
    let mut out = Vec::new();
    let mut dialogs = client.iter_dialogs();
    loop {
        match dialogs.next().await {
            Ok(Some(dialog)) => {
                let chat = dialog.chat();
                out.push(ChatSummary {
                    id: chat.id().to_string(),
                    title: chat.name().to_owned(),
                    kind: chat_kind(chat).to_owned(),
                    photo: None,
                    source: "user".to_owned(),
                });
            }
            Ok(None) => break,
            Err(e) => return Err(classify_rpc_error(e)),
        }
    }
    Ok(out)
}

// ─── Event loop ──────────────────────────────────────────────────────────────

/// Stream new messages, forwarding matching ones on `tx`.
///
/// With `all_dialogs` every conversation is watched and `targets` is
/// ignored; otherwise only the listed chat ids pass (empty list ⇒
/// unfiltered). Runs until the receiver is dropped.
pub async fn listen(
    client: Client,
    targets: Vec<String>,
    all_dialogs: bool,
    tx: mpsc::Sender<MonitorEvent>,
) -> Result<(), TelegramError> {
    loop {
        let update = match client.next_update().await {
            Ok(update) => update,
            Err(e) => {
                if tx.is_closed() {
                    return Ok(());
                }
                return Err(TelegramError::Transport(format!("update stream failed: {e}")));
            }
        };

        let Update::NewMessage(message) = update else {
            continue;
        };
        if message.outgoing() {
            continue;
        }

        let chat = message.chat();
        let chat_id = chat.id().to_string();
        if !all_dialogs && !targets.is_empty() && !targets.contains(&chat_id) {
            continue;
        }

        let text = message.text();
        if text.is_empty() {
            continue;
        }

        let sender = message
            .sender()
            .map(|s| s.name().to_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| chat_id.clone());

        let event = MonitorEvent {
            text: text.to_owned(),
            sender,
            chat: chat.name().to_owned(),
            chat_id: Some(chat_id),
            message_id: Some(i64::from(message.id())),
            message_ts: Some(message.date().timestamp() as f64),
        };

        if tx.send(event).await.is_err() {
            return Ok(());
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
