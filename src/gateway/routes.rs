//! Control-API handlers.
//!
//! Every route declares its auth requirement and rate-limit action up front,
//! then does its work against [`AppState`]. Failures become [`ApiError`]s.

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

use super::auth::{RequestContext, clear_cookie, enforce_rate_limit, session_cookie};
use super::error::ApiError;
use crate::config::AuthMode;
use crate::engine::presets;
use crate::state::AppState;
use crate::telegram::pending::{PENDING_TTL, PendingAuth};
use crate::telegram::{ChatSummary, bot::BotAdapter, user};

/// Upper bound on messages accepted by the self-test endpoint.
const ENGINE_TEST_MAX_MESSAGES: usize = 50;

// ─── Health ──────────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "chatwarden" }))
}

// ─── Login / logout ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    enforce_rate_limit(&state, &ctx, "login")?;

    let role = state
        .accounts
        .verify(&body.username, &body.password)
        .ok_or(ApiError::InvalidCredentials)?;

    let session_id = state.sessions.create(&body.username, role);
    log::info!("gateway: {} logged in as {}", body.username, role.as_str());

    let mut response = Json(json!({
        "username": body.username,
        "role": role.as_str(),
    }))
    .into_response();
    if let Ok(value) = session_cookie(&session_id, state.production).parse() {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    Ok(response)
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, ApiError> {
    let user = ctx.require_user()?;
    state.sessions.destroy(&user.session_id);

    let mut response = Json(json!({ "ok": true })).into_response();
    if let Ok(value) = clear_cookie(state.production).parse() {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    Ok(response)
}

// ─── Settings ────────────────────────────────────────────────────────────────

pub async fn settings_get(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, ApiError> {
    ctx.require_admin()?;
    enforce_rate_limit(&state, &ctx, "settings_get")?;
    Ok(Json(state.settings.get()).into_response())
}

pub async fn settings_save(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(patch): Json<Value>,
) -> Result<Response, ApiError> {
    ctx.require_admin()?;
    enforce_rate_limit(&state, &ctx, "settings_save")?;
    if !patch.is_object() {
        return Err(ApiError::Validation("settings body must be an object".to_owned()));
    }
    let updated = state.settings.merge(&patch)?;
    Ok(Json(updated).into_response())
}

// ─── Session-string generation ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCodeBody {
    #[serde(default)]
    pub api_id: Value,
    #[serde(default)]
    pub api_hash: String,
    #[serde(default)]
    pub phone_number: String,
}

pub async fn session_request_code(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<RequestCodeBody>,
) -> Result<Response, ApiError> {
    ctx.require_admin()?;
    enforce_rate_limit(&state, &ctx, "session_request_code")?;

    let api_id = match &body.api_id {
        Value::String(s) => s.trim().parse::<i32>().ok(),
        Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        _ => None,
    }
    .filter(|v| *v > 0)
    .ok_or_else(|| ApiError::Validation("apiId must be a positive integer".to_owned()))?;

    let api_hash = body.api_hash.trim().to_owned();
    if api_hash.is_empty() {
        return Err(ApiError::Validation("apiHash is required".to_owned()));
    }
    let phone_number = body.phone_number.trim().to_owned();
    if phone_number.is_empty() {
        return Err(ApiError::Validation("phoneNumber is required".to_owned()));
    }

    let client = user::connect_fresh(api_id, &api_hash).await?;
    let login_token = user::request_login_code(&client, &phone_number).await?;

    let request_id = state.pending.insert(PendingAuth {
        client,
        login_token,
        api_id,
        api_hash,
        phone_number,
    });
    log::info!("gateway: login code requested, pending entry {request_id}");

    Ok(Json(json!({
        "requestId": request_id,
        "isCodeViaApp": true,
        "expiresInSeconds": PENDING_TTL.as_secs(),
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteBody {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub code: String,
    pub password: Option<String>,
}

pub async fn session_complete(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<CompleteBody>,
) -> Result<Response, ApiError> {
    ctx.require_admin()?;
    enforce_rate_limit(&state, &ctx, "session_complete")?;

    if body.request_id.trim().is_empty() {
        return Err(ApiError::Validation("requestId is required".to_owned()));
    }
    let entry = state
        .pending
        .take(body.request_id.trim())
        .ok_or_else(|| ApiError::NotFound("unknown or expired requestId".to_owned()))?;

    let code = body.code.trim();
    if code.is_empty() {
        // The entry is consumed on any failure, per the contract.
        return Err(ApiError::Validation("code is required".to_owned()));
    }

    match user::complete_sign_in(
        &entry.client,
        &entry.login_token,
        code,
        body.password.as_deref(),
    )
    .await
    {
        Ok(user::SignInOutcome::Authorized { session_string }) => {
            state
                .settings
                .merge(&json!({ "sessionString": session_string }))?;
            log::info!("gateway: user session generated for {}", entry.phone_number);
            Ok(Json(json!({ "sessionString": session_string })).into_response())
        }
        Ok(user::SignInOutcome::PasswordRequired) => {
            // 2FA bounce: park the live client again under the same id so
            // the follow-up request (code + password) can resume.
            let request_id = body.request_id.trim().to_owned();
            state.pending.insert_with_id(request_id.clone(), entry);
            Err(ApiError::PasswordRequired { request_id })
        }
        Err(e) => Err(e.into()),
    }
}

// ─── Chat sync ───────────────────────────────────────────────────────────────

pub async fn telegram_chats(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, ApiError> {
    ctx.require_admin()?;
    enforce_rate_limit(&state, &ctx, "chat_sync")?;

    let settings = state.settings.get();
    let (chats, source) = match settings.auth_mode {
        AuthMode::Bot => (bot_chat_list(&settings.bot_token, &settings.bot_target_chats).await?, "bot"),
        AuthMode::User => match user_chat_list(&settings).await {
            Ok(chats) => (chats, "user"),
            // A bot-account session cannot enumerate dialogs; fall back to
            // the Bot API path when a token is configured.
            Err(e) if e.is_bot_method_invalid() && !settings.bot_token.trim().is_empty() => {
                log::warn!("gateway: dialog listing unavailable, falling back to bot path");
                (
                    bot_chat_list(&settings.bot_token, &settings.bot_target_chats).await?,
                    "bot",
                )
            }
            Err(e) if e.is_bot_method_invalid() => {
                return Err(ApiError::Validation(
                    "this session cannot list dialogs and no bot token is configured".to_owned(),
                ));
            }
            Err(e) => return Err(e.into()),
        },
    };

    Ok(Json(json!({ "chats": chats, "source": source })).into_response())
}

async fn bot_chat_list(
    bot_token: &str,
    seed: &[String],
) -> Result<Vec<ChatSummary>, ApiError> {
    if bot_token.trim().is_empty() {
        return Err(ApiError::Validation("botToken is required for chat sync".to_owned()));
    }
    let adapter = BotAdapter::new(bot_token);
    Ok(adapter.list_chats(seed).await?)
}

async fn user_chat_list(
    settings: &crate::config::Settings,
) -> Result<Vec<ChatSummary>, crate::telegram::TelegramError> {
    use crate::telegram::TelegramError;

    let api_id = settings
        .api_id
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| {
            TelegramError::InvalidCredentials("apiId must be a positive integer".to_owned())
        })?;
    let (client, _) =
        user::connect_for_monitoring(api_id, &settings.api_hash, &settings.session_string).await?;
    user::list_dialogs(&client).await
}

// ─── Engine self-test ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EngineTestBody {
    pub settings: Option<Value>,
    pub messages: Option<Vec<String>>,
    pub preset: Option<String>,
}

pub async fn engine_test(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<EngineTestBody>,
) -> Result<Response, ApiError> {
    ctx.require_admin()?;
    enforce_rate_limit(&state, &ctx, "engine_test")?;

    // Sanitized overrides apply on top of the persisted settings for this
    // call only; nothing is written back.
    let mut doc = serde_json::to_value(state.settings.get())
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    if let Some(Value::Object(overlay)) = body.settings {
        if let Value::Object(base) = &mut doc {
            for (k, v) in overlay {
                base.insert(k, v);
            }
        }
    }
    let effective = crate::config::normalize(&doc);

    let messages: Vec<String> = match body.messages {
        Some(list) if !list.is_empty() => list
            .into_iter()
            .map(|m| m.trim().to_owned())
            .filter(|m| !m.is_empty())
            .take(ENGINE_TEST_MAX_MESSAGES)
            .collect(),
        _ => {
            let preset = body.preset.as_deref().unwrap_or("all");
            presets::preset_messages(preset)
                .ok_or_else(|| {
                    ApiError::Validation(format!("unknown preset '{preset}'"))
                })?
                .into_iter()
                .map(str::to_owned)
                .collect()
        }
    };
    if messages.is_empty() {
        return Err(ApiError::Validation("no messages to test".to_owned()));
    }

    let mut results = Vec::with_capacity(messages.len());
    let mut summary: BTreeMap<String, usize> = BTreeMap::new();
    for text in messages {
        let analysis = state.engine.analyze(&text, &effective).await;
        *summary.entry(analysis.verdict.clone()).or_default() += 1;
        results.push(json!({
            "text": text,
            "result": analysis,
        }));
    }

    Ok(Json(json!({ "results": results, "summary": summary })).into_response())
}

// ─── Engine control ──────────────────────────────────────────────────────────

pub async fn engine_start(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Option<Json<Value>>,
) -> Result<Response, ApiError> {
    ctx.require_admin()?;
    enforce_rate_limit(&state, &ctx, "engine_control")?;

    let overrides = body.map(|Json(v)| v).filter(Value::is_object);
    let status = state.monitor.start(overrides).await?;
    Ok(Json(status).into_response())
}

pub async fn engine_stop(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, ApiError> {
    ctx.require_admin()?;
    enforce_rate_limit(&state, &ctx, "engine_control")?;

    let stopped = state.monitor.stop().await;
    let status = state.monitor.status().await;
    Ok(Json(json!({ "stopped": stopped, "status": status })).into_response())
}

// ─── Read-only feeds ─────────────────────────────────────────────────────────

pub async fn status(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, ApiError> {
    ctx.require_user()?;
    enforce_rate_limit(&state, &ctx, "status")?;
    Ok(Json(state.monitor.status().await).into_response())
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<i64>,
}

pub async fn messages(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<MessagesQuery>,
) -> Result<Response, ApiError> {
    ctx.require_user()?;
    enforce_rate_limit(&state, &ctx, "messages")?;

    let rows = state.store.read_recent(query.limit.unwrap_or(100))?;
    let shaped: Vec<Value> = rows
        .into_iter()
        .map(|row| {
            json!({
                "id": row.id,
                "time": format_local_time(row.message_ts),
                "chat": row.chat,
                "sender": row.sender,
                "text": row.text,
                "type": row.kind,
                "score": row.score,
            })
        })
        .collect();
    Ok(Json(shaped).into_response())
}

pub async fn stats(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, ApiError> {
    ctx.require_user()?;
    enforce_rate_limit(&state, &ctx, "stats")?;
    Ok(Json(state.store.read_stats()?).into_response())
}

/// Local wall-clock time for a seconds epoch.
fn format_local_time(epoch_secs: i64) -> String {
    use chrono::TimeZone;
    chrono::Local
        .timestamp_opt(epoch_secs, 0)
        .single()
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_owned())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_time_formats_hms() {
        let formatted = format_local_time(1_700_000_000);
        assert_eq!(formatted.len(), 8);
        assert_eq!(formatted.matches(':').count(), 2);
    }

    #[test]
    fn local_time_handles_out_of_range() {
        assert_eq!(format_local_time(i64::MAX), "--:--:--");
    }
}
