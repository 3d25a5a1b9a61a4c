//! Router assembly and the HTTP server.

use std::net::SocketAddr;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::auth::context_middleware;
use super::routes::{
    engine_start, engine_stop, engine_test, health, login, logout, messages, session_complete,
    session_request_code, settings_get, settings_save, stats, status, telegram_chats,
};
use crate::state::AppState;

/// Default HTTP port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 8080;

/// Build the `/api` router. Exposed separately so tests can drive it
/// in-process with `tower::ServiceExt::oneshot`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/settings", get(settings_get).post(settings_save))
        .route("/api/session/request-code", post(session_request_code))
        .route("/api/session/complete", post(session_complete))
        .route("/api/telegram/chats", get(telegram_chats))
        .route("/api/engine/test", post(engine_test))
        .route("/api/start", post(engine_start))
        .route("/api/stop", post(engine_stop))
        .route("/api/status", get(status))
        .route("/api/messages", get(messages))
        .route("/api/stats", get(stats))
        .layer(middleware::from_fn_with_state(state.clone(), context_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolve the listen port from `PORT`.
pub fn port_from_env() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Bind and serve until shutdown is signalled. A graceful shutdown stops the
/// ingestion runtime first so the Telegram client disconnects cleanly.
pub async fn serve(state: AppState, port: u16) -> Result<(), String> {
    let monitor = state.monitor.clone();
    let app = build_router(state);

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("could not bind {addr}: {e}"))?;
    log::info!("gateway: listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        log::info!("gateway: shutdown signal received");
        monitor.stop().await;
    })
    .await
    .map_err(|e| format!("server error: {e}"))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
