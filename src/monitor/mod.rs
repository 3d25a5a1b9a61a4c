//! Ingestion runtime.
//!
//! Owns the Telegram client lifecycle and routes inbound messages through
//! the analysis engine into the message store:
//!
//! ```text
//!  Telegram (bot long-poll | user update stream)
//!            │ mpsc<MonitorEvent>
//!            ▼
//!      handle_event() ── engine.analyze() ──▶ MessageStore
//! ```
//!
//! States: `stopped → starting → running → stopping → stopped`. One instance
//! runs at a time; any start failure returns the runtime to `stopped` and
//! surfaces the error text verbatim.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::config::{AuthMode, Settings, SettingsStore, store::ConfigError};
use crate::database::{MessageStore, NewMessage};
use crate::engine::AnalysisEngine;
use crate::inference::InferenceError;
use crate::telegram::{MonitorEvent, TelegramError, bot::BotAdapter, user};

const EVENT_BUFFER: usize = 256;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("already running")]
    AlreadyRunning,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Telegram(#[from] TelegramError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub is_running: bool,
    pub model: String,
    /// Decision threshold as a ratio.
    pub threshold: f64,
}

// ─── Runtime ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stopped,
    Starting,
    Running,
    Stopping,
}

struct Inner {
    phase: Phase,
    tasks: Vec<JoinHandle<()>>,
    model_id: String,
    threshold: f64,
}

pub struct MonitorRuntime {
    settings: Arc<SettingsStore>,
    store: Arc<MessageStore>,
    engine: Arc<AnalysisEngine>,
    inner: Mutex<Inner>,
}

impl MonitorRuntime {
    pub fn new(
        settings: Arc<SettingsStore>,
        store: Arc<MessageStore>,
        engine: Arc<AnalysisEngine>,
    ) -> Self {
        Self {
            settings,
            store,
            engine,
            inner: Mutex::new(Inner {
                phase: Phase::Stopped,
                tasks: Vec::new(),
                model_id: String::new(),
                threshold: 0.0,
            }),
        }
    }

    /// Start monitoring. `overrides` (when present) is merged into the
    /// persisted settings first.
    ///
    /// In user mode with `userAuthAllMessages` enabled, a non-empty target
    /// list is saved but deliberately not used for subscription.
    pub async fn start(&self, overrides: Option<Value>) -> Result<MonitorStatus, MonitorError> {
        let mut inner = self.inner.lock().await;
        if matches!(inner.phase, Phase::Running | Phase::Starting) {
            return Err(MonitorError::AlreadyRunning);
        }
        inner.phase = Phase::Starting;

        match self.spin_up(&mut inner, overrides).await {
            Ok(status) => {
                inner.phase = Phase::Running;
                log::info!(
                    "monitor: running (model={}, threshold={})",
                    status.model,
                    status.threshold
                );
                Ok(status)
            }
            Err(e) => {
                for task in inner.tasks.drain(..) {
                    task.abort();
                }
                inner.phase = Phase::Stopped;
                Err(e)
            }
        }
    }

    async fn spin_up(
        &self,
        inner: &mut Inner,
        overrides: Option<Value>,
    ) -> Result<MonitorStatus, MonitorError> {
        let settings = match overrides {
            Some(patch) => self.settings.merge(&patch)?,
            None => self.settings.get(),
        };
        validate_credentials(&settings)?;

        // Pre-warm the selected classifier so the first message does not pay
        // the load latency (and so a broken model fails the start, loudly).
        self.engine.cache().get(&settings.ml_model).await?;

        let (tx, rx) = mpsc::channel::<MonitorEvent>(EVENT_BUFFER);

        let listener = match settings.auth_mode {
            AuthMode::Bot => {
                let adapter = BotAdapter::new(&settings.bot_token);
                let name = adapter.validate().await?;
                log::info!("monitor: bot session validated as {name}");
                let targets = settings.bot_target_chats.clone();
                tokio::spawn(async move {
                    if let Err(e) = adapter.listen(targets, tx).await {
                        log::warn!("monitor: bot listener exited: {e}");
                    }
                })
            }
            AuthMode::User => {
                let api_id = parse_api_id(&settings.api_id)?;
                let (client, rotated) =
                    user::connect_for_monitoring(api_id, &settings.api_hash, &settings.session_string)
                        .await?;
                if let Some(session_string) = rotated {
                    self.settings
                        .merge(&json!({ "sessionString": session_string }))?;
                    log::info!("monitor: session string rotated during connect, persisted");
                }
                let all_dialogs = settings.user_auth_all_messages;
                let targets = settings.user_target_chats.clone();
                tokio::spawn(async move {
                    if let Err(e) = user::listen(client, targets, all_dialogs, tx).await {
                        log::warn!("monitor: user listener exited: {e}");
                    }
                })
            }
        };

        let consumer = {
            let engine = Arc::clone(&self.engine);
            let store = Arc::clone(&self.store);
            let settings_store = Arc::clone(&self.settings);
            let mut rx = rx;
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let snapshot = settings_store.get();
                    handle_event(&engine, &store, &snapshot, event).await;
                }
            })
        };

        inner.tasks = vec![listener, consumer];
        inner.model_id = settings.ml_model.clone();
        inner.threshold = f64::from(settings.threat_threshold) / 100.0;

        Ok(MonitorStatus {
            is_running: true,
            model: inner.model_id.clone(),
            threshold: inner.threshold,
        })
    }

    /// Stop monitoring. Returns `false` when nothing was running.
    pub async fn stop(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.phase != Phase::Running {
            return false;
        }
        inner.phase = Phase::Stopping;
        // Aborting the listener drops the Telegram client, which closes the
        // connection; disconnect is best-effort by design.
        for task in inner.tasks.drain(..) {
            task.abort();
        }
        inner.phase = Phase::Stopped;
        log::info!("monitor: stopped");
        true
    }

    pub async fn status(&self) -> MonitorStatus {
        let inner = self.inner.lock().await;
        if inner.phase == Phase::Running {
            MonitorStatus {
                is_running: true,
                model: inner.model_id.clone(),
                threshold: inner.threshold,
            }
        } else {
            let settings = self.settings.get();
            MonitorStatus {
                is_running: false,
                model: settings.ml_model,
                threshold: f64::from(settings.threat_threshold) / 100.0,
            }
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn parse_api_id(raw: &str) -> Result<i32, MonitorError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| MonitorError::Validation("apiId must be a positive integer".to_owned()))
}

fn validate_credentials(settings: &Settings) -> Result<(), MonitorError> {
    match settings.auth_mode {
        AuthMode::Bot => {
            if settings.bot_token.trim().is_empty() {
                return Err(MonitorError::Validation(
                    "botToken is required in bot mode".to_owned(),
                ));
            }
        }
        AuthMode::User => {
            parse_api_id(&settings.api_id)?;
            if settings.api_hash.trim().is_empty() {
                return Err(MonitorError::Validation(
                    "apiHash is required in user mode".to_owned(),
                ));
            }
            if settings.session_string.trim().is_empty() {
                return Err(MonitorError::Validation(
                    "sessionString is required in user mode; generate one first".to_owned(),
                ));
            }
        }
    }
    Ok(())
}

/// Analyze one event and append the verdict to the store.
///
/// Storage failures are logged and swallowed: a broken disk must not halt
/// ingestion, and the engine already absorbs inference failures.
pub async fn handle_event(
    engine: &AnalysisEngine,
    store: &MessageStore,
    settings: &Settings,
    event: MonitorEvent,
) {
    let analysis = engine.analyze(&event.text, settings).await;
    let row = NewMessage {
        telegram_message_id: event.message_id,
        telegram_chat_id: event.chat_id,
        message_ts: event.message_ts,
        chat: event.chat,
        sender: event.sender,
        text: event.text,
        kind: analysis.verdict.clone(),
        score: analysis.score,
    };
    if let Err(e) = store.store(&row) {
        log::warn!("monitor: dropping message after storage error: {e}");
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::catalog::ModelSpec;
    use crate::inference::{Classifier, ClassifierCache, InferenceRuntime, ModelOutput};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct OfflineRuntime;

    #[async_trait]
    impl InferenceRuntime for OfflineRuntime {
        async fn load(
            &self,
            _spec: &'static ModelSpec,
        ) -> Result<Arc<dyn Classifier>, InferenceError> {
            Err(InferenceError::Load("offline".into()))
        }
    }

    struct ReadyClassifier;

    #[async_trait]
    impl Classifier for ReadyClassifier {
        async fn classify(&self, _text: &str, _top_k: usize) -> Result<ModelOutput, InferenceError> {
            Err(InferenceError::Transport("offline".into()))
        }
    }

    struct ReadyRuntime;

    #[async_trait]
    impl InferenceRuntime for ReadyRuntime {
        async fn load(
            &self,
            _spec: &'static ModelSpec,
        ) -> Result<Arc<dyn Classifier>, InferenceError> {
            Ok(Arc::new(ReadyClassifier))
        }
    }

    fn fixture(dir: &TempDir, inference_up: bool) -> MonitorRuntime {
        let settings = Arc::new(
            SettingsStore::open(dir.path().join("admin-settings.json")).unwrap(),
        );
        let store = Arc::new(MessageStore::open_in_memory().unwrap());
        let runtime: Arc<dyn InferenceRuntime> = if inference_up {
            Arc::new(ReadyRuntime)
        } else {
            Arc::new(OfflineRuntime)
        };
        let engine = Arc::new(AnalysisEngine::new(Arc::new(ClassifierCache::new(runtime))));
        MonitorRuntime::new(settings, store, engine)
    }

    // ── State machine ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn initial_status_is_stopped_with_settings_values() {
        let dir = TempDir::new().unwrap();
        let m = fixture(&dir, true);
        let status = m.status().await;
        assert!(!status.is_running);
        assert_eq!(status.model, "toxic-bert");
        assert!((status.threshold - 0.70).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stop_when_stopped_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let m = fixture(&dir, true);
        assert!(!m.stop().await);
    }

    #[tokio::test]
    async fn start_without_bot_token_fails_validation_and_stays_stopped() {
        let dir = TempDir::new().unwrap();
        let m = fixture(&dir, true);
        let err = m.start(None).await.unwrap_err();
        assert!(matches!(err, MonitorError::Validation(_)), "{err}");
        assert!(!m.status().await.is_running);
    }

    #[tokio::test]
    async fn start_in_user_mode_requires_session_string() {
        let dir = TempDir::new().unwrap();
        let m = fixture(&dir, true);
        let overrides = serde_json::json!({
            "authMode": "user",
            "apiId": "12345",
            "apiHash": "abcdef",
        });
        let err = m.start(Some(overrides)).await.unwrap_err();
        assert!(err.to_string().contains("sessionString"), "{err}");
    }

    #[tokio::test]
    async fn start_with_broken_inference_fails_prewarm() {
        let dir = TempDir::new().unwrap();
        let m = fixture(&dir, false);
        let overrides = serde_json::json!({ "botToken": "123:abc" });
        let err = m.start(Some(overrides)).await.unwrap_err();
        assert!(matches!(err, MonitorError::Inference(_)), "{err}");
        assert!(!m.status().await.is_running);
        // The override merge persisted before the failure, per the contract.
        let status = m.status().await;
        assert_eq!(status.model, "toxic-bert");
    }

    #[tokio::test]
    async fn invalid_api_id_is_rejected() {
        for bad in ["", "0", "-3", "abc"] {
            assert!(parse_api_id(bad).is_err(), "{bad:?}");
        }
        assert_eq!(parse_api_id(" 12345 ").unwrap(), 12345);
    }

    // ── Event handling ───────────────────────────────────────────────────────

    fn event(text: &str) -> MonitorEvent {
        MonitorEvent {
            text: text.to_owned(),
            sender: "Аноним".to_owned(),
            chat: "тестовый чат".to_owned(),
            chat_id: Some("-100500".to_owned()),
            message_id: Some(7),
            message_ts: Some(1_700_000_000.0),
        }
    }

    #[tokio::test]
    async fn handle_event_stores_the_verdict() {
        let dir = TempDir::new().unwrap();
        let m = fixture(&dir, false);
        let settings = m.settings.get();
        handle_event(
            &m.engine,
            &m.store,
            &settings,
            event("Продам мефедрон, есть закладки по городу."),
        )
        .await;

        let rows = m.store.read_recent(1).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, "drugs");
        assert_eq!(rows[0].telegram_message_id, Some(7));
        assert_eq!(rows[0].telegram_chat_id.as_deref(), Some("-100500"));
        assert!(rows[0].score >= 0.74);
    }

    #[tokio::test]
    async fn handle_event_stores_safe_messages_too() {
        let dir = TempDir::new().unwrap();
        let m = fixture(&dir, false);
        let settings = m.settings.get();
        handle_event(&m.engine, &m.store, &settings, event("Как дела?")).await;
        let rows = m.store.read_recent(1).unwrap();
        assert_eq!(rows[0].kind, "safe");
    }
}
