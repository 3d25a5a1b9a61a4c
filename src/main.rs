//! Headless service entry point: boot the shared state, start the control
//! API, and let admins drive the ingestion runtime over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use chatwarden::config::{SettingsStore, store::SETTINGS_FILE};
use chatwarden::database::{MessageStore, messages::MESSAGES_FILE};
use chatwarden::engine::AnalysisEngine;
use chatwarden::gateway::{self, auth::{Accounts, SessionStore}};
use chatwarden::inference::{ClassifierCache, HttpInference};
use chatwarden::monitor::MonitorRuntime;
use chatwarden::ratelimit::RateLimiter;
use chatwarden::state::AppState;
use chatwarden::telegram::pending::PendingAuthRegistry;

#[derive(Parser)]
#[command(
    name = "chatwarden",
    version,
    about = "Telegram chat threat-monitoring service"
)]
struct Args {
    /// HTTP port (overrides the PORT environment variable).
    #[arg(long)]
    port: Option<u16>,

    /// Runtime data directory (overrides CHATWARDEN_DATA_DIR).
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let data_dir = args.data_dir.unwrap_or_else(chatwarden::data_dir);
    chatwarden::logging::init(&data_dir);

    let settings = match SettingsStore::open(data_dir.join(SETTINGS_FILE)) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!("fatal: could not open settings store: {e}");
            std::process::exit(1);
        }
    };
    let store = match MessageStore::open(&data_dir.join(MESSAGES_FILE)) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!("fatal: could not open message store: {e}");
            std::process::exit(1);
        }
    };

    let cache = Arc::new(ClassifierCache::new(Arc::new(HttpInference::from_env())));
    let engine = Arc::new(AnalysisEngine::new(cache));
    let monitor = Arc::new(MonitorRuntime::new(
        Arc::clone(&settings),
        Arc::clone(&store),
        Arc::clone(&engine),
    ));

    let state = AppState {
        settings,
        store,
        engine,
        monitor,
        limiter: Arc::new(RateLimiter::new()),
        sessions: Arc::new(SessionStore::new()),
        pending: Arc::new(PendingAuthRegistry::new()),
        accounts: Arc::new(Accounts::from_env()),
        production: AppState::production_from_env(),
    };

    let port = args.port.unwrap_or_else(gateway::port_from_env);
    if let Err(e) = gateway::serve(state, port).await {
        log::error!("fatal: {e}");
        std::process::exit(1);
    }
}
