pub mod config;
pub mod database;
pub mod engine;
pub mod gateway;
pub mod inference;
pub mod logging;
pub mod monitor;
pub mod ratelimit;
pub mod state;
pub mod telegram;

/// Convenience re-exports for the most commonly used types across the
/// ChatWarden codebase.
///
/// ```rust
/// use chatwarden::prelude::*;
/// ```
pub mod prelude {
    // Configuration
    pub use crate::config::{AuthMode, Settings, SettingsStore};

    // Engine
    pub use crate::engine::{Analysis, AnalysisEngine, RiskCategory, Scores, THREAT_TYPES};

    // Inference seam
    pub use crate::inference::{
        Classifier, ClassifierCache, HttpInference, InferenceRuntime, ModelOutput,
    };

    // Persistence
    pub use crate::database::{MessageStore, NewMessage, StoredMessage};

    // Ingestion
    pub use crate::monitor::{MonitorRuntime, MonitorStatus};

    // Throttling
    pub use crate::ratelimit::{RateLimiter, RatePolicy};

    // Control plane
    pub use crate::gateway::{ApiError, build_router, serve};
    pub use crate::state::AppState;
}

use std::path::PathBuf;

/// Resolve the runtime data directory: `CHATWARDEN_DATA_DIR`, falling back
/// to `~/.chatwarden`, falling back to `./chatwarden-data`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHATWARDEN_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|h| h.join(".chatwarden"))
        .unwrap_or_else(|| PathBuf::from("chatwarden-data"))
}
