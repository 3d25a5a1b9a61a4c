//! Persisted service configuration.
//!
//! The settings document lives at `<data_dir>/admin-settings.json` and keeps
//! the camelCase field names the admin UI speaks. Every path into the
//! document — cold-start defaults, disk load, API merge — goes through the
//! normalizer, so the rest of the codebase only ever sees clamped,
//! deduplicated, well-typed values.

pub mod normalize;
pub mod schema;
pub mod store;

pub use normalize::normalize;
pub use schema::{AuthMode, CategoryThresholds, MediaSettings, ProxySettings, Settings};
pub use store::SettingsStore;
