//! Settings persistence.
//!
//! The store owns the current in-memory snapshot behind an `RwLock` and
//! persists it as pretty-printed JSON at rest-permission `0600`. Writes go
//! through a temp file + rename so a crash can never leave a half-written
//! document behind.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use serde_json::Value;

use super::{normalize, schema::Settings};

/// File name of the settings document inside the data directory.
pub const SETTINGS_FILE: &str = "admin-settings.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings: {0}")]
    Read(std::io::Error),

    #[error("failed to write settings: {0}")]
    Write(std::io::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ─── SettingsStore ───────────────────────────────────────────────────────────

/// Load/save/merge access to the singleton settings document.
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Settings>,
}

impl SettingsStore {
    /// Open the store at `path`.
    ///
    /// Cold start (no file): defaults are normalized and written out.
    /// A present-but-invalid file is treated as corrupt: a warning is logged,
    /// defaults are used, and the file is deliberately left untouched.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let settings = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Value>(&content) {
                Ok(raw) => normalize(&raw),
                Err(e) => {
                    log::warn!(
                        "settings: {} is not valid JSON ({e}); using defaults without overwriting",
                        path.display()
                    );
                    return Ok(Self {
                        path,
                        current: RwLock::new(Settings::default()),
                    });
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let defaults = Settings::default();
                write_atomic(&path, &defaults)?;
                defaults
            }
            Err(e) => return Err(ConfigError::Read(e)),
        };

        let store = Self {
            path,
            current: RwLock::new(settings.clone()),
        };
        // Re-persist the normalized form so the on-disk document is canonical.
        write_atomic(&store.path, &settings)?;
        Ok(store)
    }

    /// Snapshot of the current settings.
    pub fn get(&self) -> Settings {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the settings wholesale (value is re-normalized) and persist.
    pub fn replace(&self, settings: Settings) -> Result<Settings, ConfigError> {
        let normalized = normalize(&serde_json::to_value(&settings)?);
        write_atomic(&self.path, &normalized)?;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = normalized.clone();
        Ok(normalized)
    }

    /// Shallow-merge a JSON patch over the current document, normalize the
    /// result, persist it, and return the new settings.
    pub fn merge(&self, patch: &Value) -> Result<Settings, ConfigError> {
        let mut doc = serde_json::to_value(self.get())?;
        if let (Value::Object(base), Value::Object(overlay)) = (&mut doc, patch) {
            for (k, v) in overlay {
                base.insert(k.clone(), v.clone());
            }
        }
        let normalized = normalize(&doc);
        write_atomic(&self.path, &normalized)?;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = normalized.clone();
        Ok(normalized)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ─── Atomic write ────────────────────────────────────────────────────────────

fn write_atomic(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(settings)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(ConfigError::Write)?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &content).map_err(ConfigError::Write)?;

    // Restrict to owner read/write before the file becomes visible under its
    // real name — the document holds Telegram credentials.
    #[cfg(unix)]
    {
        let mut perms = fs::metadata(&tmp).map_err(ConfigError::Write)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(&tmp, perms).map_err(ConfigError::Write)?;
    }

    fs::rename(&tmp, path).map_err(ConfigError::Write)?;
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DEFAULT_MODEL_ID;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SettingsStore {
        SettingsStore::open(dir.path().join(SETTINGS_FILE)).unwrap()
    }

    #[test]
    fn cold_start_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.path().exists());
        assert_eq!(store.get(), Settings::default());
    }

    #[test]
    fn reopen_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        {
            let store = SettingsStore::open(&path).unwrap();
            store
                .merge(&json!({"threatThreshold": 55, "mlModel": "mdeberta-xnli"}))
                .unwrap();
        }
        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.get().threat_threshold, 55);
        assert_eq!(reopened.get().ml_model, "mdeberta-xnli");
    }

    #[test]
    fn corrupt_file_yields_defaults_and_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{ this is not json").unwrap();

        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.get(), Settings::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ this is not json");
    }

    #[test]
    fn merge_normalizes_the_patch() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let updated = store
            .merge(&json!({"mlModel": "bogus", "threatThreshold": 0.6}))
            .unwrap();
        assert_eq!(updated.ml_model, DEFAULT_MODEL_ID);
        assert_eq!(updated.threat_threshold, 60);
    }

    #[test]
    fn merge_keeps_untouched_fields() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.merge(&json!({"botToken": "123:abc"})).unwrap();
        let after = store.merge(&json!({"threatThreshold": 42})).unwrap();
        assert_eq!(after.bot_token, "123:abc");
        assert_eq!(after.threat_threshold, 42);
    }

    #[test]
    fn replace_persists_to_disk() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut s = store.get();
        s.session_string = "abc123".to_owned();
        store.replace(s).unwrap();

        let reopened = SettingsStore::open(store.path()).unwrap();
        assert_eq!(reopened.get().session_string, "abc123");
    }

    #[cfg(unix)]
    #[test]
    fn settings_file_mode_is_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn on_disk_document_is_pretty_printed_camel_case() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("\"mlModel\""));
        assert!(content.contains('\n'));
    }
}
