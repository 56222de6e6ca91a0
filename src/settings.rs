//! # Settings Persistence
//!
//! Preserves the session values that should survive a restart: the date of the
//! last run, the two checkbox preferences, and how many pictures were fetched
//! on that date.
//!
//! ## Storage
//! Values live in a flat string-to-string store behind [`KeyValueStore`]:
//! - [`JsonFileStore`] keeps them in `~/.config/apod-viewer/settings.json`
//! - [`MemoryStore`] keeps them for the lifetime of the process only
//!
//! ## Keys
//! | Key                 | Value                      | Default |
//! |---------------------|----------------------------|---------|
//! | `date_today`        | `YYYY-MM-DD` of last write | none    |
//! | `show_on_startup`   | `true` / `false`           | `true`  |
//! | `limit_range`       | `true` / `false`           | `false` |
//! | `image_count_today` | decimal count              | `0`     |
//!
//! A missing or unparseable value is never an error; it simply reads as the
//! default.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, warn};

use crate::counter;

pub const KEY_DATE_TODAY: &str = "date_today";
pub const KEY_SHOW_ON_STARTUP: &str = "show_on_startup";
pub const KEY_LIMIT_RANGE: &str = "limit_range";
pub const KEY_IMAGE_COUNT_TODAY: &str = "image_count_today";

/// Errors raised while writing settings to durable storage.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to write settings to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The durable key-value capability.
///
/// Reads never fail: an absent key is `None`. Writes are batched so a backend
/// can commit all entries together and never leave a half-written set.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set_many(&mut self, entries: &[(&str, String)]) -> Result<(), SettingsError>;
}

/// Process-lifetime store. Used for `--no-save` runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set_many(&mut self, entries: &[(&str, String)]) -> Result<(), SettingsError> {
        for (key, value) in entries {
            self.values.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }
}

/// Store backed by a JSON object of string values on disk.
///
/// The whole file is read once on open and rewritten on every batch.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Opens the store at `path`.
    ///
    /// A missing file is an empty store. A file that cannot be read or parsed
    /// is logged and also treated as empty; the next write replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(values) => values,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring corrupt settings file");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read settings file");
                BTreeMap::new()
            }
        };

        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current values to a sibling temp file, then renames it over
    /// the target so readers only ever see a complete file.
    fn persist(&self) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(&self.values)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;

        debug!(path = %self.path.display(), "settings written");
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set_many(&mut self, entries: &[(&str, String)]) -> Result<(), SettingsError> {
        for (key, value) in entries {
            self.values.insert((*key).to_string(), value.clone());
        }
        self.persist()
    }
}

/// Typed view of the four persisted entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedSettings {
    /// Pictures fetched today; already reset to 0 if the last run was another day.
    pub images_fetched_today: u32,
    pub show_on_startup: bool,
    pub limit_range: bool,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            images_fetched_today: 0,
            show_on_startup: true,
            limit_range: false,
        }
    }
}

/// Typed reads and writes over any [`KeyValueStore`].
pub struct SettingsStore {
    backend: Box<dyn KeyValueStore + Send>,
}

impl SettingsStore {
    pub fn new(backend: impl KeyValueStore + Send + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Raw string lookup, `None` when the key was never written.
    pub fn read(&self, key: &str) -> Option<String> {
        self.backend.get(key)
    }

    /// Reads all settings, applying the day rollover to the image count.
    pub fn load(&self, today: NaiveDate) -> PersistedSettings {
        let defaults = PersistedSettings::default();

        let last_run = self.read(KEY_DATE_TODAY);
        let count = self.read(KEY_IMAGE_COUNT_TODAY);

        PersistedSettings {
            images_fetched_today: counter::load(last_run.as_deref(), count.as_deref(), today),
            show_on_startup: self
                .read(KEY_SHOW_ON_STARTUP)
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.show_on_startup),
            limit_range: self
                .read(KEY_LIMIT_RANGE)
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.limit_range),
        }
    }

    /// Writes all four entries in one batch, stamped with `today`.
    pub fn save(&mut self, settings: &PersistedSettings, today: NaiveDate) -> Result<(), SettingsError> {
        self.backend.set_many(&[
            (KEY_DATE_TODAY, counter::format_stored_date(today)),
            (KEY_SHOW_ON_STARTUP, settings.show_on_startup.to_string()),
            (KEY_LIMIT_RANGE, settings.limit_range.to_string()),
            (KEY_IMAGE_COUNT_TODAY, settings.images_fetched_today.to_string()),
        ])
    }
}

/// Accepts `true`/`false` in any case (older builds wrote `True`/`False`).
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_empty_store_reads_defaults() {
        let store = SettingsStore::new(MemoryStore::new());
        let loaded = store.load(today());
        assert_eq!(loaded, PersistedSettings::default());
        assert_eq!(loaded.images_fetched_today, 0);
        assert!(loaded.show_on_startup);
        assert!(!loaded.limit_range);
        assert_eq!(store.read(KEY_DATE_TODAY), None);
    }

    #[test]
    fn test_save_then_load_same_day_round_trips() {
        let mut store = SettingsStore::new(MemoryStore::new());
        let settings = PersistedSettings {
            images_fetched_today: 3,
            show_on_startup: true,
            limit_range: false,
        };
        store.save(&settings, today()).unwrap();

        assert_eq!(store.load(today()), settings);
        assert_eq!(store.read(KEY_DATE_TODAY).as_deref(), Some("2024-06-15"));
        assert_eq!(store.read(KEY_IMAGE_COUNT_TODAY).as_deref(), Some("3"));
    }

    #[test]
    fn test_count_resets_when_loaded_next_day() {
        let mut store = SettingsStore::new(MemoryStore::new());
        let settings = PersistedSettings {
            images_fetched_today: 9,
            show_on_startup: false,
            limit_range: true,
        };
        store.save(&settings, today()).unwrap();

        let tomorrow = today().succ_opt().unwrap();
        let loaded = store.load(tomorrow);
        assert_eq!(loaded.images_fetched_today, 0);
        assert!(!loaded.show_on_startup);
        assert!(loaded.limit_range);
    }

    #[test]
    fn test_corrupt_values_read_as_defaults() {
        let mut backend = MemoryStore::new();
        backend
            .set_many(&[
                (KEY_DATE_TODAY, "not a date".to_string()),
                (KEY_SHOW_ON_STARTUP, "maybe".to_string()),
                (KEY_LIMIT_RANGE, "True".to_string()),
                (KEY_IMAGE_COUNT_TODAY, "lots".to_string()),
            ])
            .unwrap();
        let store = SettingsStore::new(backend);

        let loaded = store.load(today());
        assert_eq!(loaded.images_fetched_today, 0);
        assert!(loaded.show_on_startup);
        assert!(loaded.limit_range);
    }

    #[test]
    fn test_json_file_store_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut store = SettingsStore::new(JsonFileStore::open(&path));
        let settings = PersistedSettings {
            images_fetched_today: 5,
            show_on_startup: false,
            limit_range: true,
        };
        store.save(&settings, today()).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = SettingsStore::new(JsonFileStore::open(&path));
        assert_eq!(reopened.load(today()), settings);
    }

    #[test]
    fn test_json_file_store_ignores_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ this is not json").unwrap();

        let file_store = JsonFileStore::open(&path);
        assert_eq!(file_store.path(), path.as_path());
        assert_eq!(file_store.get(KEY_IMAGE_COUNT_TODAY), None);

        let mut store = SettingsStore::new(file_store);
        assert_eq!(store.load(today()), PersistedSettings::default());

        store.save(&PersistedSettings::default(), today()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: BTreeMap<String, String> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.get(KEY_SHOW_ON_STARTUP).map(String::as_str), Some("true"));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool(" TRUE "), Some(true));
        assert_eq!(parse_bool("1"), None);
    }
}
