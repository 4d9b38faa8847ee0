//! Persisted key-value preferences
//!
//! Stores small UI preferences (overview zoom/offset, waveform style) so they
//! survive restarts.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during preference operations
#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A string-keyed preference store
pub trait PrefStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError>;

    /// Read a float, ignoring missing or malformed entries
    fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.parse().ok().filter(|v: &f64| v.is_finite())
    }

    fn set_f64(&mut self, key: &str, value: f64) -> Result<(), PrefsError> {
        self.set(key, &value.to_string())
    }
}

/// Preference store backed by SQLite
pub struct SqlitePrefs {
    conn: Connection,
}

impl SqlitePrefs {
    const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS prefs (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
    "#;

    /// Open or create a preferences database at the given path
    pub fn open(db_path: &Path) -> Result<Self, PrefsError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch(Self::SCHEMA)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database
    pub fn in_memory() -> Result<Self, PrefsError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(Self::SCHEMA)?;
        Ok(Self { conn })
    }

    /// Default database location
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cue")
            .join("prefs.db")
    }

    /// Number of stored entries
    pub fn len(&self) -> Result<usize, PrefsError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM prefs", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, PrefsError> {
        Ok(self.len()? == 0)
    }
}

impl PrefStore for SqlitePrefs {
    fn get(&self, key: &str) -> Option<String> {
        self.conn
            .query_row(
                "SELECT value FROM prefs WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .ok()
            .flatten()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        self.conn.execute(
            "INSERT OR REPLACE INTO prefs (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now],
        )?;
        Ok(())
    }
}

/// Volatile preference store
#[derive(Debug, Default, Clone)]
pub struct MemoryPrefs {
    values: HashMap<String, String>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrefStore for MemoryPrefs {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_set_and_get() {
        let mut prefs = SqlitePrefs::in_memory().unwrap();
        assert!(prefs.is_empty().unwrap());

        prefs.set("waveform.style", "overview").unwrap();
        assert_eq!(prefs.get("waveform.style").as_deref(), Some("overview"));
        assert_eq!(prefs.len().unwrap(), 1);
    }

    #[test]
    fn test_sqlite_overwrite() {
        let mut prefs = SqlitePrefs::in_memory().unwrap();
        prefs.set_f64("overview.zoom", 2.5).unwrap();
        prefs.set_f64("overview.zoom", 4.0).unwrap();
        assert_eq!(prefs.get_f64("overview.zoom"), Some(4.0));
        assert_eq!(prefs.len().unwrap(), 1);
    }

    #[test]
    fn test_missing_key() {
        let prefs = SqlitePrefs::in_memory().unwrap();
        assert!(prefs.get("nope").is_none());
        assert!(prefs.get_f64("nope").is_none());
    }

    #[test]
    fn test_malformed_float_is_ignored() {
        let mut prefs = MemoryPrefs::new();
        prefs.set("overview.offset", "abc").unwrap();
        prefs.set("overview.zoom", "NaN").unwrap();
        assert!(prefs.get_f64("overview.offset").is_none());
        assert!(prefs.get_f64("overview.zoom").is_none());
    }

    #[test]
    fn test_open_on_disk() {
        let dir = std::env::temp_dir().join(format!("cue-prefs-{}", std::process::id()));
        let path = dir.join("prefs.db");
        {
            let mut prefs = SqlitePrefs::open(&path).unwrap();
            prefs.set("k", "v").unwrap();
        }
        let prefs = SqlitePrefs::open(&path).unwrap();
        assert_eq!(prefs.get("k").as_deref(), Some("v"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
