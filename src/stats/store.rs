use crate::app_dirs::AppDirs;
use chrono::Local;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Key the stats document is stored under
pub const STATS_KEY: &str = "breathing_stats";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Load/save of one opaque JSON document
pub trait StatsStore: Send {
    /// `Ok(None)` when nothing has been saved yet
    fn load(&self) -> Result<Option<String>, StoreError>;
    fn save(&self, document: &str) -> Result<(), StoreError>;
    fn delete(&self) -> Result<(), StoreError>;
}

impl<S: StatsStore + ?Sized> StatsStore for Box<S> {
    fn load(&self) -> Result<Option<String>, StoreError> {
        (**self).load()
    }

    fn save(&self, document: &str) -> Result<(), StoreError> {
        (**self).save(document)
    }

    fn delete(&self) -> Result<(), StoreError> {
        (**self).delete()
    }
}

/// Key/value table in a local SQLite database
#[derive(Debug)]
pub struct SqliteStatsStore {
    conn: Connection,
}

impl SqliteStatsStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Database under `$HOME/.local/state/exhale`
    pub fn open_default() -> Result<Self, StoreError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("exhale_stats.db"));
        debug!("opening stats database at {}", path.display());
        Self::open(path)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }
}

impl StatsStore for SqliteStatsStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM documents WHERE key = ?1",
                [STATS_KEY],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save(&self, document: &str) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO documents (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![STATS_KEY, document, Local::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn delete(&self) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM documents WHERE key = ?1", [STATS_KEY])?;
        Ok(())
    }
}

/// Plain JSON file, replaced atomically on save
#[derive(Debug, Clone)]
pub struct FileStatsStore {
    path: PathBuf,
}

impl FileStatsStore {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatsStore for FileStatsStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, document: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, document)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn delete(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-process store; clones share the same slot
#[derive(Debug, Clone, Default)]
pub struct MemoryStatsStore {
    slot: Arc<Mutex<Option<String>>>,
    failing: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: &str) -> Self {
        let store = Self::default();
        if let Ok(mut slot) = store.slot.lock() {
            *slot = Some(document.to_string());
        }
        store
    }

    /// Make every subsequent operation fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn contents(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".into()));
        }
        Ok(())
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, StoreError> {
        self.slot
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))
    }
}

impl StatsStore for MemoryStatsStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.slot()?.clone())
    }

    fn save(&self, document: &str) -> Result<(), StoreError> {
        self.check()?;
        *self.slot()? = Some(document.to_string());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self) -> Result<(), StoreError> {
        self.check()?;
        *self.slot()? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    fn exercise(store: &dyn StatsStore) {
        assert!(store.load().unwrap().is_none());
        store.save(r#"{"totalSessions":1}"#).unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some(r#"{"totalSessions":1}"#));
        store.save(r#"{"totalSessions":2}"#).unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some(r#"{"totalSessions":2}"#));
        store.delete().unwrap();
        assert!(store.load().unwrap().is_none());
        // deleting twice is fine
        store.delete().unwrap();
    }

    #[test]
    fn sqlite_store_roundtrip() {
        let store = SqliteStatsStore::in_memory().unwrap();
        exercise(&store);
    }

    #[test]
    fn sqlite_store_persists_across_connections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("stats.db");
        SqliteStatsStore::open(&path).unwrap().save("{}").unwrap();

        let reopened = SqliteStatsStore::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileStatsStore::with_path(dir.path().join("stats.json"));
        exercise(&store);
    }

    #[test]
    fn memory_store_failure_injection() {
        let store = MemoryStatsStore::new();
        exercise(&store);

        store.set_failing(true);
        assert_matches!(store.save("{}"), Err(StoreError::Unavailable(_)));
        assert_matches!(store.load(), Err(StoreError::Unavailable(_)));
        store.set_failing(false);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn memory_store_clones_share_state() {
        let store = MemoryStatsStore::new();
        let handle = store.clone();
        store.save("{}").unwrap();
        assert_eq!(handle.contents().as_deref(), Some("{}"));
        assert_eq!(handle.save_count(), 1);
    }

    #[test]
    fn boxed_store_delegates() {
        let store: Box<dyn StatsStore> = Box::new(MemoryStatsStore::with_document("{}"));
        assert_eq!(store.load().unwrap().as_deref(), Some("{}"));
    }
}
