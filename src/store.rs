//! Persistent translation history using SQLite.
//!
//! Records are kept in a single `translations` table. The schema is versioned
//! through `PRAGMA user_version`; pending migrations run when the store opens.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

/// Identifier assigned by the store when a record is created.
pub type RecordId = i64;

/// Ordered schema migrations. Entry `n` moves the schema from version `n` to `n + 1`.
const MIGRATIONS: &[&str] = &[
    // 0 -> 1: initial table.
    "
    CREATE TABLE IF NOT EXISTS translations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        language_from TEXT NOT NULL,
        language_to TEXT NOT NULL,
        translated_text TEXT NOT NULL,
        timestamp_millis INTEGER NOT NULL
    );
    ",
    // 1 -> 2: dashboard sorts by timestamp.
    "
    CREATE INDEX IF NOT EXISTS idx_translations_timestamp
        ON translations(timestamp_millis);
    ",
];

/// Errors raised by a [`TranslationStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("translation {0} not found")]
    NotFound(RecordId),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),

    #[error("store connection poisoned")]
    Poisoned,
}

/// A persisted translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRecord {
    /// `None` until the record has been written to a store.
    pub id: Option<RecordId>,
    pub source_text: String,
    /// May be empty when the translation has not completed yet.
    pub translated_text: String,
    /// Display name; empty means unspecified.
    pub source_language: String,
    /// Display name; empty means unspecified.
    pub target_language: String,
    pub created_at_millis: i64,
}

impl TranslationRecord {
    /// Builds an unsaved record.
    pub fn new(
        source_text: impl Into<String>,
        translated_text: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        created_at_millis: i64,
    ) -> Self {
        Self {
            id: None,
            source_text: source_text.into(),
            translated_text: translated_text.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            created_at_millis,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            source_text: row.get(1)?,
            source_language: row.get(2)?,
            target_language: row.get(3)?,
            translated_text: row.get(4)?,
            created_at_millis: row.get(5)?,
        })
    }
}

/// Persistence contract for translation records.
///
/// Implementations serialize access internally; callers may share one store
/// between sessions, with last-write-wins semantics on the same id.
pub trait TranslationStore: Send + Sync {
    /// Inserts a new row and returns its id. `record.id` is ignored.
    fn create(&self, record: &TranslationRecord) -> Result<RecordId, StoreError>;

    /// Overwrites the row `id` with the fields of `record`.
    ///
    /// Fails with [`StoreError::NotFound`] when no such row exists.
    fn update(&self, id: RecordId, record: &TranslationRecord) -> Result<(), StoreError>;

    fn delete(&self, id: RecordId) -> Result<(), StoreError>;

    /// All records in insertion order.
    fn get_all(&self) -> Result<Vec<TranslationRecord>, StoreError>;

    fn get_by_id(&self, id: RecordId) -> Result<TranslationRecord, StoreError>;
}

/// [`TranslationStore`] backed by a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    /// Database connection (shared across clones).
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and applies pending migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Readers don't block the writer.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;

        let store = Self::from_connection(conn)?;
        info!("Translation store opened at {:?}", path);
        Ok(store)
    }

    /// Opens a private in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Current schema version.
    pub fn schema_version(&self) -> Result<u32, StoreError> {
        let conn = self.lock()?;
        Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }
}

/// Applies every migration newer than the database's `user_version`.
fn migrate(conn: &Connection) -> Result<(), StoreError> {
    apply_migrations(conn, MIGRATIONS)
}

/// Runs each pending entry of `migrations` in its own transaction.
///
/// A failing step rolls back (the transaction is dropped uncommitted) and
/// leaves `user_version` at the last step that succeeded.
fn apply_migrations(conn: &Connection, migrations: &[&str]) -> Result<(), StoreError> {
    let current: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (version, sql) in migrations.iter().enumerate().skip(current as usize) {
        let next = version + 1;
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", next)?;
        tx.commit()?;
        debug!("Migrated translation store to schema v{}", next);
    }

    Ok(())
}

impl TranslationStore for SqliteStore {
    fn create(&self, record: &TranslationRecord) -> Result<RecordId, StoreError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO translations
                (text, language_from, language_to, translated_text, timestamp_millis)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.source_text,
                record.source_language,
                record.target_language,
                record.translated_text,
                record.created_at_millis
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Created translation {}", id);
        Ok(id)
    }

    fn update(&self, id: RecordId, record: &TranslationRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;

        let changed = conn.execute(
            "UPDATE translations
             SET text = ?1, language_from = ?2, language_to = ?3,
                 translated_text = ?4, timestamp_millis = ?5
             WHERE id = ?6",
            params![
                record.source_text,
                record.source_language,
                record.target_language,
                record.translated_text,
                record.created_at_millis,
                id
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!("Updated translation {}", id);
        Ok(())
    }

    fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM translations WHERE id = ?1", params![id])?;
        debug!("Deleted translation {}", id);
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<TranslationRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, text, language_from, language_to, translated_text, timestamp_millis
             FROM translations ORDER BY id ASC",
        )?;
        let records = stmt
            .query_map([], TranslationRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn get_by_id(&self, id: RecordId) -> Result<TranslationRecord, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, text, language_from, language_to, translated_text, timestamp_millis
             FROM translations WHERE id = ?1 LIMIT 1",
            params![id],
            TranslationRecord::from_row,
        )
        .optional()?
        .ok_or(StoreError::NotFound(id))
    }
}

/// Gets the default path of the history database.
///
/// Uses `./data/translations.db` if the `data/` directory exists
/// (e.g., a mounted volume), otherwise falls back to the current directory.
pub fn default_store_path() -> PathBuf {
    let data_dir = PathBuf::from("data");
    if data_dir.is_dir() {
        data_dir.join("translations.db")
    } else {
        PathBuf::from("translations.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello() -> TranslationRecord {
        TranslationRecord::new("Hello", "Hola", "English", "Spanish", 1_700_000_000_000)
    }

    #[test]
    fn test_create_and_get_round_trip() {
        let store = SqliteStore::in_memory().unwrap();

        let id = store.create(&hello()).unwrap();
        let fetched = store.get_by_id(id).unwrap();

        assert_eq!(fetched.id, Some(id));
        assert_eq!(fetched.source_text, "Hello");
        assert_eq!(fetched.translated_text, "Hola");
        assert_eq!(fetched.source_language, "English");
        assert_eq!(fetched.target_language, "Spanish");
        assert_eq!(fetched.created_at_millis, 1_700_000_000_000);
    }

    #[test]
    fn test_update_in_place() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store.create(&hello()).unwrap();

        let mut edited = hello();
        edited.translated_text = "¡Hola!".to_string();
        store.update(id, &edited).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, Some(id));
        assert_eq!(all[0].translated_text, "¡Hola!");
    }

    #[test]
    fn test_update_missing_id_fails() {
        let store = SqliteStore::in_memory().unwrap();
        let result = store.update(42, &hello());
        assert!(matches!(result, Err(StoreError::NotFound(42))));
    }

    #[test]
    fn test_get_missing_id_fails() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(matches!(store.get_by_id(7), Err(StoreError::NotFound(7))));
    }

    #[test]
    fn test_delete_and_insertion_order() {
        let store = SqliteStore::in_memory().unwrap();
        let first = store.create(&hello()).unwrap();
        let second = store
            .create(&TranslationRecord::new("Bye", "Adiós", "English", "Spanish", 1))
            .unwrap();
        let third = store
            .create(&TranslationRecord::new("Merci", "Thanks", "French", "English", 2))
            .unwrap();

        store.delete(second).unwrap();

        let ids: Vec<_> = store.get_all().unwrap().into_iter().filter_map(|r| r.id).collect();
        assert_eq!(ids, vec![first, third]);
    }

    #[test]
    fn test_migrations_reach_latest_version() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap() as usize, MIGRATIONS.len());
    }

    #[test]
    fn test_open_file_reopens_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");

        let id = {
            let store = SqliteStore::open(&path).unwrap();
            store.create(&hello()).unwrap()
        };

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get_by_id(id).unwrap().source_text, "Hello");
        assert_eq!(reopened.schema_version().unwrap() as usize, MIGRATIONS.len());
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        let conn = Connection::open_in_memory().unwrap();
        let result = apply_migrations(
            &conn,
            &["CREATE TABLE ok_table (id INTEGER);", "CREATE TABLE broken ("],
        );
        assert!(result.is_err());

        // The first migration committed, the second left nothing behind.
        let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0)).unwrap();
        assert_eq!(version, 1);
        assert!(conn.is_autocommit());

        // Retrying with a fixed script picks up where it stopped.
        apply_migrations(
            &conn,
            &["CREATE TABLE ok_table (id INTEGER);", "CREATE TABLE fixed (id INTEGER);"],
        )
        .unwrap();
        let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0)).unwrap();
        assert_eq!(version, 2);
    }
}
