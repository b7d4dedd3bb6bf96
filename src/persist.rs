use rusqlite::Connection;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("Blob store poisoned: {0}")]
    LockError(String),
}

/// Key-value blob persistence. The store writes its whole aggregate as one
/// serialized blob under a fixed namespace after every mutation and reads
/// it back once at startup. No partial updates.
pub trait BlobStore {
    fn load(&self, namespace: &str) -> Result<Option<String>, PersistError>;
    fn save(&mut self, namespace: &str, blob: &str) -> Result<(), PersistError>;
}

/// SQLite-backed blob store: one row per namespace.
pub struct SqliteBlobStore {
    conn: Connection,
}

impl SqliteBlobStore {
    /// Open (or create) the backing database and initialize the schema.
    pub fn new(path: &str) -> Result<Self, PersistError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PersistError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;

        let store = SqliteBlobStore { conn };
        store.initialize_schema()?;

        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), PersistError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS blobs (
                namespace       TEXT PRIMARY KEY,
                blob            TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

impl BlobStore for SqliteBlobStore {
    fn load(&self, namespace: &str) -> Result<Option<String>, PersistError> {
        let mut stmt = self
            .conn
            .prepare("SELECT blob FROM blobs WHERE namespace = ?1")?;
        let result = stmt.query_row(rusqlite::params![namespace], |row| row.get(0));

        match result {
            Ok(blob) => Ok(Some(blob)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PersistError::from(e)),
        }
    }

    fn save(&mut self, namespace: &str, blob: &str) -> Result<(), PersistError> {
        self.conn.execute(
            "INSERT INTO blobs (namespace, blob, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(namespace) DO UPDATE SET
                blob = excluded.blob,
                updated_at = excluded.updated_at",
            rusqlite::params![
                namespace,
                blob,
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
            ],
        )?;
        Ok(())
    }
}

/// In-memory blob store. Clones share the same backing map, which lets a
/// test reopen a "fresh" record store over the same persisted state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn load(&self, namespace: &str) -> Result<Option<String>, PersistError> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|e| PersistError::LockError(e.to_string()))?;
        Ok(blobs.get(namespace).cloned())
    }

    fn save(&mut self, namespace: &str, blob: &str) -> Result<(), PersistError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|e| PersistError::LockError(e.to_string()))?;
        blobs.insert(namespace.to_string(), blob.to_string());
        Ok(())
    }
}
