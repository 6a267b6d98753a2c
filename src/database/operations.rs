use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Mutex, MutexGuard};

use crate::database::schema::{initialize_schema, run_migrations};
use crate::error::StoreError;
use crate::models::DepositRecord;

/// Document store receiving one record per resolved deposit
#[async_trait]
pub trait DepositStore: Send + Sync {
    /// Insert or replace the document keyed by `record.hash` in `collection`
    async fn insert(&self, collection: &str, record: &DepositRecord) -> Result<(), StoreError>;

    /// Release the connection. Later inserts fail with `StoreError::Closed`.
    async fn close(&self) -> Result<(), StoreError>;
}

/// SQLite-backed document store
pub struct SqliteDepositStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteDepositStore {
    /// Open (or create) the database file and initialize schema
    pub fn new(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;

        initialize_schema(&conn)?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Create an in-memory store for testing
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;

        initialize_schema(&conn)?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Operation("Failed to acquire lock".to_string()))
    }

    /// Upsert a record. Re-inserting the same hash replaces the document.
    pub fn upsert(&self, collection: &str, record: &DepositRecord) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;

        let document = serde_json::to_string(record)?;

        conn.execute(
            "INSERT INTO deposits (collection, hash, block_number, block_timestamp, from_address, to_address, value, document)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(collection, hash) DO UPDATE SET
                block_number = excluded.block_number,
                block_timestamp = excluded.block_timestamp,
                from_address = excluded.from_address,
                to_address = excluded.to_address,
                value = excluded.value,
                document = excluded.document,
                updated_at = strftime('%s', 'now')",
            params![
                collection,
                record.hash,
                record.block_number as i64,
                record.block_timestamp as i64,
                record.from,
                record.to,
                record.value,
                document,
            ],
        )?;

        Ok(())
    }

    /// Get a stored record by hash
    pub fn get_deposit(&self, collection: &str, hash: &str) -> Result<DepositRecord, StoreError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;

        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM deposits WHERE collection = ?1 AND hash = ?2",
                params![collection, hash],
                |row| row.get(0),
            )
            .optional()?;

        let document = document.ok_or(StoreError::NotFound)?;
        Ok(serde_json::from_str(&document)?)
    }

    /// Number of records in a collection
    pub fn count(&self, collection: &str) -> Result<u64, StoreError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM deposits WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }

    fn close_connection(&self) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        match guard.take() {
            Some(conn) => conn.close().map_err(|(_, e)| StoreError::Connection(e)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DepositStore for SqliteDepositStore {
    async fn insert(&self, collection: &str, record: &DepositRecord) -> Result<(), StoreError> {
        self.upsert(collection, record)
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.close_connection()
    }
}
