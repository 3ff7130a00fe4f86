#![forbid(unsafe_code)]

mod entities;
mod error;
mod schema;
mod slots;
mod tag_sync;
mod tags;
mod types;

pub use error::{ErrorKind, StoreError};
pub use types::*;

use relcon_core::ids::{EntityId, EntityKind};
use relcon_core::model::EntityRef;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DB_FILE_NAME: &str = "relcon.db";
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One SQLite connection over the engine database.
///
/// Open one store per worker; stores over the same directory share the
/// database file and coordinate through SQLite's write lock.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_busy_timeout(storage_dir, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_busy_timeout(
        storage_dir: impl AsRef<Path>,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let conn = Connection::open(storage_dir.join(DB_FILE_NAME))?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        schema::preflight(&conn)?;
        schema::install(&conn)?;

        tracing::debug!(dir = %storage_dir.display(), "store opened");
        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn db_path(&self) -> PathBuf {
        self.storage_dir.join(DB_FILE_NAME)
    }

    /// Starts a transaction that holds the database write lock from `BEGIN`,
    /// so reads made inside it cannot go stale before the writes land.
    fn write_tx(&mut self) -> Result<Transaction<'_>, StoreError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

fn entity_from_row(kind: String, id: String) -> Result<EntityRef, StoreError> {
    let kind =
        EntityKind::try_new(kind).map_err(|_| StoreError::InvalidInput("invalid entity row"))?;
    let id = EntityId::try_new(id).map_err(|_| StoreError::InvalidInput("invalid entity row"))?;
    Ok(EntityRef::new(kind, id))
}

fn to_count(value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::InvalidInput("numeric overflow"))
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
