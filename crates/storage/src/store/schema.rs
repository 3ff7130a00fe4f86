#![forbid(unsafe_code)]

use super::StoreError;
use rusqlite::{Connection, OptionalExtension, params};

pub(super) const SCHEMA_VERSION: &str = "relcon_v1";

/// Refuses to open a database written by a different schema version.
pub(super) fn preflight(conn: &Connection) -> Result<(), StoreError> {
    let has_meta = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='meta'",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some();
    if !has_meta {
        return Ok(());
    }

    let version = conn
        .query_row(
            "SELECT value FROM meta WHERE key='schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?;

    match version.as_deref() {
        None => Ok(()),
        Some(SCHEMA_VERSION) => Ok(()),
        Some(_) => Err(StoreError::InvalidInput(
            "RESET_REQUIRED: schema version mismatch",
        )),
    }
}

pub(super) fn install(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS entities (
          kind TEXT NOT NULL,
          id TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY (kind, id)
        );

        CREATE TABLE IF NOT EXISTS tags (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          category TEXT NOT NULL,
          label TEXT NOT NULL,
          flagged INTEGER NOT NULL DEFAULT 0 CHECK(flagged IN (0, 1)),
          created_at_ms INTEGER NOT NULL,
          UNIQUE (category, label)
        );

        CREATE TABLE IF NOT EXISTS entity_tags (
          kind TEXT NOT NULL,
          entity_id TEXT NOT NULL,
          tag_id INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY (kind, entity_id, tag_id),
          FOREIGN KEY (kind, entity_id) REFERENCES entities(kind, id) ON DELETE CASCADE,
          FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS entity_flags (
          kind TEXT NOT NULL,
          entity_id TEXT NOT NULL,
          slot TEXT NOT NULL,
          pinned INTEGER NOT NULL CHECK(pinned IN (0, 1)),
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY (kind, entity_id, slot),
          FOREIGN KEY (kind, entity_id) REFERENCES entities(kind, id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_entity_tags_tag ON entity_tags(tag_id);
        CREATE INDEX IF NOT EXISTS idx_entity_flags_slot ON entity_flags(slot, pinned);
        "#,
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", SCHEMA_VERSION],
    )?;
    Ok(())
}
