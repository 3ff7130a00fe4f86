#![forbid(unsafe_code)]

use super::*;
use relcon_core::ids::TagCategory;
use relcon_core::model::Tag;
use rusqlite::{OptionalExtension, params};

impl SqliteStore {
    /// Registers a row the CRUD layer has persisted. Returns `false` if it was already known.
    pub fn entity_register(&mut self, entity: &EntityRef) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO entities(kind, id, created_at_ms) VALUES (?1, ?2, ?3)",
            params![entity.kind.as_str(), entity.id.as_str(), now_ms()],
        )?;
        Ok(inserted > 0)
    }

    pub fn entity_exists(&self, entity: &EntityRef) -> Result<bool, StoreError> {
        entity_exists_conn(&self.conn, entity)
    }

    /// Drops the entity with its tag links and slot flags. Tags themselves stay.
    pub fn entity_delete(&mut self, entity: &EntityRef) -> Result<bool, StoreError> {
        let tx = self.write_tx()?;
        let deleted = tx.execute(
            "DELETE FROM entities WHERE kind=?1 AND id=?2",
            params![entity.kind.as_str(), entity.id.as_str()],
        )?;
        tx.commit()?;
        if deleted > 0 {
            tracing::debug!(entity = %entity, "entity deleted");
        }
        Ok(deleted > 0)
    }

    /// Tags linked to `entity` in `category`, ordered by label.
    pub fn entity_tags(
        &self,
        entity: &EntityRef,
        category: &TagCategory,
    ) -> Result<Vec<Tag>, StoreError> {
        if !entity_exists_conn(&self.conn, entity)? {
            return Err(StoreError::UnknownEntity);
        }

        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.label, t.flagged \
             FROM entity_tags l JOIN tags t ON t.id = l.tag_id \
             WHERE l.kind=?1 AND l.entity_id=?2 AND t.category=?3 \
             ORDER BY t.label ASC",
        )?;
        let mut rows = stmt.query(params![
            entity.kind.as_str(),
            entity.id.as_str(),
            category.as_str()
        ])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Tag {
                id: row.get(0)?,
                category: category.clone(),
                label: row.get(1)?,
                flagged: row.get(2)?,
            });
        }
        Ok(out)
    }
}

fn entity_exists_conn(conn: &Connection, entity: &EntityRef) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM entities WHERE kind=?1 AND id=?2",
            params![entity.kind.as_str(), entity.id.as_str()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

pub(super) fn ensure_entity_exists_tx(
    tx: &Transaction<'_>,
    entity: &EntityRef,
) -> Result<(), StoreError> {
    if entity_exists_conn(tx, entity)? {
        Ok(())
    } else {
        Err(StoreError::UnknownEntity)
    }
}
