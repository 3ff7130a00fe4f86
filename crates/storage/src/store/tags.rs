#![forbid(unsafe_code)]

use super::*;
use relcon_core::ids::TagCategory;
use relcon_core::model::{Tag, normalize_label};
use rusqlite::{OptionalExtension, params};

pub(super) struct ResolvedTag {
    pub(super) tag: Tag,
    pub(super) created: bool,
}

/// Find-or-create in one statement pair under the caller's write transaction.
///
/// The `UNIQUE(category, label)` constraint makes the insert a no-op when the
/// label already exists, so two resolvers never produce two rows.
pub(super) fn resolve_tag_tx(
    tx: &Transaction<'_>,
    category: &TagCategory,
    label: &str,
    now_ms: i64,
) -> Result<ResolvedTag, StoreError> {
    let inserted = tx.execute(
        "INSERT INTO tags(category, label, flagged, created_at_ms) VALUES (?1, ?2, 0, ?3) \
         ON CONFLICT(category, label) DO NOTHING",
        params![category.as_str(), label, now_ms],
    )?;

    let (id, flagged) = tx.query_row(
        "SELECT id, flagged FROM tags WHERE category=?1 AND label=?2",
        params![category.as_str(), label],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, bool>(1)?)),
    )?;

    Ok(ResolvedTag {
        tag: Tag {
            id,
            category: category.clone(),
            label: label.to_string(),
            flagged,
        },
        created: inserted > 0,
    })
}

impl SqliteStore {
    /// Returns the tag labelled `label` in `category`, creating it unflagged if absent.
    pub fn tag_resolve(&mut self, category: &TagCategory, label: &str) -> Result<Tag, StoreError> {
        let label = normalize_label(label)?;
        let tx = self.write_tx()?;
        let resolved = resolve_tag_tx(&tx, category, &label, now_ms())?;
        tx.commit()?;
        if resolved.created {
            tracing::debug!(category = %category, label = %label, id = resolved.tag.id, "tag created");
        }
        Ok(resolved.tag)
    }

    pub fn tag_get(&self, category: &TagCategory, label: &str) -> Result<Option<Tag>, StoreError> {
        let label = normalize_label(label)?;
        let row = self
            .conn
            .query_row(
                "SELECT id, flagged FROM tags WHERE category=?1 AND label=?2",
                params![category.as_str(), label],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, bool>(1)?)),
            )
            .optional()?;
        Ok(row.map(|(id, flagged)| Tag {
            id,
            category: category.clone(),
            label,
            flagged,
        }))
    }

    /// Whole vocabulary of a category: flagged tags first, then by label.
    pub fn tags_list(&self, category: &TagCategory) -> Result<Vec<Tag>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, label, flagged FROM tags WHERE category=?1 \
             ORDER BY flagged DESC, label ASC",
        )?;
        let mut rows = stmt.query(params![category.as_str()])?;
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

    pub fn tag_set_flagged(
        &mut self,
        category: &TagCategory,
        tag_id: i64,
        flagged: bool,
    ) -> Result<Tag, StoreError> {
        let tx = self.write_tx()?;
        let updated = tx.execute(
            "UPDATE tags SET flagged=?3 WHERE category=?1 AND id=?2",
            params![category.as_str(), tag_id, flagged],
        )?;
        if updated == 0 {
            return Err(StoreError::UnknownTag);
        }
        let label = tx.query_row(
            "SELECT label FROM tags WHERE id=?1",
            params![tag_id],
            |row| row.get::<_, String>(0),
        )?;
        tx.commit()?;
        Ok(Tag {
            id: tag_id,
            category: category.clone(),
            label,
            flagged,
        })
    }

    /// Removes a tag from the vocabulary, unlinking it from every entity.
    pub fn tag_delete(&mut self, category: &TagCategory, tag_id: i64) -> Result<bool, StoreError> {
        let tx = self.write_tx()?;
        let deleted = tx.execute(
            "DELETE FROM tags WHERE category=?1 AND id=?2",
            params![category.as_str(), tag_id],
        )?;
        tx.commit()?;
        if deleted > 0 {
            tracing::debug!(category = %category, id = tag_id, "tag deleted");
        }
        Ok(deleted > 0)
    }
}
