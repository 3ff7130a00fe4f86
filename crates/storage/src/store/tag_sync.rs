#![forbid(unsafe_code)]

use super::entities::ensure_entity_exists_tx;
use super::tags::resolve_tag_tx;
use super::*;
use relcon_core::ids::TagCategory;
use relcon_core::model::{Tag, normalize_label_set};
use rusqlite::params;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default, PartialEq, Eq)]
struct LinkDiff {
    to_add: Vec<i64>,
    to_remove: Vec<i64>,
}

fn diff_links(current: &BTreeSet<i64>, desired: &BTreeSet<i64>) -> LinkDiff {
    LinkDiff {
        to_add: desired.difference(current).copied().collect(),
        to_remove: current.difference(desired).copied().collect(),
    }
}

fn linked_tag_ids_tx(
    tx: &Transaction<'_>,
    entity: &EntityRef,
    category: &TagCategory,
) -> Result<BTreeSet<i64>, StoreError> {
    let mut stmt = tx.prepare(
        "SELECT l.tag_id FROM entity_tags l JOIN tags t ON t.id = l.tag_id \
         WHERE l.kind=?1 AND l.entity_id=?2 AND t.category=?3",
    )?;
    let mut rows = stmt.query(params![
        entity.kind.as_str(),
        entity.id.as_str(),
        category.as_str()
    ])?;
    let mut out = BTreeSet::new();
    while let Some(row) = rows.next()? {
        out.insert(row.get::<_, i64>(0)?);
    }
    Ok(out)
}

impl SqliteStore {
    /// Converges the entity's links in `category` to exactly `labels`.
    ///
    /// Labels are resolved (and created) inside the same write transaction as
    /// the link delta, so a failure anywhere leaves both tags and links as they
    /// were. Links shared by the old and new sets are not touched. Tags are
    /// never deleted here, even when no entity references them anymore.
    pub fn sync_tags<I, S>(
        &mut self,
        entity: &EntityRef,
        category: &TagCategory,
        labels: I,
    ) -> Result<TagSyncOutcome, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let desired_labels = normalize_label_set(labels)?;
        let now_ms = now_ms();

        let tx = self.write_tx()?;
        ensure_entity_exists_tx(&tx, entity)?;

        let mut desired = BTreeMap::<i64, Tag>::new();
        let mut created = Vec::new();
        for label in &desired_labels {
            let resolved = resolve_tag_tx(&tx, category, label, now_ms)?;
            if resolved.created {
                created.push(resolved.tag.id);
            }
            desired.insert(resolved.tag.id, resolved.tag);
        }

        let current = linked_tag_ids_tx(&tx, entity, category)?;
        let desired_ids: BTreeSet<i64> = desired.keys().copied().collect();
        let diff = diff_links(&current, &desired_ids);

        for tag_id in &diff.to_add {
            tx.execute(
                "INSERT INTO entity_tags(kind, entity_id, tag_id, created_at_ms) VALUES (?1, ?2, ?3, ?4)",
                params![entity.kind.as_str(), entity.id.as_str(), tag_id, now_ms],
            )?;
        }
        for tag_id in &diff.to_remove {
            tx.execute(
                "DELETE FROM entity_tags WHERE kind=?1 AND entity_id=?2 AND tag_id=?3",
                params![entity.kind.as_str(), entity.id.as_str(), tag_id],
            )?;
        }

        tx.commit()?;

        let mut tags: Vec<Tag> = desired.into_values().collect();
        tags.sort_by(|a, b| a.label.cmp(&b.label));

        tracing::debug!(
            entity = %entity,
            category = %category,
            added = diff.to_add.len(),
            removed = diff.to_remove.len(),
            created = created.len(),
            "tags synced"
        );

        Ok(TagSyncOutcome {
            tags,
            added: diff.to_add,
            removed: diff.to_remove,
            created,
        })
    }
}
