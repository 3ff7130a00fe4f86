#![forbid(unsafe_code)]

use super::entities::ensure_entity_exists_tx;
use super::*;
use relcon_core::ids::SlotName;
use relcon_core::model::Slot;
use rusqlite::{OptionalExtension, params};

// Occupants of ?1 other than the (kind, id) pair ?2/?3. A NULL pair skips nobody.
const OCCUPANT_COUNT_SQL: &str = "SELECT COUNT(1) FROM entity_flags \
     WHERE slot=?1 AND pinned=1 \
       AND NOT (kind IS ?2 AND entity_id IS ?3)";

// The admission check rides on the write: the row is only produced while the
// other occupants stay below capacity (?5).
const PIN_SQL: &str = "INSERT INTO entity_flags(kind, entity_id, slot, pinned, updated_at_ms) \
     SELECT ?1, ?2, ?3, 1, ?4 \
     WHERE ( \
       SELECT COUNT(1) FROM entity_flags \
       WHERE slot=?3 AND pinned=1 AND NOT (kind=?1 AND entity_id=?2) \
     ) < ?5 \
     ON CONFLICT(kind, entity_id, slot) DO UPDATE SET pinned=1, updated_at_ms=excluded.updated_at_ms";

fn occupant_count(
    conn: &Connection,
    slot: &SlotName,
    skip: Option<&EntityRef>,
) -> Result<u32, StoreError> {
    let count = conn.query_row(
        OCCUPANT_COUNT_SQL,
        params![
            slot.as_str(),
            skip.map(|e| e.kind.as_str()),
            skip.map(|e| e.id.as_str()),
        ],
        |row| row.get::<_, i64>(0),
    )?;
    to_count(count)
}

fn unpin_tx(
    tx: &Transaction<'_>,
    entity: &EntityRef,
    slot: &SlotName,
    now_ms: i64,
) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE entity_flags SET pinned=0, updated_at_ms=?4 \
         WHERE kind=?1 AND entity_id=?2 AND slot=?3",
        params![entity.kind.as_str(), entity.id.as_str(), slot.as_str(), now_ms],
    )?;
    Ok(())
}

impl SqliteStore {
    /// Pins (`desired = true`) or unpins `entity` in `slot`.
    ///
    /// A pin is refused with [`StoreError::CapacityExceeded`] when the slot's
    /// other occupants already fill its capacity. `exclude` names an entity
    /// the pin may replace: it is unpinned only when the slot is full without
    /// it, and only if the pin is then admitted. With room to spare it is left
    /// alone. Unpinning is unconditional. Returns the slot's counts after the
    /// change.
    ///
    /// Capacity comes from the caller; [`crate::Engine`] resolves it from the
    /// configured slot table.
    pub(crate) fn set_featured(
        &mut self,
        entity: &EntityRef,
        slot: &Slot,
        desired: bool,
        exclude: Option<&EntityRef>,
    ) -> Result<SlotCounts, StoreError> {
        let now_ms = now_ms();
        let tx = self.write_tx()?;
        ensure_entity_exists_tx(&tx, entity)?;

        if desired {
            let mut others = occupant_count(&tx, &slot.name, Some(entity))?;
            if others >= slot.capacity {
                if let Some(replaced) = exclude.filter(|other| *other != entity) {
                    unpin_tx(&tx, replaced, &slot.name, now_ms)?;
                    others = occupant_count(&tx, &slot.name, Some(entity))?;
                }
            }
            if others >= slot.capacity {
                return Err(capacity_exceeded(slot, others));
            }
            let written = tx.execute(
                PIN_SQL,
                params![
                    entity.kind.as_str(),
                    entity.id.as_str(),
                    slot.name.as_str(),
                    now_ms,
                    i64::from(slot.capacity),
                ],
            )?;
            if written == 0 {
                let others = occupant_count(&tx, &slot.name, Some(entity))?;
                return Err(capacity_exceeded(slot, others));
            }
        } else {
            unpin_tx(&tx, entity, &slot.name, now_ms)?;
        }

        let occupants = occupant_count(&tx, &slot.name, None)?;
        tx.commit()?;

        tracing::debug!(
            entity = %entity,
            slot = %slot.name,
            pinned = desired,
            occupants,
            "slot flag set"
        );
        Ok(SlotCounts::new(slot.name.clone(), occupants, slot.capacity))
    }

    /// Read-only view used for "remaining capacity" displays. `exclude` drops
    /// one entity (typically the one being edited) from the count.
    pub(crate) fn slot_counts(
        &self,
        slot: &Slot,
        exclude: Option<&EntityRef>,
    ) -> Result<SlotCounts, StoreError> {
        let occupants = occupant_count(&self.conn, &slot.name, exclude)?;
        Ok(SlotCounts::new(slot.name.clone(), occupants, slot.capacity))
    }

    pub fn is_featured(&self, entity: &EntityRef, slot: &SlotName) -> Result<bool, StoreError> {
        let pinned = self
            .conn
            .query_row(
                "SELECT pinned FROM entity_flags WHERE kind=?1 AND entity_id=?2 AND slot=?3",
                params![entity.kind.as_str(), entity.id.as_str(), slot.as_str()],
                |row| row.get::<_, bool>(0),
            )
            .optional()?;
        Ok(pinned.unwrap_or(false))
    }

    /// Entities currently pinned in `slot`, ordered by kind then id.
    pub fn slot_occupants(&self, slot: &SlotName) -> Result<Vec<EntityRef>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, entity_id FROM entity_flags \
             WHERE slot=?1 AND pinned=1 \
             ORDER BY kind ASC, entity_id ASC",
        )?;
        let mut rows = stmt.query(params![slot.as_str()])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(entity_from_row(row.get(0)?, row.get(1)?)?);
        }
        Ok(out)
    }
}

fn capacity_exceeded(slot: &Slot, current_count: u32) -> StoreError {
    StoreError::CapacityExceeded {
        slot: slot.name.to_string(),
        capacity: slot.capacity,
        current_count,
    }
}
