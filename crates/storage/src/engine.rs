#![forbid(unsafe_code)]

use crate::store::{ErrorKind, SlotCounts, SqliteStore, StoreError, TagSyncOutcome};
use relcon_core::ids::{SlotName, TagCategory};
use relcon_core::model::{EntityRef, Slot};
use relcon_core::{EngineConfig, SlotTable};
use std::path::Path;
use std::time::Duration;

/// Entry point for the action layer: tag reconciliation and featured-slot
/// admission over one store, with the configured slot table injected.
///
/// `Conflict` failures (lock contention that outlived the busy timeout) are
/// retried here; every other error is returned as-is.
#[derive(Debug)]
pub struct Engine {
    store: SqliteStore,
    slots: SlotTable,
    conflict_retries: u32,
    conflict_backoff: Duration,
}

impl Engine {
    pub fn open(storage_dir: impl AsRef<Path>, config: EngineConfig) -> Result<Self, StoreError> {
        let slots = config.slot_table()?;
        let store = SqliteStore::open_with_busy_timeout(
            storage_dir,
            Duration::from_millis(config.busy_timeout_ms),
        )?;
        Ok(Self::with_store(store, slots, &config))
    }

    pub fn with_store(store: SqliteStore, slots: SlotTable, config: &EngineConfig) -> Self {
        Self {
            store,
            slots,
            conflict_retries: config.conflict_retries,
            conflict_backoff: Duration::from_millis(config.conflict_backoff_ms),
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SqliteStore {
        &mut self.store
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

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
        let labels: Vec<String> = labels
            .into_iter()
            .map(|label| label.as_ref().to_string())
            .collect();
        self.retry_on_conflict("sync_tags", |store| {
            store.sync_tags(entity, category, &labels)
        })
    }

    pub fn set_featured(
        &mut self,
        entity: &EntityRef,
        slot: &SlotName,
        desired: bool,
        exclude: Option<&EntityRef>,
    ) -> Result<SlotCounts, StoreError> {
        let slot = self.slot(slot)?;
        let result = self.retry_on_conflict("set_featured", |store| {
            store.set_featured(entity, &slot, desired, exclude)
        });
        if let Err(StoreError::CapacityExceeded {
            capacity,
            current_count,
            ..
        }) = &result
        {
            tracing::debug!(
                entity = %entity,
                slot = %slot.name,
                capacity,
                current_count,
                "pin refused"
            );
        }
        result
    }

    pub fn slot_counts(
        &self,
        slot: &SlotName,
        exclude: Option<&EntityRef>,
    ) -> Result<SlotCounts, StoreError> {
        let slot = self.slot(slot)?;
        self.store.slot_counts(&slot, exclude)
    }

    fn slot(&self, name: &SlotName) -> Result<Slot, StoreError> {
        self.slots
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownSlot {
                slot: name.to_string(),
            })
    }

    fn retry_on_conflict<T>(
        &mut self,
        op: &'static str,
        mut run: impl FnMut(&mut SqliteStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut attempt = 0u32;
        loop {
            match run(&mut self.store) {
                Err(err) if err.kind() == ErrorKind::Conflict && attempt < self.conflict_retries => {
                    attempt += 1;
                    tracing::warn!(op, attempt, error = %err, "conflict, retrying");
                    std::thread::sleep(self.conflict_backoff * attempt);
                }
                other => return other,
            }
        }
    }
}
