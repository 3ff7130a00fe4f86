#![forbid(unsafe_code)]

use relcon_core::ids::SlotName;
use relcon_core::model::Tag;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TagSyncOutcome {
    /// Tags linked after the sync, ordered by label.
    pub tags: Vec<Tag>,
    pub added: Vec<i64>,
    pub removed: Vec<i64>,
    /// Tags this call had to create.
    pub created: Vec<i64>,
}

impl TagSyncOutcome {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SlotCounts {
    pub slot: SlotName,
    pub occupant_count: u32,
    pub capacity: u32,
    pub remaining: u32,
}

impl SlotCounts {
    pub(crate) fn new(slot: SlotName, occupant_count: u32, capacity: u32) -> Self {
        Self {
            slot,
            occupant_count,
            capacity,
            remaining: capacity.saturating_sub(occupant_count),
        }
    }

    pub fn is_full(&self) -> bool {
        self.remaining == 0
    }
}
