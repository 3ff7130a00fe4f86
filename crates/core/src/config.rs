#![forbid(unsafe_code)]

use crate::ids::SlotName;
use crate::model::Slot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_CONFLICT_RETRIES: u32 = 3;
pub const DEFAULT_CONFLICT_BACKOFF_MS: u64 = 25;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("slot {slot} is configured more than once")]
    DuplicateSlot { slot: String },
    #[error("slot {slot} must have a capacity of at least 1")]
    ZeroCapacity { slot: String },
}

/// Engine settings. Every field is optional in YAML and falls back to the
/// observed production values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub slots: Vec<Slot>,
    pub busy_timeout_ms: u64,
    pub conflict_retries: u32,
    pub conflict_backoff_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slots: vec![
                Slot::new(SlotName::main(), 6),
                Slot::new(SlotName::photos(), 12),
            ],
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
            conflict_backoff_ms: DEFAULT_CONFLICT_BACKOFF_MS,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.slot_table()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn slot_table(&self) -> Result<SlotTable, ConfigError> {
        SlotTable::try_new(self.slots.iter().cloned())
    }
}

/// Validated slot name -> capacity lookup injected into the admission controller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotTable {
    slots: BTreeMap<SlotName, Slot>,
}

impl SlotTable {
    pub fn try_new(slots: impl IntoIterator<Item = Slot>) -> Result<Self, ConfigError> {
        let mut out = BTreeMap::new();
        for slot in slots {
            if slot.capacity == 0 {
                return Err(ConfigError::ZeroCapacity {
                    slot: slot.name.into_string(),
                });
            }
            if out.contains_key(&slot.name) {
                return Err(ConfigError::DuplicateSlot {
                    slot: slot.name.into_string(),
                });
            }
            out.insert(slot.name.clone(), slot);
        }
        Ok(Self { slots: out })
    }

    pub fn get(&self, name: &SlotName) -> Option<&Slot> {
        self.slots.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(name: &str) -> SlotName {
        SlotName::try_new(name).expect("slot name")
    }

    #[test]
    fn default_config_carries_observed_capacities() {
        let table = EngineConfig::default().slot_table().expect("slot table");
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&slot("main")).map(|s| s.capacity), Some(6));
        assert_eq!(table.get(&slot("photos")).map(|s| s.capacity), Some(12));
        assert!(table.get(&slot("sidebar")).is_none());
    }

    #[test]
    fn yaml_overrides_and_falls_back_to_defaults() {
        let config = EngineConfig::from_yaml_str(
            r#"
slots:
  - name: main
    capacity: 3
  - name: gallery
    capacity: 9
conflict_retries: 5
"#,
        )
        .expect("parse config");
        assert_eq!(config.conflict_retries, 5);
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        let table = config.slot_table().expect("slot table");
        assert_eq!(table.get(&slot("gallery")).map(|s| s.capacity), Some(9));
        assert!(table.get(&slot("photos")).is_none());
    }

    #[test]
    fn yaml_rejects_duplicate_and_empty_slots() {
        let duplicate = EngineConfig::from_yaml_str(
            "slots:\n  - {name: main, capacity: 1}\n  - {name: main, capacity: 2}\n",
        );
        assert!(matches!(
            duplicate,
            Err(ConfigError::DuplicateSlot { slot }) if slot == "main"
        ));

        let zero = EngineConfig::from_yaml_str("slots:\n  - {name: main, capacity: 0}\n");
        assert!(matches!(zero, Err(ConfigError::ZeroCapacity { .. })));

        let bad_name = EngineConfig::from_yaml_str("slots:\n  - {name: Main, capacity: 2}\n");
        assert!(matches!(bad_name, Err(ConfigError::Yaml(_))));

        let unknown = EngineConfig::from_yaml_str("slot_count: 3\n");
        assert!(matches!(unknown, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn load_reads_yaml_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "relcon_config_{}_{}.yaml",
            std::process::id(),
            line!()
        ));
        std::fs::write(&path, "busy_timeout_ms: 250\n").expect("write config");
        let config = EngineConfig::load(&path).expect("load config");
        std::fs::remove_file(&path).ok();
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.slots, EngineConfig::default().slots);

        let missing = EngineConfig::load(path.with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
