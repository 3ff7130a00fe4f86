#![forbid(unsafe_code)]

pub mod config;

pub use config::{ConfigError, EngineConfig, SlotTable};

pub mod ids {
    use serde::{Deserialize, Serialize};
    use std::fmt;

    const MAX_IDENTIFIER_LEN: usize = 64;
    const MAX_ENTITY_ID_LEN: usize = 256;

    #[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
    pub enum IdentifierError {
        #[error("identifier must not be empty")]
        Empty,
        #[error("identifier is too long")]
        TooLong,
        #[error("identifier must start with a lowercase letter or digit")]
        InvalidFirstChar,
        #[error("identifier contains invalid char {ch:?} at {index}")]
        InvalidChar { ch: char, index: usize },
    }

    #[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
    pub enum EntityIdError {
        #[error("entity id must not be empty")]
        Empty,
        #[error("entity id is too long")]
        TooLong,
        #[error("entity id contains control characters")]
        ContainsControl,
    }

    /// Lowercase identifier shared by entity kinds, slot names and tag categories.
    fn validate_identifier(value: &str) -> Result<(), IdentifierError> {
        if value.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if value.len() > MAX_IDENTIFIER_LEN {
            return Err(IdentifierError::TooLong);
        }
        let mut chars = value.chars();
        let Some(first) = chars.next() else {
            return Err(IdentifierError::Empty);
        };
        if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
            return Err(IdentifierError::InvalidFirstChar);
        }
        for (index, ch) in value.chars().enumerate().skip(1) {
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '-') {
                continue;
            }
            return Err(IdentifierError::InvalidChar { ch, index });
        }
        Ok(())
    }

    fn validate_entity_id(value: &str) -> Result<(), EntityIdError> {
        if value.is_empty() {
            return Err(EntityIdError::Empty);
        }
        if value.len() > MAX_ENTITY_ID_LEN {
            return Err(EntityIdError::TooLong);
        }
        if value.chars().any(|c| c.is_control()) {
            return Err(EntityIdError::ContainsControl);
        }
        Ok(())
    }

    macro_rules! identifier_newtype {
        ($(#[$meta:meta])* $name:ident, $error:ty, $validate:path, trim = $trim:expr) => {
            $(#[$meta])*
            #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            #[serde(try_from = "String", into = "String")]
            pub struct $name(String);

            impl $name {
                pub fn as_str(&self) -> &str {
                    &self.0
                }

                pub fn into_string(self) -> String {
                    self.0
                }

                pub fn try_new(value: impl Into<String>) -> Result<Self, $error> {
                    let mut value = value.into();
                    if $trim {
                        let trimmed = value.trim();
                        if trimmed.len() != value.len() {
                            value = trimmed.to_string();
                        }
                    }
                    $validate(&value)?;
                    Ok(Self(value))
                }
            }

            impl TryFrom<String> for $name {
                type Error = $error;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    Self::try_new(value)
                }
            }

            impl From<$name> for String {
                fn from(value: $name) -> Self {
                    value.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }
        };
    }

    identifier_newtype!(
        /// Type namespace of a taggable/pinnable row (`work`, `video`, `photo`, ...).
        EntityKind,
        IdentifierError,
        validate_identifier,
        trim = false
    );

    identifier_newtype!(
        /// Opaque row id, unique within its [`EntityKind`].
        EntityId,
        EntityIdError,
        validate_entity_id,
        trim = true
    );

    identifier_newtype!(
        /// Name of a capacity-bounded featured slot.
        SlotName,
        IdentifierError,
        validate_identifier,
        trim = false
    );

    identifier_newtype!(
        /// Tag namespace. Labels are unique per category, not globally.
        TagCategory,
        IdentifierError,
        validate_identifier,
        trim = false
    );

    impl SlotName {
        pub fn main() -> Self {
            Self("main".to_string())
        }

        pub fn photos() -> Self {
            Self("photos".to_string())
        }
    }

    impl TagCategory {
        pub fn content() -> Self {
            Self("content".to_string())
        }

        pub fn search() -> Self {
            Self("search".to_string())
        }
    }
}

pub mod model {
    use crate::ids::{EntityId, EntityKind, IdentifierError, EntityIdError, SlotName, TagCategory};
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeSet;
    use std::fmt;

    pub const MAX_LABEL_LEN: usize = 256;

    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct EntityRef {
        pub kind: EntityKind,
        pub id: EntityId,
    }

    impl EntityRef {
        pub fn new(kind: EntityKind, id: EntityId) -> Self {
            Self { kind, id }
        }

        pub fn parse(kind: &str, id: &str) -> Result<Self, EntityRefError> {
            Ok(Self {
                kind: EntityKind::try_new(kind)?,
                id: EntityId::try_new(id)?,
            })
        }
    }

    impl fmt::Display for EntityRef {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}/{}", self.kind, self.id)
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
    pub enum EntityRefError {
        #[error("invalid entity kind: {0}")]
        Kind(#[from] IdentifierError),
        #[error("invalid entity id: {0}")]
        Id(#[from] EntityIdError),
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Tag {
        pub id: i64,
        pub category: TagCategory,
        pub label: String,
        pub flagged: bool,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Slot {
        pub name: SlotName,
        pub capacity: u32,
    }

    impl Slot {
        pub fn new(name: SlotName, capacity: u32) -> Self {
            Self { name, capacity }
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
    pub enum LabelError {
        #[error("tag label must not be empty")]
        Empty,
        #[error("tag label is too long")]
        TooLong,
        #[error("tag label contains control characters")]
        ContainsControl,
    }

    /// Trims a label and checks it. Matching stays case-sensitive.
    pub fn normalize_label(raw: &str) -> Result<String, LabelError> {
        let label = raw.trim();
        if label.is_empty() {
            return Err(LabelError::Empty);
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(LabelError::TooLong);
        }
        if label.chars().any(|c| c.is_control()) {
            return Err(LabelError::ContainsControl);
        }
        Ok(label.to_string())
    }

    /// Desired label set for a sync: trimmed, blanks dropped, duplicates collapsed.
    pub fn normalize_label_set<I, S>(labels: I) -> Result<BTreeSet<String>, LabelError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = BTreeSet::new();
        for raw in labels {
            match normalize_label(raw.as_ref()) {
                Ok(label) => {
                    out.insert(label);
                }
                Err(LabelError::Empty) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::ids::*;
    use super::model::*;

    #[test]
    fn identifiers_reject_uppercase_and_separators() {
        assert!(EntityKind::try_new("photo").is_ok());
        assert!(SlotName::try_new("main-carousel_2").is_ok());
        assert_eq!(EntityKind::try_new(""), Err(IdentifierError::Empty));
        assert_eq!(
            SlotName::try_new("Main"),
            Err(IdentifierError::InvalidFirstChar)
        );
        assert_eq!(
            TagCategory::try_new("content tags"),
            Err(IdentifierError::InvalidChar { ch: ' ', index: 7 })
        );
        assert_eq!(
            TagCategory::try_new("x".repeat(65)),
            Err(IdentifierError::TooLong)
        );
    }

    #[test]
    fn entity_id_is_trimmed_and_opaque() {
        let id = EntityId::try_new("  4f1c-UPPER/ok ").expect("entity id");
        assert_eq!(id.as_str(), "4f1c-UPPER/ok");
        assert_eq!(EntityId::try_new("   "), Err(EntityIdError::Empty));
        assert_eq!(
            EntityId::try_new("a\nb"),
            Err(EntityIdError::ContainsControl)
        );
    }

    #[test]
    fn entity_ref_displays_kind_and_id() {
        let entity = EntityRef::parse("video", "42").expect("entity ref");
        assert_eq!(entity.to_string(), "video/42");
        assert!(matches!(
            EntityRef::parse("Video", "42"),
            Err(EntityRefError::Kind(_))
        ));
    }

    #[test]
    fn label_set_trims_dedupes_and_drops_blanks() {
        let set = normalize_label_set(["drone", " drone ", "", "  ", "Drone", "bw"])
            .expect("label set");
        let labels: Vec<&str> = set.iter().map(String::as_str).collect();
        assert_eq!(labels, vec!["Drone", "bw", "drone"]);
    }

    #[test]
    fn label_set_rejects_oversized_label() {
        let long = "a".repeat(MAX_LABEL_LEN + 1);
        assert_eq!(
            normalize_label_set(["ok", long.as_str()]),
            Err(LabelError::TooLong)
        );
        assert_eq!(normalize_label("  "), Err(LabelError::Empty));
    }

    #[test]
    fn identifiers_round_trip_through_serde_as_strings() {
        let category: TagCategory = serde_json::from_str("\"search\"").expect("category");
        assert_eq!(category, TagCategory::search());
        assert!(serde_json::from_str::<SlotName>("\"Bad Slot\"").is_err());
        let json = serde_json::to_string(&EntityRef::parse("photo", "p1").expect("entity"))
            .expect("serialize");
        assert_eq!(json, r#"{"kind":"photo","id":"p1"}"#);
    }
}
