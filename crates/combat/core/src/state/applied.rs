//! Attribute modifiers written onto a target by an "apply effect" activation.

use std::collections::BTreeMap;

use super::{ActorId, AttributeKey, ItemId};

/// One applied effect on a target's shared state map.
///
/// Entries are created or updated in place under the same key; the combat
/// engine never removes them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AppliedEffectEntry {
    pub item_id: Option<ItemId>,
    pub name: String,
    /// Actor that applied the effect.
    pub source: ActorId,
    /// Milliseconds since the Unix epoch of the last write.
    pub timestamp: i64,
    pub disable: bool,
    pub attributes: BTreeMap<AttributeKey, i64>,
}

impl AppliedEffectEntry {
    /// Key used when an entry is derived from an item.
    pub fn item_key(item: &ItemId) -> String {
        item.to_string()
    }

    /// Synthetic key for entries that do not originate from an item.
    pub fn synthetic_key(source: &ActorId, name: &str) -> String {
        format!("{source}:{name}")
    }

    /// Overwrites the mutable parts of this entry with a newer write.
    pub fn refresh_from(&mut self, other: AppliedEffectEntry) {
        self.name = other.name;
        self.source = other.source;
        self.timestamp = other.timestamp;
        self.disable = other.disable;
        self.attributes = other.attributes;
        if other.item_id.is_some() {
            self.item_id = other.item_id;
        }
    }
}
