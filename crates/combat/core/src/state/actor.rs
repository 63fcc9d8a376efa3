use std::collections::BTreeMap;

use super::{ActorId, AppliedEffectEntry, ConditionSet, ItemId, ItemState, ParticipantId};

/// Integer resource meter (e.g., health) tracked per actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceMeter {
    pub current: u32,
    pub maximum: u32,
}

impl ResourceMeter {
    pub fn new(current: u32, maximum: u32) -> Self {
        Self {
            current: current.min(maximum),
            maximum,
        }
    }

    pub fn full(maximum: u32) -> Self {
        Self::new(maximum, maximum)
    }

    /// Sets the current value, clamped to `[0, maximum]`.
    pub fn set(&mut self, value: i64) {
        self.current = value.clamp(0, i64::from(self.maximum)) as u32;
    }

    pub fn is_empty(&self) -> bool {
        self.current == 0
    }
}

/// Attribute names that applied effects may modify.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AttributeKey {
    Dice,
    Critical,
    Add,
    Attack,
    DamageRoll,
    Penetrate,
    Armor,
    Guard,
    Reduce,
}

/// Numeric combat attributes of an actor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombatAttributes {
    /// Bonus dice for attack judgements.
    pub dice: i64,
    /// Critical value modifier (negative lowers the critical value).
    pub critical: i64,
    /// Flat bonus for attack judgements.
    pub add: i64,
    pub attack: i64,
    /// Bonus damage dice.
    pub damage_roll: i64,
    pub penetrate: i64,
    pub armor: i64,
    pub guard: i64,
    pub reduce: i64,
}

impl CombatAttributes {
    pub fn get(&self, key: AttributeKey) -> i64 {
        match key {
            AttributeKey::Dice => self.dice,
            AttributeKey::Critical => self.critical,
            AttributeKey::Add => self.add,
            AttributeKey::Attack => self.attack,
            AttributeKey::DamageRoll => self.damage_roll,
            AttributeKey::Penetrate => self.penetrate,
            AttributeKey::Armor => self.armor,
            AttributeKey::Guard => self.guard,
            AttributeKey::Reduce => self.reduce,
        }
    }

    pub fn add_to(&mut self, key: AttributeKey, value: i64) {
        let slot = match key {
            AttributeKey::Dice => &mut self.dice,
            AttributeKey::Critical => &mut self.critical,
            AttributeKey::Add => &mut self.add,
            AttributeKey::Attack => &mut self.attack,
            AttributeKey::DamageRoll => &mut self.damage_roll,
            AttributeKey::Penetrate => &mut self.penetrate,
            AttributeKey::Armor => &mut self.armor,
            AttributeKey::Guard => &mut self.guard,
            AttributeKey::Reduce => &mut self.reduce,
        };
        *slot += value;
    }
}

/// Complete actor document as seen by the combat engine.
///
/// # Invariants
///
/// - `hp.current <= hp.maximum`
/// - `applied` entries are keyed by item-derived or synthetic ids and are
///   never removed by the combat engine
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActorState {
    pub id: ActorId,
    pub name: String,
    /// Participant that controls this actor; `None` means authority-controlled.
    pub owner: Option<ParticipantId>,
    pub hp: ResourceMeter,
    /// Corruption resource that grows when resurrect healing is used.
    pub encroachment: u32,
    pub attributes: CombatAttributes,
    pub conditions: ConditionSet,
    pub applied: BTreeMap<String, AppliedEffectEntry>,
    pub items: BTreeMap<ItemId, ItemState>,
}

impl ActorState {
    pub fn new(id: impl Into<ActorId>, name: impl Into<String>, hp: ResourceMeter) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            hp,
            ..Self::default()
        }
    }

    /// Builder: set controlling participant.
    pub fn with_owner(mut self, owner: impl Into<ParticipantId>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Builder: set base combat attributes.
    pub fn with_attributes(mut self, attributes: CombatAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Builder: set encroachment.
    pub fn with_encroachment(mut self, encroachment: u32) -> Self {
        self.encroachment = encroachment;
        self
    }

    /// Builder: add an item.
    pub fn with_item(mut self, item: ItemState) -> Self {
        self.items.insert(item.id.clone(), item);
        self
    }

    pub fn item(&self, id: &ItemId) -> Option<&ItemState> {
        self.items.get(id)
    }

    pub fn item_mut(&mut self, id: &ItemId) -> Option<&mut ItemState> {
        self.items.get_mut(id)
    }

    /// Returns true if the participant may act for this actor.
    ///
    /// Authority-controlled actors (`owner == None`) are only writable by the
    /// authority, which the caller checks separately.
    pub fn is_owned_by(&self, participant: &ParticipantId) -> bool {
        self.owner.as_ref() == Some(participant)
    }

    /// Base attributes plus every enabled applied-effect modifier.
    pub fn effective_attributes(&self) -> CombatAttributes {
        let mut attributes = self.attributes;
        for entry in self.applied.values().filter(|entry| !entry.disable) {
            for (key, value) in &entry.attributes {
                attributes.add_to(*key, *value);
            }
        }
        attributes
    }

    /// Guard contributed by equipped temporary weapons.
    pub fn temporary_guard(&self) -> i64 {
        self.items
            .values()
            .filter(|item| item.temporary && item.equipped)
            .map(|item| item.attack.guard)
            .sum()
    }

    /// Armor contributed by every equipped item.
    pub fn equipped_armor(&self) -> i64 {
        self.items
            .values()
            .filter(|item| item.equipped)
            .map(|item| item.attack.armor)
            .sum()
    }
}
