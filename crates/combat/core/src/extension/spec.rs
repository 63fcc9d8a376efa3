//! Extension data carried by items.

use crate::state::{AttackProfile, ConditionKind};

/// Effect kind an extension produces.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ExtensionKind {
    Heal,
    Damage,
    Condition,
    /// Creates a temporary weapon.
    Weapon,
    /// Creates temporary armor.
    Protect,
    Vehicle,
}

impl ExtensionKind {
    /// Equipment-creation kinds inherit the triggering item's timing and are
    /// never merged.
    pub const fn is_equipment(self) -> bool {
        matches!(self, Self::Weapon | Self::Protect | Self::Vehicle)
    }

    /// Kinds whose dice/add formulas are summed across sources.
    pub const fn is_formula(self) -> bool {
        matches!(self, Self::Heal | Self::Damage)
    }
}

/// Phase an effect executes in, relative to the triggering action.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Timing {
    /// As soon as the action is declared.
    #[default]
    Instant,
    /// After the action's judgement succeeds.
    AfterSuccess,
    /// After every target has reported the damage it actually took.
    AfterDamage,
    /// At the next round boundary, from the persistent queue.
    AfterMain,
}

/// Which actors an effect lands on.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TargetScope {
    /// The acting actor.
    #[strum(serialize = "self")]
    #[cfg_attr(feature = "serde", serde(rename = "self"))]
    SelfOnly,
    /// The targets the operator selected for the action.
    #[default]
    SelectedTargets,
    /// Every combatant.
    AllTargets,
}

impl TargetScope {
    /// Scopes that run AfterDamage follow-ups even if no target was damaged.
    pub const fn bypasses_damage_gate(self) -> bool {
        matches!(self, Self::SelfOnly | Self::AllTargets)
    }
}

bitflags::bitflags! {
    /// Boolean switches of heal/damage extensions; merged by union.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct EffectFlags: u8 {
        /// Damage ignores the target's reduce.
        const IGNORE_REDUCE = 1 << 0;
        /// Healing raises the target's encroachment by the amount healed.
        const RESURRECT = 1 << 1;
        /// Healing may target actors at 0 HP.
        const REVIVAL = 1 << 2;
    }
}

impl Default for EffectFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Poison rank as declared on an item.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum PoisonRank {
    Fixed(i64),
    /// Formula with bracket references, e.g. `[level]+1`.
    Formula(String),
}

/// Raw creation data of an equipment extension.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EquipmentCreation {
    pub name: String,
    pub profile: AttackProfile,
}

impl EquipmentCreation {
    pub fn new(name: impl Into<String>, profile: AttackProfile) -> Self {
        Self {
            name: name.into(),
            profile,
        }
    }
}

/// One extension of one item, for one effect kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtensionSpec {
    pub activate: bool,
    /// Declared timing; ignored by equipment kinds.
    pub timing: Timing,
    pub target: TargetScope,
    /// Dice-count formula.
    pub dice: String,
    /// Flat-add formula.
    pub add: String,
    pub condition_types: Vec<ConditionKind>,
    pub poisoned_rank: Option<PoisonRank>,
    pub flags: EffectFlags,
    /// Requires manual operator input; never merged.
    pub custom: bool,
    pub equipment: Option<EquipmentCreation>,
}

impl ExtensionSpec {
    /// An active dice/add extension (heal or damage).
    pub fn formula(dice: impl Into<String>, add: impl Into<String>) -> Self {
        Self {
            activate: true,
            dice: dice.into(),
            add: add.into(),
            ..Self::default()
        }
    }

    /// An active condition extension.
    pub fn conditions(types: impl IntoIterator<Item = ConditionKind>) -> Self {
        Self {
            activate: true,
            condition_types: types.into_iter().collect(),
            ..Self::default()
        }
    }

    /// An active equipment-creation extension.
    pub fn equipment(creation: EquipmentCreation) -> Self {
        Self {
            activate: true,
            equipment: Some(creation),
            ..Self::default()
        }
    }

    /// Builder: set declared timing.
    pub fn at(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Builder: set target scope.
    pub fn targeting(mut self, target: TargetScope) -> Self {
        self.target = target;
        self
    }

    /// Builder: add flags.
    pub fn with_flags(mut self, flags: EffectFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Builder: set poison rank.
    pub fn with_poison_rank(mut self, rank: PoisonRank) -> Self {
        self.poisoned_rank = Some(rank);
        self
    }

    /// Builder: mark as requiring manual input.
    pub fn custom(mut self) -> Self {
        self.custom = true;
        self
    }

    /// Builder: deactivate.
    pub fn inactive(mut self) -> Self {
        self.activate = false;
        self
    }
}
