use std::collections::BTreeMap;

use super::ItemId;
use crate::config::CombatConfig;
use crate::error::RuleError;
use crate::extension::{ExtensionKind, ExtensionSpec, Timing};

/// Broad item categories.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ItemKind {
    /// A single ability.
    #[default]
    Effect,
    /// Several abilities used as one action.
    Combo,
    Spell,
    Weapon,
    Protect,
    Vehicle,
}

/// When in the round an item is used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ActionType {
    #[default]
    Major,
    Minor,
    Reaction,
    Auto,
    Setup,
    Initiative,
    Cleanup,
    /// Spellcasting; its roll kind decides the runtime timing.
    Casting,
}

/// Judgement roll an item performs when used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RollKind {
    #[default]
    None,
    Major,
    Reaction,
    Dodge,
    /// Casting judgement.
    Cast,
}

/// Activation settings of an item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActiveSpec {
    /// Timing declared for the item's own effects.
    pub run_timing: Option<Timing>,
    pub action_type: ActionType,
    pub roll: RollKind,
}

/// Reset window of a usage counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DisableMode {
    /// Unlimited uses.
    #[default]
    NotCheck,
    Round,
    Scene,
    Session,
}

/// Tracks how often an item was used in its reset window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UsageCounter {
    pub used: u32,
    pub max: u32,
    pub disable: DisableMode,
}

impl UsageCounter {
    pub fn limited(max: u32, disable: DisableMode) -> Self {
        Self {
            used: 0,
            max,
            disable,
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        match self.disable {
            DisableMode::NotCheck => None,
            _ => Some(self.max.saturating_sub(self.used)),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == Some(0)
    }

    /// Records one use.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::UsageExhausted`] if no uses remain.
    pub fn consume(&mut self, item: &ItemId) -> Result<(), RuleError> {
        if self.is_exhausted() {
            return Err(RuleError::UsageExhausted {
                item: item.clone(),
                used: self.used,
                max: self.max,
            });
        }
        self.used = self.used.saturating_add(1);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }
}

/// Attack and defense numbers an item contributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttackProfile {
    pub dice: i64,
    pub critical: i64,
    pub add: i64,
    /// Weapon attack added to damage rolls.
    pub attack: i64,
    pub guard: i64,
    pub armor: i64,
}

impl Default for AttackProfile {
    fn default() -> Self {
        Self {
            dice: 0,
            critical: CombatConfig::DEFAULT_CRITICAL as i64,
            add: 0,
            attack: 0,
            guard: 0,
            armor: 0,
        }
    }
}

/// An item owned by an actor.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemState {
    pub id: ItemId,
    pub name: String,
    pub kind: ItemKind,
    /// Level context for formula evaluation.
    pub level: Option<u32>,
    pub active: ActiveSpec,
    pub usage: UsageCounter,
    pub attack: AttackProfile,
    pub extensions: BTreeMap<ExtensionKind, ExtensionSpec>,
    /// Items bundled into a combo, resolved as one action.
    pub components: Vec<ItemId>,
    pub equipped: bool,
    /// Created by an equipment extension rather than owned permanently.
    pub temporary: bool,
}

impl ItemState {
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    /// Builder: set level.
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    /// Builder: set activation settings.
    pub fn with_active(mut self, active: ActiveSpec) -> Self {
        self.active = active;
        self
    }

    /// Builder: set usage counter.
    pub fn with_usage(mut self, usage: UsageCounter) -> Self {
        self.usage = usage;
        self
    }

    /// Builder: set attack profile.
    pub fn with_attack(mut self, attack: AttackProfile) -> Self {
        self.attack = attack;
        self
    }

    /// Builder: attach an extension.
    pub fn with_extension(mut self, kind: ExtensionKind, spec: ExtensionSpec) -> Self {
        self.extensions.insert(kind, spec);
        self
    }

    /// Builder: bundle component items.
    pub fn with_components(mut self, components: Vec<ItemId>) -> Self {
        self.components = components;
        self
    }

    pub fn level_or_default(&self) -> u32 {
        self.level.unwrap_or(CombatConfig::DEFAULT_ITEM_LEVEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limited_counter_exhausts_at_max() {
        let id = ItemId::new("blade");
        let mut usage = UsageCounter::limited(2, DisableMode::Scene);

        usage.consume(&id).unwrap();
        usage.consume(&id).unwrap();

        assert_eq!(
            usage.consume(&id),
            Err(RuleError::UsageExhausted {
                item: id,
                used: 2,
                max: 2
            })
        );
    }

    #[test]
    fn unlimited_counter_never_exhausts() {
        let id = ItemId::new("punch");
        let mut usage = UsageCounter::default();

        for _ in 0..100 {
            usage.consume(&id).unwrap();
        }
        assert_eq!(usage.remaining(), None);
    }
}
