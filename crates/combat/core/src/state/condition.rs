//! Status conditions carried by actors.
//!
//! Conditions have no duration here; they stay until something outside the
//! combat engine removes them. Applying an already-active condition refreshes
//! its detail instead of adding a second copy.

use arrayvec::ArrayVec;

use super::ActorId;
use crate::config::CombatConfig;

/// Types of status conditions.
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
pub enum ConditionKind {
    // ========================================================================
    // Judgement penalties
    // ========================================================================
    /// Attack pools lose dice.
    Dazed,

    /// Cannot move.
    Rigor,

    /// Cannot use automatic abilities.
    Pressure,

    // ========================================================================
    // Damage over time
    // ========================================================================
    /// Loses HP each round according to its rank.
    Poisoned,

    // ========================================================================
    // Directed states (need a chosen actor or mode)
    // ========================================================================
    /// Must attack the hated actor.
    Hatred,

    /// Cannot approach the feared actor; damage rolls are penalized.
    Fear,

    /// Loses control in a chosen manner; cannot guard.
    Berserk,

    // ========================================================================
    // Recovery
    // ========================================================================
    /// Cannot receive healing.
    HealBlocked,
}

impl ConditionKind {
    /// Conditions that need one interactive selection per batch.
    pub const fn requires_selection(self) -> bool {
        matches!(self, Self::Hatred | Self::Fear | Self::Berserk)
    }

    /// Conditions that force guard to zero during defense.
    pub const fn suppresses_guard(self) -> bool {
        matches!(self, Self::Berserk)
    }

    /// Conditions that block incoming healing.
    pub const fn suppresses_heal(self) -> bool {
        matches!(self, Self::HealBlocked)
    }
}

/// Berserk subtypes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BerserkMode {
    Release,
    Bloodlust,
    Hunger,
    Slaughter,
    Destruction,
    Cruelty,
    Delusion,
    SelfHarm,
    Terror,
    Hostility,
}

/// Extra data attached to an active condition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum ConditionDetail {
    #[default]
    None,
    Poison {
        rank: i64,
    },
    Hatred {
        target: ActorId,
    },
    Fear {
        target: ActorId,
    },
    Berserk {
        mode: BerserkMode,
    },
}

impl ConditionDetail {
    pub fn poison_rank(&self) -> Option<i64> {
        match self {
            Self::Poison { rank } => Some(*rank),
            _ => None,
        }
    }
}

/// A single active condition.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActiveCondition {
    pub kind: ConditionKind,
    pub detail: ConditionDetail,
}

/// Result of applying a condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConditionChange {
    /// Condition was not active before.
    Added,
    /// Condition was already active; its detail was replaced.
    Refreshed,
    /// No room left for another condition.
    Full,
}

/// Active conditions on an actor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConditionSet {
    conditions: ArrayVec<ActiveCondition, { CombatConfig::MAX_CONDITIONS }>,
}

impl ConditionSet {
    pub fn empty() -> Self {
        Self {
            conditions: ArrayVec::new(),
        }
    }

    pub fn has(&self, kind: ConditionKind) -> bool {
        self.conditions.iter().any(|c| c.kind == kind)
    }

    pub fn get(&self, kind: ConditionKind) -> Option<&ActiveCondition> {
        self.conditions.iter().find(|c| c.kind == kind)
    }

    /// Adds a condition, or refreshes its detail if already active.
    pub fn apply(&mut self, kind: ConditionKind, detail: ConditionDetail) -> ConditionChange {
        if let Some(existing) = self.conditions.iter_mut().find(|c| c.kind == kind) {
            existing.detail = detail;
            return ConditionChange::Refreshed;
        }

        if self.conditions.is_full() {
            return ConditionChange::Full;
        }

        self.conditions.push(ActiveCondition { kind, detail });
        ConditionChange::Added
    }

    pub fn remove(&mut self, kind: ConditionKind) {
        self.conditions.retain(|c| c.kind != kind);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveCondition> {
        self.conditions.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn suppresses_guard(&self) -> bool {
        self.conditions.iter().any(|c| c.kind.suppresses_guard())
    }

    pub fn suppresses_heal(&self) -> bool {
        self.conditions.iter().any(|c| c.kind.suppresses_heal())
    }
}
