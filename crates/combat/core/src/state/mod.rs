//! Shared combat state replicated to every participant.
//!
//! Only the authority mutates these documents; other participants read their
//! replica and forward change requests. The types here carry no behavior
//! beyond local invariants (HP clamping, condition refresh, usage windows).
mod actor;
mod applied;
mod condition;
mod ids;
mod item;

pub use actor::{ActorState, AttributeKey, CombatAttributes, ResourceMeter};
pub use applied::AppliedEffectEntry;
pub use condition::{
    ActiveCondition, BerserkMode, ConditionChange, ConditionDetail, ConditionKind, ConditionSet,
};
pub use ids::{ActorId, ItemId, ParticipantId};
pub use item::{
    ActionType, ActiveSpec, AttackProfile, DisableMode, ItemKind, ItemState, RollKind,
    UsageCounter,
};

use std::collections::BTreeMap;

use crate::error::RuleError;

/// Every actor taking part in the current combat, keyed by id.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombatState {
    pub actors: BTreeMap<ActorId, ActorState>,
}

impl CombatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add an actor, replacing any actor with the same id.
    pub fn with_actor(mut self, actor: ActorState) -> Self {
        self.insert(actor);
        self
    }

    pub fn insert(&mut self, actor: ActorState) {
        self.actors.insert(actor.id.clone(), actor);
    }

    pub fn remove(&mut self, id: &ActorId) -> Option<ActorState> {
        self.actors.remove(id)
    }

    pub fn actor(&self, id: &ActorId) -> Option<&ActorState> {
        self.actors.get(id)
    }

    pub fn actor_mut(&mut self, id: &ActorId) -> Option<&mut ActorState> {
        self.actors.get_mut(id)
    }

    /// Returns the actor or a [`RuleError::ActorNotFound`].
    pub fn require_actor(&self, id: &ActorId) -> Result<&ActorState, RuleError> {
        self.actor(id).ok_or_else(|| RuleError::ActorNotFound(id.clone()))
    }

    /// Returns the item on the given actor or the matching lookup error.
    pub fn require_item(&self, actor: &ActorId, item: &ItemId) -> Result<&ItemState, RuleError> {
        self.require_actor(actor)?
            .item(item)
            .ok_or_else(|| RuleError::ItemNotFound {
                actor: actor.clone(),
                item: item.clone(),
            })
    }

    /// Returns the ids of every combatant in stable order.
    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.actors.keys().cloned().collect()
    }

    /// Resets every usage counter that uses the given reset window.
    pub fn reset_usage(&mut self, mode: DisableMode) -> usize {
        let mut reset = 0;
        for actor in self.actors.values_mut() {
            for item in actor.items.values_mut() {
                if item.usage.disable == mode && item.usage.used > 0 {
                    item.usage.reset();
                    reset += 1;
                }
            }
        }
        reset
    }
}
