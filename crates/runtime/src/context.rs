//! Dependencies shared by the executor, resolver and authority service.

use std::sync::Arc;

use tokio::sync::RwLock;

use combat_core::{
    ActorId, ActorState, CombatState, Dice, FormulaEvaluator, ItemId, ItemState, ParticipantId,
};

use crate::api::{MacroRunner, Prompt, Result, RuntimeError, SettingsStore};
use crate::config::SessionConfig;
use crate::events::EventBus;
use crate::protocol::MessageBus;

/// This participant's replica of the combat state.
pub type SharedState = Arc<RwLock<CombatState>>;

/// Constructor-injected dependencies of one participant.
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct ResolutionContext {
    pub participant: ParticipantId,
    pub authority_id: ParticipantId,
    pub state: SharedState,
    pub config: Arc<SessionConfig>,
    pub prompt: Arc<dyn Prompt>,
    pub dice: Arc<dyn Dice>,
    pub evaluator: Arc<dyn FormulaEvaluator>,
    pub bus: Arc<dyn MessageBus>,
    pub settings: Arc<dyn SettingsStore>,
    pub macros: Arc<dyn MacroRunner>,
    pub events: EventBus,
}

impl ResolutionContext {
    pub fn is_authority(&self) -> bool {
        self.participant == self.authority_id
    }

    /// Clones an actor out of the shared state. The lock is released before
    /// returning so callers can prompt freely.
    pub async fn actor_snapshot(&self, actor: &ActorId) -> Result<ActorState> {
        let state = self.state.read().await;
        Ok(state.require_actor(actor)?.clone())
    }

    /// Clones an actor and one of its items out of the shared state.
    pub async fn item_snapshot(
        &self,
        actor: &ActorId,
        item: &ItemId,
    ) -> Result<(ActorState, ItemState)> {
        let state = self.state.read().await;
        let item = state.require_item(actor, item)?.clone();
        let actor = state.require_actor(actor)?.clone();
        Ok((actor, item))
    }

    /// Ids of every combatant.
    pub async fn combatants(&self) -> Vec<ActorId> {
        self.state.read().await.actor_ids()
    }

    /// Owner of an actor; `None` for authority-controlled actors.
    pub async fn owner_of(&self, actor: &ActorId) -> Result<Option<ParticipantId>> {
        let state = self.state.read().await;
        Ok(state.require_actor(actor)?.owner.clone())
    }

    pub(crate) fn stale(error: RuntimeError) -> RuntimeError {
        match error {
            RuntimeError::Rule(rule) => RuntimeError::StaleReference(rule),
            other => other,
        }
    }
}
