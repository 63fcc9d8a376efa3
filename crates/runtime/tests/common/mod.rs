#![allow(dead_code)]

use std::sync::Arc;

use combat_core::{
    ActorId, ActorState, AttackProfile, CombatAttributes, CombatState, ExtensionKind,
    ExtensionSpec, ItemKind, ItemState, ParticipantId, ResourceMeter,
};
use combat_runtime::testing::{FixedDice, RecordingBus, ScriptedPrompt};
use combat_runtime::{MessageBus, Prompt, Session, SessionConfig};

pub const GM: &str = "gm";
pub const ALICE: &str = "alice";

pub fn gm() -> ParticipantId {
    ParticipantId::new(GM)
}

pub fn alice() -> ParticipantId {
    ParticipantId::new(ALICE)
}

pub fn pc() -> ActorId {
    ActorId::new("pc")
}

pub fn npc() -> ActorId {
    ActorId::new("npc")
}

/// `pc` (owned by alice, 20/30 HP) and `npc` (authority-controlled, 10/30 HP).
pub fn arena() -> CombatState {
    CombatState::new()
        .with_actor(
            ActorState::new("pc", "Player", ResourceMeter::new(20, 30))
                .with_owner(ALICE)
                .with_attributes(CombatAttributes {
                    dice: 2,
                    attack: 1,
                    ..CombatAttributes::default()
                }),
        )
        .with_actor(ActorState::new("npc", "Grunt", ResourceMeter::new(10, 30)))
}

pub fn blade() -> ItemState {
    ItemState::new("blade", "Blade", ItemKind::Weapon).with_attack(AttackProfile {
        dice: 1,
        attack: 3,
        ..AttackProfile::default()
    })
}

pub fn item_with(id: &str, kind: ExtensionKind, spec: ExtensionSpec) -> ItemState {
    ItemState::new(id, id, ItemKind::Effect).with_extension(kind, spec)
}

pub fn give(state: &mut CombatState, actor: &ActorId, item: ItemState) {
    if let Some(actor) = state.actor_mut(actor) {
        actor.items.insert(item.id.clone(), item);
    }
}

/// Authority session over `state`; every d10 lands on 5.
pub fn authority(state: CombatState, prompt: Arc<ScriptedPrompt>) -> Session {
    Session::builder(gm(), gm())
        .config(SessionConfig::default())
        .state(state)
        .prompt(prompt as Arc<dyn Prompt>)
        .dice(Arc::new(FixedDice::constant(5)))
        .build()
}

/// Alice's session with its own replica, sending through `bus`.
pub fn player(state: CombatState, bus: Arc<RecordingBus>) -> Session {
    Session::builder(alice(), gm())
        .state(state)
        .prompt(Arc::new(ScriptedPrompt::new()))
        .dice(Arc::new(FixedDice::constant(5)))
        .bus(bus as Arc<dyn MessageBus>)
        .build()
}

pub async fn hp(session: &Session, actor: &ActorId) -> u32 {
    session
        .state()
        .read()
        .await
        .actor(actor)
        .map(|actor| actor.hp.current)
        .unwrap_or_default()
}
