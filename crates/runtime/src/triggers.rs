//! Condition-trigger side channel.
//!
//! The condition toggle takes only the actor, the condition and its detail.
//! Callers that know why a toggle fires (source item, poison rank, whether
//! the announcement would be a duplicate) record it in the [`TriggerLedger`]
//! under `actor:condition` right before toggling; the toggle consumes the
//! entry when it publishes its notification.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use combat_core::{ActorId, ActorState, ConditionChange, ConditionDetail, ConditionKind};

use crate::api::{Result, RuntimeError};
use crate::events::{CombatEvent, EventBus};

/// Ledger key, rendered as `actor:condition`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriggerKey {
    pub actor: ActorId,
    pub kind: ConditionKind,
}

impl TriggerKey {
    pub fn new(actor: ActorId, kind: ConditionKind) -> Self {
        Self { actor, kind }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.actor, self.kind)
    }
}

/// Why a toggle fired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerMetadata {
    pub source_item: Option<String>,
    pub poison_rank: Option<i64>,
    /// Skip the notification; the condition was already announced.
    pub suppress_message: bool,
}

#[derive(Debug, Default)]
pub struct TriggerLedger {
    entries: Mutex<HashMap<TriggerKey, TriggerMetadata>>,
}

impl TriggerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records metadata for the next toggle of `key`, replacing older data.
    pub fn record(&self, key: TriggerKey, metadata: TriggerMetadata) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| RuntimeError::LockPoisoned("trigger ledger"))?
            .insert(key, metadata);
        Ok(())
    }

    /// Removes and returns the metadata for `key`.
    pub fn take(&self, key: &TriggerKey) -> Result<Option<TriggerMetadata>> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| RuntimeError::LockPoisoned("trigger ledger"))?
            .remove(key))
    }

    pub fn clear(&self) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| RuntimeError::LockPoisoned("trigger ledger"))?
            .clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generic status-condition toggle primitive.
pub trait ConditionToggle: Send + Sync {
    fn toggle(
        &self,
        actor: &mut ActorState,
        kind: ConditionKind,
        detail: ConditionDetail,
    ) -> Result<ConditionChange>;
}

/// Toggle that applies to the actor's condition set and announces the
/// change with whatever the ledger knows about it.
pub struct StandardToggle {
    ledger: Arc<TriggerLedger>,
    events: EventBus,
}

impl StandardToggle {
    pub fn new(ledger: Arc<TriggerLedger>, events: EventBus) -> Self {
        Self { ledger, events }
    }
}

impl ConditionToggle for StandardToggle {
    fn toggle(
        &self,
        actor: &mut ActorState,
        kind: ConditionKind,
        detail: ConditionDetail,
    ) -> Result<ConditionChange> {
        let poison_rank = detail.poison_rank();
        let change = actor.conditions.apply(kind, detail);
        let metadata = self
            .ledger
            .take(&TriggerKey::new(actor.id.clone(), kind))?
            .unwrap_or_default();

        if change == ConditionChange::Full {
            tracing::warn!(
                target: "runtime::triggers",
                actor = %actor.id,
                condition = %kind,
                "Condition set full, toggle ignored"
            );
            return Ok(change);
        }

        if !metadata.suppress_message {
            self.events.publish(CombatEvent::ConditionApplied {
                target: actor.id.clone(),
                kind,
                change,
                source_item: metadata.source_item,
                poison_rank: metadata.poison_rank.or(poison_rank),
            });
        }

        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, Topic};
    use combat_core::ResourceMeter;

    #[test]
    fn key_renders_actor_and_condition() {
        let key = TriggerKey::new(ActorId::new("npc"), ConditionKind::Poisoned);
        assert_eq!(key.to_string(), "npc:poisoned");
    }

    #[test]
    fn toggle_consumes_metadata_and_attributes_the_source() {
        let ledger = Arc::new(TriggerLedger::new());
        let events = EventBus::with_capacity(8);
        let mut rx = events.subscribe(Topic::Combat);
        let toggle = StandardToggle::new(Arc::clone(&ledger), events);
        let mut actor = ActorState::new("npc", "NPC", ResourceMeter::full(20));

        ledger
            .record(
                TriggerKey::new(actor.id.clone(), ConditionKind::Poisoned),
                TriggerMetadata {
                    source_item: Some("Venom Fang".into()),
                    poison_rank: Some(3),
                    suppress_message: false,
                },
            )
            .unwrap();

        let change = toggle
            .toggle(
                &mut actor,
                ConditionKind::Poisoned,
                ConditionDetail::Poison { rank: 3 },
            )
            .unwrap();

        assert_eq!(change, ConditionChange::Added);
        assert!(ledger.is_empty());
        match rx.try_recv().unwrap() {
            Event::Combat(CombatEvent::ConditionApplied {
                source_item,
                poison_rank,
                ..
            }) => {
                assert_eq!(source_item.as_deref(), Some("Venom Fang"));
                assert_eq!(poison_rank, Some(3));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn suppressed_toggle_applies_silently() {
        let ledger = Arc::new(TriggerLedger::new());
        let events = EventBus::with_capacity(8);
        let mut rx = events.subscribe(Topic::Combat);
        let toggle = StandardToggle::new(Arc::clone(&ledger), events);
        let mut actor = ActorState::new("npc", "NPC", ResourceMeter::full(20));

        ledger
            .record(
                TriggerKey::new(actor.id.clone(), ConditionKind::Dazed),
                TriggerMetadata {
                    suppress_message: true,
                    ..TriggerMetadata::default()
                },
            )
            .unwrap();
        toggle
            .toggle(&mut actor, ConditionKind::Dazed, ConditionDetail::None)
            .unwrap();

        assert!(actor.conditions.has(ConditionKind::Dazed));
        assert!(rx.try_recv().is_err());
    }
}
