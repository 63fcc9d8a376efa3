//! Event payloads, one enum per topic.

use serde::{Deserialize, Serialize};

use combat_core::{
    ActorId, ConditionChange, ConditionKind, ExtensionKind, HealBlockReason, ItemId,
    ParticipantId,
};

use crate::protocol::{AggregationKey, MessageKind};

/// Applied effects, one event per target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    Healed {
        target: ActorId,
        /// Contributing item names.
        label: String,
        healed: u32,
        current: u32,
        encroachment_gain: u32,
    },
    HealBlocked {
        target: ActorId,
        label: String,
        reason: HealBlockReason,
    },
    Damaged {
        target: ActorId,
        label: String,
        realized: u32,
        current: u32,
    },
    ConditionApplied {
        target: ActorId,
        kind: ConditionKind,
        change: ConditionChange,
        /// Item that caused the toggle, when known.
        source_item: Option<String>,
        poison_rank: Option<i64>,
    },
    EquipmentCreated {
        target: ActorId,
        items: Vec<ItemId>,
        equipped: Vec<ItemId>,
    },
    AttributesApplied {
        target: ActorId,
        key: String,
    },
    UsageConsumed {
        actor: ActorId,
        item: ItemId,
        remaining: Option<u32>,
    },
    /// A per-target mutation failed; the rest of the request continued.
    Failure {
        target: Option<ActorId>,
        message: String,
    },
}

/// Deferred-queue transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueueEvent {
    AfterMainEnqueued {
        actor: ActorId,
        item: ItemId,
        kind: ExtensionKind,
        depth: usize,
    },
    AfterMainDrained {
        executed: usize,
        skipped: usize,
        failed: usize,
    },
    AfterMainCleared,
    AfterDamageRegistered {
        key: AggregationKey,
        expected: usize,
    },
    AfterDamageFinalized {
        key: AggregationKey,
        damaged: Vec<ActorId>,
    },
}

/// Authority decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProtocolEvent {
    Rejected {
        kind: MessageKind,
        actor: ActorId,
        reason: String,
    },
    PermissionDenied {
        participant: ParticipantId,
        actor: ActorId,
        kind: MessageKind,
    },
}
