use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use combat_core::{
    ActorId, AttributeKey, ConditionDetail, ConditionKind, EffectFlags, ExtensionBucket,
    ExtensionKind, ExtensionSource, ItemId, TargetScope,
};

use crate::api::{Result, RuntimeError};

/// Identifies one in-flight AfterDamage aggregation: attacker and item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AggregationKey {
    pub attacker: ActorId,
    pub item: ItemId,
}

impl AggregationKey {
    pub fn new(attacker: ActorId, item: ItemId) -> Self {
        Self { attacker, item }
    }
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.attacker, self.item)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealRequest {
    pub actor: ActorId,
    pub label: String,
    pub targets: Vec<ActorId>,
    /// Rolled once and shared by every target.
    pub amount: i64,
    pub rendered: String,
    pub flags: EffectFlags,
    pub skip_dialog: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageRequest {
    pub actor: ActorId,
    pub label: String,
    pub targets: Vec<ActorId>,
    pub amount: i64,
    pub rendered: String,
    pub flags: EffectFlags,
    pub skip_dialog: bool,
    /// Aggregation the realized damage is reported to.
    pub report: Option<AggregationKey>,
}

/// One condition to apply, with its resolved detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionGrant {
    pub kind: ConditionKind,
    pub detail: ConditionDetail,
}

impl ConditionGrant {
    pub fn new(kind: ConditionKind, detail: ConditionDetail) -> Self {
        Self { kind, detail }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRequest {
    pub actor: ActorId,
    pub source_item: String,
    pub targets: Vec<ActorId>,
    pub grant: ConditionGrant,
    pub skip_dialog: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRequestBulk {
    pub actor: ActorId,
    pub source_item: String,
    pub targets: Vec<ActorId>,
    pub grants: Vec<ConditionGrant>,
    pub skip_dialog: bool,
}

/// Persistent AfterMain queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AfterMainEntry {
    pub kind: ExtensionKind,
    pub actor_id: ActorId,
    pub item_id: ItemId,
    pub bucket: ExtensionBucket,
    pub targets: Vec<ActorId>,
}

/// Buckets to execute once every expected target reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionFollowUp {
    pub actor: ActorId,
    pub item: ItemId,
    pub buckets: Vec<ExtensionBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionRegistration {
    pub key: AggregationKey,
    pub expected: Vec<ActorId>,
    pub follow_up: ExtensionFollowUp,
}

/// Attribute modifiers written as an applied-effect entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeGrant {
    pub actor: ActorId,
    pub item: Option<ItemId>,
    pub name: String,
    pub targets: Vec<ActorId>,
    pub attributes: BTreeMap<AttributeKey, i64>,
    pub skip_dialog: bool,
}

/// Macro and attribute activation run after damage lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationFollowUp {
    pub actor: ActorId,
    pub item: ItemId,
    pub macro_name: Option<String>,
    /// Targets are replaced by the final target set at finalization.
    pub apply: Option<AttributeGrant>,
    pub scope: TargetScope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationRegistration {
    pub key: AggregationKey,
    pub expected: Vec<ActorId>,
    pub follow_up: ActivationFollowUp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageReport {
    pub key: AggregationKey,
    pub target: ActorId,
    /// HP actually lost.
    pub realized: u32,
}

/// Asks a target's owner to resolve defense against a damage roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenseRequest {
    pub key: AggregationKey,
    pub attacker: ActorId,
    pub item_name: String,
    pub target: ActorId,
    pub damage: i64,
    pub penetrate: i64,
    pub rendered: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRequest {
    pub actor: ActorId,
    pub item: ItemId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRequest {
    pub actor: ActorId,
    pub kind: ExtensionKind,
    /// One item is created per source per target.
    pub sources: Vec<ExtensionSource>,
    pub targets: Vec<ActorId>,
    pub skip_dialog: bool,
}

/// Authority refusal sent back to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: MessageKind,
    pub actor: ActorId,
    pub reason: String,
}

/// Discriminant of [`Message`], used for logging and rejections.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    HealRequest,
    DamageRequest,
    ConditionRequest,
    ConditionRequestBulk,
    EnqueueAfterMain,
    RegisterAfterDamageExtension,
    RegisterAfterDamageActivation,
    ReportDamageForActivation,
    ReportDamageForApply,
    ShowDefenseDialog,
    ApplyAttributes,
    ConsumeUsage,
    CreateEquipment,
    Rejected,
}

/// Every message that crosses the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Message {
    HealRequest(HealRequest),
    DamageRequest(DamageRequest),
    ConditionRequest(ConditionRequest),
    ConditionRequestBulk(ConditionRequestBulk),
    EnqueueAfterMain(AfterMainEntry),
    RegisterAfterDamageExtension(ExtensionRegistration),
    RegisterAfterDamageActivation(ActivationRegistration),
    ReportDamageForActivation(DamageReport),
    ReportDamageForApply(DamageReport),
    ShowDefenseDialog(DefenseRequest),
    ApplyAttributes(AttributeGrant),
    ConsumeUsage(UsageRequest),
    CreateEquipment(EquipmentRequest),
    Rejected(Rejection),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::HealRequest(_) => MessageKind::HealRequest,
            Self::DamageRequest(_) => MessageKind::DamageRequest,
            Self::ConditionRequest(_) => MessageKind::ConditionRequest,
            Self::ConditionRequestBulk(_) => MessageKind::ConditionRequestBulk,
            Self::EnqueueAfterMain(_) => MessageKind::EnqueueAfterMain,
            Self::RegisterAfterDamageExtension(_) => MessageKind::RegisterAfterDamageExtension,
            Self::RegisterAfterDamageActivation(_) => MessageKind::RegisterAfterDamageActivation,
            Self::ReportDamageForActivation(_) => MessageKind::ReportDamageForActivation,
            Self::ReportDamageForApply(_) => MessageKind::ReportDamageForApply,
            Self::ShowDefenseDialog(_) => MessageKind::ShowDefenseDialog,
            Self::ApplyAttributes(_) => MessageKind::ApplyAttributes,
            Self::ConsumeUsage(_) => MessageKind::ConsumeUsage,
            Self::CreateEquipment(_) => MessageKind::CreateEquipment,
            Self::Rejected(_) => MessageKind::Rejected,
        }
    }

    /// Actor whose owner must have sent the message.
    pub fn actor(&self) -> &ActorId {
        match self {
            Self::HealRequest(r) => &r.actor,
            Self::DamageRequest(r) => &r.actor,
            Self::ConditionRequest(r) => &r.actor,
            Self::ConditionRequestBulk(r) => &r.actor,
            Self::EnqueueAfterMain(e) => &e.actor_id,
            Self::RegisterAfterDamageExtension(r) => &r.key.attacker,
            Self::RegisterAfterDamageActivation(r) => &r.key.attacker,
            Self::ReportDamageForActivation(r) | Self::ReportDamageForApply(r) => &r.target,
            Self::ShowDefenseDialog(r) => &r.attacker,
            Self::ApplyAttributes(r) => &r.actor,
            Self::ConsumeUsage(r) => &r.actor,
            Self::CreateEquipment(r) => &r.actor,
            Self::Rejected(r) => &r.actor,
        }
    }

    /// Second actor whose owner may also send the message.
    ///
    /// Damage reports come from the target's owner, or from the attacker's
    /// side when the target could not be resolved.
    pub fn attacker(&self) -> Option<&ActorId> {
        match self {
            Self::ReportDamageForActivation(r) | Self::ReportDamageForApply(r) => {
                Some(&r.key.attacker)
            }
            _ => None,
        }
    }

    /// True if the authority should apply without a confirmation prompt.
    pub fn skip_dialog(&self) -> bool {
        match self {
            Self::HealRequest(r) => r.skip_dialog,
            Self::DamageRequest(r) => r.skip_dialog,
            Self::ConditionRequest(r) => r.skip_dialog,
            Self::ConditionRequestBulk(r) => r.skip_dialog,
            Self::ApplyAttributes(r) => r.skip_dialog,
            Self::CreateEquipment(r) => r.skip_dialog,
            _ => true,
        }
    }

    /// Checks structural invariants before sending or applying.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidMessage`] for empty target or grant
    /// lists, negative amounts, or mismatched queue entries.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| RuntimeError::InvalidMessage {
            kind: self.kind(),
            reason: reason.to_owned(),
        };
        let require_targets = |targets: &[ActorId]| {
            if targets.is_empty() {
                Err(invalid("no targets"))
            } else {
                Ok(())
            }
        };

        match self {
            Self::HealRequest(r) => {
                require_targets(&r.targets)?;
                if r.amount < 0 {
                    return Err(invalid("negative heal amount"));
                }
            }
            Self::DamageRequest(r) => {
                require_targets(&r.targets)?;
                if r.amount < 0 {
                    return Err(invalid("negative damage amount"));
                }
            }
            Self::ConditionRequest(r) => {
                require_targets(&r.targets)?;
            }
            Self::ConditionRequestBulk(r) => {
                require_targets(&r.targets)?;
                if r.grants.is_empty() {
                    return Err(invalid("no conditions"));
                }
            }
            Self::EnqueueAfterMain(e) => {
                if e.bucket.kind() != e.kind {
                    return Err(invalid("entry kind does not match its bucket"));
                }
            }
            Self::ApplyAttributes(r) => {
                require_targets(&r.targets)?;
            }
            Self::CreateEquipment(r) => {
                require_targets(&r.targets)?;
                if !r.kind.is_equipment() {
                    return Err(invalid("not an equipment kind"));
                }
            }
            Self::RegisterAfterDamageExtension(_)
            | Self::RegisterAfterDamageActivation(_)
            | Self::ReportDamageForActivation(_)
            | Self::ReportDamageForApply(_)
            | Self::ShowDefenseDialog(_)
            | Self::ConsumeUsage(_)
            | Self::Rejected(_) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heal(amount: i64, targets: Vec<ActorId>) -> Message {
        Message::HealRequest(HealRequest {
            actor: ActorId::new("pc"),
            label: "First Aid".into(),
            targets,
            amount,
            rendered: "2d10".into(),
            flags: EffectFlags::empty(),
            skip_dialog: false,
        })
    }

    #[test]
    fn aggregation_key_joins_attacker_and_item() {
        let key = AggregationKey::new(ActorId::new("pc"), ItemId::new("blade"));
        assert_eq!(key.to_string(), "pc_blade");
    }

    #[test]
    fn validation_rejects_empty_targets_and_negative_amounts() {
        assert!(heal(5, vec![ActorId::new("npc")]).validate().is_ok());
        assert!(matches!(
            heal(5, vec![]).validate(),
            Err(RuntimeError::InvalidMessage {
                kind: MessageKind::HealRequest,
                ..
            })
        ));
        assert!(heal(-1, vec![ActorId::new("npc")]).validate().is_err());
    }

    #[test]
    fn messages_are_tagged_by_kind_on_the_wire() {
        let json = serde_json::to_value(heal(5, vec![ActorId::new("npc")])).unwrap();
        assert_eq!(json["type"], "heal_request");
        assert_eq!(json["payload"]["amount"], 5);
        assert_eq!(MessageKind::HealRequest.to_string(), "heal_request");
    }
}
