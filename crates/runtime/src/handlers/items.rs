//! Applied attributes, usage counters and temporary equipment.

use tracing::{debug, info};

use combat_core::{
    ActorId, AppliedEffectEntry, ExtensionKind, ItemId, ItemKind, ItemState, RuleError,
};

use crate::api::{Result, RuntimeError};
use crate::authority::AuthorityService;
use crate::events::CombatEvent;
use crate::protocol::{AttributeGrant, EquipmentRequest, MessageKind, UsageRequest};

impl AuthorityService {
    /// Writes one applied-effect entry per target, updating an existing entry
    /// under the same key in place.
    pub(crate) async fn apply_attributes(&self, grant: AttributeGrant) -> Result<()> {
        let key = match &grant.item {
            Some(item) => AppliedEffectEntry::item_key(item),
            None => AppliedEffectEntry::synthetic_key(&grant.actor, &grant.name),
        };
        let timestamp = chrono::Utc::now().timestamp_millis();

        let mut state = self.ctx.state.write().await;
        for target in &grant.targets {
            let Some(actor) = state.actor_mut(target) else {
                self.report_failure(Some(target), &RuleError::ActorNotFound(target.clone()).into());
                continue;
            };

            let entry = AppliedEffectEntry {
                item_id: grant.item.clone(),
                name: grant.name.clone(),
                source: grant.actor.clone(),
                timestamp,
                disable: false,
                attributes: grant.attributes.clone(),
            };
            match actor.applied.get_mut(&key) {
                Some(existing) => existing.refresh_from(entry),
                None => {
                    actor.applied.insert(key.clone(), entry);
                }
            }

            info!(
                target: "runtime::authority",
                actor = %target,
                key = %key,
                modifiers = grant.attributes.len(),
                "Applied effect written"
            );
            self.ctx.events.publish(CombatEvent::AttributesApplied {
                target: target.clone(),
                key: key.clone(),
            });
        }
        Ok(())
    }

    pub(crate) async fn consume_usage(&self, request: UsageRequest) -> Result<()> {
        let remaining = {
            let mut state = self.ctx.state.write().await;
            let actor = state
                .actor_mut(&request.actor)
                .ok_or_else(|| RuleError::ActorNotFound(request.actor.clone()))?;
            let item = actor
                .item_mut(&request.item)
                .ok_or_else(|| RuleError::ItemNotFound {
                    actor: request.actor.clone(),
                    item: request.item.clone(),
                })?;
            item.usage.consume(&request.item)?;
            item.usage.remaining()
        };

        debug!(
            target: "runtime::authority",
            actor = %request.actor,
            item = %request.item,
            ?remaining,
            "Usage consumed"
        );
        self.ctx.events.publish(CombatEvent::UsageConsumed {
            actor: request.actor,
            item: request.item,
            remaining,
        });
        Ok(())
    }

    /// Creates one temporary item per source on every target, then asks once
    /// per target which of the new items to equip.
    pub(crate) async fn create_equipment(&self, request: EquipmentRequest) -> Result<()> {
        let kind = equipment_item_kind(request.kind).ok_or_else(|| RuntimeError::InvalidMessage {
            kind: MessageKind::CreateEquipment,
            reason: format!("{} does not create equipment", request.kind),
        })?;

        let mut created: Vec<(ActorId, Vec<ItemState>)> = Vec::new();
        {
            let mut state = self.ctx.state.write().await;
            for target in &request.targets {
                let Some(actor) = state.actor_mut(target) else {
                    self.report_failure(
                        Some(target),
                        &RuleError::ActorNotFound(target.clone()).into(),
                    );
                    continue;
                };

                let items: Vec<ItemState> = request
                    .sources
                    .iter()
                    .map(|source| {
                        let creation = source.spec.equipment.clone().unwrap_or_default();
                        let name = if creation.name.is_empty() {
                            source.item_name.clone()
                        } else {
                            creation.name
                        };
                        let mut item = ItemState::new(
                            ItemId::new(format!("{}@{}", source.item_id, target)),
                            name,
                            kind,
                        )
                        .with_attack(creation.profile);
                        item.temporary = true;
                        item
                    })
                    .collect();

                for item in &items {
                    actor.items.insert(item.id.clone(), item.clone());
                }
                created.push((target.clone(), items));
            }
        }

        for (target, items) in created {
            let chosen = self.ctx.prompt.select_equipment(&target, &items).await;

            let mut equipped = Vec::new();
            {
                let mut state = self.ctx.state.write().await;
                let Some(actor) = state.actor_mut(&target) else {
                    continue;
                };
                for item in &items {
                    if let Some(owned) = actor.item_mut(&item.id) {
                        owned.equipped = chosen.contains(&item.id);
                        if owned.equipped {
                            equipped.push(item.id.clone());
                        }
                    }
                }
            }

            info!(
                target: "runtime::authority",
                actor = %target,
                created = items.len(),
                equipped = equipped.len(),
                "Temporary equipment created"
            );
            self.ctx.events.publish(CombatEvent::EquipmentCreated {
                target,
                items: items.into_iter().map(|item| item.id).collect(),
                equipped,
            });
        }
        Ok(())
    }
}

fn equipment_item_kind(kind: ExtensionKind) -> Option<ItemKind> {
    match kind {
        ExtensionKind::Weapon => Some(ItemKind::Weapon),
        ExtensionKind::Protect => Some(ItemKind::Protect),
        ExtensionKind::Vehicle => Some(ItemKind::Vehicle),
        ExtensionKind::Heal | ExtensionKind::Damage | ExtensionKind::Condition => None,
    }
}
