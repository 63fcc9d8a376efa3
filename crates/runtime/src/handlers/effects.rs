//! Heal, damage and condition application.

use tracing::{debug, info};

use combat_core::{
    ActorId, DamageOutcome, EffectFlags, HealOutcome, RuleError, apply_damage, apply_heal,
};

use crate::api::Result;
use crate::authority::AuthorityService;
use crate::events::CombatEvent;
use crate::protocol::{ConditionGrant, DamageReport, DamageRequest, HealRequest};
use crate::triggers::{TriggerKey, TriggerMetadata};

impl AuthorityService {
    pub(crate) async fn apply_heal_request(&self, request: HealRequest) -> Result<()> {
        let mut state = self.ctx.state.write().await;

        for target in &request.targets {
            let Some(actor) = state.actor_mut(target) else {
                self.report_failure(Some(target), &RuleError::ActorNotFound(target.clone()).into());
                continue;
            };

            match apply_heal(actor, request.amount, request.flags) {
                HealOutcome::Blocked(reason) => {
                    info!(
                        target: "runtime::authority",
                        actor = %target,
                        label = %request.label,
                        %reason,
                        "Heal blocked"
                    );
                    self.ctx.events.publish(CombatEvent::HealBlocked {
                        target: target.clone(),
                        label: request.label.clone(),
                        reason,
                    });
                }
                HealOutcome::Applied {
                    previous,
                    current,
                    healed,
                    encroachment_gain,
                } => {
                    info!(
                        target: "runtime::authority",
                        actor = %target,
                        label = %request.label,
                        roll = %request.rendered,
                        previous,
                        current,
                        encroachment_gain,
                        "Healed"
                    );
                    self.ctx.events.publish(CombatEvent::Healed {
                        target: target.clone(),
                        label: request.label.clone(),
                        healed,
                        current,
                        encroachment_gain,
                    });
                }
            }
        }

        Ok(())
    }

    /// Applies damage and, when the request belongs to an aggregation,
    /// reports every target's realized delta to both AfterDamage queues.
    pub(crate) async fn apply_damage_request(&self, request: DamageRequest) -> Result<()> {
        let ignore_reduce = request.flags.contains(EffectFlags::IGNORE_REDUCE);
        let mut realized: Vec<(ActorId, u32)> = Vec::with_capacity(request.targets.len());

        {
            let mut state = self.ctx.state.write().await;
            for target in &request.targets {
                let Some(actor) = state.actor_mut(target) else {
                    self.report_failure(
                        Some(target),
                        &RuleError::ActorNotFound(target.clone()).into(),
                    );
                    // Still report so the aggregation does not wait forever.
                    realized.push((target.clone(), 0));
                    continue;
                };

                let DamageOutcome {
                    previous,
                    current,
                    realized: lost,
                } = apply_damage(actor, request.amount, ignore_reduce);
                info!(
                    target: "runtime::authority",
                    actor = %target,
                    label = %request.label,
                    roll = %request.rendered,
                    amount = request.amount,
                    previous,
                    current,
                    "Damaged"
                );
                self.ctx.events.publish(CombatEvent::Damaged {
                    target: target.clone(),
                    label: request.label.clone(),
                    realized: lost,
                    current,
                });
                realized.push((target.clone(), lost));
            }
        }

        let Some(key) = request.report else {
            return Ok(());
        };
        for (target, realized) in realized {
            let report = DamageReport {
                key: key.clone(),
                target,
                realized,
            };
            if let Err(error) = self.report_activation(report.clone()).await {
                self.report_failure(Some(&report.target), &error);
            }
            if let Err(error) = self.report_extension(report.clone()).await {
                self.report_failure(Some(&report.target), &error);
            }
        }
        Ok(())
    }

    /// Applies every grant to every target.
    ///
    /// The trigger ledger is filled right before each toggle so the toggle's
    /// notification can name the source item. A grant identical to the
    /// already-active condition is applied without a second announcement.
    pub(crate) async fn apply_conditions(
        &self,
        source_item: &str,
        targets: &[ActorId],
        grants: &[ConditionGrant],
    ) -> Result<()> {
        let mut state = self.ctx.state.write().await;

        for target in targets {
            let Some(actor) = state.actor_mut(target) else {
                self.report_failure(Some(target), &RuleError::ActorNotFound(target.clone()).into());
                continue;
            };

            for grant in grants {
                let duplicate = actor
                    .conditions
                    .get(grant.kind)
                    .is_some_and(|active| active.detail == grant.detail);

                let applied: Result<_> = self
                    .ledger
                    .record(
                        TriggerKey::new(target.clone(), grant.kind),
                        TriggerMetadata {
                            source_item: Some(source_item.to_owned()),
                            poison_rank: grant.detail.poison_rank(),
                            suppress_message: duplicate,
                        },
                    )
                    .and_then(|()| self.toggle.toggle(actor, grant.kind, grant.detail.clone()));

                match applied {
                    Ok(change) => debug!(
                        target: "runtime::authority",
                        actor = %target,
                        condition = %grant.kind,
                        ?change,
                        source_item,
                        "Condition toggled"
                    ),
                    Err(error) => self.report_failure(Some(target), &error),
                }
            }
        }

        Ok(())
    }
}

