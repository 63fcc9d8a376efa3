//! Attack, damage and defense resolution.
//!
//! The three steps may run on different participants:
//!
//! 1. [`DamageResolver::resolve_attack_roll`] on the attacker's side
//! 2. [`DamageResolver::resolve_damage_roll`] and
//!    [`DamageResolver::announce_damage`] on the attacker's side
//! 3. [`DamageResolver::apply_damage`] on each target owner's side (or on
//!    the authority for unowned targets)
//!
//! Step 3 sends the real damage to the authority tagged with the
//! aggregation key, which is how AfterDamage follow-ups learn who was hurt.

use tracing::{debug, error, info};

use combat_core::{
    ActorId, AttackBaseline, AttackPenalty, CombatError, DamagePlan, DamageRollInput,
    DefenseInput, EffectFlags, ExtensionBucket, ItemId, RollOutcome, attack_expression,
    effective_guard,
};

use crate::api::{Result, RuntimeError};
use crate::authority::Authority;
use crate::context::ResolutionContext;
use crate::events::CombatEvent;
use crate::executor::ResolutionExecutor;
use crate::protocol::{
    ActivationFollowUp, AggregationKey, DamageReport, DamageRequest, DefenseRequest, Envelope,
    Message, Recipient,
};

/// An attack judgement and the numbers captured before it was rolled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackRoll {
    pub baseline: AttackBaseline,
    pub penalty: AttackPenalty,
    pub outcome: RollOutcome,
}

/// A rolled damage total, ready to be announced to its targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamageRoll {
    pub key: AggregationKey,
    pub item_name: String,
    pub plan: DamagePlan,
    pub outcome: RollOutcome,
    /// Declared penetrate; defaults to the attacker's baseline.
    pub penetrate: i64,
}

pub struct DamageResolver<'a> {
    ctx: &'a ResolutionContext,
    authority: &'a dyn Authority,
}

impl<'a> DamageResolver<'a> {
    pub fn new(ctx: &'a ResolutionContext, authority: &'a dyn Authority) -> Self {
        Self { ctx, authority }
    }

    /// Rolls the attack judgement.
    ///
    /// The baseline is captured from the current state before the roll, so
    /// later state changes cannot alter the damage that follows.
    pub async fn resolve_attack_roll(&self, actor: &ActorId, item: &ItemId) -> Result<AttackRoll> {
        let (actor_state, item_state) = self.ctx.item_snapshot(actor, item).await?;

        let baseline = AttackBaseline::snapshot(&actor_state, &item_state);
        let penalty = AttackPenalty::for_actor(&actor_state, &self.ctx.config.combat);
        let outcome = self
            .ctx
            .dice
            .roll(&attack_expression(&actor_state, &item_state, penalty));

        info!(
            target: "runtime::resolver",
            actor = %actor,
            item = %item,
            roll = %outcome.rendered,
            total = outcome.total,
            dazed_penalty = penalty.dice,
            "Attack rolled"
        );
        Ok(AttackRoll {
            baseline,
            penalty,
            outcome,
        })
    }

    /// Rolls damage from an attack judgement.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::UserInput`] if the operator cancels the damage dialog.
    pub async fn resolve_damage_roll(
        &self,
        actor: &ActorId,
        item: &ItemId,
        attack: &AttackRoll,
    ) -> Result<DamageRoll> {
        let (_, item_state) = self.ctx.item_snapshot(actor, item).await?;
        let options = self
            .ctx
            .prompt
            .damage_options(attack.outcome.total, &attack.baseline)
            .await
            .ok_or_else(|| RuntimeError::user_input("damage roll cancelled"))?;

        let plan = DamagePlan::new(
            &attack.baseline,
            attack.penalty,
            DamageRollInput {
                attack_total: attack.outcome.total,
                extra_dice: options.extra_dice,
                extra_add: options.extra_add,
            },
        );
        let outcome = self.ctx.dice.roll(&plan.expr());

        info!(
            target: "runtime::resolver",
            actor = %actor,
            item = %item,
            roll = %outcome.rendered,
            total = outcome.total,
            "Damage rolled"
        );
        Ok(DamageRoll {
            key: AggregationKey::new(actor.clone(), item.clone()),
            item_name: item_state.name,
            plan,
            outcome,
            penetrate: options.penetrate.unwrap_or(attack.baseline.penetrate),
        })
    }

    /// Registers the AfterDamage follow-ups for this roll, then asks every
    /// target's owner to resolve defense.
    ///
    /// Targets this participant controls are resolved in-process; the rest
    /// get one [`Message::ShowDefenseDialog`] each.
    pub async fn announce_damage(
        &self,
        roll: &DamageRoll,
        targets: &[ActorId],
        deferred: Vec<ExtensionBucket>,
        activation: Option<ActivationFollowUp>,
    ) -> Result<()> {
        if targets.is_empty() {
            return Err(RuntimeError::user_input("damage has no target"));
        }

        let executor = ResolutionExecutor::new(self.ctx, self.authority);
        if !deferred.is_empty() {
            executor
                .register_after_damage_extension(roll.key.clone(), targets, deferred)
                .await?;
        }
        if let Some(follow_up) = activation {
            executor
                .register_after_damage_activation(roll.key.clone(), targets, follow_up)
                .await?;
        }

        for target in targets {
            let request = DefenseRequest {
                key: roll.key.clone(),
                attacker: roll.key.attacker.clone(),
                item_name: roll.item_name.clone(),
                target: target.clone(),
                damage: roll.outcome.total,
                penetrate: roll.penetrate,
                rendered: roll.outcome.rendered.clone(),
            };

            let owner = match self.ctx.owner_of(target).await {
                Ok(owner) => owner,
                Err(error) => {
                    self.defense_failed(target, &error);
                    self.report_unresolved(&request).await;
                    continue;
                }
            };
            let local = match &owner {
                Some(owner) => *owner == self.ctx.participant,
                None => self.ctx.is_authority(),
            };

            if local {
                if let Err(error) = self.apply_damage(&request).await {
                    self.defense_failed(target, &error);
                }
                continue;
            }

            let to = match owner {
                Some(owner) => Recipient::Participant(owner),
                None => Recipient::Authority,
            };
            debug!(
                target: "runtime::resolver",
                actor = %target,
                recipient = ?to,
                "Forwarding defense dialog"
            );
            self.ctx.bus.emit(Envelope::new(
                self.ctx.participant.clone(),
                to,
                Message::ShowDefenseDialog(request),
            ))?;
        }
        Ok(())
    }

    /// Resolves one target's defense and sends the real damage to the
    /// authority. Returns the real damage.
    ///
    /// A dismissed defense dialog declares no guard and no cover. If the
    /// defense cannot be resolved at all, zero damage is reported under the
    /// aggregation key instead.
    pub async fn apply_damage(&self, request: &DefenseRequest) -> Result<i64> {
        let real = match self.resolve_defense(request).await {
            Ok(real) => real,
            Err(error) => {
                self.report_unresolved(request).await;
                return Err(error);
            }
        };

        // Reduce is already part of the defense math.
        self.authority
            .request(Message::DamageRequest(DamageRequest {
                actor: request.target.clone(),
                label: request.item_name.clone(),
                targets: vec![request.target.clone()],
                amount: real,
                rendered: request.rendered.clone(),
                flags: EffectFlags::IGNORE_REDUCE,
                skip_dialog: true,
                report: Some(request.key.clone()),
            }))
            .await?;
        Ok(real)
    }

    async fn resolve_defense(&self, request: &DefenseRequest) -> Result<i64> {
        let target = self.ctx.actor_snapshot(&request.target).await?;
        let declaration = self
            .ctx
            .prompt
            .declare_defense(request)
            .await
            .unwrap_or_default();

        let attributes = target.effective_attributes();
        let input = DefenseInput {
            damage: request.damage,
            guard: if declaration.guarding {
                effective_guard(&target)
            } else {
                0
            },
            armor: attributes.armor + target.equipped_armor(),
            penetrate: request.penetrate,
            reduce: attributes.reduce,
            covering: declaration.covering,
        };
        let real = input.real_damage();

        debug!(
            target: "runtime::resolver",
            actor = %request.target,
            damage = request.damage,
            guard = input.guard,
            armor = input.effective_armor(),
            covering = input.covering,
            real,
            "Defense resolved"
        );

        Ok(real)
    }

    /// Reports zero damage for a target whose defense never resolved, so
    /// the AfterDamage requests under the key still complete.
    async fn report_unresolved(&self, request: &DefenseRequest) {
        let report = DamageReport {
            key: request.key.clone(),
            target: request.target.clone(),
            realized: 0,
        };
        let executor = ResolutionExecutor::new(self.ctx, self.authority);
        if let Err(error) = executor.report_damage_for_activation(report.clone()).await {
            self.defense_failed(&request.target, &error);
        }
        if let Err(error) = executor.report_damage_for_apply(report).await {
            self.defense_failed(&request.target, &error);
        }
    }

    fn defense_failed(&self, target: &ActorId, error: &RuntimeError) {
        error!(
            target: "runtime::resolver",
            actor = %target,
            code = error.error_code(),
            error = %error,
            "Defense resolution failed"
        );
        self.ctx.events.publish(CombatEvent::Failure {
            target: Some(target.clone()),
            message: error.to_string(),
        });
    }
}
