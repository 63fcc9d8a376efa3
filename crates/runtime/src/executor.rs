//! Resolution executor: the entry points item-type handlers call.
//!
//! The executor turns an item activation into buckets, runs the buckets that
//! belong to the current phase, defers the rest, and sends every resulting
//! state change through the [`Authority`] port. It holds no state of its own
//! and is cheap to construct per call.
//!
//! Rolls happen here, on the participant that resolves the action; requests
//! carry the rolled numbers so the authority never re-rolls.

use std::sync::Arc;

use tracing::{debug, info, warn};

use combat_core::{
    ActorId, BucketKey, CombatConfig, CombatError, ConditionDetail, ConditionKind, DiceExpr,
    DisableMode, EffectFlags, ExtensionBucket, ExtensionKind, ItemId, LevelContext,
    MergedCondition, MergedFormula, RollOutcome, TargetScope, Timing, collect_descriptors, group,
    merge,
};

use crate::api::{ConditionSelection, Result, RuntimeError};
use crate::authority::Authority;
use crate::context::ResolutionContext;
use crate::events::{CombatEvent, QueueEvent};
use crate::protocol::{
    ActivationFollowUp, ActivationRegistration, AfterMainEntry, AggregationKey, AttributeGrant,
    ConditionGrant, ConditionRequest, ConditionRequestBulk, DamageReport, DamageRequest,
    EquipmentRequest, ExtensionFollowUp, ExtensionRegistration, HealRequest, Message,
    UsageRequest,
};
use crate::queues::{AfterMainQueue, DrainReport};

/// Outcome of one [`ResolutionExecutor::process_extensions`] pass.
#[derive(Debug, Default)]
pub struct ExtensionPass {
    pub executed: Vec<BucketKey>,
    /// Buckets whose own timing is AfterMain.
    pub enqueued: Vec<BucketKey>,
    /// AfterDamage buckets the caller registers with its damage roll.
    pub deferred: Vec<ExtensionBucket>,
    /// Buckets that belong to neither this phase nor a deferral.
    pub skipped: Vec<BucketKey>,
    /// Buckets that failed to merge or execute; siblings were unaffected.
    pub failures: Vec<(BucketKey, RuntimeError)>,
}

pub struct ResolutionExecutor<'a> {
    ctx: &'a ResolutionContext,
    authority: &'a dyn Authority,
}

impl<'a> ResolutionExecutor<'a> {
    pub fn new(ctx: &'a ResolutionContext, authority: &'a dyn Authority) -> Self {
        Self { ctx, authority }
    }

    /// Records one use of `item` before its effects resolve.
    ///
    /// # Errors
    ///
    /// Fails with [`RuleError::UsageExhausted`](combat_core::RuleError) when
    /// no uses remain; nothing is sent in that case.
    pub async fn process_usage_cost(&self, actor: &ActorId, item: &ItemId) -> Result<()> {
        let (_, item_state) = self.ctx.item_snapshot(actor, item).await?;
        if item_state.usage.disable == DisableMode::NotCheck {
            return Ok(());
        }

        let mut probe = item_state.usage;
        probe.consume(item)?;

        self.authority
            .request(Message::ConsumeUsage(UsageRequest {
                actor: actor.clone(),
                item: item.clone(),
            }))
            .await
    }

    /// Collects, groups and merges the item's extensions, then handles every
    /// bucket relative to `phase`:
    ///
    /// | bucket | action |
    /// |---|---|
    /// | own timing AfterMain, parent timing == `phase` | enqueued |
    /// | own timing == `phase` | executed now |
    /// | own timing AfterDamage, parent timing == `phase` | returned in [`ExtensionPass::deferred`] |
    /// | anything else | skipped |
    ///
    /// A failing bucket never stops its siblings.
    pub async fn process_extensions(
        &self,
        actor: &ActorId,
        item: &ItemId,
        phase: Timing,
        targets: &[ActorId],
    ) -> Result<ExtensionPass> {
        let (actor_state, item_state) = self.ctx.item_snapshot(actor, item).await?;
        let report = merge(
            &actor_state,
            self.ctx.evaluator.as_ref(),
            group(collect_descriptors(&actor_state, &item_state)),
        );

        let mut pass = ExtensionPass::default();
        for failure in report.failures {
            let error = RuntimeError::from(failure.error);
            self.bucket_failed(&failure.key, &error);
            pass.failures.push((failure.key, error));
        }

        for bucket in report.buckets {
            let key = bucket.key;
            if key.timing == Timing::AfterMain {
                if key.parent_timing != phase {
                    pass.skipped.push(key);
                    continue;
                }
                match self.enqueue_after_main(actor, item, bucket, targets).await {
                    Ok(()) => pass.enqueued.push(key),
                    Err(error) => {
                        self.bucket_failed(&key, &error);
                        pass.failures.push((key, error));
                    }
                }
            } else if key.timing == phase {
                match self.execute_bucket(actor, item, &bucket, targets, false).await {
                    Ok(()) => pass.executed.push(key),
                    Err(error) => {
                        self.bucket_failed(&key, &error);
                        pass.failures.push((key, error));
                    }
                }
            } else if key.timing == Timing::AfterDamage && key.parent_timing == phase {
                pass.deferred.push(bucket);
            } else {
                pass.skipped.push(key);
            }
        }

        debug!(
            target: "runtime::executor",
            actor = %actor,
            item = %item,
            %phase,
            executed = pass.executed.len(),
            enqueued = pass.enqueued.len(),
            deferred = pass.deferred.len(),
            failed = pass.failures.len(),
            "Extension pass complete"
        );
        Ok(pass)
    }

    fn bucket_failed(&self, key: &BucketKey, error: &RuntimeError) {
        warn!(
            target: "runtime::executor",
            kind = %key.kind,
            timing = %key.timing,
            code = error.error_code(),
            error = %error,
            "Bucket aborted"
        );
        self.ctx.events.publish(CombatEvent::Failure {
            target: None,
            message: error.to_string(),
        });
    }

    /// Resolves the bucket's target scope and sends the matching request.
    pub async fn execute_bucket(
        &self,
        actor: &ActorId,
        item: &ItemId,
        bucket: &ExtensionBucket,
        selected: &[ActorId],
        skip_dialog: bool,
    ) -> Result<()> {
        let targets = self.resolve_targets(bucket.target(), actor, selected).await?;

        match bucket.kind() {
            ExtensionKind::Heal | ExtensionKind::Damage => {
                let formula = self.formula_for(actor, item, bucket).await?;
                let label = bucket.source_names();
                let rolled = if bucket.kind() == ExtensionKind::Heal {
                    self.execute_heal_now(actor, &label, &targets, formula, skip_dialog)
                        .await
                } else {
                    self.execute_damage_now(actor, &label, &targets, formula, skip_dialog)
                        .await
                };
                rolled.map(|_| ())
            }
            ExtensionKind::Condition => {
                let merged = self.condition_for(actor, bucket).await?;
                let grants = self.condition_grants(&merged).await?;
                self.execute_condition_now_bulk(
                    actor,
                    &bucket.source_names(),
                    &targets,
                    grants,
                    skip_dialog,
                )
                .await
            }
            ExtensionKind::Weapon | ExtensionKind::Protect | ExtensionKind::Vehicle => {
                self.authority
                    .request(Message::CreateEquipment(EquipmentRequest {
                        actor: actor.clone(),
                        kind: bucket.kind(),
                        sources: bucket.sources.clone(),
                        targets,
                        skip_dialog,
                    }))
                    .await
            }
        }
    }

    /// Maps a target scope onto actor ids.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::UserInput`] when a selected-targets effect has no
    /// selection.
    pub async fn resolve_targets(
        &self,
        scope: TargetScope,
        actor: &ActorId,
        selected: &[ActorId],
    ) -> Result<Vec<ActorId>> {
        match scope {
            TargetScope::SelfOnly => Ok(vec![actor.clone()]),
            TargetScope::SelectedTargets if selected.is_empty() => {
                Err(RuntimeError::user_input("no target selected"))
            }
            TargetScope::SelectedTargets => Ok(selected.to_vec()),
            TargetScope::AllTargets => Ok(self.ctx.combatants().await),
        }
    }

    /// Dice/add/flags of a heal or damage bucket.
    ///
    /// Custom buckets ask the operator for one formula pair, evaluated with
    /// the triggering item's level; cancelling aborts the bucket.
    async fn formula_for(
        &self,
        actor: &ActorId,
        item: &ItemId,
        bucket: &ExtensionBucket,
    ) -> Result<MergedFormula> {
        if !bucket.is_custom() {
            if let Some(merged) = bucket.merged_formula() {
                return Ok(*merged);
            }
            let actor_state = self.ctx.actor_snapshot(actor).await?;
            let report = merge(&actor_state, self.ctx.evaluator.as_ref(), vec![bucket.clone()]);
            if let Some(failure) = report.failures.into_iter().next() {
                return Err(failure.error.into());
            }
            return Ok(report
                .buckets
                .first()
                .and_then(ExtensionBucket::merged_formula)
                .copied()
                .unwrap_or_default());
        }

        let Some(entered) = self.ctx.prompt.custom_formula(bucket).await else {
            return Err(RuntimeError::user_input(format!(
                "custom {} for {} cancelled",
                bucket.kind(),
                bucket.source_names()
            )));
        };

        let (actor_state, item_state) = self.ctx.item_snapshot(actor, item).await?;
        let level = LevelContext::from_level(item_state.level);
        let evaluate = |formula: &str| {
            self.ctx
                .evaluator
                .evaluate(formula, &level, &actor_state)
                .map_err(|error| RuntimeError::user_input(format!("`{formula}`: {error}")))
        };

        Ok(MergedFormula {
            dice: evaluate(&entered.dice)?.max(0),
            add: evaluate(&entered.add)?,
            flags: bucket
                .sources
                .iter()
                .fold(EffectFlags::empty(), |flags, source| flags | source.spec.flags),
        })
    }

    /// Union of a condition bucket. Custom condition buckets have nothing to
    /// enter by hand, so they are merged here like any other.
    async fn condition_for(
        &self,
        actor: &ActorId,
        bucket: &ExtensionBucket,
    ) -> Result<MergedCondition> {
        if let Some(merged) = bucket.merged_condition() {
            return Ok(merged.clone());
        }

        let actor_state = self.ctx.actor_snapshot(actor).await?;
        let mut unmerged = bucket.clone();
        unmerged.key.custom = false;
        let report = merge(&actor_state, self.ctx.evaluator.as_ref(), vec![unmerged]);
        Ok(report
            .buckets
            .first()
            .and_then(ExtensionBucket::merged_condition)
            .cloned()
            .unwrap_or_default())
    }

    /// Resolves each condition's detail. Selection conditions prompt once
    /// per batch.
    async fn condition_grants(&self, merged: &MergedCondition) -> Result<Vec<ConditionGrant>> {
        let mut grants = Vec::with_capacity(merged.types.len());
        for &kind in &merged.types {
            let detail = match kind {
                ConditionKind::Poisoned => ConditionDetail::Poison {
                    rank: merged
                        .poison_rank
                        .unwrap_or(CombatConfig::DEFAULT_POISON_RANK),
                },
                kind if kind.requires_selection() => self.select_detail(kind).await?,
                _ => ConditionDetail::None,
            };
            grants.push(ConditionGrant::new(kind, detail));
        }
        Ok(grants)
    }

    async fn select_detail(&self, kind: ConditionKind) -> Result<ConditionDetail> {
        let candidates = self.ctx.combatants().await;
        match (kind, self.ctx.prompt.select_condition(kind, &candidates).await) {
            (ConditionKind::Hatred, Some(ConditionSelection::Target(target))) => {
                Ok(ConditionDetail::Hatred { target })
            }
            (ConditionKind::Fear, Some(ConditionSelection::Target(target))) => {
                Ok(ConditionDetail::Fear { target })
            }
            (ConditionKind::Berserk, Some(ConditionSelection::Berserk(mode))) => {
                Ok(ConditionDetail::Berserk { mode })
            }
            (_, None) => Err(RuntimeError::user_input(format!("{kind} selection cancelled"))),
            (_, Some(selection)) => Err(RuntimeError::user_input(format!(
                "{selection:?} does not fit {kind}"
            ))),
        }
    }

    /// Rolls `dice`d10 + `add` once and heals every target by the total.
    pub async fn execute_heal_now(
        &self,
        actor: &ActorId,
        label: &str,
        targets: &[ActorId],
        formula: MergedFormula,
        skip_dialog: bool,
    ) -> Result<RollOutcome> {
        let outcome = self.ctx.dice.roll(&DiceExpr::d10(formula.dice, formula.add));
        debug!(
            target: "runtime::executor",
            actor = %actor,
            label,
            roll = %outcome.rendered,
            total = outcome.total,
            "Heal rolled"
        );

        self.authority
            .request(Message::HealRequest(HealRequest {
                actor: actor.clone(),
                label: label.to_owned(),
                targets: targets.to_vec(),
                amount: outcome.total.max(0),
                rendered: outcome.rendered.clone(),
                flags: formula.flags,
                skip_dialog,
            }))
            .await?;
        Ok(outcome)
    }

    /// Rolls `dice`d10 + `add` once and damages every target by the total.
    pub async fn execute_damage_now(
        &self,
        actor: &ActorId,
        label: &str,
        targets: &[ActorId],
        formula: MergedFormula,
        skip_dialog: bool,
    ) -> Result<RollOutcome> {
        let outcome = self.ctx.dice.roll(&DiceExpr::d10(formula.dice, formula.add));
        debug!(
            target: "runtime::executor",
            actor = %actor,
            label,
            roll = %outcome.rendered,
            total = outcome.total,
            "Damage rolled"
        );

        self.authority
            .request(Message::DamageRequest(DamageRequest {
                actor: actor.clone(),
                label: label.to_owned(),
                targets: targets.to_vec(),
                amount: outcome.total.max(0),
                rendered: outcome.rendered.clone(),
                flags: formula.flags,
                skip_dialog,
                report: None,
            }))
            .await?;
        Ok(outcome)
    }

    pub async fn execute_condition_now(
        &self,
        actor: &ActorId,
        source_item: &str,
        targets: &[ActorId],
        grant: ConditionGrant,
        skip_dialog: bool,
    ) -> Result<()> {
        self.authority
            .request(Message::ConditionRequest(ConditionRequest {
                actor: actor.clone(),
                source_item: source_item.to_owned(),
                targets: targets.to_vec(),
                grant,
                skip_dialog,
            }))
            .await
    }

    /// Sends several conditions as one request. A single grant goes out as a
    /// plain [`Message::ConditionRequest`]; no grants sends nothing.
    pub async fn execute_condition_now_bulk(
        &self,
        actor: &ActorId,
        source_item: &str,
        targets: &[ActorId],
        mut grants: Vec<ConditionGrant>,
        skip_dialog: bool,
    ) -> Result<()> {
        match grants.len() {
            0 => Ok(()),
            1 => {
                let grant = grants.remove(0);
                self.execute_condition_now(actor, source_item, targets, grant, skip_dialog)
                    .await
            }
            _ => {
                self.authority
                    .request(Message::ConditionRequestBulk(ConditionRequestBulk {
                        actor: actor.clone(),
                        source_item: source_item.to_owned(),
                        targets: targets.to_vec(),
                        grants,
                        skip_dialog,
                    }))
                    .await
            }
        }
    }

    /// Writes an applied-effect entry onto every target of the grant.
    pub async fn apply_to_targets(&self, grant: AttributeGrant) -> Result<()> {
        self.authority.request(Message::ApplyAttributes(grant)).await
    }

    pub async fn enqueue_after_main(
        &self,
        actor: &ActorId,
        item: &ItemId,
        bucket: ExtensionBucket,
        targets: &[ActorId],
    ) -> Result<()> {
        self.authority
            .request(Message::EnqueueAfterMain(AfterMainEntry {
                kind: bucket.kind(),
                actor_id: actor.clone(),
                item_id: item.clone(),
                bucket,
                targets: targets.to_vec(),
            }))
            .await
    }

    /// Executes every AfterMain entry in insertion order, then clears the
    /// queue once.
    ///
    /// Entries whose actor or item is gone are skipped with a warning;
    /// failing entries are counted and never stop the drain. Only the
    /// authority drains; elsewhere this is a no-op.
    pub async fn drain_after_main(&self) -> Result<DrainReport> {
        if !self.ctx.is_authority() {
            debug!(target: "runtime::queues", "Not the authority, skipping AfterMain drain");
            return Ok(DrainReport::default());
        }

        let queue = AfterMainQueue::new(Arc::clone(&self.ctx.settings));
        let entries = queue.entries()?;
        if entries.is_empty() {
            return Ok(DrainReport::default());
        }

        let drained = entries.len();
        let mut report = DrainReport::default();
        for entry in entries {
            if let Err(error) = self
                .ctx
                .item_snapshot(&entry.actor_id, &entry.item_id)
                .await
                .map_err(ResolutionContext::stale)
            {
                warn!(
                    target: "runtime::queues",
                    actor = %entry.actor_id,
                    item = %entry.item_id,
                    error = %error,
                    "Skipping stale AfterMain entry"
                );
                report.skipped += 1;
                continue;
            }

            match self
                .execute_bucket(
                    &entry.actor_id,
                    &entry.item_id,
                    &entry.bucket,
                    &entry.targets,
                    true,
                )
                .await
            {
                Ok(()) => report.executed += 1,
                Err(error) => {
                    self.bucket_failed(&entry.bucket.key, &error);
                    report.failed += 1;
                }
            }
        }

        // Entries enqueued while the drain awaited wait for the next round.
        let remaining = queue.drop_front(drained)?;
        info!(
            target: "runtime::queues",
            executed = report.executed,
            skipped = report.skipped,
            failed = report.failed,
            remaining,
            "AfterMain queue drained"
        );
        self.ctx.events.publish(QueueEvent::AfterMainDrained {
            executed: report.executed,
            skipped: report.skipped,
            failed: report.failed,
        });
        Ok(report)
    }

    /// Drops every pending AfterMain entry. Authority only.
    pub fn clear_after_main(&self) -> Result<()> {
        if !self.ctx.is_authority() {
            debug!(target: "runtime::queues", "Not the authority, skipping AfterMain clear");
            return Ok(());
        }
        AfterMainQueue::new(Arc::clone(&self.ctx.settings)).clear()?;
        self.ctx.events.publish(QueueEvent::AfterMainCleared);
        Ok(())
    }

    pub async fn register_after_damage_extension(
        &self,
        key: AggregationKey,
        expected: &[ActorId],
        buckets: Vec<ExtensionBucket>,
    ) -> Result<()> {
        let follow_up = ExtensionFollowUp {
            actor: key.attacker.clone(),
            item: key.item.clone(),
            buckets,
        };
        self.authority
            .request(Message::RegisterAfterDamageExtension(ExtensionRegistration {
                key,
                expected: expected.to_vec(),
                follow_up,
            }))
            .await
    }

    pub async fn register_after_damage_activation(
        &self,
        key: AggregationKey,
        expected: &[ActorId],
        follow_up: ActivationFollowUp,
    ) -> Result<()> {
        self.authority
            .request(Message::RegisterAfterDamageActivation(ActivationRegistration {
                key,
                expected: expected.to_vec(),
                follow_up,
            }))
            .await
    }

    pub async fn report_damage_for_activation(&self, report: DamageReport) -> Result<()> {
        self.authority
            .request(Message::ReportDamageForActivation(report))
            .await
    }

    pub async fn report_damage_for_apply(&self, report: DamageReport) -> Result<()> {
        self.authority
            .request(Message::ReportDamageForApply(report))
            .await
    }
}
