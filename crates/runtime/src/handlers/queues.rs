//! AfterMain enqueue and AfterDamage registration, reporting and finalization.

use std::sync::Arc;

use tracing::{debug, info, warn};

use combat_core::{ActorId, CombatError};

use crate::api::Result;
use crate::authority::AuthorityService;
use crate::events::{CombatEvent, QueueEvent};
use crate::executor::ResolutionExecutor;
use crate::protocol::{
    ActivationFollowUp, ActivationRegistration, AfterMainEntry, AggregationKey, DamageReport,
    ExtensionFollowUp, ExtensionRegistration,
};
use crate::queues::{AfterMainQueue, Completion, ReportOutcome};

impl AuthorityService {
    pub(crate) fn enqueue_after_main(&self, entry: AfterMainEntry) -> Result<()> {
        let queue = AfterMainQueue::new(Arc::clone(&self.ctx.settings));
        let (actor, item, kind) = (entry.actor_id.clone(), entry.item_id.clone(), entry.kind);

        let depth = queue.push(entry)?;

        info!(
            target: "runtime::queues",
            actor = %actor,
            item = %item,
            %kind,
            depth,
            "AfterMain entry enqueued"
        );
        self.ctx.events.publish(QueueEvent::AfterMainEnqueued {
            actor,
            item,
            kind,
            depth,
        });
        Ok(())
    }

    pub(crate) async fn register_extension(
        &self,
        registration: ExtensionRegistration,
    ) -> Result<()> {
        let ExtensionRegistration {
            key,
            expected,
            follow_up,
        } = registration;

        if expected.is_empty() {
            return self
                .finalize_extension(key, Completion {
                    payload: follow_up,
                    damaged: Vec::new(),
                    undamaged: Vec::new(),
                })
                .await;
        }

        let count = expected.len();
        self.after_damage
            .extension
            .register(key.clone(), expected, follow_up)?;
        self.registered(key, count);
        Ok(())
    }

    pub(crate) async fn register_activation(
        &self,
        registration: ActivationRegistration,
    ) -> Result<()> {
        let ActivationRegistration {
            key,
            expected,
            follow_up,
        } = registration;

        if expected.is_empty() {
            return self
                .finalize_activation(key, Completion {
                    payload: follow_up,
                    damaged: Vec::new(),
                    undamaged: Vec::new(),
                })
                .await;
        }

        let count = expected.len();
        self.after_damage
            .activation
            .register(key.clone(), expected, follow_up)?;
        self.registered(key, count);
        Ok(())
    }

    fn registered(&self, key: AggregationKey, expected: usize) {
        debug!(
            target: "runtime::queues",
            key = %key,
            expected,
            "AfterDamage aggregation registered"
        );
        self.ctx
            .events
            .publish(QueueEvent::AfterDamageRegistered { key, expected });
    }

    pub(crate) async fn report_extension(&self, report: DamageReport) -> Result<()> {
        let DamageReport {
            key,
            target,
            realized,
        } = report;
        match self.after_damage.extension.report(&key, &target, realized)? {
            ReportOutcome::Completed(done) => self.finalize_extension(key, done).await,
            ReportOutcome::Pending { remaining } => {
                debug!(target: "runtime::queues", key = %key, remaining, "Awaiting damage reports");
                Ok(())
            }
            ReportOutcome::Ignored => Ok(()),
        }
    }

    pub(crate) async fn report_activation(&self, report: DamageReport) -> Result<()> {
        let DamageReport {
            key,
            target,
            realized,
        } = report;
        match self.after_damage.activation.report(&key, &target, realized)? {
            ReportOutcome::Completed(done) => self.finalize_activation(key, done).await,
            ReportOutcome::Pending { remaining } => {
                debug!(target: "runtime::queues", key = %key, remaining, "Awaiting damage reports");
                Ok(())
            }
            ReportOutcome::Ignored => Ok(()),
        }
    }

    /// Runs deferred AfterDamage buckets.
    ///
    /// Buckets scoped to selected targets run only if somebody was damaged,
    /// and then only against the damaged targets.
    async fn finalize_extension(
        &self,
        key: AggregationKey,
        done: Completion<ExtensionFollowUp>,
    ) -> Result<()> {
        let Completion {
            payload, damaged, ..
        } = done;
        self.finalized(&key, &damaged);

        let executor = ResolutionExecutor::new(&self.ctx, self);
        for bucket in &payload.buckets {
            if damaged.is_empty() && !bucket.target().bypasses_damage_gate() {
                debug!(
                    target: "runtime::queues",
                    key = %key,
                    kind = %bucket.kind(),
                    "No target damaged, skipping AfterDamage bucket"
                );
                continue;
            }

            if let Err(error) = executor
                .execute_bucket(&payload.actor, &payload.item, bucket, &damaged, true)
                .await
            {
                warn!(
                    target: "runtime::queues",
                    key = %key,
                    kind = %bucket.kind(),
                    code = error.error_code(),
                    error = %error,
                    "AfterDamage bucket failed"
                );
                self.ctx.events.publish(CombatEvent::Failure {
                    target: None,
                    message: error.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Runs the macro and attribute activation attached to a damage roll.
    async fn finalize_activation(
        &self,
        key: AggregationKey,
        done: Completion<ActivationFollowUp>,
    ) -> Result<()> {
        let Completion {
            payload, damaged, ..
        } = done;
        self.finalized(&key, &damaged);

        let ActivationFollowUp {
            actor,
            macro_name,
            apply,
            scope,
            ..
        } = payload;
        if damaged.is_empty() && !scope.bypasses_damage_gate() {
            debug!(target: "runtime::queues", key = %key, "No target damaged, skipping activation");
            return Ok(());
        }

        let executor = ResolutionExecutor::new(&self.ctx, self);
        let targets = executor.resolve_targets(scope, &actor, &damaged).await?;

        if let Some(name) = macro_name
            && let Err(error) = self.ctx.macros.run(&name, &actor, &targets).await
        {
            self.report_failure(Some(&actor), &error);
        }

        if let Some(mut grant) = apply {
            grant.targets = targets;
            self.apply_attributes(grant).await?;
        }
        Ok(())
    }

    fn finalized(&self, key: &AggregationKey, damaged: &[ActorId]) {
        info!(
            target: "runtime::queues",
            key = %key,
            damaged = damaged.len(),
            "AfterDamage aggregation finalized"
        );
        self.ctx.events.publish(QueueEvent::AfterDamageFinalized {
            key: key.clone(),
            damaged: damaged.to_vec(),
        });
    }
}
