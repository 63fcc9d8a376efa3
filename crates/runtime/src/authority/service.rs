//! The authority-side request handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use combat_core::{ActorId, CombatError, ParticipantId};

use super::Authority;
use crate::api::{ConfirmRequest, Result, RuntimeError};
use crate::context::ResolutionContext;
use crate::events::{CombatEvent, ProtocolEvent};
use crate::protocol::{Envelope, Message, MessageKind, Recipient, Rejection};
use crate::queues::AfterDamageQueues;
use crate::resolver::DamageResolver;
use crate::triggers::{ConditionToggle, TriggerLedger};

/// Owns every mutation of shared combat state.
///
/// Requests arrive either in-process (through [`LocalAuthority`] or the
/// service's own [`Authority`] impl during finalization) or from the bus.
/// Each request is validated, permission-checked, optionally confirmed by
/// the operator and then dispatched to its handler.
///
/// [`LocalAuthority`]: super::LocalAuthority
pub struct AuthorityService {
    pub(crate) ctx: ResolutionContext,
    pub(crate) after_damage: AfterDamageQueues,
    pub(crate) ledger: Arc<TriggerLedger>,
    pub(crate) toggle: Arc<dyn ConditionToggle>,
}

impl AuthorityService {
    pub fn new(
        ctx: ResolutionContext,
        ledger: Arc<TriggerLedger>,
        toggle: Arc<dyn ConditionToggle>,
    ) -> Self {
        Self {
            ctx,
            after_damage: AfterDamageQueues::new(),
            ledger,
            toggle,
        }
    }

    pub fn context(&self) -> &ResolutionContext {
        &self.ctx
    }

    pub fn after_damage(&self) -> &AfterDamageQueues {
        &self.after_damage
    }

    pub fn ledger(&self) -> &Arc<TriggerLedger> {
        &self.ledger
    }

    /// Handles one request from `from`.
    ///
    /// Permission failures are dropped silently (logged at debug). Declined
    /// requests are answered with a rejection and mutate nothing.
    pub async fn handle(&self, from: &ParticipantId, message: Message) -> Result<()> {
        let kind = message.kind();
        message.validate()?;

        let actor = message.actor().clone();
        let permitted = self.permits(from, &actor).await
            || match message.attacker() {
                Some(attacker) => self.permits(from, attacker).await,
                None => false,
            };
        if !permitted {
            debug!(
                target: "runtime::authority",
                %kind,
                participant = %from,
                actor = %actor,
                "Permission denied, dropping request"
            );
            self.ctx.events.publish(ProtocolEvent::PermissionDenied {
                participant: from.clone(),
                actor,
                kind,
            });
            return Ok(());
        }

        if !self.approve(from, &message).await {
            return self.reject(from, kind, &actor, "declined by the authority");
        }

        debug!(target: "runtime::authority", %kind, from = %from, "Handling request");

        match message {
            Message::HealRequest(request) => self.apply_heal_request(request).await,
            Message::DamageRequest(request) => self.apply_damage_request(request).await,
            Message::ConditionRequest(request) => {
                self.apply_conditions(
                    &request.source_item,
                    &request.targets,
                    std::slice::from_ref(&request.grant),
                )
                .await
            }
            Message::ConditionRequestBulk(request) => {
                self.apply_conditions(&request.source_item, &request.targets, &request.grants)
                    .await
            }
            Message::EnqueueAfterMain(entry) => self.enqueue_after_main(entry),
            Message::RegisterAfterDamageExtension(registration) => {
                self.register_extension(registration).await
            }
            Message::RegisterAfterDamageActivation(registration) => {
                self.register_activation(registration).await
            }
            Message::ReportDamageForActivation(report) => self.report_activation(report).await,
            Message::ReportDamageForApply(report) => self.report_extension(report).await,
            Message::ShowDefenseDialog(request) => {
                DamageResolver::new(&self.ctx, self)
                    .apply_damage(&request)
                    .await
                    .map(|_| ())
            }
            Message::ApplyAttributes(grant) => self.apply_attributes(grant).await,
            Message::ConsumeUsage(request) => self.consume_usage(request).await,
            Message::CreateEquipment(request) => self.create_equipment(request).await,
            Message::Rejected(rejection) => {
                warn!(
                    target: "runtime::authority",
                    kind = %rejection.kind,
                    "Authority received a rejection notice, ignoring"
                );
                Ok(())
            }
        }
    }

    /// The authority acts for everyone; players only for actors they own.
    async fn permits(&self, from: &ParticipantId, actor: &ActorId) -> bool {
        if *from == self.ctx.authority_id {
            return true;
        }
        let state = self.ctx.state.read().await;
        state
            .actor(actor)
            .is_some_and(|actor| actor.is_owned_by(from))
    }

    async fn approve(&self, from: &ParticipantId, message: &Message) -> bool {
        if self.ctx.config.auto_approve || message.skip_dialog() {
            return true;
        }
        let request = ConfirmRequest::new(
            format!("Apply {}?", message.kind()),
            format!("{from} requests {} for {}", message.kind(), message.actor()),
        );
        self.ctx.prompt.confirm(&request).await
    }

    /// Tells the requester its request was declined.
    pub(crate) fn reject(
        &self,
        from: &ParticipantId,
        kind: MessageKind,
        actor: &ActorId,
        reason: &str,
    ) -> Result<()> {
        info!(
            target: "runtime::authority",
            %kind,
            participant = %from,
            actor = %actor,
            reason,
            "Request rejected"
        );

        if *from == self.ctx.participant {
            self.ctx.events.publish(ProtocolEvent::Rejected {
                kind,
                actor: actor.clone(),
                reason: reason.to_owned(),
            });
            return Ok(());
        }

        self.ctx.bus.emit(Envelope::new(
            self.ctx.participant.clone(),
            Recipient::Participant(from.clone()),
            Message::Rejected(Rejection {
                kind,
                actor: actor.clone(),
                reason: reason.to_owned(),
            }),
        ))
    }

    /// Logs a per-target failure and surfaces a generic notice.
    pub(crate) fn report_failure(&self, target: Option<&ActorId>, error: &RuntimeError) {
        error!(
            target: "runtime::authority",
            target_actor = ?target,
            code = error.error_code(),
            severity = error.severity().as_str(),
            error = %error,
            "Per-target mutation failed, continuing"
        );
        self.ctx.events.publish(CombatEvent::Failure {
            target: target.cloned(),
            message: error.to_string(),
        });
    }
}

#[async_trait]
impl Authority for AuthorityService {
    async fn request(&self, message: Message) -> Result<()> {
        self.handle(&self.ctx.participant, message).await
    }

    fn is_local(&self) -> bool {
        true
    }
}
