//! Participant session orchestrator.
//!
//! A session wires one participant's ports into a [`ResolutionContext`],
//! picks the authority route once, and exposes the executor, the damage
//! resolver and the combat lifecycle hooks. [`Session::run`] pumps inbound
//! envelopes from the message bus until the bus closes.

use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, error, info, warn};

use combat_core::{
    CombatError, CombatState, Dice, DisableMode, ErrorSeverity, ExpressionEvaluator,
    FormulaEvaluator, ParticipantId, PcgDice,
};

use crate::api::{
    AutoPrompt, InMemorySettings, MacroRunner, NoopMacros, Prompt, Result, SettingsStore,
};
use crate::authority::{Authority, AuthorityService, LocalAuthority, RemoteAuthority};
use crate::config::SessionConfig;
use crate::context::{ResolutionContext, SharedState};
use crate::events::{Event, EventBus, ProtocolEvent, Topic};
use crate::executor::ResolutionExecutor;
use crate::protocol::{Envelope, LoopbackBus, Message, MessageBus, Recipient};
use crate::queues::DrainReport;
use crate::resolver::DamageResolver;
use crate::triggers::{StandardToggle, TriggerLedger};

/// One participant's view of a combat.
pub struct Session {
    ctx: ResolutionContext,
    authority: Arc<dyn Authority>,
    service: Option<Arc<AuthorityService>>,
}

impl Session {
    /// Create a new session builder
    pub fn builder(participant: ParticipantId, authority: ParticipantId) -> SessionBuilder {
        SessionBuilder::new(participant, authority)
    }

    pub fn context(&self) -> &ResolutionContext {
        &self.ctx
    }

    pub fn participant(&self) -> &ParticipantId {
        &self.ctx.participant
    }

    pub fn state(&self) -> &SharedState {
        &self.ctx.state
    }

    pub fn events(&self) -> &EventBus {
        &self.ctx.events
    }

    /// Subscribe to one event topic
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.ctx.events.subscribe(topic)
    }

    /// Authority-side request handler; `None` on other participants.
    pub fn service(&self) -> Option<&Arc<AuthorityService>> {
        self.service.as_ref()
    }

    pub fn is_authority(&self) -> bool {
        self.ctx.is_authority()
    }

    pub fn authority(&self) -> &dyn Authority {
        self.authority.as_ref()
    }

    pub fn executor(&self) -> ResolutionExecutor<'_> {
        ResolutionExecutor::new(&self.ctx, self.authority.as_ref())
    }

    pub fn resolver(&self) -> DamageResolver<'_> {
        DamageResolver::new(&self.ctx, self.authority.as_ref())
    }

    /// Starts a combat with empty queues.
    pub async fn start_combat(&self) -> Result<()> {
        self.reset_queues()?;
        info!(target: "runtime::session", participant = %self.ctx.participant, "Combat started");
        Ok(())
    }

    /// Round boundary: drains AfterMain, then refreshes per-round usage.
    pub async fn begin_round(&self) -> Result<DrainReport> {
        let report = self.executor().drain_after_main().await?;
        if self.is_authority() {
            let reset = self.ctx.state.write().await.reset_usage(DisableMode::Round);
            debug!(target: "runtime::session", reset, "Round usage reset");
        }
        Ok(report)
    }

    /// Ends the combat; pending follow-ups are dropped without running.
    pub async fn end_combat(&self) -> Result<()> {
        self.reset_queues()?;
        if self.is_authority() {
            let mut state = self.ctx.state.write().await;
            let reset =
                state.reset_usage(DisableMode::Round) + state.reset_usage(DisableMode::Scene);
            debug!(target: "runtime::session", reset, "Combat usage reset");
        }
        info!(target: "runtime::session", participant = %self.ctx.participant, "Combat ended");
        Ok(())
    }

    fn reset_queues(&self) -> Result<()> {
        self.executor().clear_after_main()?;
        if let Some(service) = &self.service {
            service.after_damage().clear()?;
            service.ledger().clear()?;
        }
        Ok(())
    }

    /// Routes one inbound envelope.
    ///
    /// Envelopes this participant sent, or that are addressed elsewhere, are
    /// ignored.
    pub async fn handle_envelope(&self, envelope: Envelope) -> Result<()> {
        if envelope.from == self.ctx.participant
            || !envelope.is_for(&self.ctx.participant, self.is_authority())
        {
            return Ok(());
        }
        let Envelope { from, to, message } = envelope;

        if matches!(to, Recipient::Authority)
            && let Some(service) = &self.service
        {
            return service.handle(&from, message).await;
        }

        match message {
            Message::ShowDefenseDialog(request) => {
                self.resolver().apply_damage(&request).await.map(|_| ())
            }
            Message::Rejected(rejection) => {
                info!(
                    target: "runtime::session",
                    kind = %rejection.kind,
                    actor = %rejection.actor,
                    reason = %rejection.reason,
                    "Request rejected by the authority"
                );
                self.ctx.events.publish(ProtocolEvent::Rejected {
                    kind: rejection.kind,
                    actor: rejection.actor,
                    reason: rejection.reason,
                });
                Ok(())
            }
            other => {
                debug!(
                    target: "runtime::session",
                    kind = %other.kind(),
                    from = %from,
                    "Ignoring envelope"
                );
                Ok(())
            }
        }
    }

    /// Handles envelopes until the bus closes.
    ///
    /// Failures are logged by severity and never stop the loop.
    pub async fn run(&self, mut receiver: broadcast::Receiver<Envelope>) {
        loop {
            let envelope = match receiver.recv().await {
                Ok(envelope) => envelope,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(target: "runtime::session", missed, "Message bus lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let kind = envelope.message.kind();
            if let Err(err) = self.handle_envelope(envelope).await {
                match err.severity() {
                    ErrorSeverity::Recoverable | ErrorSeverity::Validation => warn!(
                        target: "runtime::session",
                        %kind,
                        code = err.error_code(),
                        error = %err,
                        "Envelope failed"
                    ),
                    _ => error!(
                        target: "runtime::session",
                        %kind,
                        code = err.error_code(),
                        error = %err,
                        "Envelope failed"
                    ),
                }
            }
        }
        debug!(target: "runtime::session", participant = %self.ctx.participant, "Message bus closed");
    }
}

/// Builder for [`Session`]; every port has a headless default.
pub struct SessionBuilder {
    participant: ParticipantId,
    authority: ParticipantId,
    config: SessionConfig,
    state: Option<SharedState>,
    prompt: Option<Arc<dyn Prompt>>,
    dice: Option<Arc<dyn Dice>>,
    evaluator: Option<Arc<dyn FormulaEvaluator>>,
    bus: Option<Arc<dyn MessageBus>>,
    settings: Option<Arc<dyn SettingsStore>>,
    macros: Option<Arc<dyn MacroRunner>>,
}

impl SessionBuilder {
    fn new(participant: ParticipantId, authority: ParticipantId) -> Self {
        Self {
            participant,
            authority,
            config: SessionConfig::default(),
            state: None,
            prompt: None,
            dice: None,
            evaluator: None,
            bus: None,
            settings: None,
            macros: None,
        }
    }

    /// Override session configuration
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Provide the initial combat state
    pub fn state(mut self, state: CombatState) -> Self {
        self.state = Some(Arc::new(RwLock::new(state)));
        self
    }

    /// Share a state replica with another session of the same process.
    pub fn shared_state(mut self, state: SharedState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn prompt(mut self, prompt: Arc<dyn Prompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn dice(mut self, dice: Arc<dyn Dice>) -> Self {
        self.dice = Some(dice);
        self
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn FormulaEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn macros(mut self, macros: Arc<dyn MacroRunner>) -> Self {
        self.macros = Some(macros);
        self
    }

    /// Build the session.
    ///
    /// The authority gets an [`AuthorityService`] behind a
    /// [`LocalAuthority`]; everyone else forwards through a
    /// [`RemoteAuthority`].
    pub fn build(self) -> Session {
        let config = Arc::new(self.config);
        let bus = self
            .bus
            .unwrap_or_else(|| Arc::new(LoopbackBus::new(config.bus_buffer_size)));

        let ctx = ResolutionContext {
            participant: self.participant,
            authority_id: self.authority,
            state: self
                .state
                .unwrap_or_else(|| Arc::new(RwLock::new(CombatState::default()))),
            prompt: self.prompt.unwrap_or_else(|| Arc::new(AutoPrompt)),
            dice: self.dice.unwrap_or_else(|| Arc::new(PcgDice::default())),
            evaluator: self
                .evaluator
                .unwrap_or_else(|| Arc::new(ExpressionEvaluator)),
            bus: Arc::clone(&bus),
            settings: self
                .settings
                .unwrap_or_else(|| Arc::new(InMemorySettings::new())),
            macros: self.macros.unwrap_or_else(|| Arc::new(NoopMacros)),
            events: EventBus::with_capacity(config.event_buffer_size),
            config,
        };

        let (authority, service): (Arc<dyn Authority>, _) = if ctx.is_authority() {
            let ledger = Arc::new(TriggerLedger::new());
            let toggle = Arc::new(StandardToggle::new(
                Arc::clone(&ledger),
                ctx.events.clone(),
            ));
            let service = Arc::new(AuthorityService::new(ctx.clone(), ledger, toggle));
            (
                Arc::new(LocalAuthority::new(Arc::clone(&service))),
                Some(service),
            )
        } else {
            (
                Arc::new(RemoteAuthority::new(ctx.participant.clone(), bus)),
                None,
            )
        };

        info!(
            target: "runtime::session",
            participant = %ctx.participant,
            authority = ctx.is_authority(),
            "Session built"
        );
        Session {
            ctx,
            authority,
            service,
        }
    }
}
