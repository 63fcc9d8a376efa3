//! Message bus port and the in-process loopback implementation.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use combat_core::ParticipantId;

use super::Message;
use crate::api::{Result, RuntimeError};

/// Who an envelope is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "to", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    Authority,
    Participant(ParticipantId),
    Broadcast,
}

/// A message with routing information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: ParticipantId,
    pub to: Recipient,
    pub message: Message,
}

impl Envelope {
    pub fn new(from: ParticipantId, to: Recipient, message: Message) -> Self {
        Self { from, to, message }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes and validates an envelope received from the wire.
    pub fn from_json(raw: &str) -> Result<Self> {
        let envelope: Self = serde_json::from_str(raw)?;
        envelope.message.validate()?;
        Ok(envelope)
    }

    /// True if `participant` should handle this envelope.
    pub fn is_for(&self, participant: &ParticipantId, is_authority: bool) -> bool {
        match &self.to {
            Recipient::Authority => is_authority,
            Recipient::Participant(id) => id == participant,
            Recipient::Broadcast => true,
        }
    }
}

/// Message bus port: broadcast emit, dispatch by subscription.
pub trait MessageBus: Send + Sync {
    fn emit(&self, envelope: Envelope) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<Envelope>;
}

/// In-process bus shared by every session of one process.
///
/// Every subscriber sees every envelope, including its own; sessions filter
/// by [`Envelope::is_for`].
#[derive(Clone)]
pub struct LoopbackBus {
    sender: broadcast::Sender<Envelope>,
}

impl LoopbackBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity.max(1)).0,
        }
    }
}

impl Default for LoopbackBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl MessageBus for LoopbackBus {
    fn emit(&self, envelope: Envelope) -> Result<()> {
        let kind = envelope.message.kind();
        if self.sender.send(envelope).is_err() {
            tracing::debug!(target: "runtime::bus", %kind, "No bus subscribers");
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }
}

impl From<broadcast::error::RecvError> for RuntimeError {
    fn from(_: broadcast::error::RecvError) -> Self {
        RuntimeError::BusClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MessageKind, Rejection};
    use combat_core::ActorId;

    fn rejection() -> Envelope {
        Envelope::new(
            ParticipantId::new("gm"),
            Recipient::Participant(ParticipantId::new("alice")),
            Message::Rejected(Rejection {
                kind: MessageKind::HealRequest,
                actor: ActorId::new("pc"),
                reason: "declined".into(),
            }),
        )
    }

    #[test]
    fn envelope_survives_the_wire() {
        let envelope = rejection();
        let decoded = Envelope::from_json(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn routing_filters_by_recipient() {
        let envelope = rejection();
        assert!(envelope.is_for(&ParticipantId::new("alice"), false));
        assert!(!envelope.is_for(&ParticipantId::new("gm"), true));
    }

    #[tokio::test]
    async fn loopback_delivers_to_every_subscriber() {
        let bus = LoopbackBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(rejection()).unwrap();

        assert_eq!(first.recv().await.unwrap(), rejection());
        assert_eq!(second.recv().await.unwrap(), rejection());
    }

    #[test]
    fn emit_without_subscribers_is_ok() {
        assert!(LoopbackBus::default().emit(rejection()).is_ok());
    }
}
