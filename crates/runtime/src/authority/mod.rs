//! Authority routing.
//!
//! Exactly one participant of a session is the authority; only it mutates
//! shared combat state. Every other participant forwards requests over the
//! bus. Callers never check which case they are in: the session picks a
//! [`LocalAuthority`] or a [`RemoteAuthority`] once and hands it to the
//! executor and resolver.

mod service;

pub use service::AuthorityService;

use std::sync::Arc;

use async_trait::async_trait;

use combat_core::ParticipantId;

use crate::api::Result;
use crate::protocol::{Envelope, Message, MessageBus, Recipient};

/// Port through which every state-changing request travels.
#[async_trait]
pub trait Authority: Send + Sync {
    async fn request(&self, message: Message) -> Result<()>;

    /// True if requests are applied in this process.
    fn is_local(&self) -> bool;
}

/// Applies requests in-process; no bus traffic.
pub struct LocalAuthority {
    service: Arc<AuthorityService>,
}

impl LocalAuthority {
    pub fn new(service: Arc<AuthorityService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<AuthorityService> {
        &self.service
    }
}

#[async_trait]
impl Authority for LocalAuthority {
    async fn request(&self, message: Message) -> Result<()> {
        self.service.request(message).await
    }

    fn is_local(&self) -> bool {
        true
    }
}

/// Forwards each request as exactly one envelope to the authority.
pub struct RemoteAuthority {
    participant: ParticipantId,
    bus: Arc<dyn MessageBus>,
}

impl RemoteAuthority {
    pub fn new(participant: ParticipantId, bus: Arc<dyn MessageBus>) -> Self {
        Self { participant, bus }
    }
}

#[async_trait]
impl Authority for RemoteAuthority {
    async fn request(&self, message: Message) -> Result<()> {
        message.validate()?;
        tracing::debug!(
            target: "runtime::authority",
            kind = %message.kind(),
            from = %self.participant,
            "Forwarding request to authority"
        );
        self.bus.emit(Envelope::new(
            self.participant.clone(),
            Recipient::Authority,
            message,
        ))
    }

    fn is_local(&self) -> bool {
        false
    }
}
