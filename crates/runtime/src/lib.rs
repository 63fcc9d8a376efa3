//! Effect-timing orchestration for multi-participant combat sessions.
//!
//! This crate sits between item-type handlers and the shared combat state.
//! It decides which extension buckets run now, which wait for the next round
//! boundary and which wait until damage lands, and it routes every state
//! change through the single authority participant.
//!
//! Modules are organized by responsibility:
//! - [`session`] hosts the participant orchestrator and builder
//! - [`executor`] and [`resolver`] are the entry points item handlers call
//! - [`authority`] routes requests and applies them on the authority
//! - [`queues`] holds the AfterMain and AfterDamage deferral queues
//! - [`protocol`] defines the bus messages and the message bus port
//! - [`api`] exposes errors and the host-provided ports
//! - [`events`] provides topic-based local notifications
//! - `testing` (feature `testing`) provides scripted ports for tests and demos
pub mod api;
pub mod authority;
pub mod config;
pub mod context;
pub mod events;
pub mod executor;
pub mod protocol;
pub mod queues;
pub mod resolver;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod triggers;

mod handlers;

pub use api::{
    AutoPrompt, ConditionSelection, ConfirmRequest, CustomFormula, DamageOptions,
    DefenseDeclaration, InMemorySettings, MacroRunner, NoopMacros, Prompt, Result, RuntimeError,
    SettingsStore,
};
pub use authority::{Authority, AuthorityService, LocalAuthority, RemoteAuthority};
pub use config::SessionConfig;
pub use context::{ResolutionContext, SharedState};
pub use events::{CombatEvent, Event, EventBus, ProtocolEvent, QueueEvent, Topic};
pub use executor::{ExtensionPass, ResolutionExecutor};
pub use protocol::{AggregationKey, Envelope, LoopbackBus, Message, MessageBus, Recipient};
pub use queues::{AfterDamageQueues, AfterMainQueue, DrainReport};
pub use resolver::{AttackRoll, DamageResolver, DamageRoll};
pub use session::{Session, SessionBuilder};
pub use triggers::{ConditionToggle, StandardToggle, TriggerLedger};
