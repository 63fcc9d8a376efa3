//! Authority message protocol.
//!
//! A closed set of tagged variants crosses the bus. Every variant carries
//! fully evaluated numbers, never raw formulas, so the authority applies them
//! without re-deriving randomness. Payloads are validated when they are sent
//! and again when they arrive.

mod bus;
mod message;

pub use bus::{Envelope, LoopbackBus, MessageBus, Recipient};
pub use message::{
    ActivationFollowUp, ActivationRegistration, AfterMainEntry, AggregationKey, AttributeGrant,
    ConditionGrant, ConditionRequest, ConditionRequestBulk, DamageReport, DamageRequest,
    DefenseRequest, EquipmentRequest, ExtensionFollowUp, ExtensionRegistration, HealRequest,
    Message, MessageKind, Rejection, UsageRequest,
};
