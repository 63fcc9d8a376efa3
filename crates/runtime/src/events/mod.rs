//! Topic-based event bus for local notifications.
//!
//! Every state change the authority applies, every queue transition and every
//! rejection is published here. Hosts render these as chat messages or log
//! lines; tests subscribe to assert ordering.

mod bus;
mod types;

pub use bus::{Event, EventBus, Topic};
pub use types::{CombatEvent, ProtocolEvent, QueueEvent};
