//! Deferred execution queues owned by the authority.
//!
//! - [`AfterMainQueue`] persists entries in the settings store until the next
//!   round boundary drains them in FIFO order.
//! - [`AfterDamageQueues`] hold one aggregation per attacker and item until
//!   every expected target has reported the damage it actually took.

mod after_damage;
mod after_main;

pub use after_damage::{AfterDamageQueues, AggregationQueue, Completion, ReportOutcome};
pub use after_main::{AFTER_MAIN_KEY, AfterMainQueue, DrainReport};
