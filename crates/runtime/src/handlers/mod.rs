//! Authority-side handlers, one per message kind.
//!
//! Each handler runs on the authority after the request passed validation,
//! the permission check and the optional confirmation prompt. Handlers that
//! loop over targets never abort on a single target: the failure is logged,
//! surfaced as [`CombatEvent::Failure`](crate::events::CombatEvent::Failure)
//! and the loop continues.
//!
//! The combat-state write lock is never held across an `.await` that can
//! re-enter the service (prompts, finalization, nested requests).

mod effects;
mod items;
mod queues;
