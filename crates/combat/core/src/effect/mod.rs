//! HP mutations applied by the authority.
//!
//! These are the only functions in the crate that write to an
//! [`ActorState`](crate::state::ActorState). Both clamp HP to `[0, max]` and
//! report the realized change, which is what aggregation and bookkeeping use.

mod damage;
mod heal;

pub use damage::{DamageOutcome, apply_damage};
pub use heal::{HealBlockReason, HealOutcome, apply_heal};
