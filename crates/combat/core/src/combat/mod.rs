//! Attack, damage and defense math.
//!
//! All functions are pure. The runtime resolver drives them in three steps,
//! each potentially on a different participant:
//!
//! 1. attack judgement: [`attack_expression`] with [`AttackPenalty`], and an
//!    [`AttackBaseline`] captured before the roll
//! 2. damage roll: [`DamagePlan`] built from the baseline
//! 3. defense, once per target: [`DefenseInput::real_damage`]

mod attack;
mod damage;
mod defense;

pub use attack::{AttackBaseline, AttackPenalty, attack_expression};
pub use damage::{DamagePlan, DamageRollInput};
pub use defense::{DefenseInput, effective_guard};
