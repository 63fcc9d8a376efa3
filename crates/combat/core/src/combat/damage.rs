use super::{AttackBaseline, AttackPenalty};
use crate::dice::DiceExpr;

/// Operator input for one damage roll.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DamageRollInput {
    /// Total of the attack judgement.
    pub attack_total: i64,
    pub extra_dice: i64,
    pub extra_add: i64,
}

/// Dice count and flat add of a damage roll.
///
/// ```text
/// dice = floor(attack_total / 10) + 1 + damage_roll + extra_dice
/// add  = attack + weapon_attack + fear_penalty + extra_add
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DamagePlan {
    pub dice: i64,
    pub add: i64,
}

impl DamagePlan {
    pub fn new(baseline: &AttackBaseline, penalty: AttackPenalty, input: DamageRollInput) -> Self {
        Self {
            dice: input.attack_total.div_euclid(10) + 1 + baseline.damage_roll + input.extra_dice,
            add: baseline.attack + baseline.weapon_attack + penalty.damage_add + input.extra_add,
        }
    }

    pub fn expr(&self) -> DiceExpr {
        DiceExpr::d10(self.dice, self.add)
    }
}
