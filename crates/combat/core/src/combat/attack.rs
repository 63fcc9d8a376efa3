use crate::config::CombatConfig;
use crate::dice::DiceExpr;
use crate::state::{ActorState, ConditionKind, ItemState};

/// Numbers carried from the attack judgement into the damage roll.
///
/// Captured before the judgement is rolled; anything that disables effects
/// after the roll must not change the damage that follows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttackBaseline {
    pub attack: i64,
    pub damage_roll: i64,
    pub penetrate: i64,
    pub weapon_attack: i64,
}

impl AttackBaseline {
    pub fn snapshot(actor: &ActorState, item: &ItemState) -> Self {
        let attributes = actor.effective_attributes();
        Self {
            attack: attributes.attack,
            damage_roll: attributes.damage_roll,
            penetrate: attributes.penetrate,
            weapon_attack: item.attack.attack,
        }
    }
}

/// Modifiers that conditions impose on an attacker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttackPenalty {
    /// Dice removed from the attack pool.
    pub dice: u32,
    /// Flat modifier on the damage roll.
    pub damage_add: i64,
}

impl AttackPenalty {
    pub fn for_actor(actor: &ActorState, config: &CombatConfig) -> Self {
        let conditions = &actor.conditions;
        Self {
            dice: if conditions.has(ConditionKind::Dazed) {
                config.dazed_dice_penalty
            } else {
                0
            },
            damage_add: if conditions.has(ConditionKind::Fear) {
                config.fear_damage_penalty
            } else {
                0
            },
        }
    }
}

/// Attack judgement pool: `N dx C + A` from actor and item stats.
pub fn attack_expression(actor: &ActorState, item: &ItemState, penalty: AttackPenalty) -> DiceExpr {
    let attributes = actor.effective_attributes();
    let count = attributes.dice + item.attack.dice - i64::from(penalty.dice);
    let critical = item.attack.critical + attributes.critical;

    DiceExpr::Critical {
        count: count.clamp(0, i64::from(u32::MAX)) as u32,
        critical: critical.clamp(i64::from(CombatConfig::MIN_CRITICAL), i64::from(u32::MAX))
            as u32,
        add: attributes.add + item.attack.add,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AttackProfile, CombatAttributes, ConditionDetail, ItemKind, ResourceMeter};

    fn attacker() -> ActorState {
        ActorState::new("pc", "PC", ResourceMeter::full(30)).with_attributes(CombatAttributes {
            dice: 4,
            critical: -1,
            add: 2,
            attack: 3,
            damage_roll: 1,
            penetrate: 2,
            ..CombatAttributes::default()
        })
    }

    fn blade() -> ItemState {
        ItemState::new("blade", "Blade", ItemKind::Weapon).with_attack(AttackProfile {
            dice: 1,
            add: 1,
            attack: 5,
            ..AttackProfile::default()
        })
    }

    #[test]
    fn expression_combines_actor_and_item() {
        let expr = attack_expression(&attacker(), &blade(), AttackPenalty::default());
        assert_eq!(
            expr,
            DiceExpr::Critical {
                count: 5,
                critical: 9,
                add: 3
            }
        );
    }

    #[test]
    fn dazed_attacker_loses_dice() {
        let mut actor = attacker();
        actor
            .conditions
            .apply(ConditionKind::Dazed, ConditionDetail::None);

        let penalty = AttackPenalty::for_actor(&actor, &CombatConfig::default());
        let DiceExpr::Critical { count, .. } = attack_expression(&actor, &blade(), penalty) else {
            panic!("attack pools are critical pools");
        };

        assert_eq!(count, 3);
        assert_eq!(penalty.damage_add, 0);
    }

    #[test]
    fn baseline_snapshot_is_independent_of_later_changes() {
        let mut actor = attacker();
        let baseline = AttackBaseline::snapshot(&actor, &blade());

        actor.attributes.attack = 0;

        assert_eq!(baseline.attack, 3);
        assert_eq!(baseline.weapon_attack, 5);
        assert_eq!(baseline.penetrate, 2);
    }
}
