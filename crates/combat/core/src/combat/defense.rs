use crate::state::ActorState;

/// One target's defense declaration against a damage roll.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DefenseInput {
    pub damage: i64,
    pub guard: i64,
    pub armor: i64,
    pub penetrate: i64,
    pub reduce: i64,
    /// Covering multiplier; 0 means the target is not covering anyone.
    pub covering: u32,
}

impl DefenseInput {
    pub fn effective_armor(&self) -> i64 {
        (self.armor - self.penetrate).max(0)
    }

    /// Damage that actually reaches the target's HP.
    pub fn real_damage(&self) -> i64 {
        let through = self.damage - self.guard - self.effective_armor();
        let scaled = if self.covering > 0 {
            through * (i64::from(self.covering) + 1)
        } else {
            through
        };
        (scaled - self.reduce).max(0)
    }
}

/// Guard a target may declare: base guard plus equipped temporary weapons,
/// or 0 while a guard-suppressing condition is active.
pub fn effective_guard(target: &ActorState) -> i64 {
    if target.conditions.suppresses_guard() {
        return 0;
    }
    target.effective_attributes().guard + target.temporary_guard()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        AttackProfile, BerserkMode, CombatAttributes, ConditionDetail, ConditionKind, ItemKind,
        ItemState, ResourceMeter,
    };

    fn input(covering: u32) -> DefenseInput {
        DefenseInput {
            damage: 20,
            guard: 5,
            armor: 8,
            penetrate: 3,
            reduce: 2,
            covering,
        }
    }

    #[test]
    fn real_damage_subtracts_guard_armor_and_reduce() {
        assert_eq!(input(0).effective_armor(), 5);
        assert_eq!(input(0).real_damage(), 8);
    }

    #[test]
    fn covering_multiplies_before_reduce() {
        assert_eq!(input(1).real_damage(), 18);
    }

    #[test]
    fn real_damage_never_negative() {
        let weak = DefenseInput {
            damage: 3,
            ..input(0)
        };
        assert_eq!(weak.real_damage(), 0);

        let over_penetrated = DefenseInput {
            penetrate: 20,
            ..input(0)
        };
        assert_eq!(over_penetrated.effective_armor(), 0);
    }

    #[test]
    fn berserk_forces_guard_to_zero() {
        let shield = {
            let mut item = ItemState::new("shield", "Shield", ItemKind::Weapon).with_attack(
                AttackProfile {
                    guard: 3,
                    ..AttackProfile::default()
                },
            );
            item.temporary = true;
            item.equipped = true;
            item
        };
        let mut target = ActorState::new("npc", "NPC", ResourceMeter::full(30))
            .with_attributes(CombatAttributes {
                guard: 4,
                ..CombatAttributes::default()
            })
            .with_item(shield);

        assert_eq!(effective_guard(&target), 7);

        target.conditions.apply(
            ConditionKind::Berserk,
            ConditionDetail::Berserk {
                mode: BerserkMode::Release,
            },
        );
        assert_eq!(effective_guard(&target), 0);
    }
}
