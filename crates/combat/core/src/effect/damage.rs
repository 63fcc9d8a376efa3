use crate::state::ActorState;

/// Result of [`apply_damage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DamageOutcome {
    pub previous: u32,
    pub current: u32,
    /// HP actually lost after reduce and clamping.
    pub realized: u32,
}

/// Deals `amount` damage to `target`, subtracting the target's reduce unless
/// `ignore_reduce` is set.
pub fn apply_damage(target: &mut ActorState, amount: i64, ignore_reduce: bool) -> DamageOutcome {
    let reduce = if ignore_reduce {
        0
    } else {
        target.effective_attributes().reduce
    };
    let dealt = (amount - reduce).max(0);

    let previous = target.hp.current;
    target.hp.set(i64::from(previous) - dealt);

    DamageOutcome {
        previous,
        current: target.hp.current,
        realized: previous - target.hp.current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CombatAttributes, ResourceMeter};

    fn target() -> ActorState {
        ActorState::new("npc", "NPC", ResourceMeter::new(10, 30)).with_attributes(
            CombatAttributes {
                reduce: 3,
                ..CombatAttributes::default()
            },
        )
    }

    #[test]
    fn reduce_applies_unless_ignored() {
        let mut reduced = target();
        assert_eq!(apply_damage(&mut reduced, 5, false).realized, 2);

        let mut ignored = target();
        assert_eq!(apply_damage(&mut ignored, 5, true).realized, 5);
    }

    #[test]
    fn realized_delta_stops_at_zero_hp() {
        let mut target = target();
        let outcome = apply_damage(&mut target, 50, true);

        assert_eq!(
            outcome,
            DamageOutcome {
                previous: 10,
                current: 0,
                realized: 10
            }
        );
    }
}
