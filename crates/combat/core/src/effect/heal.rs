use crate::extension::EffectFlags;
use crate::state::ActorState;

/// Why a heal left the target untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum HealBlockReason {
    /// Target is at 0 HP and the heal cannot revive.
    Incapacitated,
    /// Target carries a heal-suppressing condition.
    Suppressed,
}

/// Result of [`apply_heal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "result", rename_all = "snake_case"))]
pub enum HealOutcome {
    Blocked(HealBlockReason),
    Applied {
        previous: u32,
        current: u32,
        /// HP actually restored after clamping.
        healed: u32,
        encroachment_gain: u32,
    },
}

/// Heals `target` by `amount`.
///
/// Blocked heals leave the target unchanged. With [`EffectFlags::RESURRECT`]
/// the target's encroachment grows by the HP actually restored.
pub fn apply_heal(target: &mut ActorState, amount: i64, flags: EffectFlags) -> HealOutcome {
    if target.conditions.suppresses_heal() {
        return HealOutcome::Blocked(HealBlockReason::Suppressed);
    }
    if target.hp.is_empty() && !flags.contains(EffectFlags::REVIVAL) {
        return HealOutcome::Blocked(HealBlockReason::Incapacitated);
    }

    let previous = target.hp.current;
    target.hp.set(i64::from(previous) + amount.max(0));
    let healed = target.hp.current - previous;

    let encroachment_gain = if flags.contains(EffectFlags::RESURRECT) {
        healed
    } else {
        0
    };
    target.encroachment = target.encroachment.saturating_add(encroachment_gain);

    HealOutcome::Applied {
        previous,
        current: target.hp.current,
        healed,
        encroachment_gain,
    }
}
