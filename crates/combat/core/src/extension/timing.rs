//! Effective-phase classification.
//!
//! Heal, damage and condition extensions run at their own declared timing.
//! Equipment-creation extensions always inherit the triggering item's runtime
//! timing, so one item can activate at AfterSuccess while its damage
//! extension waits for AfterMain.

use super::{ExtensionKind, ExtensionSpec, Timing};
use crate::state::{ActionType, ActiveSpec, RollKind};

/// Runtime timing of the triggering item itself.
///
/// A casting item that performs a judgement roll resolves after that roll
/// succeeds; every other item uses its declared run timing.
pub fn parent_timing(active: &ActiveSpec) -> Timing {
    if active.action_type == ActionType::Casting && active.roll != RollKind::None {
        return Timing::AfterSuccess;
    }
    active.run_timing.unwrap_or_default()
}

/// Effective phase of one extension.
pub fn classify(kind: ExtensionKind, spec: &ExtensionSpec, parent: Timing) -> Timing {
    if kind.is_equipment() {
        parent
    } else {
        spec.timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::EquipmentCreation;
    use crate::state::AttackProfile;

    #[test]
    fn casting_roll_maps_to_after_success() {
        let active = ActiveSpec {
            run_timing: Some(Timing::Instant),
            action_type: ActionType::Casting,
            roll: RollKind::Cast,
        };
        assert_eq!(parent_timing(&active), Timing::AfterSuccess);
    }

    #[test]
    fn casting_without_roll_uses_run_timing() {
        let active = ActiveSpec {
            run_timing: Some(Timing::AfterMain),
            action_type: ActionType::Casting,
            roll: RollKind::None,
        };
        assert_eq!(parent_timing(&active), Timing::AfterMain);
    }

    #[test]
    fn missing_run_timing_is_instant() {
        assert_eq!(parent_timing(&ActiveSpec::default()), Timing::Instant);
    }

    #[test]
    fn equipment_inherits_parent_while_damage_keeps_its_own() {
        let weapon = ExtensionSpec::equipment(EquipmentCreation::new(
            "Bone Blade",
            AttackProfile::default(),
        ))
        .at(Timing::AfterMain);
        let damage = ExtensionSpec::formula("2", "0").at(Timing::AfterMain);

        assert_eq!(
            classify(ExtensionKind::Weapon, &weapon, Timing::AfterSuccess),
            Timing::AfterSuccess
        );
        assert_eq!(
            classify(ExtensionKind::Damage, &damage, Timing::AfterSuccess),
            Timing::AfterMain
        );
    }
}
